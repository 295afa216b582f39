// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files and environment variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::config::{Configuration, ConfigurationLayer};
use crate::error::{ReportSdkError, Result};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ConfigurationLayer>;
}

/// Built-in defaults source. Fills the server name from the host.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ConfigurationLayer> {
		debug!("loading defaults");
		Ok(ConfigurationLayer {
			server_name: env_var("HOSTNAME").or_else(|| env_var("COMPUTERNAME")),
			..Default::default()
		})
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ConfigurationLayer> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ConfigurationLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ReportSdkError::ConfigRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ConfigurationLayer =
			toml::from_str(&content).map_err(|e| ReportSdkError::ConfigParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: LOOM_REPORT_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ConfigurationLayer> {
		debug!("loading environment variables");
		layer_from_lookup(env_var)
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
	value
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(String::from)
		.collect()
}

/// `key:value` pairs separated by commas.
fn parse_tags(name: &str, value: &str) -> Result<BTreeMap<String, String>> {
	parse_list(value)
		.into_iter()
		.map(|pair| match pair.split_once(':') {
			Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
			_ => Err(ReportSdkError::invalid_value(
				name,
				format!("expected key:value, got '{pair}'"),
			)),
		})
		.collect()
}

fn parse_number<T: std::str::FromStr>(name: &str, value: String) -> Result<T> {
	value
		.parse()
		.map_err(|_| ReportSdkError::invalid_value(name, format!("invalid number '{value}'")))
}

fn layer_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<ConfigurationLayer> {
	let send_modules = lookup("LOOM_REPORT_SEND_MODULES")
		.map(|v| v.eq_ignore_ascii_case("true") || v == "1");
	let tags = lookup("LOOM_REPORT_TAGS")
		.map(|v| parse_tags("LOOM_REPORT_TAGS", &v))
		.transpose()?;
	let max_breadcrumbs = lookup("LOOM_REPORT_MAX_BREADCRUMBS")
		.map(|v| parse_number("LOOM_REPORT_MAX_BREADCRUMBS", v))
		.transpose()?;
	let modules_timeout_ms = lookup("LOOM_REPORT_MODULES_TIMEOUT_MS")
		.map(|v| parse_number("LOOM_REPORT_MODULES_TIMEOUT_MS", v))
		.transpose()?;

	Ok(ConfigurationLayer {
		server_name: lookup("LOOM_REPORT_SERVER_NAME"),
		release: lookup("LOOM_REPORT_RELEASE"),
		environment: lookup("LOOM_REPORT_ENVIRONMENT"),
		excluded_exceptions: lookup("LOOM_REPORT_EXCLUDED_EXCEPTIONS").map(|v| parse_list(&v)),
		send_modules,
		tags,
		project_root: lookup("LOOM_REPORT_PROJECT_ROOT"),
		in_app_include: lookup("LOOM_REPORT_IN_APP_INCLUDE").map(|v| parse_list(&v)),
		max_breadcrumbs,
		modules_command: None,
		modules_timeout_ms,
	})
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_REPORT_*`)
/// 2. Config file at `path`, when given
/// 3. Built-in defaults
pub fn load_configuration(path: Option<&Path>) -> Result<Configuration> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(DefaultsSource), Box::new(EnvSource)];
	if let Some(path) = path {
		sources.push(Box::new(TomlSource::new(path)));
	}

	load_from_sources(sources)
}

/// Merge the given sources in precedence order.
pub fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<Configuration> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ConfigurationLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	Ok(merged.finalize())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	struct FixedSource(Precedence, ConfigurationLayer);

	impl ConfigSource for FixedSource {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.0
		}

		fn load(&self) -> Result<ConfigurationLayer> {
			Ok(self.1.clone())
		}
	}

	fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| vars.get(name).cloned()
	}

	#[test]
	fn test_env_layer_parses_all_fields() {
		let layer = layer_from_lookup(lookup_from(&[
			("LOOM_REPORT_SERVER_NAME", "web-1"),
			("LOOM_REPORT_RELEASE", "2.3.4"),
			("LOOM_REPORT_ENVIRONMENT", "staging"),
			("LOOM_REPORT_EXCLUDED_EXCEPTIONS", "FooError, BarError,"),
			("LOOM_REPORT_SEND_MODULES", "1"),
			("LOOM_REPORT_TAGS", "region:eu,tier:web"),
			("LOOM_REPORT_PROJECT_ROOT", "/srv/app"),
			("LOOM_REPORT_MAX_BREADCRUMBS", "25"),
			("LOOM_REPORT_MODULES_TIMEOUT_MS", "500"),
		]))
		.unwrap();

		assert_eq!(layer.server_name.as_deref(), Some("web-1"));
		assert_eq!(
			layer.excluded_exceptions,
			Some(vec!["FooError".to_string(), "BarError".to_string()])
		);
		assert_eq!(layer.send_modules, Some(true));
		assert_eq!(layer.tags.as_ref().unwrap()["tier"], "web");
		assert_eq!(layer.max_breadcrumbs, Some(25));
		assert_eq!(layer.modules_timeout_ms, Some(500));
	}

	#[test]
	fn test_env_layer_rejects_bad_numbers() {
		let result = layer_from_lookup(lookup_from(&[("LOOM_REPORT_MAX_BREADCRUMBS", "many")]));
		assert!(matches!(result, Err(ReportSdkError::InvalidValue { .. })));
	}

	#[test]
	fn test_env_layer_rejects_malformed_tags() {
		let result = layer_from_lookup(lookup_from(&[("LOOM_REPORT_TAGS", "region")]));
		assert!(matches!(result, Err(ReportSdkError::InvalidValue { .. })));
	}

	#[test]
	fn test_missing_toml_file_is_empty_layer() {
		let layer = TomlSource::new("/nonexistent/loom-report.toml").load().unwrap();
		assert_eq!(layer, ConfigurationLayer::default());
	}

	#[test]
	fn test_toml_file_is_parsed() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
release = "1.0.0"
environment = "staging"
excluded_exceptions = ["FooError"]
send_modules = false

[tags]
team = "payments"
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(layer.release.as_deref(), Some("1.0.0"));
		assert_eq!(layer.excluded_exceptions, Some(vec!["FooError".to_string()]));
		assert_eq!(layer.tags.unwrap()["team"], "payments");
	}

	#[test]
	fn test_invalid_toml_is_reported() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "release = [").unwrap();

		let result = TomlSource::new(file.path()).load();
		assert!(matches!(result, Err(ReportSdkError::ConfigParse { .. })));
	}

	#[test]
	fn test_sources_merge_by_precedence() {
		let sources: Vec<Box<dyn ConfigSource>> = vec![
			Box::new(FixedSource(
				Precedence::Environment,
				ConfigurationLayer {
					release: Some("from-env".to_string()),
					..Default::default()
				},
			)),
			Box::new(FixedSource(
				Precedence::ConfigFile,
				ConfigurationLayer {
					release: Some("from-file".to_string()),
					environment: Some("staging".to_string()),
					..Default::default()
				},
			)),
		];

		let config = load_from_sources(sources).unwrap();
		assert_eq!(config.release.as_deref(), Some("from-env"));
		assert_eq!(config.current_environment, "staging");
	}
}
