// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Report configuration: the values event construction reads.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use loom_report_core::{short_type_name, BreadcrumbBuffer, StackFrame, DEFAULT_MAX_BREADCRUMBS};
use serde::{Deserialize, Serialize};

use crate::backtrace::FrameClassifier;

const DEFAULT_ENVIRONMENT: &str = "production";
const DEFAULT_MODULES_TIMEOUT_MS: u64 = 2_000;

fn default_modules_command() -> Vec<String> {
	["cargo", "tree", "--depth", "1", "--prefix", "none"]
		.into_iter()
		.map(String::from)
		.collect()
}

/// One layer of configuration; unset fields defer to lower layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigurationLayer {
	pub server_name: Option<String>,
	pub release: Option<String>,
	pub environment: Option<String>,
	pub excluded_exceptions: Option<Vec<String>>,
	pub send_modules: Option<bool>,
	pub tags: Option<BTreeMap<String, String>>,
	pub project_root: Option<String>,
	pub in_app_include: Option<Vec<String>>,
	pub max_breadcrumbs: Option<usize>,
	pub modules_command: Option<Vec<String>>,
	pub modules_timeout_ms: Option<u64>,
}

impl ConfigurationLayer {
	pub fn merge(&mut self, other: Self) {
		if other.server_name.is_some() {
			self.server_name = other.server_name;
		}
		if other.release.is_some() {
			self.release = other.release;
		}
		if other.environment.is_some() {
			self.environment = other.environment;
		}
		if other.excluded_exceptions.is_some() {
			self.excluded_exceptions = other.excluded_exceptions;
		}
		if other.send_modules.is_some() {
			self.send_modules = other.send_modules;
		}
		if let Some(tags) = other.tags {
			// Tags accumulate across layers; the higher layer wins per key.
			self.tags.get_or_insert_with(BTreeMap::new).extend(tags);
		}
		if other.project_root.is_some() {
			self.project_root = other.project_root;
		}
		if other.in_app_include.is_some() {
			self.in_app_include = other.in_app_include;
		}
		if other.max_breadcrumbs.is_some() {
			self.max_breadcrumbs = other.max_breadcrumbs;
		}
		if other.modules_command.is_some() {
			self.modules_command = other.modules_command;
		}
		if other.modules_timeout_ms.is_some() {
			self.modules_timeout_ms = other.modules_timeout_ms;
		}
	}

	pub fn finalize(self) -> Configuration {
		Configuration {
			server_name: self.server_name,
			release: self.release,
			current_environment: self
				.environment
				.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
			excluded_exception_names: self.excluded_exceptions.unwrap_or_default().into_iter().collect(),
			send_modules: self.send_modules.unwrap_or(false),
			tags: self.tags.unwrap_or_default(),
			project_root: self.project_root,
			in_app_include: self.in_app_include.unwrap_or_default(),
			max_breadcrumbs: self.max_breadcrumbs.unwrap_or(DEFAULT_MAX_BREADCRUMBS),
			modules_command: self.modules_command.unwrap_or_else(default_modules_command),
			modules_timeout: Duration::from_millis(
				self.modules_timeout_ms.unwrap_or(DEFAULT_MODULES_TIMEOUT_MS),
			),
		}
	}
}

/// Fully resolved report configuration.
///
/// Built once near process start and passed explicitly into event
/// construction; nothing in this crate reads it from global state.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
	pub server_name: Option<String>,
	/// Semantic version or commit SHA
	pub release: Option<String>,
	/// "production", "staging", "development"
	pub current_environment: String,
	/// Error type names that are never reported.
	pub excluded_exception_names: BTreeSet<String>,
	/// Collect dependency versions into each event.
	pub send_modules: bool,
	pub tags: BTreeMap<String, String>,
	/// Frames under this path are application code.
	pub project_root: Option<String>,
	/// Extra path prefixes treated as application code.
	pub in_app_include: Vec<String>,
	pub max_breadcrumbs: usize,
	/// Program and arguments that print the dependency listing.
	pub modules_command: Vec<String>,
	pub modules_timeout: Duration,
}

impl Default for Configuration {
	fn default() -> Self {
		ConfigurationLayer::default().finalize()
	}
}

impl Configuration {
	/// True if errors of `type_name` must not be reported.
	///
	/// Matches the fully qualified name or its final path segment, so both
	/// `"FooError"` and `"my_app::FooError"` exclude `my_app::FooError`.
	pub fn is_excluded(&self, type_name: &str) -> bool {
		self.excluded_exception_names.contains(type_name)
			|| self
				.excluded_exception_names
				.contains(short_type_name(type_name))
	}

	/// An empty breadcrumb buffer sized by `max_breadcrumbs`.
	pub fn breadcrumb_buffer(&self) -> BreadcrumbBuffer {
		BreadcrumbBuffer::new(self.max_breadcrumbs)
	}

	fn in_app_roots(&self) -> impl Iterator<Item = &str> {
		self.project_root
			.as_deref()
			.into_iter()
			.chain(self.in_app_include.iter().map(String::as_str))
			.filter(|root| !root.is_empty())
	}
}

impl FrameClassifier for Configuration {
	fn is_in_app(&self, frame: &StackFrame) -> bool {
		match frame.abs_path.as_deref() {
			Some(path) => {
				if is_dependency_path(path) {
					return false;
				}
				let mut roots = self.in_app_roots().peekable();
				if roots.peek().is_none() {
					// Without roots, absolute paths defer to the symbol.
					return !Path::new(path).is_absolute()
						|| frame.function.as_deref().is_some_and(is_in_app_function);
				}
				roots.any(|root| path.starts_with(root)) || !Path::new(path).is_absolute()
			}
			None => frame.function.as_deref().is_some_and(is_in_app_function),
		}
	}

	fn relative_filename(&self, abs_path: &str) -> Option<String> {
		let root = self.project_root.as_deref().filter(|r| !r.is_empty())?;
		let rest = abs_path.strip_prefix(root)?;
		let rest = rest.trim_start_matches('/');
		if rest.is_empty() {
			None
		} else {
			Some(rest.to_string())
		}
	}
}

/// Paths of the toolchain and of downloaded crates.
fn is_dependency_path(path: &str) -> bool {
	const DEPENDENCY_MARKERS: &[&str] = &[
		"/.cargo/registry/",
		"/.cargo/git/",
		"/rustlib/",
		"/vendor/",
	];

	path.starts_with("/rustc/") || DEPENDENCY_MARKERS.iter().any(|m| path.contains(m))
}

/// Symbol heuristic for frames without a path: reject std and runtime
/// machinery.
pub(crate) fn is_in_app_function(function: &str) -> bool {
	const SYSTEM_PREFIXES: &[&str] = &[
		"std::",
		"core::",
		"alloc::",
		"<std::",
		"<core::",
		"<alloc::",
		"tokio::",
		"<tokio::",
		"futures::",
		"<futures::",
		"tracing::",
		"<tracing::",
		"test::",
		"<test::",
		"backtrace::",
		"<backtrace::",
		"panic_unwind::",
		"rust_begin_unwind",
		"rust_panic",
		"__rust_",
		"_rust_",
		"__libc_",
		"_start",
	];

	const SYSTEM_CONTAINS: &[&str] = &[
		"::panic::",
		"::panicking::",
		"::rt::",
		"::sys_common::",
		"::ops::function::",
		"loom_report::",
	];

	// Unqualified symbols are C or runtime entry points.
	function.contains("::")
		&& !SYSTEM_PREFIXES.iter().any(|p| function.starts_with(p))
		&& !SYSTEM_CONTAINS.iter().any(|c| function.contains(c))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn frame_at(path: &str) -> StackFrame {
		StackFrame {
			abs_path: Some(path.to_string()),
			..Default::default()
		}
	}

	#[test]
	fn test_layer_finalize_defaults() {
		let config = ConfigurationLayer::default().finalize();
		assert_eq!(config.current_environment, "production");
		assert!(!config.send_modules);
		assert!(config.excluded_exception_names.is_empty());
		assert_eq!(config.max_breadcrumbs, 100);
		assert_eq!(config.modules_timeout, Duration::from_secs(2));
		assert_eq!(config.modules_command[0], "cargo");
	}

	#[test]
	fn test_breadcrumb_buffer_uses_configured_capacity() {
		let config = Configuration {
			max_breadcrumbs: 3,
			..Default::default()
		};
		assert_eq!(config.breadcrumb_buffer().capacity(), 3);
	}

	#[test]
	fn test_merge_overwrites_set_fields_only() {
		let mut base = ConfigurationLayer {
			release: Some("1.0.0".to_string()),
			environment: Some("staging".to_string()),
			..Default::default()
		};
		base.merge(ConfigurationLayer {
			release: Some("1.1.0".to_string()),
			..Default::default()
		});

		assert_eq!(base.release.as_deref(), Some("1.1.0"));
		assert_eq!(base.environment.as_deref(), Some("staging"));
	}

	#[test]
	fn test_merge_accumulates_tags() {
		let mut base = ConfigurationLayer {
			tags: Some(BTreeMap::from([
				("region".to_string(), "eu".to_string()),
				("tier".to_string(), "web".to_string()),
			])),
			..Default::default()
		};
		base.merge(ConfigurationLayer {
			tags: Some(BTreeMap::from([("tier".to_string(), "worker".to_string())])),
			..Default::default()
		});

		let tags = base.tags.unwrap();
		assert_eq!(tags["region"], "eu");
		assert_eq!(tags["tier"], "worker");
	}

	#[test]
	fn test_is_excluded_matches_full_and_short_names() {
		let config = Configuration {
			excluded_exception_names: BTreeSet::from(["FooError".to_string()]),
			..Default::default()
		};

		assert!(config.is_excluded("FooError"));
		assert!(config.is_excluded("my_app::errors::FooError"));
		assert!(!config.is_excluded("my_app::errors::BarError"));
	}

	#[test]
	fn test_in_app_by_project_root() {
		let config = Configuration {
			project_root: Some("/srv/app".to_string()),
			..Default::default()
		};

		assert!(config.is_in_app(&frame_at("/srv/app/src/main.rs")));
		assert!(!config.is_in_app(&frame_at("/usr/lib/libc.so.6")));
		assert!(!config.is_in_app(&frame_at(
			"/home/me/.cargo/registry/src/index.crates.io/tokio-1.0.0/src/lib.rs"
		)));
		assert!(!config.is_in_app(&frame_at("/rustc/abc123/library/core/src/result.rs")));
	}

	#[test]
	fn test_in_app_relative_paths_without_roots() {
		let config = Configuration::default();
		assert!(config.is_in_app(&frame_at("./src/main.rs")));
		assert!(config.is_in_app(&frame_at("app.ext")));
		assert!(!config.is_in_app(&frame_at("/usr/lib/libc.so.6")));
	}

	#[test]
	fn test_absolute_paths_without_roots_use_symbol() {
		let config = Configuration::default();
		let frame = |path: &str, function: &str| StackFrame {
			abs_path: Some(path.to_string()),
			function: Some(function.to_string()),
			..Default::default()
		};

		assert!(config.is_in_app(&frame("/srv/app/src/main.rs", "my_app::main")));
		assert!(!config.is_in_app(&frame("/srv/app/src/main.rs", "std::rt::lang_start")));
		assert!(!config.is_in_app(&frame(
			"/rustc/abc123/library/std/src/panicking.rs",
			"my_app::looks_local"
		)));

		let with_root = Configuration {
			project_root: Some("/srv/app".to_string()),
			..Default::default()
		};
		assert!(!with_root.is_in_app(&frame("/opt/elsewhere/lib.rs", "other::f")));
	}

	#[test]
	fn test_in_app_include_prefixes() {
		let config = Configuration {
			in_app_include: vec!["/opt/plugins".to_string()],
			..Default::default()
		};
		assert!(config.is_in_app(&frame_at("/opt/plugins/auth/src/lib.rs")));
		assert!(!config.is_in_app(&frame_at("/opt/other/src/lib.rs")));
	}

	#[test]
	fn test_in_app_function_heuristic_without_path() {
		let config = Configuration::default();
		let frame = |f: &str| StackFrame {
			function: Some(f.to_string()),
			..Default::default()
		};

		assert!(config.is_in_app(&frame("my_app::handlers::process")));
		assert!(!config.is_in_app(&frame("std::panicking::begin_panic")));
		assert!(!config.is_in_app(&frame("core::result::unwrap_failed")));
		assert!(!config.is_in_app(&frame("tokio::runtime::Runtime::block_on")));
		assert!(!config.is_in_app(&frame("start_thread")));
		assert!(!config.is_in_app(&frame("main")));
		assert!(!config.is_in_app(&StackFrame::default()));
	}

	#[test]
	fn test_relative_filename_strips_project_root() {
		let config = Configuration {
			project_root: Some("/srv/app".to_string()),
			..Default::default()
		};

		assert_eq!(
			config.relative_filename("/srv/app/src/main.rs").as_deref(),
			Some("src/main.rs")
		);
		assert_eq!(config.relative_filename("/usr/lib/libc.so.6"), None);
	}
}
