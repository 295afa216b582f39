// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dependency version listing for the `modules` field of events.
//!
//! Listing is best effort: any failure leaves `modules` unset and never
//! fails event construction.

use std::collections::BTreeMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::Configuration;
use crate::error::{ReportSdkError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Produces raw text listing dependencies and their versions.
pub trait ModuleLister {
	fn list(&self) -> Result<String>;
}

impl<F> ModuleLister for F
where
	F: Fn() -> Result<String>,
{
	fn list(&self) -> Result<String> {
		self()
	}
}

/// Runs an external command and captures its standard output.
#[derive(Debug, Clone)]
pub struct CommandLister {
	program: String,
	args: Vec<String>,
	timeout: Duration,
}

impl CommandLister {
	pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
		Self {
			program: program.into(),
			args,
			timeout,
		}
	}

	/// The lister described by `modules_command`, if one is configured.
	pub fn from_configuration(config: &Configuration) -> Option<Self> {
		let (program, args) = config.modules_command.split_first()?;
		Some(Self::new(program.clone(), args.to_vec(), config.modules_timeout))
	}
}

impl ModuleLister for CommandLister {
	fn list(&self) -> Result<String> {
		let mut child = Command::new(&self.program)
			.args(&self.args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.spawn()
			.map_err(|e| ReportSdkError::ModuleListing(format!("failed to spawn {}: {e}", self.program)))?;

		let mut stdout = child
			.stdout
			.take()
			.ok_or_else(|| ReportSdkError::ModuleListing("stdout not captured".to_string()))?;
		let reader = thread::spawn(move || {
			let mut output = String::new();
			stdout.read_to_string(&mut output).map(|_| output)
		});

		let deadline = Instant::now() + self.timeout;
		let status = loop {
			match child.try_wait() {
				Ok(Some(status)) => break status,
				Ok(None) if Instant::now() >= deadline => {
					let _ = child.kill();
					let _ = child.wait();
					return Err(ReportSdkError::ModuleListing(format!(
						"{} timed out after {:?}",
						self.program, self.timeout
					)));
				}
				Ok(None) => thread::sleep(POLL_INTERVAL),
				Err(e) => {
					return Err(ReportSdkError::ModuleListing(format!(
						"failed to wait for {}: {e}",
						self.program
					)))
				}
			}
		};

		if !status.success() {
			return Err(ReportSdkError::ModuleListing(format!(
				"{} exited with {status}",
				self.program
			)));
		}

		reader
			.join()
			.map_err(|_| ReportSdkError::ModuleListing("output reader panicked".to_string()))?
			.map_err(|e| ReportSdkError::ModuleListing(format!("failed to read output: {e}")))
	}
}

/// Parse a dependency listing into `name -> version`.
///
/// Understands `name (version)` lines and cargo's `name vVERSION` lines;
/// anything else is ignored.
pub fn parse_modules(text: &str) -> BTreeMap<String, String> {
	text.lines().filter_map(parse_module_line).collect()
}

fn parse_module_line(line: &str) -> Option<(String, String)> {
	let line = line.trim();
	let mut tokens = line.split_whitespace();
	let name = tokens.next()?;

	if let Some(version) = tokens
		.next()
		.and_then(|t| t.strip_prefix('v'))
		.filter(|v| v.starts_with(|c: char| c.is_ascii_digit()))
	{
		return Some((name.to_string(), version.to_string()));
	}

	let (name, rest) = line.split_once(" (")?;
	let versions = rest.strip_suffix(')')?;
	// `name (2.0, 1.9)` lists installed versions newest first.
	let version = versions.split(',').next()?.trim();
	if name.trim().is_empty() || version.is_empty() {
		return None;
	}
	Some((name.trim().to_string(), version.to_string()))
}

/// Run the lister and parse its output; `None` on any failure.
pub fn collect_modules(lister: &dyn ModuleLister) -> Option<BTreeMap<String, String>> {
	match lister.list() {
		Ok(text) => {
			let modules = parse_modules(&text);
			if modules.is_empty() {
				debug!("module listing produced no entries");
				None
			} else {
				Some(modules)
			}
		}
		Err(e) => {
			debug!(error = %e, "module listing unavailable");
			None
		}
	}
}
