// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the report SDK.

use std::path::PathBuf;

use loom_report_core::ReportError;
use thiserror::Error;

/// Result type alias for report SDK operations.
pub type Result<T> = std::result::Result<T, ReportSdkError>;

/// Errors raised by the report SDK itself.
///
/// Event construction never returns these. An error of this type handed
/// back to the SDK for reporting is refused rather than reported.
#[derive(Debug, Error)]
pub enum ReportSdkError {
	/// Reading a configuration file failed.
	#[error("failed to read config file {path}: {source}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// A configuration file is not valid TOML for the expected shape.
	#[error("failed to parse config file {path}: {source}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// A configuration value could not be interpreted.
	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	/// The dependency lister could not produce a listing.
	#[error("module listing failed: {0}")]
	ModuleListing(String),

	#[error(transparent)]
	Core(#[from] ReportError),
}

impl ReportSdkError {
	pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			key: key.into(),
			message: message.into(),
		}
	}
}
