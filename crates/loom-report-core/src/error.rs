// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for report value types.

use thiserror::Error;

/// Errors raised while parsing or encoding report value types.
#[derive(Debug, Error)]
pub enum ReportError {
	#[error("invalid level: {0}")]
	InvalidLevel(String),

	#[error("invalid interface: {0}")]
	InvalidInterface(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type for report value operations.
pub type Result<T> = std::result::Result<T, ReportError>;
