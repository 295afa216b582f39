// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stack frame and stack trace types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One call site in a stack trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
	/// Path as reported by the backtrace.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub abs_path: Option<String>,
	/// Path relative to the project root, when the frame lives under it.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub filename: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub function: Option<String>,
	/// e.g. `my_app::handlers` for `my_app::handlers::process`
	#[serde(skip_serializing_if = "Option::is_none")]
	pub module: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lineno: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub colno: Option<u32>,
	/// Application code as opposed to library or runtime code.
	#[serde(default)]
	pub in_app: bool,
}

impl StackFrame {
	/// The file name shown to humans: the project-relative name when known.
	pub fn display_file(&self) -> Option<&str> {
		self.filename.as_deref().or(self.abs_path.as_deref())
	}
}

/// An ordered sequence of frames, innermost frame last.
///
/// The frame list is fixed at construction; a trace is replaced wholesale,
/// never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTrace {
	frames: Vec<StackFrame>,
}

impl StackTrace {
	pub fn new(frames: Vec<StackFrame>) -> Self {
		Self { frames }
	}

	pub fn frames(&self) -> &[StackFrame] {
		&self.frames
	}

	pub fn is_empty(&self) -> bool {
		self.frames.is_empty()
	}

	pub fn len(&self) -> usize {
		self.frames.len()
	}

	/// The innermost (most recent) frame.
	pub fn innermost(&self) -> Option<&StackFrame> {
		self.frames.last()
	}

	pub fn to_document(&self) -> Value {
		serde_json::json!({
			"frames": self
				.frames
				.iter()
				.map(|frame| serde_json::to_value(frame).unwrap_or(Value::Null))
				.collect::<Vec<_>>(),
		})
	}
}

impl From<Vec<StackFrame>> for StackTrace {
	fn from(frames: Vec<StackFrame>) -> Self {
		Self::new(frames)
	}
}
