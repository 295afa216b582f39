// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Culprit selection: the human-readable "where it happened" string.

use crate::frame::StackFrame;

/// Pick the frame that best explains where an error happened.
///
/// Frames are innermost-last. Scans from the innermost frame outward for
/// the first in-app frame and falls back to the innermost frame.
pub fn culprit_frame(frames: &[StackFrame]) -> Option<&StackFrame> {
	frames.iter().rev().find(|f| f.in_app).or_else(|| frames.last())
}

/// Render `<file> in <function> at line <lineno>`, dropping absent segments.
pub fn format_culprit(frame: &StackFrame) -> Option<String> {
	let mut parts: Vec<String> = Vec::with_capacity(3);

	if let Some(file) = frame.display_file() {
		parts.push(file.to_string());
	}
	if let Some(function) = &frame.function {
		parts.push(format!("in {function}"));
	}
	if let Some(lineno) = frame.lineno {
		parts.push(format!("at line {lineno}"));
	}

	if parts.is_empty() {
		None
	} else {
		Some(parts.join(" "))
	}
}

/// Resolve the culprit string for a frame sequence.
pub fn resolve_culprit(frames: &[StackFrame]) -> Option<String> {
	culprit_frame(frames).and_then(format_culprit)
}
