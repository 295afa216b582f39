// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Raw backtraces and their parsing into stack frames.
//!
//! A raw backtrace is a list of opaque lines in the form
//! `<function> at <path>:<line>:<col>`. The column, the whole location, or
//! a leading `N:` frame index may be missing. Symbols may carry the
//! `0x<address> - ` prefix and `::h<hash>` suffix that std prints. Lines
//! that fit none of these shapes are skipped.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ::backtrace::{Backtrace as ResolvedBacktrace, BacktraceSymbol};
use loom_report_core::{module_of, StackFrame};
use rustc_demangle::demangle;
use tracing::trace;

static NEXT_BACKTRACE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a raw backtrace, assigned when it is created.
///
/// Errors in one chain may share a backtrace; the chain walker uses this
/// id to attach each distinct backtrace only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BacktraceId(u64);

impl BacktraceId {
	fn next() -> Self {
		Self(NEXT_BACKTRACE_ID.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for BacktraceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Unparsed backtrace lines, innermost call first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBacktrace {
	id: BacktraceId,
	lines: Vec<String>,
}

impl RawBacktrace {
	pub fn new<I, S>(lines: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			id: BacktraceId::next(),
			lines: lines.into_iter().map(Into::into).collect(),
		}
	}

	pub fn empty() -> Self {
		Self::new(Vec::<String>::new())
	}

	/// Capture the current thread's backtrace.
	///
	/// Frames of the capture machinery itself are dropped, so the first
	/// line is the caller. Unresolved frames are skipped.
	pub fn capture() -> Self {
		Self::from_resolved(&ResolvedBacktrace::new())
	}

	/// Lines from a symbol-resolved backtrace, innermost first.
	pub fn from_resolved(backtrace: &ResolvedBacktrace) -> Self {
		let lines: Vec<String> = backtrace
			.frames()
			.iter()
			.flat_map(|frame| frame.symbols())
			.filter_map(symbol_line)
			.skip_while(|line| is_capture_frame(line))
			.collect();
		Self::new(lines)
	}

	/// Lines from std's rendered backtrace.
	pub fn from_std(backtrace: &Backtrace) -> Self {
		if backtrace.status() != BacktraceStatus::Captured {
			return Self::empty();
		}
		Self::new(flatten_std_backtrace(&format!("{backtrace:#}")))
	}

	pub fn id(&self) -> BacktraceId {
		self.id
	}

	pub fn lines(&self) -> &[String] {
		&self.lines
	}

	pub fn is_empty(&self) -> bool {
		self.lines.is_empty()
	}

	/// Parse into frames, keeping the input order.
	pub fn parse(&self, classifier: &dyn FrameClassifier) -> Vec<StackFrame> {
		parse_backtrace(&self.lines, classifier)
	}
}

/// Decides which frames are application code.
pub trait FrameClassifier {
	fn is_in_app(&self, frame: &StackFrame) -> bool;

	/// Project-relative name for `abs_path`, if it lives under the project.
	fn relative_filename(&self, _abs_path: &str) -> Option<String> {
		None
	}
}

impl<F> FrameClassifier for F
where
	F: Fn(&StackFrame) -> bool,
{
	fn is_in_app(&self, frame: &StackFrame) -> bool {
		self(frame)
	}
}

/// Frames belonging to backtrace capture rather than to the caller.
const CAPTURE_FRAME_PREFIXES: &[&str] = &[
	"backtrace::",
	"<backtrace::",
	"loom_report::backtrace::RawBacktrace::",
	"loom_report::capture::CapturedException::with_current_backtrace",
	"loom_report::capture::ExceptionGraph::from_panic",
	"loom_report::event::Event::from_panic",
];

fn is_capture_frame(line: &str) -> bool {
	CAPTURE_FRAME_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Render one resolved symbol as `<function> at <path>:<line>:<col>`.
fn symbol_line(symbol: &BacktraceSymbol) -> Option<String> {
	let function = symbol.name().map(|name| format!("{name:#}"));
	let location = match (symbol.filename(), symbol.lineno()) {
		(Some(path), Some(line)) => Some(match symbol.colno() {
			Some(col) => format!("{}:{line}:{col}", path.display()),
			None => format!("{}:{line}", path.display()),
		}),
		_ => None,
	};

	match (function, location) {
		(Some(function), Some(location)) => Some(format!("{function} at {location}")),
		(Some(function), None) => Some(function),
		(None, Some(location)) => Some(format!("<unknown> at {location}")),
		(None, None) => None,
	}
}

/// Drop std's `0x<address> - ` symbol prefix.
fn strip_address(function: &str) -> &str {
	let Some(rest) = function.strip_prefix("0x") else {
		return function;
	};
	let digits = rest
		.find(|c: char| !c.is_ascii_hexdigit())
		.unwrap_or(rest.len());
	let rest = &rest[digits..];
	rest.strip_prefix(" - ").unwrap_or(rest).trim()
}

/// Drop a trailing `::h<16 hex digits>` symbol hash.
fn strip_hash(function: &str) -> &str {
	match function.rsplit_once("::h") {
		Some((head, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => head,
		_ => function,
	}
}

/// Join std's two-line frame format into single `<function> at <location>` lines.
fn flatten_std_backtrace(text: &str) -> Vec<String> {
	let mut lines: Vec<String> = Vec::new();
	let mut pending: Option<String> = None;

	for raw in text.lines() {
		let line = raw.trim();
		if line.is_empty() {
			continue;
		}
		if let Some(location) = line.strip_prefix("at ") {
			if let Some(function) = pending.take() {
				lines.push(format!("{function} at {location}"));
			}
			continue;
		}
		if let Some(function) = pending.replace(strip_frame_index(line).to_string()) {
			lines.push(function);
		}
	}
	lines.extend(pending);

	lines
}

/// Drop a leading `N:` frame index.
fn strip_frame_index(line: &str) -> &str {
	match line.split_once(':') {
		Some((index, rest)) if !index.is_empty() && index.trim().chars().all(|c| c.is_ascii_digit()) => {
			rest.trim_start()
		}
		_ => line,
	}
}

/// Parse raw lines into frames, keeping the input order.
pub fn parse_backtrace(lines: &[String], classifier: &dyn FrameClassifier) -> Vec<StackFrame> {
	lines
		.iter()
		.filter_map(|line| {
			let frame = parse_frame_line(line, classifier);
			if frame.is_none() {
				trace!(line = %line, "skipping unparseable backtrace line");
			}
			frame
		})
		.collect()
}

/// Parse a single backtrace line into a frame.
pub fn parse_frame_line(line: &str, classifier: &dyn FrameClassifier) -> Option<StackFrame> {
	let line = strip_frame_index(line.trim());

	if line.is_empty() || line.starts_with("at ") || line.ends_with(':') || line.starts_with("note:") {
		return None;
	}

	let (function, location) = match line.rsplit_once(" at ") {
		Some((function, location)) => (function.trim(), Some(parse_location(location.trim())?)),
		None => (line, None),
	};

	let function = match strip_address(function) {
		"" | "<unknown>" => None,
		symbol => Some(strip_hash(&format!("{:#}", demangle(symbol))).to_string()),
	};
	if function.is_none() && location.is_none() {
		return None;
	}

	let module = function.as_deref().map(module_of).filter(|m| !m.is_empty());
	let (abs_path, lineno, colno) = match location {
		Some(loc) => (Some(loc.path.to_string()), loc.lineno, loc.colno),
		None => (None, None, None),
	};
	let filename = abs_path
		.as_deref()
		.and_then(|path| classifier.relative_filename(path));

	let mut frame = StackFrame {
		abs_path,
		filename,
		function,
		module,
		lineno,
		colno,
		in_app: false,
	};
	frame.in_app = classifier.is_in_app(&frame);

	Some(frame)
}

struct Location<'a> {
	path: &'a str,
	lineno: Option<u32>,
	colno: Option<u32>,
}

/// Parse `<path>:<line>:<col>` or `<path>:<line>`.
fn parse_location(location: &str) -> Option<Location<'_>> {
	let (head, last) = location.rsplit_once(':')?;
	let last: u32 = last.parse().ok()?;

	match head.rsplit_once(':') {
		Some((path, line)) if !path.is_empty() => match line.parse::<u32>() {
			Ok(lineno) => Some(Location {
				path,
				lineno: Some(lineno),
				colno: Some(last),
			}),
			Err(_) => Some(Location {
				path: head,
				lineno: Some(last),
				colno: None,
			}),
		},
		_ if !head.is_empty() => Some(Location {
			path: head,
			lineno: Some(last),
			colno: None,
		}),
		_ => None,
	}
}
