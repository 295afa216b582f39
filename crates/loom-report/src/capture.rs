// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Captured errors: an arena of exceptions linked by cause.
//!
//! Each exception gets an [`ExceptionId`] when it is pushed into an
//! [`ExceptionGraph`]. Cause links refer to these ids, so a chain may
//! contain cycles; the chain walker breaks them by id.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use loom_report_core::ReportError;
use serde_json::{Map, Value};

use crate::backtrace::RawBacktrace;
use crate::error::ReportSdkError;

/// Type name given to panics.
pub const PANIC_TYPE_NAME: &str = "panic";

/// Handle of one exception in an [`ExceptionGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExceptionId(usize);

impl fmt::Display for ExceptionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// One captured error.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedException {
	/// e.g. `std::io::Error`
	pub type_name: String,
	pub message: String,
	pub backtrace: Option<Arc<RawBacktrace>>,
	/// Structured context carried by the error itself.
	pub extra: Map<String, Value>,
	/// Raised by the reporting SDK itself; never reported.
	pub internal: bool,
	cause: Option<ExceptionId>,
}

impl CapturedException {
	pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			type_name: type_name.into(),
			message: message.into(),
			backtrace: None,
			extra: Map::new(),
			internal: false,
			cause: None,
		}
	}

	pub fn with_backtrace(mut self, backtrace: Arc<RawBacktrace>) -> Self {
		self.backtrace = Some(backtrace);
		self
	}

	/// Attach the backtrace of the calling thread.
	pub fn with_current_backtrace(self) -> Self {
		self.with_backtrace(Arc::new(RawBacktrace::capture()))
	}

	pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.extra.insert(key.into(), value.into());
		self
	}

	pub fn cause(&self) -> Option<ExceptionId> {
		self.cause
	}
}

/// Arena of captured exceptions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionGraph {
	nodes: Vec<CapturedException>,
}

impl ExceptionGraph {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, exception: CapturedException) -> ExceptionId {
		self.nodes.push(exception);
		ExceptionId(self.nodes.len() - 1)
	}

	/// Link `id` to `cause`. Returns false if either id is unknown.
	pub fn set_cause(&mut self, id: ExceptionId, cause: Option<ExceptionId>) -> bool {
		if cause.is_some_and(|c| c.0 >= self.nodes.len()) {
			return false;
		}
		match self.nodes.get_mut(id.0) {
			Some(node) => {
				node.cause = cause;
				true
			}
			None => false,
		}
	}

	/// Push a chain given leaf first, linking each entry to the next.
	///
	/// Returns the leaf's id, or `None` for an empty chain.
	pub fn push_chain(&mut self, chain: Vec<CapturedException>) -> Option<ExceptionId> {
		let ids: Vec<ExceptionId> = chain.into_iter().map(|e| self.push(e)).collect();
		for pair in ids.windows(2) {
			self.set_cause(pair[0], Some(pair[1]));
		}
		ids.first().copied()
	}

	pub fn get(&self, id: ExceptionId) -> Option<&CapturedException> {
		self.nodes.get(id.0)
	}

	pub fn get_mut(&mut self, id: ExceptionId) -> Option<&mut CapturedException> {
		self.nodes.get_mut(id.0)
	}

	pub fn cause_of(&self, id: ExceptionId) -> Option<ExceptionId> {
		self.get(id).and_then(|e| e.cause)
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Capture an error and its `source()` chain.
	///
	/// The leaf keeps its exact type name. Sources are only known as
	/// `dyn Error`, so their names come from a small table of std error
	/// types or from the leading identifier of their `Debug` output.
	pub fn from_error<E>(error: &E) -> (Self, ExceptionId)
	where
		E: Error + 'static,
	{
		let mut graph = Self::new();
		let leaf = graph.push(capture_one(error, std::any::type_name::<E>().to_string()));
		graph.push_sources(leaf, error.source());
		(graph, leaf)
	}

	/// Capture a type-erased error and its `source()` chain.
	pub fn from_dyn_error(error: &(dyn Error + 'static)) -> (Self, ExceptionId) {
		let mut graph = Self::new();
		let leaf = graph.push(capture_one(error, dyn_type_name(error)));
		graph.push_sources(leaf, error.source());
		(graph, leaf)
	}

	fn push_sources(&mut self, leaf: ExceptionId, mut source: Option<&(dyn Error + 'static)>) {
		let mut visited: Vec<*const ()> = Vec::new();
		let mut previous = leaf;

		while let Some(error) = source {
			let ptr = error as *const dyn Error as *const ();
			if visited.contains(&ptr) {
				break;
			}
			visited.push(ptr);

			let id = self.push(capture_one(error, dyn_type_name(error)));
			self.set_cause(previous, Some(id));
			previous = id;
			source = error.source();
		}
	}

	/// Capture a panic payload as a `panic` exception with the current backtrace.
	pub fn from_panic(
		payload: &(dyn Any + Send),
		location: Option<&Location<'_>>,
	) -> (Self, ExceptionId) {
		let message = if let Some(s) = payload.downcast_ref::<&str>() {
			(*s).to_string()
		} else if let Some(s) = payload.downcast_ref::<String>() {
			s.clone()
		} else {
			"Box<dyn Any>".to_string()
		};

		let mut exception = CapturedException::new(PANIC_TYPE_NAME, message).with_current_backtrace();
		if let Some(location) = location {
			exception = exception.with_extra(
				"panic.location",
				format!("{}:{}:{}", location.file(), location.line(), location.column()),
			);
		}

		let mut graph = Self::new();
		let leaf = graph.push(exception);
		(graph, leaf)
	}
}

fn capture_one(error: &(dyn Error + 'static), type_name: String) -> CapturedException {
	let mut exception = CapturedException::new(type_name, error.to_string());
	exception.internal = is_internal_error(error);
	exception
}

/// Errors raised by this SDK.
fn is_internal_error(error: &(dyn Error + 'static)) -> bool {
	error.downcast_ref::<ReportSdkError>().is_some() || error.downcast_ref::<ReportError>().is_some()
}

fn dyn_type_name(error: &(dyn Error + 'static)) -> String {
	macro_rules! known {
		($($ty:ty),* $(,)?) => {
			$(
				if error.downcast_ref::<$ty>().is_some() {
					return std::any::type_name::<$ty>().to_string();
				}
			)*
		};
	}

	known!(
		ReportSdkError,
		ReportError,
		std::io::Error,
		std::fmt::Error,
		std::num::ParseIntError,
		std::num::ParseFloatError,
		std::str::Utf8Error,
		std::string::FromUtf8Error,
		serde_json::Error,
	);

	debug_type_name(error)
}

/// Leading identifier of the `Debug` rendering, e.g. `TimeoutError` for
/// `TimeoutError { after: 5s }`.
fn debug_type_name(error: &dyn Error) -> String {
	let debug = format!("{error:?}");
	let ident: String = debug
		.chars()
		.take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
		.collect();
	let ident = ident.trim_end_matches(':');

	match ident.chars().next() {
		Some(c) if c.is_alphabetic() || c == '_' => ident.to_string(),
		_ => "Error".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug)]
	struct TimeoutError {
		source: std::io::Error,
	}

	impl fmt::Display for TimeoutError {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			write!(f, "request timed out")
		}
	}

	impl Error for TimeoutError {
		fn source(&self) -> Option<&(dyn Error + 'static)> {
			Some(&self.source)
		}
	}

	#[derive(Debug)]
	struct WrappedError(TimeoutError);

	impl fmt::Display for WrappedError {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			write!(f, "sync failed")
		}
	}

	impl Error for WrappedError {
		fn source(&self) -> Option<&(dyn Error + 'static)> {
			Some(&self.0)
		}
	}

	#[test]
	fn from_error_walks_sources() {
		let error = WrappedError(TimeoutError {
			source: std::io::Error::new(std::io::ErrorKind::TimedOut, "socket read"),
		});

		let (graph, leaf) = ExceptionGraph::from_error(&error);

		assert_eq!(graph.len(), 3);
		let leaf_exc = graph.get(leaf).unwrap();
		assert!(leaf_exc.type_name.ends_with("WrappedError"));
		assert_eq!(leaf_exc.message, "sync failed");

		let mid = graph.cause_of(leaf).unwrap();
		assert_eq!(graph.get(mid).unwrap().type_name, "TimeoutError");

		let root = graph.cause_of(mid).unwrap();
		let root_exc = graph.get(root).unwrap();
		assert_eq!(root_exc.type_name, "std::io::error::Error");
		assert_eq!(root_exc.message, "socket read");
		assert_eq!(graph.cause_of(root), None);
	}

	#[test]
	fn sdk_errors_are_flagged_internal() {
		let error = ReportSdkError::ModuleListing("boom".to_string());
		let (graph, leaf) = ExceptionGraph::from_error(&error);
		assert!(graph.get(leaf).unwrap().internal);

		let (graph, leaf) = ExceptionGraph::from_error(&std::fmt::Error);
		assert!(!graph.get(leaf).unwrap().internal);
	}

	#[test]
	fn set_cause_allows_cycles_and_rejects_unknown_ids() {
		let mut graph = ExceptionGraph::new();
		let a = graph.push(CapturedException::new("A", "a"));
		let b = graph.push(CapturedException::new("B", "b"));

		assert!(graph.set_cause(a, Some(b)));
		assert!(graph.set_cause(b, Some(a)));
		assert_eq!(graph.cause_of(graph.cause_of(a).unwrap()), Some(a));

		assert!(!graph.set_cause(a, Some(ExceptionId(99))));
		assert!(!graph.set_cause(ExceptionId(99), None));
	}

	#[test]
	fn push_chain_links_leaf_to_root() {
		let mut graph = ExceptionGraph::new();
		let leaf = graph
			.push_chain(vec![
				CapturedException::new("Leaf", "boom"),
				CapturedException::new("Mid", "wrapped"),
				CapturedException::new("Root", "root cause"),
			])
			.unwrap();

		let mid = graph.cause_of(leaf).unwrap();
		let root = graph.cause_of(mid).unwrap();
		assert_eq!(graph.get(root).unwrap().type_name, "Root");
		assert_eq!(graph.cause_of(root), None);
		assert_eq!(ExceptionGraph::new().push_chain(Vec::new()), None);
	}

	#[test]
	fn from_panic_reads_string_payloads() {
		let payload: Box<dyn Any + Send> = Box::new("index out of bounds");
		let (graph, leaf) = ExceptionGraph::from_panic(payload.as_ref(), Some(Location::caller()));
		let exception = graph.get(leaf).unwrap();

		assert_eq!(exception.type_name, PANIC_TYPE_NAME);
		assert_eq!(exception.message, "index out of bounds");
		assert!(exception.backtrace.is_some());
		assert!(exception.extra["panic.location"]
			.as_str()
			.unwrap()
			.contains("capture.rs"));

		let payload: Box<dyn Any + Send> = Box::new(42u8);
		let (graph, leaf) = ExceptionGraph::from_panic(payload.as_ref(), None);
		assert_eq!(graph.get(leaf).unwrap().message, "Box<dyn Any>");
	}

	#[test]
	fn debug_type_name_falls_back_to_error() {
		#[derive(Debug)]
		struct Plain;
		impl fmt::Display for Plain {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "plain")
			}
		}
		impl Error for Plain {}

		assert_eq!(debug_type_name(&Plain), "Plain");
		assert_eq!(debug_type_name(&std::fmt::Error), "Error");
	}
}
