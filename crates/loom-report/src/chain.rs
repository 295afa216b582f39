// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exception chain walking: from a leaf error to an ordered, de-duplicated
//! list of exception descriptors.

use std::collections::HashSet;
use std::sync::Arc;

use loom_report_core::{ExceptionDescriptor, StackTrace};
use tracing::trace;

use crate::backtrace::{BacktraceId, FrameClassifier, RawBacktrace};
use crate::capture::{ExceptionGraph, ExceptionId};

/// Follow cause links from `leaf`, leaf first, visiting each id once.
///
/// Stops at the first missing cause or at a cause that was already
/// visited, so cyclic chains terminate.
pub fn collect_chain(graph: &ExceptionGraph, leaf: ExceptionId) -> Vec<ExceptionId> {
	let mut visited: HashSet<ExceptionId> = HashSet::new();
	let mut chain = Vec::new();
	let mut current = graph.get(leaf).map(|_| leaf);

	while let Some(id) = current {
		if !visited.insert(id) {
			trace!(exception = %id, "cause chain cycle detected");
			break;
		}
		chain.push(id);
		current = graph.cause_of(id);
	}

	chain
}

/// Builds exception descriptors for a cause chain.
pub struct ExceptionChainWalker<'a> {
	classifier: &'a dyn FrameClassifier,
	leaf_backtrace_fallback: Option<Arc<RawBacktrace>>,
}

impl<'a> ExceptionChainWalker<'a> {
	pub fn new(classifier: &'a dyn FrameClassifier) -> Self {
		Self {
			classifier,
			leaf_backtrace_fallback: None,
		}
	}

	/// Backtrace to use for the leaf when it carries none of its own.
	pub fn with_leaf_backtrace_fallback(mut self, backtrace: Arc<RawBacktrace>) -> Self {
		self.leaf_backtrace_fallback = Some(backtrace);
		self
	}

	/// Walk the chain starting at `leaf`.
	///
	/// Returns descriptors root cause first. Stack traces are attached while
	/// walking from the leaf towards the root, at most once per distinct
	/// backtrace; `on_stacktrace` sees each attached trace in that order.
	/// Frames are reordered innermost-last.
	pub fn walk(
		&self,
		graph: &ExceptionGraph,
		leaf: ExceptionId,
		mut on_stacktrace: impl FnMut(&StackTrace),
	) -> Vec<ExceptionDescriptor> {
		let mut seen_backtraces: HashSet<BacktraceId> = HashSet::new();
		let mut descriptors = Vec::new();

		for id in collect_chain(graph, leaf) {
			let Some(exception) = graph.get(id) else {
				continue;
			};

			let mut descriptor = ExceptionDescriptor::new(&exception.type_name, &exception.message);

			let backtrace = exception.backtrace.as_ref().or(if id == leaf {
				self.leaf_backtrace_fallback.as_ref()
			} else {
				None
			});

			if let Some(backtrace) = backtrace {
				if seen_backtraces.insert(backtrace.id()) {
					let mut frames = backtrace.parse(self.classifier);
					frames.reverse();
					let stacktrace = StackTrace::new(frames);
					on_stacktrace(&stacktrace);
					descriptor.stacktrace = Some(stacktrace);
				} else {
					trace!(exception = %id, backtrace = %backtrace.id(), "backtrace already attached");
				}
			}

			descriptors.push(descriptor);
		}

		descriptors.reverse();
		descriptors
	}
}
