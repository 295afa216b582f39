// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Breadcrumb types (the trail of events leading up to a report).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::level::Level;

/// Default number of breadcrumbs kept by a [`BreadcrumbBuffer`].
pub const DEFAULT_MAX_BREADCRUMBS: usize = 100;

/// A breadcrumb representing something that happened before the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
	pub timestamp: DateTime<Utc>,
	/// "http", "navigation", "query", "log"
	pub category: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	pub level: Level,
	/// "default", "http", "error"
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub ty: Option<String>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub data: Map<String, Value>,
}

impl Default for Breadcrumb {
	fn default() -> Self {
		Self {
			timestamp: Utc::now(),
			category: String::new(),
			message: None,
			level: Level::Info,
			ty: None,
			data: Map::new(),
		}
	}
}

/// Read access to a breadcrumb trail.
///
/// Event construction only ever reads the size and takes a snapshot; how
/// the trail is stored and synchronized is up to the implementor.
pub trait BreadcrumbSource {
	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// An immutable copy of the current trail, oldest first.
	fn snapshot(&self) -> Arc<[Breadcrumb]>;
}

impl BreadcrumbSource for Vec<Breadcrumb> {
	fn len(&self) -> usize {
		Vec::len(self)
	}

	fn snapshot(&self) -> Arc<[Breadcrumb]> {
		Arc::from(self.as_slice())
	}
}

/// A bounded breadcrumb trail that drops the oldest entries first.
#[derive(Debug, Clone)]
pub struct BreadcrumbBuffer {
	capacity: usize,
	entries: VecDeque<Breadcrumb>,
}

impl BreadcrumbBuffer {
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			entries: VecDeque::with_capacity(capacity),
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Append a breadcrumb, trimming to capacity.
	pub fn record(&mut self, breadcrumb: Breadcrumb) {
		if self.capacity == 0 {
			return;
		}
		while self.entries.len() >= self.capacity {
			self.entries.pop_front();
		}
		self.entries.push_back(breadcrumb);
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn iter(&self) -> impl Iterator<Item = &Breadcrumb> {
		self.entries.iter()
	}
}

impl Default for BreadcrumbBuffer {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_BREADCRUMBS)
	}
}

impl BreadcrumbSource for BreadcrumbBuffer {
	fn len(&self) -> usize {
		self.entries.len()
	}

	fn snapshot(&self) -> Arc<[Breadcrumb]> {
		self.entries.iter().cloned().collect()
	}
}

/// Render a trail as `{"values": [...]}`.
pub fn breadcrumbs_document(breadcrumbs: &[Breadcrumb]) -> Value {
	serde_json::json!({
		"values": breadcrumbs
			.iter()
			.map(|b| serde_json::to_value(b).unwrap_or(Value::Null))
			.collect::<Vec<_>>(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn crumb(category: &str) -> Breadcrumb {
		Breadcrumb {
			category: category.to_string(),
			..Default::default()
		}
	}

	#[test]
	fn buffer_keeps_most_recent_entries() {
		let mut buffer = BreadcrumbBuffer::new(5);
		for i in 0..10 {
			buffer.record(crumb(&format!("test_{i}")));
		}

		let snapshot = buffer.snapshot();
		assert_eq!(snapshot.len(), 5);
		assert_eq!(snapshot[0].category, "test_5");
		assert_eq!(snapshot[4].category, "test_9");
	}

	#[test]
	fn sources_are_usable_as_trait_objects() {
		let trail = vec![crumb("first"), crumb("second")];
		let buffer = BreadcrumbBuffer::default();
		let sources: [&dyn BreadcrumbSource; 2] = [&trail, &buffer];

		assert_eq!(sources[0].len(), 2);
		assert_eq!(sources[0].snapshot()[1].category, "second");
		assert!(sources[1].is_empty());
		assert!(sources[1].snapshot().is_empty());
	}

	#[test]
	fn zero_capacity_records_nothing() {
		let mut buffer = BreadcrumbBuffer::new(0);
		buffer.record(crumb("dropped"));
		assert!(BreadcrumbSource::is_empty(&buffer));
	}

	#[test]
	fn snapshot_is_detached_from_later_writes() {
		let mut buffer = BreadcrumbBuffer::default();
		buffer.record(crumb("before"));
		let snapshot = buffer.snapshot();

		buffer.record(crumb("after"));
		buffer.clear();

		assert_eq!(snapshot.len(), 1);
		assert_eq!(snapshot[0].category, "before");
	}

	#[test]
	fn document_wraps_values() {
		let trail = vec![Breadcrumb {
			category: "http".to_string(),
			message: Some("GET /health".to_string()),
			ty: Some("http".to_string()),
			..Default::default()
		}];

		let doc = breadcrumbs_document(&trail);
		let first = &doc["values"][0];
		assert_eq!(first["category"], "http");
		assert_eq!(first["type"], "http");
		assert_eq!(first["level"], "info");
		assert!(first.get("data").is_none());
	}
}
