// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request context merged into events (contexts, user, extra, tags).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Operating system context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsContext {
	/// "linux", "macos", "windows"
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	/// "x86_64", "aarch64"
	pub arch: String,
}

impl OsContext {
	pub fn current() -> Self {
		Self {
			name: std::env::consts::OS.to_string(),
			version: None,
			arch: std::env::consts::ARCH.to_string(),
		}
	}
}

/// Runtime context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeContext {
	/// "rust"
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
}

impl RuntimeContext {
	pub fn current() -> Self {
		Self {
			name: "rust".to_string(),
			version: None,
		}
	}
}

/// Data scoped to the current request or unit of work.
///
/// Callers own the context and hand a reference to event construction,
/// which copies what it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
	#[serde(default)]
	pub contexts: Map<String, Value>,
	#[serde(default)]
	pub user: Map<String, Value>,
	#[serde(default)]
	pub extra: Map<String, Value>,
	#[serde(default)]
	pub tags: Map<String, Value>,
}

impl Context {
	pub fn new() -> Self {
		Self::default()
	}

	/// A context whose `contexts` already describe this OS and runtime.
	pub fn with_runtime_defaults() -> Self {
		let mut context = Self::new();
		context.set_context("os", to_object(&OsContext::current()));
		context.set_context("runtime", to_object(&RuntimeContext::current()));
		context
	}

	pub fn set_context(&mut self, key: impl Into<String>, value: Value) {
		self.contexts.insert(key.into(), value);
	}

	pub fn set_user(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.user.insert(key.into(), value.into());
	}

	pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.extra.insert(key.into(), value.into());
	}

	pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.tags.insert(key.into(), value.into());
	}

	pub fn clear(&mut self) {
		self.contexts.clear();
		self.user.clear();
		self.extra.clear();
		self.tags.clear();
	}
}

fn to_object<T: Serialize>(value: &T) -> Value {
	serde_json::to_value(value).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Copy entries of `source` into `target` without overwriting existing keys.
pub fn reverse_merge(target: &mut Map<String, Value>, source: &Map<String, Value>) {
	for (key, value) in source {
		if !target.contains_key(key) {
			target.insert(key.clone(), value.clone());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn reverse_merge_keeps_existing_keys() {
		let mut target = json!({ "a": 1, "b": 2 }).as_object().cloned().unwrap();
		let source = json!({ "b": 20, "c": 30 }).as_object().cloned().unwrap();

		reverse_merge(&mut target, &source);

		assert_eq!(Value::Object(target), json!({ "a": 1, "b": 2, "c": 30 }));
	}

	#[test]
	fn runtime_defaults_describe_host() {
		let context = Context::with_runtime_defaults();
		assert_eq!(context.contexts["runtime"]["name"], "rust");
		assert_eq!(context.contexts["os"]["name"], std::env::consts::OS);
		assert_eq!(context.contexts["os"]["arch"], std::env::consts::ARCH);
		assert!(context.contexts["os"].get("version").is_none());
	}

	#[test]
	fn setters_and_clear() {
		let mut context = Context::new();
		context.set_user("id", "user_123");
		context.set_extra("attempt", 3);
		context.set_tag("region", "eu");

		assert_eq!(context.user["id"], "user_123");
		assert_eq!(context.extra["attempt"], 3);
		assert_eq!(context.tags["region"], "eu");

		context.clear();
		assert_eq!(context, Context::new());
	}
}
