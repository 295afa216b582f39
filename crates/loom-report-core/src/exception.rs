// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exception descriptors: one entry per error in a cause chain.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::StackTrace;

/// One error in a cause chain as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionDescriptor {
	/// Type name, e.g. `std::io::Error`.
	#[serde(rename = "type")]
	pub ty: String,
	/// Rendered error message.
	pub value: String,
	/// Namespace portion of the type name; empty when the name has none.
	#[serde(default)]
	pub module: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stacktrace: Option<StackTrace>,
}

impl ExceptionDescriptor {
	pub fn new(ty: impl Into<String>, value: impl Into<String>) -> Self {
		let ty = ty.into();
		let module = module_of(&ty);
		Self {
			ty,
			value: value.into(),
			module,
			stacktrace: None,
		}
	}

	pub fn with_stacktrace(mut self, stacktrace: StackTrace) -> Self {
		self.stacktrace = Some(stacktrace);
		self
	}

	pub fn to_document(&self) -> Value {
		let mut doc = serde_json::Map::new();
		doc.insert("type".to_string(), Value::String(self.ty.clone()));
		doc.insert("value".to_string(), Value::String(self.value.clone()));
		doc.insert("module".to_string(), Value::String(self.module.clone()));
		if let Some(stacktrace) = &self.stacktrace {
			doc.insert("stacktrace".to_string(), stacktrace.to_document());
		}
		Value::Object(doc)
	}
}

/// Derive the module of a type name by dropping its final path segment.
///
/// Generic arguments are ignored, so `alloc::vec::Vec<my::Thing>` yields
/// `alloc::vec`.
pub fn module_of(type_name: &str) -> String {
	let base = type_name.split('<').next().unwrap_or(type_name);
	match base.rfind("::") {
		Some(idx) => base[..idx].to_string(),
		None => String::new(),
	}
}

/// The final path segment of a type name, without generic arguments.
pub fn short_type_name(type_name: &str) -> &str {
	let base = type_name.split('<').next().unwrap_or(type_name);
	match base.rfind("::") {
		Some(idx) => &base[idx + 2..],
		None => base,
	}
}
