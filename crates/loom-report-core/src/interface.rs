// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Interfaces: named sub-documents attached to an event.
//!
//! The set of interface kinds is closed. Each [`InterfaceKind`] maps to a
//! registry name, a wire alias (the key it is serialized under) and a
//! default constructor. An event holds at most one interface per kind.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ReportError;
use crate::exception::ExceptionDescriptor;
use crate::frame::StackTrace;

/// The closed set of interface kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InterfaceKind {
	Message,
	Exception,
	Stacktrace,
	Http,
}

impl InterfaceKind {
	pub const ALL: [InterfaceKind; 4] = [
		InterfaceKind::Message,
		InterfaceKind::Exception,
		InterfaceKind::Stacktrace,
		InterfaceKind::Http,
	];

	/// Registry name used by callers.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Message => "message",
			Self::Exception => "exception",
			Self::Stacktrace => "stack_trace",
			Self::Http => "http",
		}
	}

	/// Key the interface is serialized under.
	pub fn wire_alias(&self) -> &'static str {
		match self {
			Self::Message => "logentry",
			Self::Exception => "exception",
			Self::Stacktrace => "stacktrace",
			Self::Http => "request",
		}
	}

	/// A freshly constructed, empty interface of this kind.
	pub fn empty(&self) -> Interface {
		match self {
			Self::Message => Interface::Message(MessageInterface::default()),
			Self::Exception => Interface::Exception(ExceptionInterface::default()),
			Self::Stacktrace => Interface::Stacktrace(StacktraceInterface::default()),
			Self::Http => Interface::Http(HttpInterface::default()),
		}
	}
}

impl fmt::Display for InterfaceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for InterfaceKind {
	type Err = ReportError;

	/// Accepts either the registry name or the wire alias.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|kind| kind.name() == s || kind.wire_alias() == s)
			.ok_or_else(|| ReportError::InvalidInterface(s.to_string()))
	}
}

/// A log message with optional positional format parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageInterface {
	pub message: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub params: Vec<Value>,
}

impl MessageInterface {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			params: Vec::new(),
		}
	}

	pub fn with_params(mut self, params: Vec<Value>) -> Self {
		self.params = params;
		self
	}
}

/// A cause chain, root cause first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInterface {
	pub values: Vec<ExceptionDescriptor>,
}

/// A standalone stack trace not tied to an exception.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StacktraceInterface {
	pub stacktrace: StackTrace,
}

/// The HTTP request being served when the event occurred.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpInterface {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub method: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub query_string: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cookies: Option<String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub headers: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub env: BTreeMap<String, String>,
}

/// One attached interface.
#[derive(Debug, Clone, PartialEq)]
pub enum Interface {
	Message(MessageInterface),
	Exception(ExceptionInterface),
	Stacktrace(StacktraceInterface),
	Http(HttpInterface),
}

impl Interface {
	pub fn kind(&self) -> InterfaceKind {
		match self {
			Self::Message(_) => InterfaceKind::Message,
			Self::Exception(_) => InterfaceKind::Exception,
			Self::Stacktrace(_) => InterfaceKind::Stacktrace,
			Self::Http(_) => InterfaceKind::Http,
		}
	}

	/// Construct an interface of `kind` from named fields.
	///
	/// Unknown fields are ignored; fields of the wrong shape are an error.
	pub fn from_fields(kind: InterfaceKind, fields: Value) -> Result<Self, ReportError> {
		Ok(match kind {
			InterfaceKind::Message => Self::Message(serde_json::from_value(fields)?),
			InterfaceKind::Exception => Self::Exception(serde_json::from_value(fields)?),
			InterfaceKind::Stacktrace => Self::Stacktrace(serde_json::from_value(fields)?),
			InterfaceKind::Http => Self::Http(serde_json::from_value(fields)?),
		})
	}

	pub fn to_document(&self) -> Value {
		match self {
			Self::Message(message) => {
				let mut doc = Map::new();
				doc.insert("message".to_string(), Value::String(message.message.clone()));
				if !message.params.is_empty() {
					doc.insert("params".to_string(), Value::Array(message.params.clone()));
				}
				Value::Object(doc)
			}
			Self::Exception(exception) => serde_json::json!({
				"values": exception
					.values
					.iter()
					.map(ExceptionDescriptor::to_document)
					.collect::<Vec<_>>(),
			}),
			Self::Stacktrace(stacktrace) => stacktrace.stacktrace.to_document(),
			Self::Http(http) => serde_json::to_value(http).unwrap_or_else(|_| Value::Object(Map::new())),
		}
	}
}

/// Typed access to one interface variant.
pub trait InterfaceType: Default + Into<Interface> {
	const KIND: InterfaceKind;

	fn from_interface(interface: &Interface) -> Option<&Self>;
}

macro_rules! interface_type {
	($ty:ty, $variant:ident) => {
		impl From<$ty> for Interface {
			fn from(value: $ty) -> Self {
				Interface::$variant(value)
			}
		}

		impl InterfaceType for $ty {
			const KIND: InterfaceKind = InterfaceKind::$variant;

			fn from_interface(interface: &Interface) -> Option<&Self> {
				match interface {
					Interface::$variant(inner) => Some(inner),
					_ => None,
				}
			}
		}
	};
}

interface_type!(MessageInterface, Message);
interface_type!(ExceptionInterface, Exception);
interface_type!(StacktraceInterface, Stacktrace);
interface_type!(HttpInterface, Http);

/// The interfaces attached to one event, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interfaces {
	entries: BTreeMap<InterfaceKind, Interface>,
}

impl Interfaces {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, kind: InterfaceKind) -> Option<&Interface> {
		self.entries.get(&kind)
	}

	pub fn get_as<I: InterfaceType>(&self) -> Option<&I> {
		self.entries.get(&I::KIND).and_then(I::from_interface)
	}

	/// Attach an interface, returning whatever was attached under its kind.
	pub fn insert(&mut self, interface: impl Into<Interface>) -> Option<Interface> {
		let interface = interface.into();
		self.entries.insert(interface.kind(), interface)
	}

	pub fn remove(&mut self, kind: InterfaceKind) -> Option<Interface> {
		self.entries.remove(&kind)
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Interface> {
		self.entries.values()
	}

	/// Each interface's document keyed by wire alias.
	pub fn documents(&self) -> impl Iterator<Item = (&'static str, Value)> + '_ {
		self
			.entries
			.iter()
			.map(|(kind, interface)| (kind.wire_alias(), interface.to_document()))
	}
}
