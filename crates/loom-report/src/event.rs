// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The report event and its construction entry points.
//!
//! An [`Event`] is built from an error chain ([`Event::from_exception`],
//! [`Event::from_error`], [`Event::from_panic`]) or from a plain message
//! ([`Event::from_message`]). Configuration, context and breadcrumbs are
//! passed in through [`EventOptions`]; nothing is read from globals.

use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use loom_report_core::{
	breadcrumbs_document, resolve_culprit, truncate_message, Breadcrumb, BreadcrumbSource,
	ExceptionInterface, Fingerprint, Interface, InterfaceKind, InterfaceType, Interfaces, Level,
	MessageInterface, StackTrace, StacktraceInterface,
};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::backtrace::{FrameClassifier, RawBacktrace};
use crate::capture::{ExceptionGraph, ExceptionId};
use crate::chain::ExceptionChainWalker;
use crate::config::Configuration;
use crate::context::{reverse_merge, Context};
use crate::error::Result;
use crate::modules::{collect_modules, CommandLister, ModuleLister};

pub const PLATFORM: &str = "rust";
pub const SDK_NAME: &str = "loom-report-rust";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Unique event identifier, rendered as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for EventId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for EventId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.simple())
	}
}

impl FromStr for EventId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Caller-supplied values for overridable event fields.
///
/// Scalar fields replace the computed value. Map fields are event-level
/// data and take precedence over context and configuration entries with
/// the same key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOverrides {
	pub timestamp: Option<DateTime<Utc>>,
	pub level: Option<Level>,
	pub logger: Option<String>,
	pub culprit: Option<String>,
	pub server_name: Option<String>,
	pub release: Option<String>,
	pub environment: Option<String>,
	pub fingerprint: Option<Fingerprint>,
	/// Used as-is instead of running the dependency lister.
	pub modules: Option<BTreeMap<String, String>>,
	pub tags: Map<String, Value>,
	pub extra: Map<String, Value>,
	pub user: Map<String, Value>,
	pub contexts: Map<String, Value>,
}

impl EventOverrides {
	/// Read overrides from a loosely typed map.
	///
	/// Unknown keys and values of the wrong shape are skipped.
	pub fn from_map(map: &Map<String, Value>) -> Self {
		let mut overrides = Self::default();

		for (key, value) in map {
			let applied = match key.as_str() {
				"timestamp" => value
					.as_str()
					.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
					.map(|t| overrides.timestamp = Some(t.with_timezone(&Utc)))
					.is_some(),
				"level" => value
					.as_str()
					.and_then(|s| s.parse::<Level>().ok())
					.map(|level| overrides.level = Some(level))
					.is_some(),
				"logger" => set_string(&mut overrides.logger, value),
				"culprit" => set_string(&mut overrides.culprit, value),
				"server_name" => set_string(&mut overrides.server_name, value),
				"release" => set_string(&mut overrides.release, value),
				"environment" => set_string(&mut overrides.environment, value),
				"fingerprint" => serde_json::from_value::<Fingerprint>(value.clone())
					.map(|fingerprint| overrides.fingerprint = Some(fingerprint))
					.is_ok(),
				"modules" => serde_json::from_value::<BTreeMap<String, String>>(value.clone())
					.map(|modules| overrides.modules = Some(modules))
					.is_ok(),
				"tags" => set_object(&mut overrides.tags, value),
				"extra" => set_object(&mut overrides.extra, value),
				"user" => set_object(&mut overrides.user, value),
				"contexts" => set_object(&mut overrides.contexts, value),
				_ => {
					debug!(key = %key, "ignoring unknown event override");
					continue;
				}
			};

			if !applied {
				debug!(key = %key, "ignoring event override with unexpected type");
			}
		}

		overrides
	}
}

fn set_string(slot: &mut Option<String>, value: &Value) -> bool {
	match value.as_str() {
		Some(s) => {
			*slot = Some(s.to_string());
			true
		}
		None => false,
	}
}

fn set_object(slot: &mut Map<String, Value>, value: &Value) -> bool {
	match value.as_object() {
		Some(map) => {
			*slot = map.clone();
			true
		}
		None => false,
	}
}

/// Inputs to event construction besides the error or message itself.
#[derive(Default)]
pub struct EventOptions<'a> {
	pub configuration: Option<&'a Configuration>,
	pub context: Option<&'a Context>,
	pub breadcrumbs: Option<&'a dyn BreadcrumbSource>,
	/// Positional parameters for message events.
	pub message_params: Vec<Value>,
	pub overrides: EventOverrides,
	/// Used instead of the configured command when `send_modules` is set.
	pub module_lister: Option<&'a dyn ModuleLister>,
}

impl<'a> EventOptions<'a> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn configuration(mut self, configuration: &'a Configuration) -> Self {
		self.configuration = Some(configuration);
		self
	}

	pub fn context(mut self, context: &'a Context) -> Self {
		self.context = Some(context);
		self
	}

	pub fn breadcrumbs(mut self, breadcrumbs: &'a dyn BreadcrumbSource) -> Self {
		self.breadcrumbs = Some(breadcrumbs);
		self
	}

	pub fn message_params(mut self, params: Vec<Value>) -> Self {
		self.message_params = params;
		self
	}

	pub fn overrides(mut self, overrides: EventOverrides) -> Self {
		self.overrides = overrides;
		self
	}

	pub fn module_lister(mut self, lister: &'a dyn ModuleLister) -> Self {
		self.module_lister = Some(lister);
		self
	}

	fn resolved_configuration(&self) -> Cow<'a, Configuration> {
		match self.configuration {
			Some(configuration) => Cow::Borrowed(configuration),
			None => Cow::Owned(Configuration::default()),
		}
	}
}

/// One error report.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
	id: EventId,
	pub timestamp: DateTime<Utc>,
	pub level: Level,
	pub logger: Option<String>,
	/// Derived from the most recently attached stack trace.
	pub culprit: Option<String>,
	pub server_name: Option<String>,
	pub release: Option<String>,
	pub environment: Option<String>,
	pub fingerprint: Option<Fingerprint>,
	pub modules: Option<BTreeMap<String, String>>,
	pub tags: Map<String, Value>,
	pub extra: Map<String, Value>,
	pub user: Map<String, Value>,
	pub contexts: Map<String, Value>,
	breadcrumbs: Option<Arc<[Breadcrumb]>>,
	interfaces: Interfaces,
}

impl Event {
	/// An event with identity, timestamp and configured fields only.
	pub fn new(options: &EventOptions<'_>) -> Self {
		let config = options.resolved_configuration();
		Self::base(options, &config)
	}

	fn base(options: &EventOptions<'_>, config: &Configuration) -> Self {
		let overrides = &options.overrides;

		let modules = if let Some(modules) = &overrides.modules {
			Some(modules.clone())
		} else if config.send_modules {
			match options.module_lister {
				Some(lister) => collect_modules(lister),
				None => CommandLister::from_configuration(config)
					.and_then(|lister| collect_modules(&lister)),
			}
		} else {
			None
		};

		let mut event = Self {
			id: EventId::new(),
			timestamp: overrides.timestamp.unwrap_or_else(Utc::now),
			level: overrides.level.unwrap_or_default(),
			logger: overrides.logger.clone(),
			culprit: overrides.culprit.clone(),
			server_name: overrides
				.server_name
				.clone()
				.or_else(|| config.server_name.clone()),
			release: overrides.release.clone().or_else(|| config.release.clone()),
			environment: overrides
				.environment
				.clone()
				.or_else(|| Some(config.current_environment.clone())),
			fingerprint: overrides.fingerprint.clone(),
			modules,
			tags: overrides.tags.clone(),
			extra: overrides.extra.clone(),
			user: overrides.user.clone(),
			contexts: overrides.contexts.clone(),
			breadcrumbs: options.breadcrumbs.map(|source| source.snapshot()),
			interfaces: Interfaces::new(),
		};

		if let Some(context) = options.context {
			reverse_merge(&mut event.tags, &context.tags);
			reverse_merge(&mut event.extra, &context.extra);
			reverse_merge(&mut event.user, &context.user);
			reverse_merge(&mut event.contexts, &context.contexts);
		}

		let config_tags: Map<String, Value> = config
			.tags
			.iter()
			.map(|(k, v)| (k.clone(), Value::String(v.clone())))
			.collect();
		reverse_merge(&mut event.tags, &config_tags);

		trace!(event_id = %event.id, "event initialized");
		event
	}

	/// Build an event for the exception `leaf` and its cause chain.
	///
	/// Returns `None` for errors raised by this SDK, for excluded error
	/// types, and for ids not present in `graph`.
	pub fn from_exception(
		graph: &ExceptionGraph,
		leaf: ExceptionId,
		options: EventOptions<'_>,
	) -> Option<Self> {
		let Some(exception) = graph.get(leaf) else {
			debug!(exception = %leaf, "exception not present in graph");
			return None;
		};

		if exception.internal {
			debug!(error_type = %exception.type_name, "not reporting internal error");
			return None;
		}

		let config = options.resolved_configuration();
		if config.is_excluded(&exception.type_name) {
			debug!(error_type = %exception.type_name, "error type excluded from reporting");
			return None;
		}

		let mut event = Self::base(&options, &config);
		event.set_message(
			format!("{}: {}", exception.type_name, exception.message),
			Vec::new(),
		);
		reverse_merge(&mut event.extra, &exception.extra);

		let classifier: &Configuration = &config;
		let walker = ExceptionChainWalker::new(classifier)
			.with_leaf_backtrace_fallback(Arc::new(RawBacktrace::empty()));
		event.interface_with(|interface: &mut ExceptionInterface, event: &mut Event| {
			interface.values = walker.walk(graph, leaf, |trace| {
				event.culprit = resolve_culprit(trace.frames());
			});
		});

		debug!(
			event_id = %event.id,
			error_type = %exception.type_name,
			chain_length = event.interface_as::<ExceptionInterface>().map_or(0, |i| i.values.len()),
			"built exception event"
		);
		Some(event)
	}

	/// Build an event for `error` and its `source()` chain.
	pub fn from_error<E>(error: &E, options: EventOptions<'_>) -> Option<Self>
	where
		E: Error + 'static,
	{
		let (graph, leaf) = ExceptionGraph::from_error(error);
		Self::from_exception(&graph, leaf, options)
	}

	/// Build an event for a panic payload. The level defaults to fatal.
	pub fn from_panic(
		payload: &(dyn Any + Send),
		location: Option<&Location<'_>>,
		mut options: EventOptions<'_>,
	) -> Option<Self> {
		if options.overrides.level.is_none() {
			options.overrides.level = Some(Level::Fatal);
		}
		let (graph, leaf) = ExceptionGraph::from_panic(payload, location);
		Self::from_exception(&graph, leaf, options)
	}

	/// Build an event carrying a message and its positional parameters.
	pub fn from_message(message: &str, options: EventOptions<'_>) -> Self {
		let config = options.resolved_configuration();
		let mut event = Self::base(&options, &config);
		event.set_message(message, options.message_params.clone());
		debug!(event_id = %event.id, "built message event");
		event
	}

	pub fn id(&self) -> EventId {
		self.id
	}

	/// The breadcrumb trail captured at construction time.
	pub fn breadcrumbs(&self) -> &[Breadcrumb] {
		self.breadcrumbs.as_deref().unwrap_or(&[])
	}

	pub fn interfaces(&self) -> &Interfaces {
		&self.interfaces
	}

	pub fn interface(&self, kind: InterfaceKind) -> Option<&Interface> {
		self.interfaces.get(kind)
	}

	pub fn interface_as<I: InterfaceType>(&self) -> Option<&I> {
		self.interfaces.get_as::<I>()
	}

	/// Attach an interface, replacing any previous one of the same kind.
	pub fn set_interface(&mut self, interface: impl Into<Interface>) -> Option<Interface> {
		self.interfaces.insert(interface)
	}

	/// Attach an interface of the kind named `name` built from named fields.
	pub fn set_interface_fields(&mut self, name: &str, fields: Value) -> Result<()> {
		let kind: InterfaceKind = name.parse()?;
		let mut interface = Interface::from_fields(kind, fields)?;
		if let Interface::Message(message) = &mut interface {
			message.message = truncate_message(&message.message);
		}
		self.interfaces.insert(interface);
		Ok(())
	}

	/// Build a fresh interface with access to the event, then attach it.
	///
	/// The builder may update event fields such as the culprit while it
	/// fills in the interface.
	pub fn interface_with<I, F>(&mut self, build: F)
	where
		I: InterfaceType,
		F: FnOnce(&mut I, &mut Event),
	{
		let mut interface = I::default();
		build(&mut interface, self);
		self.interfaces.insert(interface);
	}

	pub fn message(&self) -> Option<&str> {
		self.interface_as::<MessageInterface>()
			.map(|m| m.message.as_str())
	}

	/// Attach a message interface, truncating the message if needed.
	pub fn set_message(&mut self, message: impl AsRef<str>, params: Vec<Value>) {
		let message = truncate_message(message.as_ref());
		self.interfaces
			.insert(MessageInterface::new(message).with_params(params));
	}

	/// Attach a standalone stack trace and derive the culprit from it.
	pub fn set_backtrace(&mut self, backtrace: &RawBacktrace, classifier: &dyn FrameClassifier) {
		self.interface_with(|interface: &mut StacktraceInterface, event: &mut Event| {
			let mut frames = backtrace.parse(classifier);
			frames.reverse();
			event.culprit = resolve_culprit(&frames);
			interface.stacktrace = StackTrace::new(frames);
		});
	}

	/// The event as a nested key/value document.
	///
	/// Null values are removed from every field except interface documents.
	pub fn to_document(&self) -> Map<String, Value> {
		let mut doc = Map::new();

		doc.insert("event_id".to_string(), Value::String(self.id.to_string()));
		doc.insert(
			"timestamp".to_string(),
			Value::String(self.timestamp.format(TIMESTAMP_FORMAT).to_string()),
		);
		doc.insert("level".to_string(), Value::String(self.level.as_str().to_string()));
		doc.insert("platform".to_string(), Value::String(PLATFORM.to_string()));
		doc.insert(
			"sdk".to_string(),
			serde_json::json!({ "name": SDK_NAME, "version": SDK_VERSION }),
		);

		insert_opt(&mut doc, "logger", &self.logger);
		insert_opt(&mut doc, "culprit", &self.culprit);
		insert_opt(&mut doc, "server_name", &self.server_name);
		insert_opt(&mut doc, "release", &self.release);
		insert_opt(&mut doc, "environment", &self.environment);
		if let Some(message) = self.message() {
			doc.insert("message".to_string(), Value::String(message.to_string()));
		}

		if let Some(fingerprint) = &self.fingerprint {
			doc.insert(
				"fingerprint".to_string(),
				Value::Array(fingerprint.parts().iter().cloned().map(Value::String).collect()),
			);
		}
		if let Some(modules) = &self.modules {
			let modules: Map<String, Value> = modules
				.iter()
				.map(|(name, version)| (name.clone(), Value::String(version.clone())))
				.collect();
			doc.insert("modules".to_string(), Value::Object(modules));
		}

		doc.insert("tags".to_string(), Value::Object(self.tags.clone()));
		doc.insert("extra".to_string(), Value::Object(self.extra.clone()));
		doc.insert("user".to_string(), Value::Object(self.user.clone()));
		doc.insert("contexts".to_string(), Value::Object(self.contexts.clone()));

		let breadcrumbs = self.breadcrumbs();
		if !breadcrumbs.is_empty() {
			doc.insert("breadcrumbs".to_string(), breadcrumbs_document(breadcrumbs));
		}

		compact_nulls(&mut doc);

		for (alias, interface) in self.interfaces.documents() {
			doc.insert(alias.to_string(), interface);
		}

		doc
	}
}

impl Serialize for Event {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		self.to_document().serialize(serializer)
	}
}

fn insert_opt(doc: &mut Map<String, Value>, key: &str, value: &Option<String>) {
	if let Some(value) = value {
		doc.insert(key.to_string(), Value::String(value.clone()));
	}
}

fn compact_nulls(map: &mut Map<String, Value>) {
	map.retain(|_, value| !value.is_null());
	for value in map.values_mut() {
		compact_value(value);
	}
}

fn compact_value(value: &mut Value) {
	match value {
		Value::Object(map) => compact_nulls(map),
		Value::Array(items) => items.iter_mut().for_each(compact_value),
		_ => {}
	}
}
