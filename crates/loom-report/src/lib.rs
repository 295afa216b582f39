// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error report event construction for Rust applications.
//!
//! Turns errors, panics and messages into report [`Event`]s ready for a
//! transport to send. The crate covers:
//! - Capturing error chains into an [`ExceptionGraph`]
//! - Walking cause chains with [`ExceptionChainWalker`]
//! - Parsing raw backtraces into frames
//! - Layered [`Configuration`] from defaults, TOML and environment
//! - Optional dependency listings via [`ModuleLister`]
//!
//! # Example
//!
//! ```
//! use loom_report::{Configuration, Event, EventOptions};
//!
//! let config = Configuration::default();
//! let error = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
//!
//! let event = Event::from_error(&error, EventOptions::new().configuration(&config))
//!     .expect("io errors are reportable");
//! let document = event.to_document();
//! assert_eq!(document["level"], "error");
//! ```

pub mod backtrace;
pub mod capture;
pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod modules;
pub mod sources;

pub use crate::backtrace::{parse_backtrace, parse_frame_line, BacktraceId, FrameClassifier, RawBacktrace};
pub use capture::{CapturedException, ExceptionGraph, ExceptionId, PANIC_TYPE_NAME};
pub use chain::{collect_chain, ExceptionChainWalker};
pub use config::{Configuration, ConfigurationLayer};
pub use context::{reverse_merge, Context, OsContext, RuntimeContext};
pub use error::{ReportSdkError, Result};
pub use event::{Event, EventId, EventOptions, EventOverrides, PLATFORM, SDK_NAME, SDK_VERSION};
pub use modules::{collect_modules, parse_modules, CommandLister, ModuleLister};
pub use sources::{
	load_configuration, load_from_sources, ConfigSource, DefaultsSource, EnvSource, Precedence,
	TomlSource,
};

pub use loom_report_core as core;
pub use loom_report_core::{
	Breadcrumb, BreadcrumbBuffer, BreadcrumbSource, ExceptionDescriptor, ExceptionInterface,
	Fingerprint, HttpInterface, Interface, InterfaceKind, InterfaceType, Level, MessageInterface,
	StackFrame, StackTrace, StacktraceInterface,
};
