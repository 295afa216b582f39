// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core value types for Loom error reports.
//!
//! This crate holds the pieces of a report event that have no I/O of their
//! own and are shared by every producer of events:
//! - Severity [`Level`]s
//! - [`StackFrame`]s and [`StackTrace`]s, plus culprit selection
//! - [`ExceptionDescriptor`]s for cause chains
//! - The closed set of [`Interface`]s and their wire aliases
//! - [`Breadcrumb`] trails behind the narrow [`BreadcrumbSource`] interface
//! - [`Fingerprint`]s and message size ceilings
//!
//! Event construction lives in `loom-report`.

pub mod breadcrumb;
pub mod culprit;
pub mod error;
pub mod exception;
pub mod fingerprint;
pub mod frame;
pub mod interface;
pub mod level;

pub use breadcrumb::{
	breadcrumbs_document, Breadcrumb, BreadcrumbBuffer, BreadcrumbSource, DEFAULT_MAX_BREADCRUMBS,
};
pub use culprit::{culprit_frame, format_culprit, resolve_culprit};
pub use error::{ReportError, Result};
pub use exception::{module_of, short_type_name, ExceptionDescriptor};
pub use fingerprint::{
	truncate_bytes, truncate_message, Fingerprint, DEFAULT_FINGERPRINT, MAX_MESSAGE_BYTES,
};
pub use frame::{StackFrame, StackTrace};
pub use interface::{
	ExceptionInterface, HttpInterface, Interface, InterfaceKind, InterfaceType, Interfaces,
	MessageInterface, StacktraceInterface,
};
pub use level::Level;
