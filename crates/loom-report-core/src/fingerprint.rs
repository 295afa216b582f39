// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fingerprints: grouping hints for the receiving service, plus the
//! size ceilings applied to event text.

use serde::{Deserialize, Serialize};

/// Placeholder that means "keep the default grouping and add to it".
pub const DEFAULT_FINGERPRINT: &str = "{{ default }}";

/// Maximum size of an event message in bytes.
pub const MAX_MESSAGE_BYTES: usize = 9_999;

/// An ordered list of grouping keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub Vec<String>);

impl Fingerprint {
	pub fn new<I, S>(parts: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self(parts.into_iter().map(Into::into).collect())
	}

	/// Default grouping refined by `parts`.
	pub fn extending_default<I, S>(parts: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut fingerprint = vec![DEFAULT_FINGERPRINT.to_string()];
		fingerprint.extend(parts.into_iter().map(Into::into));
		Self(fingerprint)
	}

	/// True when the fingerprint adds to rather than replaces default grouping.
	pub fn extends_default(&self) -> bool {
		self.0.iter().any(|part| part == DEFAULT_FINGERPRINT)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn parts(&self) -> &[String] {
		&self.0
	}
}

impl From<Vec<String>> for Fingerprint {
	fn from(parts: Vec<String>) -> Self {
		Self(parts)
	}
}

/// Truncate `s` to at most `max_bytes` bytes.
///
/// The cut lands on the last UTF-8 character boundary at or below
/// `max_bytes`, so ASCII input is cut at exactly `max_bytes`.
pub fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
	if s.len() <= max_bytes {
		return s;
	}
	let mut end = max_bytes;
	while !s.is_char_boundary(end) {
		end -= 1;
	}
	&s[..end]
}

/// Truncate an event message to [`MAX_MESSAGE_BYTES`].
///
/// The result stays valid UTF-8: a multi-byte character straddling the
/// limit is dropped whole rather than split, so such messages may come out
/// up to three bytes short of the limit.
pub fn truncate_message(message: &str) -> String {
	truncate_bytes(message, MAX_MESSAGE_BYTES).to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn truncate_message_drops_a_straddling_character() {
		let message = format!("{}é", "a".repeat(MAX_MESSAGE_BYTES - 1));
		let cut = truncate_message(&message);
		assert_eq!(cut.len(), MAX_MESSAGE_BYTES - 1);
		assert!(cut.chars().all(|c| c == 'a'));
	}
	use proptest::prelude::*;

	#[test]
	fn extending_default_prepends_placeholder() {
		let fingerprint = Fingerprint::extending_default(["db", "timeout"]);
		assert_eq!(fingerprint.parts(), ["{{ default }}", "db", "timeout"]);
		assert!(fingerprint.extends_default());
		assert!(!Fingerprint::new(["custom"]).extends_default());
	}

	#[test]
	fn serializes_as_plain_list() {
		let json = serde_json::to_value(Fingerprint::new(["a", "b"])).unwrap();
		assert_eq!(json, serde_json::json!(["a", "b"]));
	}

	#[test]
	fn truncates_ascii_to_exact_ceiling() {
		let message = "x".repeat(20_000);
		assert_eq!(truncate_message(&message).len(), 9_999);
	}

	#[test]
	fn short_messages_are_untouched() {
		assert_eq!(truncate_message("disk full"), "disk full");
	}

	#[test]
	fn truncation_never_splits_a_character() {
		// 'é' is two bytes; an odd ceiling lands mid-character.
		let message = "é".repeat(10);
		let cut = truncate_bytes(&message, 5);
		assert_eq!(cut, "éé");
	}

	proptest! {
		#[test]
		fn truncated_length_is_bounded(s in ".{0,200}", max in 0usize..64) {
			let cut = truncate_bytes(&s, max);
			prop_assert!(cut.len() <= max);
			prop_assert!(s.starts_with(cut));
			if cut.len() < s.len() {
				prop_assert!(max - cut.len() < 4);
			}
		}

		#[test]
		fn ascii_truncates_exactly(len in 0usize..30_000) {
			let s = "a".repeat(len);
			prop_assert_eq!(truncate_message(&s).len(), len.min(MAX_MESSAGE_BYTES));
		}
	}
}
