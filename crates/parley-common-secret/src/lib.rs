// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret string handling for Parley.
//!
//! [`SecretString`] wraps sensitive values (client secrets, access tokens,
//! session signing keys) so they cannot leak through `Debug`/`Display`
//! output or logs. The wrapped value is zeroed on drop.
//!
//! Access to the underlying value is explicit via [`SecretString::expose`],
//! which makes every use of a secret grep-able in review.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// A string wrapper that redacts its contents in `Debug` output and
/// zeroes the backing memory on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
	/// Wrap a sensitive string value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Expose the underlying value.
	///
	/// Call sites should pass the result directly to whatever consumes
	/// the secret rather than storing it in an intermediate.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns true if the wrapped value is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl std::fmt::Debug for SecretString {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("SecretString([REDACTED])")
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl Drop for SecretString {
	fn drop(&mut self) {
		self.0.zeroize();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn debug_output_is_redacted() {
		let secret = SecretString::new("hunter2");
		let debug = format!("{secret:?}");
		assert!(!debug.contains("hunter2"));
		assert!(debug.contains("[REDACTED]"));
	}

	#[test]
	fn expose_returns_inner_value() {
		let secret = SecretString::new("hunter2");
		assert_eq!(secret.expose(), "hunter2");
	}

	#[test]
	fn is_empty_reflects_contents() {
		assert!(SecretString::new("").is_empty());
		assert!(!SecretString::new("x").is_empty());
	}

	#[test]
	fn serde_roundtrip_is_transparent() {
		let secret = SecretString::new("tok_abc");
		let json = serde_json::to_string(&secret).unwrap();
		assert_eq!(json, "\"tok_abc\"");

		let back: SecretString = serde_json::from_str(&json).unwrap();
		assert_eq!(back.expose(), "tok_abc");
	}

	mod proptests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn debug_never_contains_secret(value in "[a-zA-Z0-9_]{8,64}") {
				prop_assume!(!value.contains("REDACTED"));
				prop_assume!(!value.contains("SecretString"));

				let secret = SecretString::new(value.clone());
				let debug = format!("{secret:?}");
				prop_assert!(!debug.contains(&value));
			}
		}
	}
}
