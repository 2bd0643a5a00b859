// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use parley_common_secret::SecretString;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// An opaque session bearer token.
///
/// Wraps [`SecretString`] so the token never appears in Debug output.
#[derive(Debug, Clone)]
pub struct SessionToken(SecretString);

impl SessionToken {
	/// Generate a fresh token: 32 random bytes, hex encoded.
	pub fn generate() -> Self {
		let mut bytes = [0u8; 32];
		rand::thread_rng().fill_bytes(&mut bytes);
		Self(SecretString::new(hex::encode(bytes)))
	}

	/// The token value, for handing to the caller.
	pub fn expose(&self) -> &str {
		self.0.expose()
	}

	/// The SHA-256 hex digest persisted by the backends.
	pub fn hash(&self) -> String {
		hash_token(self.expose())
	}
}

/// Hash a presented token the same way stored tokens are hashed.
pub(crate) fn hash_token(token: &str) -> String {
	hex::encode(Sha256::digest(token.as_bytes()))
}
