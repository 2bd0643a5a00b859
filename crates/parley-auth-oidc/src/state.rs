// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-attempt state and PKCE material.
//!
//! Generated before redirecting to the provider, persisted by the login
//! flow, and validated on callback. A mismatch is a CSRF-class failure,
//! distinct from credential failures.

use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a random, unguessable state value for CSRF protection.
///
/// 32 random bytes, hex encoded.
pub fn generate_state() -> String {
	let mut bytes = [0u8; 32];
	rand::thread_rng().fill_bytes(&mut bytes);
	hex::encode(bytes)
}

/// A PKCE verifier/challenge pair (S256 method).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
	/// The code verifier, sent with the token exchange.
	pub verifier: String,
	/// The code challenge, sent with the authorization redirect.
	pub challenge: String,
}

impl PkceChallenge {
	/// Generate a fresh verifier and its S256 challenge.
	pub fn generate() -> Self {
		let mut bytes = [0u8; 32];
		rand::thread_rng().fill_bytes(&mut bytes);
		let verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
		let challenge = Self::challenge_of(&verifier);
		Self { verifier, challenge }
	}

	/// Compute the S256 challenge for a verifier.
	pub fn challenge_of(verifier: &str) -> String {
		let digest = Sha256::digest(verifier.as_bytes());
		base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
	}
}
