// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Errors that can occur during the token exchange and identity
/// retrieval round-trips.
///
/// All of these abort the login attempt; callers surface them as a
/// single generic authentication failure and keep the detail for
/// operational logging.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
	/// The HTTP request to the provider failed (network error, timeout).
	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),

	/// The provider returned an error response (invalid code, expired
	/// token, non-2xx userinfo).
	#[error("provider error: {0}")]
	Provider(String),

	/// A response from the provider could not be parsed as expected.
	#[error("failed to parse response: {0}")]
	Parse(String),

	/// The id token failed verification (signature, issuer, audience).
	#[error("id token verification failed: {0}")]
	IdToken(String),

	/// Endpoint discovery failed or left a required endpoint unknown.
	#[error("endpoint discovery failed: {0}")]
	Discovery(String),
}
