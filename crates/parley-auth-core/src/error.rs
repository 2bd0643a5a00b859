// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Errors that can occur when loading provider configuration.
///
/// A *missing* variable is not an error - it disables the provider. These
/// errors cover values that are present but unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// A configuration value was empty or invalid.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
}

/// Errors that can occur while normalizing a userinfo payload.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
	/// No usable email address could be resolved from the claims.
	/// Without an email there is no key to reconcile the identity against.
	#[error("userinfo payload contains no usable email address")]
	MissingEmail,

	/// The userinfo payload was not a JSON object.
	#[error("userinfo payload is not a JSON object")]
	NotAnObject,
}
