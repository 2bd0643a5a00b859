// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use parley_common_secret::SecretString;
use serde::Deserialize;

/// Response from a provider's token endpoint after exchanging an
/// authorization code.
///
/// Token material is wrapped in [`SecretString`] to prevent accidental
/// logging; use `.expose()` when presenting a token to the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
	/// The access token for userinfo and avatar requests.
	#[serde(deserialize_with = "deserialize_secret_string")]
	pub access_token: SecretString,

	/// The token type (typically "bearer").
	#[serde(default)]
	pub token_type: Option<String>,

	/// Lifetime of the access token in seconds, if the provider says.
	#[serde(default)]
	pub expires_in: Option<u64>,

	/// The OIDC id token. Absent for OAuth2-only providers.
	#[serde(default, deserialize_with = "deserialize_optional_secret_string")]
	pub id_token: Option<SecretString>,

	/// Granted scopes, if the provider reports them.
	#[serde(default)]
	pub scope: Option<String>,
}

/// Error shape providers return from the token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ProviderErrorResponse {
	pub error: String,
	pub error_description: Option<String>,
}

fn deserialize_secret_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let s = String::deserialize(deserializer)?;
	Ok(SecretString::new(s))
}

fn deserialize_optional_secret_string<'de, D>(
	deserializer: D,
) -> Result<Option<SecretString>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let s = Option::<String>::deserialize(deserializer)?;
	Ok(s.map(SecretString::new))
}
