// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::error::ExchangeError;

/// The subset of the OIDC discovery document this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
	pub issuer: String,
	pub authorization_endpoint: String,
	pub token_endpoint: String,
	#[serde(default)]
	pub userinfo_endpoint: Option<String>,
	#[serde(default)]
	pub jwks_uri: Option<String>,
}

impl DiscoveryDocument {
	/// Fetch `{issuer}/.well-known/openid-configuration`.
	#[tracing::instrument(skip(client))]
	pub async fn fetch(client: &reqwest::Client, issuer: &str) -> Result<Self, ExchangeError> {
		let url = format!(
			"{}/.well-known/openid-configuration",
			issuer.trim_end_matches('/')
		);

		let response = client.get(&url).send().await?;
		if !response.status().is_success() {
			return Err(ExchangeError::Discovery(format!(
				"discovery document request returned {}",
				response.status()
			)));
		}

		response
			.json()
			.await
			.map_err(|e| ExchangeError::Discovery(format!("malformed discovery document: {e}")))
	}
}
