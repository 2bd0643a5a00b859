// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JWKS fetching and caching for id-token verification.
//!
//! Keys are fetched from the provider's JWKS endpoint, cached by `kid`,
//! and refreshed when the cache TTL elapses or a requested key is not
//! present (key rotation).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::ExchangeError;

/// Default cache TTL (1 hour).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// A single JSON Web Key from a JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
	/// Key type (e.g. "RSA").
	pub kty: String,
	/// Key ID, matched against the JWT header `kid`.
	pub kid: Option<String>,
	/// Key use (e.g. "sig").
	#[serde(rename = "use")]
	pub key_use: Option<String>,
	/// RSA modulus (base64url encoded).
	pub n: Option<String>,
	/// RSA exponent (base64url encoded).
	pub e: Option<String>,
}

/// A JWKS document containing multiple keys.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
	pub keys: Vec<Jwk>,
}

struct CacheState {
	keys: HashMap<String, DecodingKey>,
	fetched_at: Option<Instant>,
}

/// TTL-cached JWKS client.
pub struct JwksCache {
	jwks_url: String,
	cache_ttl: Duration,
	state: RwLock<CacheState>,
	client: reqwest::Client,
}

impl JwksCache {
	/// Create a cache for one JWKS endpoint.
	pub fn new(jwks_url: String, client: reqwest::Client) -> Self {
		Self {
			jwks_url,
			cache_ttl: DEFAULT_CACHE_TTL,
			state: RwLock::new(CacheState {
				keys: HashMap::new(),
				fetched_at: None,
			}),
			client,
		}
	}

	/// Get a decoding key by key ID.
	///
	/// When `kid` is `None`, the first available key is returned.
	/// Fetches from the JWKS endpoint when the cache is stale or the key
	/// is unknown.
	pub async fn get_key(&self, kid: Option<&str>) -> Result<DecodingKey, ExchangeError> {
		let stale = {
			let state = self.state.read().await;
			match state.fetched_at {
				Some(at) => at.elapsed() > self.cache_ttl,
				None => true,
			}
		};

		if !stale {
			if let Some(key) = self.lookup(kid).await {
				return Ok(key);
			}
		}

		self.refresh().await?;

		self.lookup(kid).await.ok_or_else(|| match kid {
			Some(k) => ExchangeError::IdToken(format!("no JWKS key with kid {k}")),
			None => ExchangeError::IdToken("JWKS document contains no usable keys".to_string()),
		})
	}

	async fn lookup(&self, kid: Option<&str>) -> Option<DecodingKey> {
		let state = self.state.read().await;
		match kid {
			Some(k) => state.keys.get(k).cloned(),
			None => state.keys.values().next().cloned(),
		}
	}

	#[tracing::instrument(skip(self), fields(jwks_url = %self.jwks_url))]
	async fn refresh(&self) -> Result<(), ExchangeError> {
		let response = self.client.get(&self.jwks_url).send().await?;
		if !response.status().is_success() {
			return Err(ExchangeError::IdToken(format!(
				"JWKS endpoint returned {}",
				response.status()
			)));
		}

		let document: JwksDocument = response
			.json()
			.await
			.map_err(|e| ExchangeError::Parse(format!("malformed JWKS document: {e}")))?;

		let mut keys = HashMap::new();
		for jwk in &document.keys {
			if let Some(key) = decoding_key(jwk) {
				// keys without a kid are stored under an empty id and only
				// reachable through the first-available path
				keys.insert(jwk.kid.clone().unwrap_or_default(), key);
			}
		}

		tracing::debug!(key_count = keys.len(), "JWKS cache refreshed");

		let mut state = self.state.write().await;
		state.keys = keys;
		state.fetched_at = Some(Instant::now());
		Ok(())
	}
}

fn decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
	if jwk.kty != "RSA" {
		return None;
	}
	if let Some(key_use) = &jwk.key_use {
		if key_use != "sig" {
			return None;
		}
	}
	let (n, e) = (jwk.n.as_deref()?, jwk.e.as_deref()?);
	match DecodingKey::from_rsa_components(n, e) {
		Ok(key) => Some(key),
		Err(err) => {
			tracing::warn!(kid = ?jwk.kid, error = %err, "skipping unusable JWKS key");
			None
		}
	}
}
