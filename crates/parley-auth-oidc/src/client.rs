// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The token exchange client.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use parley_auth_core::{ProviderDescriptor, ProviderFamily};

use crate::discovery::DiscoveryDocument;
use crate::error::ExchangeError;
use crate::jwks::JwksCache;
use crate::state::PkceChallenge;
use crate::token::{ProviderErrorResponse, TokenResponse};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved endpoint URLs for one provider.
///
/// Built from the descriptor's explicit URLs, with gaps filled from the
/// issuer's discovery document for OIDC providers.
#[derive(Debug, Clone)]
pub struct Endpoints {
	pub auth_url: Url,
	pub token_url: Url,
	pub userinfo_url: Option<Url>,
	pub jwks_url: Option<Url>,
}

impl Endpoints {
	/// Parse endpoint URLs. Invalid URLs are configuration defects and
	/// surface as [`ExchangeError::Discovery`].
	pub fn new(
		auth_url: &str,
		token_url: &str,
		userinfo_url: Option<&str>,
		jwks_url: Option<&str>,
	) -> Result<Self, ExchangeError> {
		let parse = |field: &str, value: &str| {
			Url::parse(value)
				.map_err(|e| ExchangeError::Discovery(format!("invalid {field} URL {value:?}: {e}")))
		};
		Ok(Self {
			auth_url: parse("authorization", auth_url)?,
			token_url: parse("token", token_url)?,
			userinfo_url: userinfo_url.map(|u| parse("userinfo", u)).transpose()?,
			jwks_url: jwks_url.map(|u| parse("jwks", u)).transpose()?,
		})
	}
}

/// Client for one provider's authorization-code flow.
///
/// Performs the code-for-token exchange and retrieves the identity
/// profile; holds a JWKS cache for id-token verification when the
/// provider exposes one. Cheap to clone per login attempt is not
/// needed - one instance per provider is shared behind the login
/// service.
pub struct ExchangeClient {
	descriptor: ProviderDescriptor,
	endpoints: Endpoints,
	http: reqwest::Client,
	jwks: Option<JwksCache>,
}

impl ExchangeClient {
	/// Create a client from a descriptor and already-resolved endpoints.
	///
	/// # Panics
	///
	/// Panics if the HTTP client cannot be built (should never happen in
	/// practice).
	pub fn new(descriptor: ProviderDescriptor, endpoints: Endpoints) -> Self {
		let http = parley_common_http::builder()
			.timeout(HTTP_TIMEOUT)
			.build()
			.expect("failed to build HTTP client");

		let jwks = endpoints
			.jwks_url
			.as_ref()
			.map(|url| JwksCache::new(url.to_string(), http.clone()));

		Self {
			descriptor,
			endpoints,
			http,
			jwks,
		}
	}

	/// Resolve a descriptor into a client, consulting the issuer's
	/// discovery document for any endpoint the configuration leaves out.
	///
	/// OAuth2-only descriptors carry all endpoints explicitly (enforced
	/// at configuration time) and never trigger discovery.
	#[tracing::instrument(skip(descriptor), fields(provider = %descriptor.name))]
	pub async fn resolve(descriptor: ProviderDescriptor) -> Result<Self, ExchangeError> {
		let explicit_complete = descriptor.auth_url.is_some()
			&& descriptor.token_url.is_some()
			&& (descriptor.family == ProviderFamily::OAuth2
				|| (descriptor.userinfo_url.is_some() && descriptor.jwks_url.is_some()));

		let endpoints = if explicit_complete {
			Endpoints::new(
				descriptor.auth_url.as_deref().unwrap_or_default(),
				descriptor.token_url.as_deref().unwrap_or_default(),
				descriptor.userinfo_url.as_deref(),
				descriptor.jwks_url.as_deref(),
			)?
		} else {
			let issuer = descriptor
				.issuer
				.as_deref()
				.ok_or_else(|| ExchangeError::Discovery("no issuer to discover from".to_string()))?;

			let http = parley_common_http::builder()
				.timeout(HTTP_TIMEOUT)
				.build()
				.expect("failed to build HTTP client");
			let document = DiscoveryDocument::fetch(&http, issuer).await?;

			// explicit configuration wins over discovered values
			Endpoints::new(
				descriptor
					.auth_url
					.as_deref()
					.unwrap_or(&document.authorization_endpoint),
				descriptor
					.token_url
					.as_deref()
					.unwrap_or(&document.token_endpoint),
				descriptor
					.userinfo_url
					.as_deref()
					.or(document.userinfo_endpoint.as_deref()),
				descriptor.jwks_url.as_deref().or(document.jwks_uri.as_deref()),
			)?
		};

		Ok(Self::new(descriptor, endpoints))
	}

	/// The descriptor this client was built from.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	/// The resolved endpoints.
	pub fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	/// Build the provider authorization URL for the OAuth flow.
	///
	/// The caller persists `state` (and the PKCE verifier) against the
	/// pending attempt before redirecting the user here.
	#[tracing::instrument(skip_all, fields(provider = %self.descriptor.name))]
	pub fn authorization_url(&self, state: Option<&str>, pkce: Option<&PkceChallenge>) -> String {
		let mut url = self.endpoints.auth_url.clone();
		{
			let mut query = url.query_pairs_mut();
			query
				.append_pair("response_type", "code")
				.append_pair("client_id", &self.descriptor.client_id)
				.append_pair("redirect_uri", &self.descriptor.redirect_uri);

			if !self.descriptor.scopes.is_empty() {
				query.append_pair("scope", &self.descriptor.scopes_string());
			}
			if let Some(state) = state {
				query.append_pair("state", state);
			}
			if let Some(pkce) = pkce {
				query
					.append_pair("code_challenge", &pkce.challenge)
					.append_pair("code_challenge_method", "S256");
			}
		}
		url.to_string()
	}

	/// Exchange an authorization code for tokens.
	///
	/// # Errors
	///
	/// - [`ExchangeError::Http`]: network error or timeout.
	/// - [`ExchangeError::Provider`]: the provider rejected the code.
	/// - [`ExchangeError::Parse`]: unexpected response format.
	#[tracing::instrument(skip_all, fields(provider = %self.descriptor.name))]
	pub async fn exchange_code(
		&self,
		code: &str,
		pkce_verifier: Option<&str>,
	) -> Result<TokenResponse, ExchangeError> {
		tracing::debug!("exchanging authorization code for tokens");

		let mut form = vec![
			("grant_type", "authorization_code"),
			("client_id", self.descriptor.client_id.as_str()),
			("client_secret", self.descriptor.client_secret.expose()),
			("code", code),
			("redirect_uri", self.descriptor.redirect_uri.as_str()),
		];
		if let Some(verifier) = pkce_verifier {
			form.push(("code_verifier", verifier));
		}

		let response = self
			.http
			.post(self.endpoints.token_url.clone())
			.header("Accept", "application/json")
			.form(&form)
			.send()
			.await?;

		let status = response.status();
		let body = response.text().await?;
		parse_token_body(status.is_success(), &body)
	}

	/// Fetch the userinfo resource with the access token as bearer
	/// credential. A non-2xx response is a hard failure for the attempt.
	#[tracing::instrument(skip_all, fields(provider = %self.descriptor.name))]
	pub async fn fetch_userinfo(&self, access_token: &str) -> Result<Value, ExchangeError> {
		let url = self.endpoints.userinfo_url.clone().ok_or_else(|| {
			ExchangeError::Discovery("provider has no userinfo endpoint".to_string())
		})?;

		let response = self
			.http
			.get(url)
			.bearer_auth(access_token)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(ExchangeError::Provider(format!(
				"userinfo request returned {}",
				response.status()
			)));
		}

		response
			.json()
			.await
			.map_err(|e| ExchangeError::Parse(format!("malformed userinfo response: {e}")))
	}

	/// Verify an OIDC id token against the provider JWKS and return its
	/// claims. Issuer and audience are validated alongside the signature.
	#[tracing::instrument(skip_all, fields(provider = %self.descriptor.name))]
	pub async fn verify_id_token(&self, id_token: &str) -> Result<Value, ExchangeError> {
		let jwks = self
			.jwks
			.as_ref()
			.ok_or_else(|| ExchangeError::IdToken("provider has no JWKS endpoint".to_string()))?;

		let header = jsonwebtoken::decode_header(id_token)
			.map_err(|e| ExchangeError::IdToken(format!("malformed id token header: {e}")))?;
		let key = jwks.get_key(header.kid.as_deref()).await?;

		let mut validation = jsonwebtoken::Validation::new(header.alg);
		validation.set_audience(&[&self.descriptor.client_id]);
		if let Some(issuer) = &self.descriptor.issuer {
			validation.set_issuer(&[issuer]);
		}

		let data = jsonwebtoken::decode::<Value>(id_token, &key, &validation)
			.map_err(|e| ExchangeError::IdToken(e.to_string()))?;
		Ok(data.claims)
	}

	/// Retrieve the identity profile for a completed exchange.
	///
	/// OIDC path: verified id-token claims merged with the userinfo
	/// response (userinfo wins on conflict). OAuth2-only path: the
	/// userinfo response alone.
	#[tracing::instrument(skip_all, fields(provider = %self.descriptor.name))]
	pub async fn profile(&self, token: &TokenResponse) -> Result<Value, ExchangeError> {
		match self.descriptor.family {
			ProviderFamily::OAuth2 => self.fetch_userinfo(token.access_token.expose()).await,
			ProviderFamily::Oidc => {
				let mut claims = match (&token.id_token, &self.jwks) {
					(Some(id_token), Some(_)) => self.verify_id_token(id_token.expose()).await?,
					(Some(_), None) => {
						tracing::warn!("id token present but provider has no JWKS endpoint, ignoring it");
						Value::Object(Default::default())
					}
					(None, _) => Value::Object(Default::default()),
				};

				if self.endpoints.userinfo_url.is_some() {
					let userinfo = self.fetch_userinfo(token.access_token.expose()).await?;
					merge_claims(&mut claims, userinfo);
				}

				match claims.as_object() {
					Some(map) if !map.is_empty() => Ok(claims),
					_ => Err(ExchangeError::Provider(
						"provider returned no identity claims".to_string(),
					)),
				}
			}
		}
	}

	/// Download an image (avatar) using the access token as bearer
	/// credential.
	#[tracing::instrument(skip(self, access_token), fields(provider = %self.descriptor.name))]
	pub async fn download_image(
		&self,
		url: &str,
		access_token: &str,
	) -> Result<bytes::Bytes, ExchangeError> {
		let response = self.http.get(url).bearer_auth(access_token).send().await?;

		if !response.status().is_success() {
			return Err(ExchangeError::Provider(format!(
				"image download returned {} (HTTP {})",
				response.status().canonical_reason().unwrap_or("error"),
				response.status().as_u16()
			)));
		}

		Ok(response.bytes().await?)
	}
}

/// Parse a token-endpoint response body, checking the provider error
/// shape before the success shape.
fn parse_token_body(status_ok: bool, body: &str) -> Result<TokenResponse, ExchangeError> {
	if let Ok(error) = serde_json::from_str::<ProviderErrorResponse>(body) {
		if !error.error.is_empty() {
			let message = error.error_description.unwrap_or(error.error);
			return Err(ExchangeError::Provider(message));
		}
	}

	if !status_ok {
		return Err(ExchangeError::Provider(
			"token endpoint returned a non-success status".to_string(),
		));
	}

	serde_json::from_str(body)
		.map_err(|e| ExchangeError::Parse(format!("malformed token response: {e}")))
}

fn merge_claims(claims: &mut Value, userinfo: Value) {
	match (claims.as_object_mut(), userinfo) {
		(Some(target), Value::Object(source)) => {
			for (key, value) in source {
				target.insert(key, value);
			}
		}
		(None, userinfo) => *claims = userinfo,
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parley_common_secret::SecretString;
	use serde_json::json;

	fn descriptor(family: ProviderFamily) -> ProviderDescriptor {
		ProviderDescriptor {
			name: "openid".to_string(),
			family,
			issuer: Some("https://idp.example.com".to_string()),
			auth_url: None,
			token_url: None,
			userinfo_url: None,
			jwks_url: None,
			client_id: "client-123".to_string(),
			client_secret: SecretString::new("secret"),
			redirect_uri: "https://parley.example.com/oauth/callback".to_string(),
			scopes: vec!["openid".to_string(), "email".to_string()],
			use_pkce: false,
			use_state: true,
			username_claim: None,
			name_claim: None,
			assume_email_verified: true,
			session_secret: Some(SecretString::new("session")),
		}
	}

	fn endpoints() -> Endpoints {
		Endpoints::new(
			"https://idp.example.com/authorize",
			"https://idp.example.com/oauth/token",
			Some("https://idp.example.com/userinfo"),
			Some("https://idp.example.com/.well-known/jwks.json"),
		)
		.unwrap()
	}

	mod authorization_url {
		use super::*;

		#[test]
		fn contains_required_params() {
			let client = ExchangeClient::new(descriptor(ProviderFamily::Oidc), endpoints());
			let url = client.authorization_url(Some("state-123"), None);

			assert!(url.starts_with("https://idp.example.com/authorize"));
			assert!(url.contains("response_type=code"));
			assert!(url.contains("client_id=client-123"));
			assert!(url.contains("redirect_uri=https%3A%2F%2Fparley.example.com%2Foauth%2Fcallback"));
			assert!(url.contains("scope=openid+email"));
			assert!(url.contains("state=state-123"));
		}

		#[test]
		fn omits_state_when_disabled() {
			let client = ExchangeClient::new(descriptor(ProviderFamily::Oidc), endpoints());
			let url = client.authorization_url(None, None);

			assert!(!url.contains("state="));
		}

		#[test]
		fn includes_pkce_challenge() {
			let client = ExchangeClient::new(descriptor(ProviderFamily::Oidc), endpoints());
			let pkce = PkceChallenge::generate();
			let url = client.authorization_url(Some("s"), Some(&pkce));

			assert!(url.contains(&format!("code_challenge={}", pkce.challenge)));
			assert!(url.contains("code_challenge_method=S256"));
		}
	}

	mod endpoints_parsing {
		use super::*;

		#[test]
		fn invalid_url_is_rejected() {
			let result = Endpoints::new("not a url", "https://idp.example.com/token", None, None);
			assert!(matches!(result, Err(ExchangeError::Discovery(_))));
		}

		#[test]
		fn optional_endpoints_may_be_absent() {
			let endpoints = Endpoints::new(
				"https://idp.example.com/authorize",
				"https://idp.example.com/token",
				None,
				None,
			)
			.unwrap();
			assert!(endpoints.userinfo_url.is_none());
			assert!(endpoints.jwks_url.is_none());
		}
	}

	mod token_body {
		use super::*;

		#[test]
		fn success_body_parses() {
			let token = parse_token_body(true, r#"{ "access_token": "at_1" }"#).unwrap();
			assert_eq!(token.access_token.expose(), "at_1");
		}

		#[test]
		fn provider_error_shape_wins() {
			let err = parse_token_body(
				true,
				r#"{ "error": "invalid_grant", "error_description": "code expired" }"#,
			)
			.unwrap_err();

			match err {
				ExchangeError::Provider(message) => assert_eq!(message, "code expired"),
				other => panic!("expected provider error, got {other:?}"),
			}
		}

		#[test]
		fn error_without_description_uses_code() {
			let err = parse_token_body(true, r#"{ "error": "access_denied" }"#).unwrap_err();
			match err {
				ExchangeError::Provider(message) => assert_eq!(message, "access_denied"),
				other => panic!("expected provider error, got {other:?}"),
			}
		}

		#[test]
		fn non_success_status_with_opaque_body_is_provider_error() {
			let err = parse_token_body(false, "<html>gateway timeout</html>").unwrap_err();
			assert!(matches!(err, ExchangeError::Provider(_)));
		}

		#[test]
		fn malformed_success_body_is_parse_error() {
			let err = parse_token_body(true, r#"{ "token": "wrong shape" }"#).unwrap_err();
			assert!(matches!(err, ExchangeError::Parse(_)));
		}
	}

	mod claims_merge {
		use super::*;

		#[test]
		fn userinfo_wins_on_conflict() {
			let mut claims = json!({ "sub": "abc", "email": "old@x.com" });
			merge_claims(&mut claims, json!({ "email": "new@x.com", "picture": "p.png" }));

			assert_eq!(claims["sub"], "abc");
			assert_eq!(claims["email"], "new@x.com");
			assert_eq!(claims["picture"], "p.png");
		}

		#[test]
		fn empty_claims_take_userinfo_wholesale() {
			let mut claims = Value::Object(Default::default());
			merge_claims(&mut claims, json!({ "email": "a@x.com" }));
			assert_eq!(claims["email"], "a@x.com");
		}
	}
}
