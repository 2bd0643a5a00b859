// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider descriptors and the startup registry.
//!
//! Each external identity provider is described by an immutable
//! [`ProviderDescriptor`] built once at startup. A provider is enabled
//! atomically: either its full required variable set is present in the
//! environment, or it is skipped entirely (with an info log, never an
//! error). Partial configuration with present-but-empty values is
//! rejected as a [`ConfigError`].

use parley_common_secret::SecretString;

use crate::error::ConfigError;

/// Which protocol family a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
	/// Full OpenID Connect: verifiable id token, optional discovery.
	Oidc,
	/// Plain OAuth2: no id token; identity comes from a userinfo resource.
	OAuth2,
}

impl std::fmt::Display for ProviderFamily {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ProviderFamily::Oidc => write!(f, "oidc"),
			ProviderFamily::OAuth2 => write!(f, "oauth2"),
		}
	}
}

/// Immutable configuration for one external identity provider.
///
/// One instance per configured provider, built at startup and shared
/// read-only across all concurrent login attempts.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
	/// Registry name this provider is looked up under (e.g. "openid").
	pub name: String,

	/// Protocol family.
	pub family: ProviderFamily,

	/// Issuer URL. Required for OIDC; used for endpoint discovery when
	/// explicit endpoint URLs are not configured.
	pub issuer: Option<String>,

	/// Authorization endpoint. Required for OAuth2-only providers.
	pub auth_url: Option<String>,

	/// Token endpoint. Required for OAuth2-only providers.
	pub token_url: Option<String>,

	/// Userinfo endpoint. Required for OAuth2-only providers.
	pub userinfo_url: Option<String>,

	/// JWKS endpoint for id-token verification. Discovered from the
	/// issuer when absent.
	pub jwks_url: Option<String>,

	/// OAuth client ID.
	pub client_id: String,

	/// OAuth client secret (wrapped to prevent logging).
	pub client_secret: SecretString,

	/// Callback URL registered with the provider.
	pub redirect_uri: String,

	/// Scopes requested at authorization time.
	pub scopes: Vec<String>,

	/// Whether to use PKCE (S256) for the code exchange.
	pub use_pkce: bool,

	/// Whether to require a state parameter on callback.
	pub use_state: bool,

	/// Claim name override for the username, if configured.
	pub username_claim: Option<String>,

	/// Claim name override for the display name, if configured.
	pub name_claim: Option<String>,

	/// Value assumed for `email_verified` when the provider does not
	/// assert the claim. Defaults true for OIDC (token validity was
	/// already checked), false for OAuth2-only.
	pub assume_email_verified: bool,

	/// Session signing secret. Required for the OIDC family.
	pub session_secret: Option<SecretString>,
}

impl ProviderDescriptor {
	/// Join scopes into a space-separated string for the authorization URL.
	pub fn scopes_string(&self) -> String {
		self.scopes.join(" ")
	}

	/// Parse a scope string into a vector of individual scopes.
	pub fn parse_scopes(scope_str: &str) -> Vec<String> {
		scope_str
			.split([' ', ','])
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	}

	/// Validate that all configured fields are non-empty and the family's
	/// endpoint requirements hold.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::InvalidConfig`] if any field is unusable.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"client_id cannot be empty".to_string(),
			));
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"client_secret cannot be empty".to_string(),
			));
		}
		if self.redirect_uri.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"redirect_uri cannot be empty".to_string(),
			));
		}
		match self.family {
			ProviderFamily::Oidc => {
				if self.issuer.as_deref().map_or(true, str::is_empty) {
					return Err(ConfigError::InvalidConfig(
						"OIDC provider requires an issuer".to_string(),
					));
				}
				if self.scopes.is_empty() {
					return Err(ConfigError::InvalidConfig(
						"OIDC provider requires a scope".to_string(),
					));
				}
				if self
					.session_secret
					.as_ref()
					.map_or(true, SecretString::is_empty)
				{
					return Err(ConfigError::InvalidConfig(
						"OIDC provider requires a session secret".to_string(),
					));
				}
			}
			ProviderFamily::OAuth2 => {
				for (field, value) in [
					("auth_url", &self.auth_url),
					("token_url", &self.token_url),
					("userinfo_url", &self.userinfo_url),
				] {
					if value.as_deref().map_or(true, str::is_empty) {
						return Err(ConfigError::InvalidConfig(format!(
							"OAuth2 provider requires {field}"
						)));
					}
				}
			}
		}
		Ok(())
	}
}

/// The fixed set of providers enabled for this process.
///
/// Built once at startup; runtime dispatch is a lookup by provider
/// name over an immutable list, never dynamic registration.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
	providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
	/// Build the registry from process environment variables.
	///
	/// # Recognized variables
	///
	/// OIDC family (`PARLEY_OIDC_*`), enabled when `ISSUER`, `CLIENT_ID`,
	/// `CLIENT_SECRET`, `CALLBACK_URL`, `SCOPE` and `SESSION_SECRET` are
	/// all set: `AUTH_URL`, `TOKEN_URL`, `USERINFO_URL`, `JWKS_URL`,
	/// `USERNAME_CLAIM`, `NAME_CLAIM`, `USE_PKCE`, `USE_STATE`,
	/// `ASSUME_EMAIL_VERIFIED` are optional.
	///
	/// OAuth2-only family (`PARLEY_OAUTH2_*`), enabled when `AUTH_URL`,
	/// `TOKEN_URL`, `USERINFO_URL`, `CLIENT_ID`, `CLIENT_SECRET` and
	/// `CALLBACK_URL` are all set; `SCOPE` and the same optionals apply.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::InvalidConfig`] when a provider's full
	/// variable set is present but a value is empty or malformed. A
	/// missing variable disables the provider instead.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Build the registry from an arbitrary variable lookup.
	///
	/// `from_env` delegates here; tests inject a map instead of mutating
	/// process environment.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut providers = Vec::new();

		if let Some(oidc) = Self::load_oidc(&lookup)? {
			providers.push(oidc);
		} else {
			tracing::info!("OIDC provider configuration not complete, skipping");
		}

		if let Some(oauth2) = Self::load_oauth2(&lookup)? {
			providers.push(oauth2);
		} else {
			tracing::info!("OAuth2 provider configuration not complete, skipping");
		}

		Ok(Self { providers })
	}

	fn load_oidc<F>(lookup: &F) -> Result<Option<ProviderDescriptor>, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let required = (
			lookup("PARLEY_OIDC_ISSUER"),
			lookup("PARLEY_OIDC_CLIENT_ID"),
			lookup("PARLEY_OIDC_CLIENT_SECRET"),
			lookup("PARLEY_OIDC_CALLBACK_URL"),
			lookup("PARLEY_OIDC_SCOPE"),
			lookup("PARLEY_OIDC_SESSION_SECRET"),
		);

		let (
			Some(issuer),
			Some(client_id),
			Some(client_secret),
			Some(redirect_uri),
			Some(scope),
			Some(session_secret),
		) = required
		else {
			return Ok(None);
		};

		let descriptor = ProviderDescriptor {
			name: "openid".to_string(),
			family: ProviderFamily::Oidc,
			issuer: Some(issuer),
			auth_url: lookup("PARLEY_OIDC_AUTH_URL"),
			token_url: lookup("PARLEY_OIDC_TOKEN_URL"),
			userinfo_url: lookup("PARLEY_OIDC_USERINFO_URL"),
			jwks_url: lookup("PARLEY_OIDC_JWKS_URL"),
			client_id,
			client_secret: SecretString::new(client_secret),
			redirect_uri,
			scopes: ProviderDescriptor::parse_scopes(&scope),
			use_pkce: flag(lookup("PARLEY_OIDC_USE_PKCE"), false),
			use_state: flag(lookup("PARLEY_OIDC_USE_STATE"), true),
			username_claim: non_empty(lookup("PARLEY_OIDC_USERNAME_CLAIM")),
			name_claim: non_empty(lookup("PARLEY_OIDC_NAME_CLAIM")),
			assume_email_verified: flag(lookup("PARLEY_OIDC_ASSUME_EMAIL_VERIFIED"), true),
			session_secret: Some(SecretString::new(session_secret)),
		};
		descriptor.validate()?;

		tracing::info!(provider = %descriptor.name, family = %descriptor.family, "identity provider enabled");
		Ok(Some(descriptor))
	}

	fn load_oauth2<F>(lookup: &F) -> Result<Option<ProviderDescriptor>, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let required = (
			lookup("PARLEY_OAUTH2_AUTH_URL"),
			lookup("PARLEY_OAUTH2_TOKEN_URL"),
			lookup("PARLEY_OAUTH2_USERINFO_URL"),
			lookup("PARLEY_OAUTH2_CLIENT_ID"),
			lookup("PARLEY_OAUTH2_CLIENT_SECRET"),
			lookup("PARLEY_OAUTH2_CALLBACK_URL"),
		);

		let (
			Some(auth_url),
			Some(token_url),
			Some(userinfo_url),
			Some(client_id),
			Some(client_secret),
			Some(redirect_uri),
		) = required
		else {
			return Ok(None);
		};

		let descriptor = ProviderDescriptor {
			name: "oauth2".to_string(),
			family: ProviderFamily::OAuth2,
			issuer: None,
			auth_url: Some(auth_url),
			token_url: Some(token_url),
			userinfo_url: Some(userinfo_url),
			jwks_url: None,
			client_id,
			client_secret: SecretString::new(client_secret),
			redirect_uri,
			scopes: lookup("PARLEY_OAUTH2_SCOPE")
				.map(|s| ProviderDescriptor::parse_scopes(&s))
				.unwrap_or_default(),
			use_pkce: flag(lookup("PARLEY_OAUTH2_USE_PKCE"), false),
			use_state: flag(lookup("PARLEY_OAUTH2_USE_STATE"), true),
			username_claim: non_empty(lookup("PARLEY_OAUTH2_USERNAME_CLAIM")),
			name_claim: non_empty(lookup("PARLEY_OAUTH2_NAME_CLAIM")),
			assume_email_verified: flag(lookup("PARLEY_OAUTH2_ASSUME_EMAIL_VERIFIED"), false),
			session_secret: None,
		};
		descriptor.validate()?;

		tracing::info!(provider = %descriptor.name, family = %descriptor.family, "identity provider enabled");
		Ok(Some(descriptor))
	}

	/// Look up an enabled provider by name.
	pub fn get(&self, name: &str) -> Option<&ProviderDescriptor> {
		self.providers.iter().find(|p| p.name == name)
	}

	/// All enabled providers.
	pub fn providers(&self) -> &[ProviderDescriptor] {
		&self.providers
	}

	/// Returns true when no provider is enabled.
	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}
}

fn flag(value: Option<String>, default: bool) -> bool {
	match value.as_deref() {
		Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
		None => default,
	}
}

fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn oidc_vars() -> HashMap<&'static str, &'static str> {
		HashMap::from([
			("PARLEY_OIDC_ISSUER", "https://idp.example.com"),
			("PARLEY_OIDC_CLIENT_ID", "client-123"),
			("PARLEY_OIDC_CLIENT_SECRET", "shhh"),
			("PARLEY_OIDC_CALLBACK_URL", "https://parley.example.com/oauth/callback"),
			("PARLEY_OIDC_SCOPE", "openid profile email"),
			("PARLEY_OIDC_SESSION_SECRET", "session-secret"),
		])
	}

	fn oauth2_vars() -> HashMap<&'static str, &'static str> {
		HashMap::from([
			("PARLEY_OAUTH2_AUTH_URL", "https://idp.example.com/authorize"),
			("PARLEY_OAUTH2_TOKEN_URL", "https://idp.example.com/token"),
			("PARLEY_OAUTH2_USERINFO_URL", "https://idp.example.com/userinfo"),
			("PARLEY_OAUTH2_CLIENT_ID", "client-456"),
			("PARLEY_OAUTH2_CLIENT_SECRET", "shhh2"),
			("PARLEY_OAUTH2_CALLBACK_URL", "https://parley.example.com/oauth/callback"),
		])
	}

	fn registry_from(vars: &HashMap<&str, &str>) -> Result<ProviderRegistry, ConfigError> {
		ProviderRegistry::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
	}

	mod enablement {
		use super::*;

		#[test]
		fn full_oidc_set_enables_provider() {
			let registry = registry_from(&oidc_vars()).unwrap();
			let provider = registry.get("openid").unwrap();

			assert_eq!(provider.family, ProviderFamily::Oidc);
			assert_eq!(provider.issuer.as_deref(), Some("https://idp.example.com"));
			assert_eq!(provider.scopes, vec!["openid", "profile", "email"]);
			assert!(provider.use_state);
			assert!(!provider.use_pkce);
			assert!(provider.assume_email_verified);
		}

		#[test]
		fn missing_required_var_skips_provider_silently() {
			let mut vars = oidc_vars();
			vars.remove("PARLEY_OIDC_SESSION_SECRET");

			let registry = registry_from(&vars).unwrap();
			assert!(registry.get("openid").is_none());
			assert!(registry.is_empty());
		}

		#[test]
		fn empty_required_var_is_an_error() {
			let mut vars = oidc_vars();
			vars.insert("PARLEY_OIDC_CLIENT_SECRET", "");

			assert!(registry_from(&vars).is_err());
		}

		#[test]
		fn oauth2_family_enables_independently() {
			let registry = registry_from(&oauth2_vars()).unwrap();
			let provider = registry.get("oauth2").unwrap();

			assert_eq!(provider.family, ProviderFamily::OAuth2);
			assert!(provider.session_secret.is_none());
			assert!(!provider.assume_email_verified);
		}

		#[test]
		fn both_families_can_be_enabled() {
			let mut vars = oidc_vars();
			vars.extend(oauth2_vars());

			let registry = registry_from(&vars).unwrap();
			assert!(registry.get("openid").is_some());
			assert!(registry.get("oauth2").is_some());
		}

		#[test]
		fn unknown_provider_lookup_returns_none() {
			let registry = registry_from(&oidc_vars()).unwrap();
			assert!(registry.get("github").is_none());
		}
	}

	mod optionals {
		use super::*;

		#[test]
		fn claim_overrides_are_picked_up() {
			let mut vars = oidc_vars();
			vars.insert("PARLEY_OIDC_USERNAME_CLAIM", "preferred_username");
			vars.insert("PARLEY_OIDC_NAME_CLAIM", "name");

			let registry = registry_from(&vars).unwrap();
			let provider = registry.get("openid").unwrap();

			assert_eq!(provider.username_claim.as_deref(), Some("preferred_username"));
			assert_eq!(provider.name_claim.as_deref(), Some("name"));
		}

		#[test]
		fn blank_claim_override_is_treated_as_absent() {
			let mut vars = oidc_vars();
			vars.insert("PARLEY_OIDC_USERNAME_CLAIM", "  ");

			let registry = registry_from(&vars).unwrap();
			assert!(registry.get("openid").unwrap().username_claim.is_none());
		}

		#[test]
		fn pkce_and_state_flags_parse() {
			let mut vars = oauth2_vars();
			vars.insert("PARLEY_OAUTH2_USE_PKCE", "true");
			vars.insert("PARLEY_OAUTH2_USE_STATE", "false");

			let registry = registry_from(&vars).unwrap();
			let provider = registry.get("oauth2").unwrap();
			assert!(provider.use_pkce);
			assert!(!provider.use_state);
		}

		#[test]
		fn email_verified_policy_is_overridable() {
			let mut vars = oauth2_vars();
			vars.insert("PARLEY_OAUTH2_ASSUME_EMAIL_VERIFIED", "1");

			let registry = registry_from(&vars).unwrap();
			assert!(registry.get("oauth2").unwrap().assume_email_verified);
		}
	}

	mod scopes {
		use super::*;

		#[test]
		fn scopes_string_joins_with_space() {
			let registry = registry_from(&oidc_vars()).unwrap();
			let provider = registry.get("openid").unwrap();
			assert_eq!(provider.scopes_string(), "openid profile email");
		}

		#[test]
		fn parse_scopes_handles_various_formats() {
			assert_eq!(
				ProviderDescriptor::parse_scopes("openid profile"),
				vec!["openid", "profile"]
			);
			assert_eq!(
				ProviderDescriptor::parse_scopes("openid,profile"),
				vec!["openid", "profile"]
			);
			assert_eq!(
				ProviderDescriptor::parse_scopes("  openid  ,  profile  "),
				vec!["openid", "profile"]
			);
			assert!(ProviderDescriptor::parse_scopes("").is_empty());
		}
	}

	mod proptests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			/// Scope joining and parsing should roundtrip.
			#[test]
			fn scope_join_and_parse_roundtrips(
				scopes in proptest::collection::vec("[a-z]{1,12}", 1..5)
			) {
				let joined = scopes.join(" ");
				let parsed = ProviderDescriptor::parse_scopes(&joined);
				prop_assert_eq!(parsed, scopes);
			}

			/// A complete OAuth2 variable set with non-empty values always
			/// yields an enabled provider.
			#[test]
			fn complete_oauth2_set_always_enables(
				client_id in "[a-zA-Z0-9]{1,32}",
				client_secret in "[a-zA-Z0-9]{1,32}",
			) {
				let mut vars = oauth2_vars();
				let id = client_id.clone();
				let secret = client_secret.clone();
				vars.remove("PARLEY_OAUTH2_CLIENT_ID");
				vars.remove("PARLEY_OAUTH2_CLIENT_SECRET");

				let registry = ProviderRegistry::from_lookup(|key| match key {
					"PARLEY_OAUTH2_CLIENT_ID" => Some(id.clone()),
					"PARLEY_OAUTH2_CLIENT_SECRET" => Some(secret.clone()),
					_ => vars.get(key).map(|v| v.to_string()),
				})
				.unwrap();

				prop_assert!(registry.get("oauth2").is_some());
			}
		}
	}
}
