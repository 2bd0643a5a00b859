// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The claim normalizer.
//!
//! Maps a raw provider userinfo payload onto a [`CanonicalIdentity`].
//! Resolution per field is an explicit ordered list of named rules; a
//! configured claim-name override is consulted before the built-in
//! rules, and the first rule producing a non-empty value wins.
//!
//! Missing optional claims never fail normalization. Only an email that
//! cannot be resolved at all is an error - without it there is no key
//! to reconcile the identity against a local account.

use serde_json::Value;

use crate::error::NormalizeError;
use crate::identity::CanonicalIdentity;
use crate::provider::{ProviderDescriptor, ProviderFamily};

/// One named claim-resolution rule: a pure function from the raw claims
/// to an optional string.
struct ResolutionRule {
	name: &'static str,
	resolve: fn(&Value) -> Option<String>,
}

fn claim_username(claims: &Value) -> Option<String> {
	resolve_claim(claims, "username")
}

fn claim_given_name(claims: &Value) -> Option<String> {
	resolve_claim(claims, "given_name")
}

fn claim_family_name(claims: &Value) -> Option<String> {
	resolve_claim(claims, "family_name")
}

fn claim_email(claims: &Value) -> Option<String> {
	resolve_claim(claims, "email")
}

fn claim_given_and_family(claims: &Value) -> Option<String> {
	let given = resolve_claim(claims, "given_name")?;
	let family = resolve_claim(claims, "family_name")?;
	Some(format!("{given} {family}"))
}

/// Username resolution order for OIDC providers.
const OIDC_USERNAME_RULES: &[ResolutionRule] = &[
	ResolutionRule { name: "username", resolve: claim_username },
	ResolutionRule { name: "given_name", resolve: claim_given_name },
	ResolutionRule { name: "email", resolve: claim_email },
];

/// Username resolution order for OAuth2-only providers, which commonly
/// carry no OIDC profile claims.
const OAUTH2_USERNAME_RULES: &[ResolutionRule] = &[
	ResolutionRule { name: "username", resolve: claim_username },
	ResolutionRule { name: "email", resolve: claim_email },
];

/// Display-name resolution order, shared by both families.
const DISPLAY_NAME_RULES: &[ResolutionRule] = &[
	ResolutionRule {
		name: "given_name+family_name",
		resolve: claim_given_and_family,
	},
	ResolutionRule { name: "given_name", resolve: claim_given_name },
	ResolutionRule { name: "family_name", resolve: claim_family_name },
];

/// Subject-id resolution order: `sub` per OIDC, falling back to the
/// bare `id` field OAuth2-only providers commonly use.
const SUBJECT_RULES: &[ResolutionRule] = &[
	ResolutionRule { name: "sub", resolve: |c| resolve_claim(c, "sub") },
	ResolutionRule { name: "id", resolve: |c| resolve_claim(c, "id") },
];

/// Convert a single claim value into a string suitable for identity
/// fields.
///
/// Strings resolve as-is, lists of strings join with `_`, numbers
/// stringify (OAuth2 `id` fields are commonly numeric). Empty results
/// count as unresolved so the next rule gets a chance.
pub fn claim_as_string(value: &Value) -> Option<String> {
	let resolved = match value {
		Value::String(s) => s.clone(),
		Value::Array(items) => items
			.iter()
			.filter_map(Value::as_str)
			.collect::<Vec<_>>()
			.join("_"),
		Value::Number(n) => n.to_string(),
		_ => return None,
	};
	if resolved.is_empty() {
		None
	} else {
		Some(resolved)
	}
}

fn resolve_claim(claims: &Value, name: &str) -> Option<String> {
	claims.get(name).and_then(claim_as_string)
}

fn resolve_first(claims: &Value, override_claim: Option<&str>, rules: &[ResolutionRule]) -> Option<String> {
	if let Some(name) = override_claim {
		if let Some(value) = resolve_claim(claims, name) {
			return Some(value);
		}
	}
	for rule in rules {
		if let Some(value) = (rule.resolve)(claims) {
			tracing::trace!(rule = rule.name, "claim resolved");
			return Some(value);
		}
	}
	None
}

/// Normalize a raw userinfo payload into a [`CanonicalIdentity`].
///
/// # Errors
///
/// [`NormalizeError::NotAnObject`] when the payload is not a JSON
/// object, [`NormalizeError::MissingEmail`] when no email claim
/// resolves.
pub fn normalize(
	descriptor: &ProviderDescriptor,
	raw: &Value,
) -> Result<CanonicalIdentity, NormalizeError> {
	if !raw.is_object() {
		return Err(NormalizeError::NotAnObject);
	}

	let email = resolve_claim(raw, "email").ok_or(NormalizeError::MissingEmail)?;

	let username_rules = match descriptor.family {
		ProviderFamily::Oidc => OIDC_USERNAME_RULES,
		ProviderFamily::OAuth2 => OAUTH2_USERNAME_RULES,
	};
	let username =
		resolve_first(raw, descriptor.username_claim.as_deref(), username_rules).unwrap_or_default();

	let display_name = resolve_first(raw, descriptor.name_claim.as_deref(), DISPLAY_NAME_RULES)
		.unwrap_or_else(|| username.clone());

	let subject_id = resolve_first(raw, None, SUBJECT_RULES).unwrap_or_default();

	let email_verified = raw
		.get("email_verified")
		.and_then(Value::as_bool)
		.unwrap_or(descriptor.assume_email_verified);

	Ok(CanonicalIdentity {
		subject_id,
		email,
		email_verified,
		username,
		display_name,
		picture_url: resolve_claim(raw, "picture"),
		provider: descriptor.name.clone(),
	})
}
