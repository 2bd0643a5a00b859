// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

/// Normalized output of a successful provider exchange.
///
/// Produced fresh per login attempt and never persisted directly; it is
/// the input to user reconciliation. All provider-specific claim naming
/// has been resolved away by the time one of these exists.
///
/// # PII Handling
///
/// Every field except `provider` is user PII from the external provider
/// and must not be logged wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalIdentity {
	/// The user's identifier at the provider (`sub` claim, or `id` for
	/// OAuth2-only providers). Opaque and provider-scoped.
	pub subject_id: String,

	/// Email address asserted by the provider. Always non-empty; an
	/// identity without an email cannot be reconciled.
	pub email: String,

	/// Whether the provider asserts the email as verified.
	pub email_verified: bool,

	/// Resolved username. May be empty when no source claim resolved.
	pub username: String,

	/// Resolved display name. Falls back to the username.
	pub display_name: String,

	/// URL of the user's avatar image at the provider, if any.
	pub picture_url: Option<String>,

	/// Name of the provider that produced this identity.
	pub provider: String,
}
