// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use parley_auth_core::NormalizeError;
use parley_auth_oidc::ExchangeError;
use parley_server_db::DbError;
use parley_server_session::SessionError;

/// Failures that abort a login attempt.
///
/// Provisioning degradation is deliberately not here; it is reported
/// via [`crate::ProvisioningReport`] on a successful outcome.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
	#[error("Unknown provider: {0}")]
	UnknownProvider(String),

	/// The callback state does not match any pending attempt. Treated
	/// as a potential CSRF/forgery, never as a credential failure.
	#[error("State mismatch")]
	StateMismatch,

	#[error("Provider exchange failed: {0}")]
	ProviderExchange(#[from] ExchangeError),

	#[error("Identity unresolvable: {0}")]
	IdentityUnresolvable(#[from] NormalizeError),

	#[error("Reconciliation failed: {0}")]
	Reconciliation(#[from] DbError),

	#[error("Session error: {0}")]
	Session(#[from] SessionError),
}

pub type Result<T> = std::result::Result<T, LoginError>;
