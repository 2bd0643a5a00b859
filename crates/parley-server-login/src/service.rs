// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Login orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use parley_auth_core::{normalize, ProviderRegistry};
use parley_auth_oidc::{generate_state, ExchangeClient, ExchangeError, PkceChallenge};
use parley_server_db::{
	BalanceStore, LoginState, LoginStateStore, UserId, UserStore,
};
use parley_server_session::{SessionStore, SessionToken};
use parley_server_storage::AvatarStorage;

use crate::config::LoginConfig;
use crate::error::{LoginError, Result};
use crate::provision::{Provisioner, ProvisioningReport};
use crate::reconcile::UserReconciler;

/// The authenticated user a completed login resolves to.
#[derive(Debug, Clone)]
pub struct Principal {
	pub user_id: UserId,
	pub email: String,
	pub username: Option<String>,
	pub display_name: Option<String>,
	/// Provider that performed this authentication.
	pub provider: String,
}

/// Output of [`LoginService::begin_login`].
///
/// The caller redirects the user to `redirect_url` and keeps `state`
/// (typically in a cookie) to echo back on callback. When the provider
/// descriptor has `use_state` disabled the state still correlates the
/// callback, it just does not ride on the authorization URL.
#[derive(Debug, Clone)]
pub struct BeginLogin {
	pub redirect_url: String,
	pub state: String,
}

/// Output of [`LoginService::complete_login`].
#[derive(Debug)]
pub struct LoginOutcome {
	pub principal: Principal,
	pub session_token: SessionToken,
	/// Whether this login created the user.
	pub created: bool,
	pub provisioning: ProvisioningReport,
}

/// Orchestrates the full login pipeline for all enabled providers.
pub struct LoginService {
	clients: HashMap<String, Arc<ExchangeClient>>,
	reconciler: UserReconciler,
	provisioner: Provisioner,
	login_states: Arc<dyn LoginStateStore>,
	sessions: Arc<dyn SessionStore>,
	config: LoginConfig,
}

impl LoginService {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		clients: Vec<Arc<ExchangeClient>>,
		users: Arc<dyn UserStore>,
		balances: Arc<dyn BalanceStore>,
		login_states: Arc<dyn LoginStateStore>,
		sessions: Arc<dyn SessionStore>,
		storage: Arc<dyn AvatarStorage>,
		config: LoginConfig,
	) -> Self {
		let clients = clients
			.into_iter()
			.map(|client| (client.descriptor().name.clone(), client))
			.collect();

		Self {
			clients,
			reconciler: UserReconciler::new(users.clone()),
			provisioner: Provisioner::new(balances, storage, users, config.initial_token_credits),
			login_states,
			sessions,
			config,
		}
	}

	/// Build a service from an environment-derived registry, resolving
	/// provider endpoints (via discovery where needed).
	#[allow(clippy::too_many_arguments)]
	pub async fn from_registry(
		registry: &ProviderRegistry,
		users: Arc<dyn UserStore>,
		balances: Arc<dyn BalanceStore>,
		login_states: Arc<dyn LoginStateStore>,
		sessions: Arc<dyn SessionStore>,
		storage: Arc<dyn AvatarStorage>,
		config: LoginConfig,
	) -> std::result::Result<Self, ExchangeError> {
		let mut clients = Vec::new();
		for descriptor in registry.providers() {
			clients.push(Arc::new(ExchangeClient::resolve(descriptor.clone()).await?));
		}
		Ok(Self::new(
			clients,
			users,
			balances,
			login_states,
			sessions,
			storage,
			config,
		))
	}

	/// Names of the providers this service can log in against.
	pub fn provider_names(&self) -> Vec<&str> {
		self.clients.keys().map(String::as_str).collect()
	}

	/// Start a login attempt against a provider.
	///
	/// Persists the pending attempt (state + PKCE verifier) before
	/// handing out the redirect, so the callback can be validated.
	#[instrument(skip(self))]
	pub async fn begin_login(&self, provider: &str) -> Result<BeginLogin> {
		let client = self
			.clients
			.get(provider)
			.ok_or_else(|| LoginError::UnknownProvider(provider.to_string()))?;
		let descriptor = client.descriptor();

		let state = generate_state();
		let pkce = descriptor.use_pkce.then(PkceChallenge::generate);

		let now = Utc::now();
		let expires_at = now
			+ chrono::Duration::from_std(self.config.state_ttl)
				.unwrap_or_else(|_| chrono::Duration::minutes(10));

		self.login_states
			.put(&LoginState {
				state: state.clone(),
				provider: provider.to_string(),
				pkce_verifier: pkce.as_ref().map(|p| p.verifier.clone()),
				created_at: now,
				expires_at,
			})
			.await?;

		let redirect_url = client.authorization_url(
			descriptor.use_state.then_some(state.as_str()),
			pkce.as_ref(),
		);

		tracing::debug!(provider, "login attempt started");
		Ok(BeginLogin {
			redirect_url,
			state,
		})
	}

	/// Complete a login from the provider callback.
	///
	/// The state is consumed before anything else happens; a state that
	/// matches no pending attempt aborts with [`LoginError::StateMismatch`]
	/// without touching user, balance, or session storage.
	#[instrument(skip_all)]
	pub async fn complete_login(&self, state: &str, code: &str) -> Result<LoginOutcome> {
		let attempt = self
			.login_states
			.take(state)
			.await?
			.ok_or(LoginError::StateMismatch)?;

		let client = self
			.clients
			.get(&attempt.provider)
			.ok_or_else(|| LoginError::UnknownProvider(attempt.provider.clone()))?;
		let descriptor = client.descriptor();

		let token = client
			.exchange_code(code, attempt.pkce_verifier.as_deref())
			.await?;
		let raw = client.profile(&token).await?;

		let identity = normalize(descriptor, &raw)?;

		let (user, created) = self.reconciler.reconcile(descriptor, &identity, &raw).await?;

		let provisioning = self
			.provisioner
			.run(
				client.as_ref(),
				&user,
				created,
				&identity,
				token.access_token.expose(),
			)
			.await;

		let session_token = self.sessions.create(&user.id).await?;

		tracing::info!(
			user_id = %user.id,
			provider = %attempt.provider,
			created,
			degraded = provisioning.degraded(),
			"login completed"
		);

		Ok(LoginOutcome {
			principal: Principal {
				user_id: user.id,
				email: user.email,
				username: user.username,
				display_name: user.display_name,
				provider: user.provider,
			},
			session_token,
			created,
			provisioning,
		})
	}
}
