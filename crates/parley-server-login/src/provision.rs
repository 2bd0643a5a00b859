// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning side-effects.
//!
//! Steps that run after reconciliation succeeds. Each step is isolated:
//! a failure is logged at WARN and recorded in the report, and the
//! login proceeds. Nothing here may abort an authentication.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::instrument;

use parley_auth_core::CanonicalIdentity;
use parley_auth_oidc::{ExchangeClient, ExchangeError};
use parley_server_db::{BalanceStore, UserRecord, UserStore};
use parley_server_storage::AvatarStorage;

/// Marker a user sets by uploading their own avatar; provider imports
/// must not clobber it.
const MANUAL_AVATAR_MARKER: &str = "manual=true";

/// Downloads avatar bytes from a provider.
#[async_trait]
pub trait AvatarFetcher: Send + Sync {
	async fn fetch(&self, url: &str, access_token: &str) -> Result<Bytes, ExchangeError>;
}

#[async_trait]
impl AvatarFetcher for ExchangeClient {
	async fn fetch(&self, url: &str, access_token: &str) -> Result<Bytes, ExchangeError> {
		self.download_image(url, access_token).await
	}
}

/// Outcome of one provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
	/// The step ran to completion.
	Ran,
	/// The step did not apply to this login.
	Skipped,
	/// The step failed; the login proceeded without it.
	Degraded,
}

/// What provisioning did for one login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisioningReport {
	pub balance_grant: StepStatus,
	pub avatar_import: StepStatus,
}

impl ProvisioningReport {
	pub fn degraded(&self) -> bool {
		self.balance_grant == StepStatus::Degraded || self.avatar_import == StepStatus::Degraded
	}
}

/// Runs the provisioning steps for a reconciled login.
pub struct Provisioner {
	balances: Arc<dyn BalanceStore>,
	storage: Arc<dyn AvatarStorage>,
	users: Arc<dyn UserStore>,
	initial_token_credits: i64,
}

impl Provisioner {
	pub fn new(
		balances: Arc<dyn BalanceStore>,
		storage: Arc<dyn AvatarStorage>,
		users: Arc<dyn UserStore>,
		initial_token_credits: i64,
	) -> Self {
		Self {
			balances,
			storage,
			users,
			initial_token_credits,
		}
	}

	#[instrument(skip_all, fields(user_id = %user.id, created))]
	pub async fn run(
		&self,
		fetcher: &dyn AvatarFetcher,
		user: &UserRecord,
		created: bool,
		identity: &CanonicalIdentity,
		access_token: &str,
	) -> ProvisioningReport {
		ProvisioningReport {
			balance_grant: self.grant_balance(user, created).await,
			avatar_import: self.import_avatar(fetcher, user, identity, access_token).await,
		}
	}

	// Every created user gets a balance record, a zero-credit one when
	// no initial amount is configured.
	async fn grant_balance(&self, user: &UserRecord, created: bool) -> StepStatus {
		if !created {
			return StepStatus::Skipped;
		}

		match self
			.balances
			.grant_initial(&user.id, self.initial_token_credits)
			.await
		{
			Ok(_) => StepStatus::Ran,
			Err(err) => {
				tracing::warn!(step = "balance_grant", user_id = %user.id, error = %err, "provisioning step failed");
				StepStatus::Degraded
			}
		}
	}

	async fn import_avatar(
		&self,
		fetcher: &dyn AvatarFetcher,
		user: &UserRecord,
		identity: &CanonicalIdentity,
		access_token: &str,
	) -> StepStatus {
		if user
			.avatar_url
			.as_deref()
			.is_some_and(|url| url.contains(MANUAL_AVATAR_MARKER))
		{
			return StepStatus::Skipped;
		}
		let Some(picture_url) = identity.picture_url.as_deref() else {
			return StepStatus::Skipped;
		};

		let bytes = match fetcher.fetch(picture_url, access_token).await {
			Ok(bytes) => bytes,
			Err(err) => {
				tracing::warn!(step = "avatar_import", user_id = %user.id, error = %err, "avatar download failed");
				return StepStatus::Degraded;
			}
		};

		let file_name = format!("{}.png", identity.subject_id);
		let path = match self.storage.save(&file_name, &user.id, bytes).await {
			Ok(path) => path,
			Err(err) => {
				tracing::warn!(step = "avatar_import", user_id = %user.id, error = %err, "avatar store failed");
				return StepStatus::Degraded;
			}
		};

		match self.users.set_avatar_url(&user.id, &path).await {
			Ok(()) => StepStatus::Ran,
			Err(err) => {
				tracing::warn!(step = "avatar_import", user_id = %user.id, error = %err, "avatar path write-back failed");
				StepStatus::Degraded
			}
		}
	}
}
