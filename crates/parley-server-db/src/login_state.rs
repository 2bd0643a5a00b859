// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pending login attempt store.
//!
//! One row per outstanding authorization redirect, keyed by the state
//! value. A row is consumed exactly once on callback via [`take`];
//! abandoned attempts are swept by [`cleanup_expired`].
//!
//! [`take`]: LoginStateStore::take
//! [`cleanup_expired`]: LoginStateStore::cleanup_expired

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::Result;
use crate::types::parse_timestamp;

/// A pending login attempt awaiting its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginState {
	/// The state value sent to the provider.
	pub state: String,
	/// The provider this attempt was started against.
	pub provider: String,
	/// The PKCE code verifier, when PKCE is in use.
	pub pkce_verifier: Option<String>,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

/// Repository trait for pending login attempts.
#[async_trait]
pub trait LoginStateStore: Send + Sync {
	async fn put(&self, state: &LoginState) -> Result<()>;

	/// Consume the attempt for `state`. Returns `None` when the state is
	/// unknown, already consumed, or expired; the row is deleted in all
	/// cases.
	async fn take(&self, state: &str) -> Result<Option<LoginState>>;

	/// Delete attempts that expired before `now`. Returns the count.
	async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// SQLite implementation of the pending login attempt store.
#[derive(Clone)]
pub struct SqliteLoginStateStore {
	pool: SqlitePool,
}

impl SqliteLoginStateStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[derive(sqlx::FromRow)]
struct LoginStateRow {
	state: String,
	provider: String,
	pkce_verifier: Option<String>,
	created_at: String,
	expires_at: String,
}

impl TryFrom<LoginStateRow> for LoginState {
	type Error = crate::error::DbError;

	fn try_from(row: LoginStateRow) -> Result<Self> {
		Ok(LoginState {
			state: row.state,
			provider: row.provider,
			pkce_verifier: row.pkce_verifier,
			created_at: parse_timestamp("created_at", &row.created_at)?,
			expires_at: parse_timestamp("expires_at", &row.expires_at)?,
		})
	}
}

#[async_trait]
impl LoginStateStore for SqliteLoginStateStore {
	#[instrument(skip(self, state), fields(provider = %state.provider))]
	async fn put(&self, state: &LoginState) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO login_states (state, provider, pkce_verifier, created_at, expires_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(&state.state)
		.bind(&state.provider)
		.bind(&state.pkce_verifier)
		.bind(state.created_at.to_rfc3339())
		.bind(state.expires_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip_all)]
	async fn take(&self, state: &str) -> Result<Option<LoginState>> {
		// DELETE ... RETURNING makes consumption atomic: two callbacks
		// with the same state cannot both succeed
		let row = sqlx::query_as::<_, LoginStateRow>(
			r#"
			DELETE FROM login_states
			WHERE state = ?
			RETURNING state, provider, pkce_verifier, created_at, expires_at
			"#,
		)
		.bind(state)
		.fetch_optional(&self.pool)
		.await?;

		let Some(attempt) = row.map(LoginState::try_from).transpose()? else {
			return Ok(None);
		};

		if attempt.expires_at < Utc::now() {
			tracing::debug!(provider = %attempt.provider, "pending login attempt expired");
			return Ok(None);
		}

		Ok(Some(attempt))
	}

	#[instrument(skip(self))]
	async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query("DELETE FROM login_states WHERE expires_at < ?")
			.bind(now.to_rfc3339())
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected();
		if deleted > 0 {
			tracing::debug!(deleted, "expired login attempts cleaned up");
		}
		Ok(deleted)
	}
}
