// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Balance store.
//!
//! The initial credit grant is insert-only: `ON CONFLICT(user_id) DO
//! NOTHING`, so a repeat login can never reset a spent-down balance.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::Result;
use crate::types::{parse_timestamp, UserId};

/// A user's token-credit balance row.
#[derive(Debug, Clone)]
pub struct BalanceRecord {
	pub user_id: UserId,
	pub token_credits: i64,
	pub created_at: chrono::DateTime<Utc>,
}

/// Repository trait for balance operations.
#[async_trait]
pub trait BalanceStore: Send + Sync {
	/// Grant the initial credit amount unless a balance row already
	/// exists. Returns whether a row was inserted.
	async fn grant_initial(&self, user_id: &UserId, token_credits: i64) -> Result<bool>;

	async fn get(&self, user_id: &UserId) -> Result<Option<BalanceRecord>>;
}

/// SQLite implementation of the balance store.
#[derive(Clone)]
pub struct SqliteBalanceStore {
	pool: SqlitePool,
}

impl SqliteBalanceStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[derive(sqlx::FromRow)]
struct BalanceRow {
	user_id: String,
	token_credits: i64,
	created_at: String,
}

impl TryFrom<BalanceRow> for BalanceRecord {
	type Error = crate::error::DbError;

	fn try_from(row: BalanceRow) -> Result<Self> {
		Ok(BalanceRecord {
			user_id: row
				.user_id
				.parse()
				.map_err(|_| crate::error::DbError::InvalidData("invalid user ID".into()))?,
			token_credits: row.token_credits,
			created_at: parse_timestamp("created_at", &row.created_at)?,
		})
	}
}

#[async_trait]
impl BalanceStore for SqliteBalanceStore {
	#[instrument(skip(self), fields(user_id = %user_id))]
	async fn grant_initial(&self, user_id: &UserId, token_credits: i64) -> Result<bool> {
		let now = Utc::now().to_rfc3339();

		let result = sqlx::query(
			r#"
			INSERT INTO balances (user_id, token_credits, created_at)
			VALUES (?, ?, ?)
			ON CONFLICT(user_id) DO NOTHING
			"#,
		)
		.bind(user_id.to_string())
		.bind(token_credits)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		let granted = result.rows_affected() > 0;
		if granted {
			tracing::debug!(token_credits, "initial balance granted");
		}
		Ok(granted)
	}

	#[instrument(skip(self), fields(user_id = %user_id))]
	async fn get(&self, user_id: &UserId) -> Result<Option<BalanceRecord>> {
		let row = sqlx::query_as::<_, BalanceRow>(
			"SELECT user_id, token_credits, created_at FROM balances WHERE user_id = ?",
		)
		.bind(user_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}
}
