// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;

use parley_server_db::UserId;

use crate::error::{Result, SessionError};
use crate::token::{hash_token, SessionToken};
use crate::{SessionStore, DEFAULT_SESSION_TTL};

/// SQLite session backend. Rows hold only the token hash.
#[derive(Clone)]
pub struct SqliteSessionStore {
	pool: SqlitePool,
	ttl: Duration,
}

impl SqliteSessionStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self::with_ttl(pool, DEFAULT_SESSION_TTL)
	}

	pub fn with_ttl(pool: SqlitePool, ttl: Duration) -> Self {
		Self { pool, ttl }
	}
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
	#[instrument(skip(self), fields(user_id = %user_id))]
	async fn create(&self, user_id: &UserId) -> Result<SessionToken> {
		let token = SessionToken::generate();
		let now = Utc::now();
		let expires_at = now
			+ chrono::Duration::from_std(self.ttl)
				.map_err(|e| SessionError::Internal(format!("invalid session TTL: {e}")))?;

		sqlx::query(
			r#"
			INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(uuid::Uuid::new_v4().to_string())
		.bind(user_id.to_string())
		.bind(token.hash())
		.bind(now.to_rfc3339())
		.bind(expires_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		Ok(token)
	}

	#[instrument(skip_all)]
	async fn resolve(&self, token: &str) -> Result<Option<UserId>> {
		let row: Option<(String,)> = sqlx::query_as(
			"SELECT user_id FROM sessions WHERE token_hash = ? AND expires_at > ?",
		)
		.bind(hash_token(token))
		.bind(Utc::now().to_rfc3339())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|(user_id,)| {
			user_id
				.parse()
				.map_err(|_| SessionError::Internal("invalid user ID in session row".to_string()))
		})
		.transpose()
	}

	#[instrument(skip_all)]
	async fn destroy(&self, token: &str) -> Result<()> {
		sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
			.bind(hash_token(token))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn cleanup_expired(&self) -> Result<u64> {
		let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
			.bind(Utc::now().to_rfc3339())
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected();
		if deleted > 0 {
			tracing::debug!(deleted, "expired sessions cleaned up");
		}
		Ok(deleted)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parley_server_db::testing::create_session_test_pool;

	#[tokio::test]
	async fn create_then_resolve_round_trips() {
		let store = SqliteSessionStore::new(create_session_test_pool().await);
		let user_id = UserId::generate();

		let token = store.create(&user_id).await.unwrap();
		let resolved = store.resolve(token.expose()).await.unwrap();

		assert_eq!(resolved, Some(user_id));
	}

	#[tokio::test]
	async fn raw_token_is_not_stored() {
		let pool = create_session_test_pool().await;
		let store = SqliteSessionStore::new(pool.clone());
		let token = store.create(&UserId::generate()).await.unwrap();

		let (stored_hash,): (String,) = sqlx::query_as("SELECT token_hash FROM sessions")
			.fetch_one(&pool)
			.await
			.unwrap();

		assert_ne!(stored_hash, token.expose());
		assert_eq!(stored_hash, token.hash());
	}

	#[tokio::test]
	async fn destroy_invalidates_the_session() {
		let store = SqliteSessionStore::new(create_session_test_pool().await);
		let token = store.create(&UserId::generate()).await.unwrap();

		store.destroy(token.expose()).await.unwrap();

		assert!(store.resolve(token.expose()).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn expired_session_does_not_resolve() {
		let store = SqliteSessionStore::with_ttl(create_session_test_pool().await, Duration::ZERO);
		let token = store.create(&UserId::generate()).await.unwrap();

		assert!(store.resolve(token.expose()).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn cleanup_counts_expired_sessions() {
		let store = SqliteSessionStore::with_ttl(create_session_test_pool().await, Duration::ZERO);
		store.create(&UserId::generate()).await.unwrap();
		store.create(&UserId::generate()).await.unwrap();

		assert_eq!(store.cleanup_expired().await.unwrap(), 2);
	}
}
