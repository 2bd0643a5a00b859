// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::instrument;

use parley_server_db::UserId;

use crate::error::Result;
use crate::token::{hash_token, SessionToken};
use crate::{SessionStore, DEFAULT_SESSION_TTL};

struct Entry {
	user_id: UserId,
	expires_at: DateTime<Utc>,
}

/// In-memory session backend, keyed by token hash.
pub struct MemorySessionStore {
	ttl: Duration,
	sessions: RwLock<HashMap<String, Entry>>,
}

impl MemorySessionStore {
	pub fn new() -> Self {
		Self::with_ttl(DEFAULT_SESSION_TTL)
	}

	pub fn with_ttl(ttl: Duration) -> Self {
		Self {
			ttl,
			sessions: RwLock::new(HashMap::new()),
		}
	}
}

impl Default for MemorySessionStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl SessionStore for MemorySessionStore {
	#[instrument(skip(self), fields(user_id = %user_id))]
	async fn create(&self, user_id: &UserId) -> Result<SessionToken> {
		let token = SessionToken::generate();
		let expires_at = Utc::now()
			+ chrono::Duration::from_std(self.ttl)
				.map_err(|e| crate::SessionError::Internal(format!("invalid session TTL: {e}")))?;

		self.sessions.write().await.insert(
			token.hash(),
			Entry {
				user_id: *user_id,
				expires_at,
			},
		);

		Ok(token)
	}

	#[instrument(skip_all)]
	async fn resolve(&self, token: &str) -> Result<Option<UserId>> {
		let hash = hash_token(token);
		let sessions = self.sessions.read().await;

		Ok(sessions
			.get(&hash)
			.filter(|entry| entry.expires_at > Utc::now())
			.map(|entry| entry.user_id))
	}

	#[instrument(skip_all)]
	async fn destroy(&self, token: &str) -> Result<()> {
		self.sessions.write().await.remove(&hash_token(token));
		Ok(())
	}

	#[instrument(skip(self))]
	async fn cleanup_expired(&self) -> Result<u64> {
		let now = Utc::now();
		let mut sessions = self.sessions.write().await;
		let before = sessions.len();
		sessions.retain(|_, entry| entry.expires_at > now);
		Ok((before - sessions.len()) as u64)
	}
}
