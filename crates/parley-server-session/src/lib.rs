// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session store binding.
//!
//! A completed login yields an opaque session token. The token itself
//! is handed to the caller exactly once; backends persist only its
//! SHA-256 hex digest, so a leaked database never leaks live sessions.
//!
//! Two backends are provided: [`MemorySessionStore`] for
//! single-instance deployments and [`SqliteSessionStore`] for shared
//! deployments.

mod error;
mod memory;
mod sqlite;
mod token;

pub use error::{Result, SessionError};
pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;
pub use token::SessionToken;

use async_trait::async_trait;
use parley_server_db::UserId;

/// Default session lifetime (7 days).
pub const DEFAULT_SESSION_TTL: std::time::Duration =
	std::time::Duration::from_secs(7 * 24 * 60 * 60);

/// Storage for login sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
	/// Create a session for a user and return the bearer token.
	async fn create(&self, user_id: &UserId) -> Result<SessionToken>;

	/// Resolve a presented token to its user, if the session is live.
	async fn resolve(&self, token: &str) -> Result<Option<UserId>>;

	/// Destroy the session for a presented token. Destroying an unknown
	/// token is not an error.
	async fn destroy(&self, token: &str) -> Result<()>;

	/// Delete expired sessions. Returns the count.
	async fn cleanup_expired(&self) -> Result<u64>;
}
