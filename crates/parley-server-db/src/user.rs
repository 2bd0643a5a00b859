// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User store.
//!
//! Email is the sole join key between external identities and local
//! users; the `users.email` column carries a `UNIQUE` constraint and
//! first-login creation goes through [`UserStore::create_if_absent`],
//! so two concurrent first logins for one email converge on one row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::Result;
use crate::types::{parse_timestamp, UserId};

/// A local user row.
///
/// # PII Handling
///
/// `email`, `username` and `display_name` are user-provided PII and
/// should be redacted in logs.
#[derive(Debug, Clone)]
pub struct UserRecord {
	/// Unique identifier for this user.
	pub id: UserId,

	/// The user's email address. Unique across all users.
	pub email: String,

	/// Whether the email has been verified (by the provider or by policy).
	pub email_verified: bool,

	/// Short handle shown in mentions and profile URLs.
	pub username: Option<String>,

	/// Human-readable display name.
	pub display_name: Option<String>,

	/// URL or storage path of the user's avatar, if any.
	pub avatar_url: Option<String>,

	/// Name of the provider that most recently authenticated this user.
	pub provider: String,

	/// The provider's stable subject identifier for this user.
	pub provider_subject_id: String,

	/// Whether the account is active.
	pub active: bool,

	/// When the user was created.
	pub created_at: DateTime<Utc>,

	/// When the user was last updated.
	pub updated_at: DateTime<Utc>,
}

/// Fields for creating a user on first login.
#[derive(Debug, Clone)]
pub struct NewUser {
	pub email: String,
	pub email_verified: bool,
	pub username: Option<String>,
	pub display_name: Option<String>,
	pub avatar_url: Option<String>,
	pub provider: String,
	pub provider_subject_id: String,
	pub active: bool,
}

/// Fields applied to an existing user on a returning login.
///
/// `provider` and `provider_subject_id` are always overwritten;
/// `username` and `display_name` are only touched when `Some`.
#[derive(Debug, Clone)]
pub struct UserUpdate {
	pub provider: String,
	pub provider_subject_id: String,
	pub username: Option<String>,
	pub display_name: Option<String>,
}

/// Repository trait for user operations.
#[async_trait]
pub trait UserStore: Send + Sync {
	async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
	async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>>;

	/// Insert the user unless a row with the same email already exists,
	/// then return the row for that email along with whether this call
	/// created it.
	async fn create_if_absent(&self, user: &NewUser) -> Result<(UserRecord, bool)>;

	async fn update(&self, id: &UserId, update: &UserUpdate) -> Result<UserRecord>;

	/// Record where the user's avatar was stored.
	async fn set_avatar_url(&self, id: &UserId, avatar_url: &str) -> Result<()>;
}

/// SQLite implementation of the user store.
#[derive(Clone)]
pub struct SqliteUserStore {
	pool: SqlitePool,
}

impl SqliteUserStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[derive(sqlx::FromRow)]
struct UserRow {
	id: String,
	email: String,
	email_verified: i32,
	username: Option<String>,
	display_name: Option<String>,
	avatar_url: Option<String>,
	provider: String,
	provider_subject_id: String,
	active: i32,
	created_at: String,
	updated_at: String,
}

impl TryFrom<UserRow> for UserRecord {
	type Error = crate::error::DbError;

	fn try_from(row: UserRow) -> Result<Self> {
		Ok(UserRecord {
			id: row
				.id
				.parse()
				.map_err(|_| crate::error::DbError::InvalidData("invalid user ID".into()))?,
			email: row.email,
			email_verified: row.email_verified != 0,
			username: row.username,
			display_name: row.display_name,
			avatar_url: row.avatar_url,
			provider: row.provider,
			provider_subject_id: row.provider_subject_id,
			active: row.active != 0,
			created_at: parse_timestamp("created_at", &row.created_at)?,
			updated_at: parse_timestamp("updated_at", &row.updated_at)?,
		})
	}
}

const USER_COLUMNS: &str = "id, email, email_verified, username, display_name, avatar_url, \
	 provider, provider_subject_id, active, created_at, updated_at";

#[async_trait]
impl UserStore for SqliteUserStore {
	#[instrument(skip(self, email))]
	async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
		let row = sqlx::query_as::<_, UserRow>(&format!(
			"SELECT {USER_COLUMNS} FROM users WHERE email = ?"
		))
		.bind(email)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(user_id = %id))]
	async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>> {
		let row = sqlx::query_as::<_, UserRow>(&format!(
			"SELECT {USER_COLUMNS} FROM users WHERE id = ?"
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self, user), fields(provider = %user.provider))]
	async fn create_if_absent(&self, user: &NewUser) -> Result<(UserRecord, bool)> {
		let id = UserId::generate();
		let now = Utc::now().to_rfc3339();

		let result = sqlx::query(
			r#"
			INSERT INTO users (
				id, email, email_verified, username, display_name, avatar_url,
				provider, provider_subject_id, active, created_at, updated_at
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(email) DO NOTHING
			"#,
		)
		.bind(id.to_string())
		.bind(&user.email)
		.bind(if user.email_verified { 1 } else { 0 })
		.bind(&user.username)
		.bind(&user.display_name)
		.bind(&user.avatar_url)
		.bind(&user.provider)
		.bind(&user.provider_subject_id)
		.bind(if user.active { 1 } else { 0 })
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		let created = result.rows_affected() > 0;

		// re-read regardless: when the insert lost a race, the winner's
		// row is the canonical one for this email
		let record = self.find_by_email(&user.email).await?.ok_or_else(|| {
			crate::error::DbError::Internal("user row vanished after insert".to_string())
		})?;

		if created {
			tracing::debug!(user_id = %record.id, "user created");
		}

		Ok((record, created))
	}

	#[instrument(skip(self, update), fields(user_id = %id))]
	async fn update(&self, id: &UserId, update: &UserUpdate) -> Result<UserRecord> {
		let now = Utc::now().to_rfc3339();

		sqlx::query(
			r#"
			UPDATE users SET
				provider = ?,
				provider_subject_id = ?,
				username = COALESCE(?, username),
				display_name = COALESCE(?, display_name),
				updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&update.provider)
		.bind(&update.provider_subject_id)
		.bind(&update.username)
		.bind(&update.display_name)
		.bind(&now)
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		self.find_by_id(id)
			.await?
			.ok_or_else(|| crate::error::DbError::NotFound(format!("user {id}")))
	}

	#[instrument(skip(self, avatar_url), fields(user_id = %id))]
	async fn set_avatar_url(&self, id: &UserId, avatar_url: &str) -> Result<()> {
		let now = Utc::now().to_rfc3339();

		let result = sqlx::query("UPDATE users SET avatar_url = ?, updated_at = ? WHERE id = ?")
			.bind(avatar_url)
			.bind(&now)
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(crate::error::DbError::NotFound(format!("user {id}")));
		}
		Ok(())
	}
}
