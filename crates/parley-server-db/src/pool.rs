// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;

use crate::error::DbError;

/// How long a writer waits on a locked database before erroring.
/// Login bursts contend on the users and sessions tables.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a SqlitePool for the authentication store.
///
/// WAL mode so callback handling (writes) does not block session
/// resolution (reads). The database file is created on first run.
///
/// # Errors
/// Returns `DbError::Internal` when `database_url` (e.g.
/// "sqlite:./parley.db") is malformed; connection failures surface as
/// `DbError::Sqlx`.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.busy_timeout(BUSY_TIMEOUT)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}
