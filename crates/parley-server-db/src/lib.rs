// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite storage layer for the authentication core.
//!
//! This crate provides:
//! - [`pool::create_pool`] - WAL-mode pool construction
//! - [`user::UserStore`] - user lookup, atomic first-login creation, updates
//! - [`balance::BalanceStore`] - insert-only initial credit grants
//! - [`login_state::LoginStateStore`] - single-use pending login attempts
//! - [`testing`] - in-memory pools and schema for tests
//!
//! Timestamps are stored as RFC 3339 TEXT columns and parsed back into
//! `DateTime<Utc>` when rows are mapped into domain types.

pub mod balance;
pub mod error;
pub mod login_state;
pub mod pool;
pub mod testing;
pub mod types;
pub mod user;

pub use balance::{BalanceRecord, BalanceStore, SqliteBalanceStore};
pub use error::{DbError, Result};
pub use login_state::{LoginState, LoginStateStore, SqliteLoginStateStore};
pub use pool::create_pool;
pub use types::UserId;
pub use user::{NewUser, SqliteUserStore, UserRecord, UserStore, UserUpdate};
