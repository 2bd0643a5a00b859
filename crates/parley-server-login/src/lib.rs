// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The login pipeline.
//!
//! Orchestrates an external-identity login end to end:
//!
//! 1. [`LoginService::begin_login`] - build the authorization redirect
//!    and persist the pending attempt (state + PKCE verifier).
//! 2. [`LoginService::complete_login`] - consume the callback: validate
//!    state, exchange the code, normalize claims, reconcile the user,
//!    run provisioning side-effects, and bind a session.
//!
//! Reconciliation failures abort the login; provisioning failures
//! degrade it (logged, reported, never fatal).

mod config;
mod error;
mod provision;
mod reconcile;
mod service;

pub use config::LoginConfig;
pub use error::{LoginError, Result};
pub use provision::{AvatarFetcher, Provisioner, ProvisioningReport, StepStatus};
pub use reconcile::UserReconciler;
pub use service::{BeginLogin, LoginOutcome, LoginService, Principal};
