// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider configuration and identity normalization for Parley.
//!
//! This crate holds the static side of external-identity authentication:
//!
//! - [`ProviderDescriptor`] - immutable configuration for one identity
//!   provider (endpoints, credentials, claim overrides)
//! - [`ProviderRegistry`] - the fixed set of enabled providers, resolved
//!   once at startup from the environment
//! - [`CanonicalIdentity`] - the provider-agnostic identity record every
//!   login attempt normalizes into
//! - [`normalize`] - the claim normalizer mapping raw userinfo payloads
//!   onto [`CanonicalIdentity`]
//!
//! Nothing in this crate performs I/O beyond reading the environment; the
//! token exchange itself lives in `parley-auth-oidc`.

mod claims;
mod error;
mod identity;
mod provider;

pub use claims::{claim_as_string, normalize};
pub use error::{ConfigError, NormalizeError};
pub use identity::CanonicalIdentity;
pub use provider::{ProviderDescriptor, ProviderFamily, ProviderRegistry};
