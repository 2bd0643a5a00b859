// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OIDC / OAuth2 token exchange client for Parley.
//!
//! This crate drives the network half of a login attempt:
//!
//! 1. **Authorization URL generation** - with a per-attempt `state`
//!    parameter for CSRF protection and an optional PKCE challenge.
//! 2. **Code exchange** - the authorization code returned on callback is
//!    exchanged for tokens at the provider's token endpoint.
//! 3. **Identity retrieval** - OIDC providers get their id token verified
//!    against the issuer's JWKS and merged with a userinfo call;
//!    OAuth2-only providers are asked for a userinfo resource with the
//!    access token as bearer credential.
//!
//! Failures are never retried here: a user-initiated retry is a fresh
//! login attempt. All tokens are wrapped in [`SecretString`] so they
//! cannot leak into logs.
//!
//! [`SecretString`]: parley_common_secret::SecretString

mod client;
mod discovery;
mod error;
mod jwks;
mod state;
mod token;

pub use client::{Endpoints, ExchangeClient};
pub use discovery::DiscoveryDocument;
pub use error::ExchangeError;
pub use jwks::{Jwk, JwksCache, JwksDocument};
pub use state::{generate_state, PkceChallenge};
pub use token::TokenResponse;
