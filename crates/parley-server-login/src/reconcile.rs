// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User reconciliation.
//!
//! Email is the join key: a canonical identity lands on the existing
//! user with that email, or creates one atomically when none exists.
//! The provider binding (`provider` + `provider_subject_id`) always
//! follows the most recent login; profile fields only move when the
//! operator configured a claim override for them and the provider
//! actually sent that claim.

use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use parley_auth_core::{claim_as_string, CanonicalIdentity, ProviderDescriptor};
use parley_server_db::{DbError, NewUser, UserRecord, UserStore, UserUpdate};

/// Maps canonical identities onto local user rows.
pub struct UserReconciler {
	users: Arc<dyn UserStore>,
}

impl UserReconciler {
	pub fn new(users: Arc<dyn UserStore>) -> Self {
		Self { users }
	}

	/// Reconcile an identity against the local user table. `raw` is the
	/// provider payload the identity was normalized from; the update
	/// path reads override claims from it verbatim so a claim the
	/// provider did not send leaves the stored profile alone. Returns
	/// the user row and whether this login created it.
	#[instrument(skip_all, fields(provider = %identity.provider))]
	pub async fn reconcile(
		&self,
		descriptor: &ProviderDescriptor,
		identity: &CanonicalIdentity,
		raw: &Value,
	) -> Result<(UserRecord, bool), DbError> {
		let existing = self.users.find_by_email(&identity.email).await?;

		let record = match existing {
			Some(record) => record,
			None => {
				let (record, created) = self
					.users
					.create_if_absent(&NewUser {
						email: identity.email.clone(),
						email_verified: identity.email_verified,
						username: non_empty(&identity.username),
						display_name: non_empty(&identity.display_name),
						avatar_url: None,
						provider: identity.provider.clone(),
						provider_subject_id: identity.subject_id.clone(),
						active: true,
					})
					.await?;

				if created {
					tracing::info!(user_id = %record.id, "user created on first login");
					return Ok((record, true));
				}

				// lost a concurrent first-login race; the winner's row is
				// the user, treat this as a returning login
				record
			}
		};

		if record.provider != identity.provider {
			tracing::info!(
				user_id = %record.id,
				from = %record.provider,
				to = %identity.provider,
				"provider binding moved to most recent login"
			);
		}

		let update = UserUpdate {
			provider: identity.provider.clone(),
			provider_subject_id: identity.subject_id.clone(),
			username: override_claim(raw, descriptor.username_claim.as_deref()),
			display_name: override_claim(raw, descriptor.name_claim.as_deref()),
		};

		let record = self.users.update(&record.id, &update).await?;
		Ok((record, false))
	}
}

fn non_empty(value: &str) -> Option<String> {
	if value.is_empty() {
		None
	} else {
		Some(value.to_string())
	}
}

fn override_claim(raw: &Value, claim: Option<&str>) -> Option<String> {
	claim
		.and_then(|name| raw.get(name))
		.and_then(claim_as_string)
}

#[cfg(test)]
mod tests {
	use super::*;
	use parley_auth_core::{ProviderFamily, ProviderRegistry};
	use parley_server_db::testing::create_login_test_pool;
	use parley_server_db::SqliteUserStore;
	use serde_json::json;

	fn descriptor(overrides: bool) -> ProviderDescriptor {
		let mut vars = vec![
			("PARLEY_OIDC_ISSUER", "https://idp.example.com"),
			("PARLEY_OIDC_CLIENT_ID", "client-123"),
			("PARLEY_OIDC_CLIENT_SECRET", "secret"),
			(
				"PARLEY_OIDC_CALLBACK_URL",
				"https://parley.example.com/oauth/callback",
			),
			("PARLEY_OIDC_SCOPE", "openid email profile"),
			("PARLEY_OIDC_SESSION_SECRET", "session-secret"),
		];
		if overrides {
			vars.push(("PARLEY_OIDC_USERNAME_CLAIM", "preferred_username"));
			vars.push(("PARLEY_OIDC_NAME_CLAIM", "name"));
		}

		let registry = ProviderRegistry::from_lookup(|name| {
			vars
				.iter()
				.find(|(key, _)| *key == name)
				.map(|(_, value)| value.to_string())
		})
		.unwrap();

		let descriptor = registry.get("openid").unwrap().clone();
		assert_eq!(descriptor.family, ProviderFamily::Oidc);
		descriptor
	}

	fn identity(email: &str, username: &str) -> CanonicalIdentity {
		CanonicalIdentity {
			subject_id: "sub-1".to_string(),
			email: email.to_string(),
			email_verified: true,
			username: username.to_string(),
			display_name: "Ann Example".to_string(),
			picture_url: None,
			provider: "openid".to_string(),
		}
	}

	async fn store() -> Arc<SqliteUserStore> {
		Arc::new(SqliteUserStore::new(create_login_test_pool().await))
	}

	#[tokio::test]
	async fn first_login_creates_the_user() {
		let reconciler = UserReconciler::new(store().await);

		let (record, created) = reconciler
			.reconcile(&descriptor(false), &identity("a@x.com", "ann"), &json!({}))
			.await
			.unwrap();

		assert!(created);
		assert_eq!(record.email, "a@x.com");
		assert_eq!(record.username.as_deref(), Some("ann"));
		assert_eq!(record.display_name.as_deref(), Some("Ann Example"));
		assert!(record.active);
		assert!(record.email_verified);
	}

	#[tokio::test]
	async fn returning_login_updates_only_the_provider_binding() {
		let reconciler = UserReconciler::new(store().await);
		let desc = descriptor(false);

		let (first, _) = reconciler
			.reconcile(&desc, &identity("a@x.com", "ann"), &json!({}))
			.await
			.unwrap();

		let mut changed = identity("a@x.com", "ann_new");
		changed.subject_id = "sub-2".to_string();
		changed.display_name = "Different Name".to_string();
		let raw = json!({ "username": "ann_new", "name": "Different Name" });
		let (second, created) = reconciler.reconcile(&desc, &changed, &raw).await.unwrap();

		assert!(!created);
		assert_eq!(second.id, first.id);
		assert_eq!(second.provider_subject_id, "sub-2");
		// no overrides configured: profile fields stay put
		assert_eq!(second.username.as_deref(), Some("ann"));
		assert_eq!(second.display_name.as_deref(), Some("Ann Example"));
	}

	#[tokio::test]
	async fn overrides_let_claims_move_profile_fields() {
		let reconciler = UserReconciler::new(store().await);
		let desc = descriptor(true);

		reconciler
			.reconcile(&desc, &identity("a@x.com", "ann"), &json!({}))
			.await
			.unwrap();

		let mut changed = identity("a@x.com", "ann_new");
		changed.display_name = "Ann Renamed".to_string();
		let raw = json!({ "preferred_username": "ann_new", "name": "Ann Renamed" });
		let (second, _) = reconciler.reconcile(&desc, &changed, &raw).await.unwrap();

		assert_eq!(second.username.as_deref(), Some("ann_new"));
		assert_eq!(second.display_name.as_deref(), Some("Ann Renamed"));
	}

	#[tokio::test]
	async fn absent_override_claim_leaves_the_profile_alone() {
		let reconciler = UserReconciler::new(store().await);
		let desc = descriptor(true);

		reconciler
			.reconcile(&desc, &identity("a@x.com", "ann"), &json!({}))
			.await
			.unwrap();

		// the payload carries neither preferred_username nor name, even
		// though the normalizer fell back to something for the identity
		let mut changed = identity("a@x.com", "a@x.com");
		changed.display_name = "a@x.com".to_string();
		let raw = json!({ "email": "a@x.com", "sub": "sub-1" });
		let (second, _) = reconciler.reconcile(&desc, &changed, &raw).await.unwrap();

		assert_eq!(second.username.as_deref(), Some("ann"));
		assert_eq!(second.display_name.as_deref(), Some("Ann Example"));
	}

	#[tokio::test]
	async fn provider_takeover_keeps_the_same_user() {
		let reconciler = UserReconciler::new(store().await);

		let (first, _) = reconciler
			.reconcile(&descriptor(false), &identity("a@x.com", "ann"), &json!({}))
			.await
			.unwrap();

		let mut other_provider = identity("a@x.com", "ann");
		other_provider.provider = "oauth2".to_string();
		other_provider.subject_id = "oauth2-sub".to_string();
		let (second, created) = reconciler
			.reconcile(&descriptor(false), &other_provider, &json!({}))
			.await
			.unwrap();

		assert!(!created);
		assert_eq!(second.id, first.id);
		assert_eq!(second.provider, "oauth2");
		assert_eq!(second.provider_subject_id, "oauth2-sub");
	}

	#[tokio::test]
	async fn concurrent_first_logins_converge_on_one_user() {
		let users = store().await;
		let reconciler = Arc::new(UserReconciler::new(users.clone()));
		let desc = Arc::new(descriptor(false));

		let mut handles = Vec::new();
		for n in 0..8 {
			let reconciler = reconciler.clone();
			let desc = desc.clone();
			handles.push(tokio::spawn(async move {
				let mut id = identity("a@x.com", "ann");
				id.subject_id = format!("sub-{n}");
				reconciler.reconcile(&desc, &id, &json!({})).await
			}));
		}

		let mut ids = Vec::new();
		let mut created_count = 0;
		for handle in handles {
			let (record, created) = handle.await.unwrap().unwrap();
			ids.push(record.id);
			if created {
				created_count += 1;
			}
		}

		assert_eq!(created_count, 1);
		assert!(ids.iter().all(|id| *id == ids[0]));
	}
}
