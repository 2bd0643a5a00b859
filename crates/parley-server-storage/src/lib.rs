// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Avatar object storage.
//!
//! The login pipeline treats storage as a collaborator behind
//! [`AvatarStorage`]; a failure here degrades the login, it never
//! fails it.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::instrument;

use parley_server_db::UserId;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Invalid file name: {0}")]
	InvalidFileName(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage for user avatar images.
#[async_trait]
pub trait AvatarStorage: Send + Sync {
	/// Store an avatar under the user's namespace and return the path
	/// recorded on the user row.
	async fn save(&self, file_name: &str, user_id: &UserId, bytes: Bytes) -> Result<String>;
}

/// Local-disk avatar storage: `{root}/{user_id}/{file_name}`.
pub struct LocalDiskStorage {
	root: PathBuf,
}

impl LocalDiskStorage {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}
}

#[async_trait]
impl AvatarStorage for LocalDiskStorage {
	#[instrument(skip(self, bytes), fields(user_id = %user_id, size = bytes.len()))]
	async fn save(&self, file_name: &str, user_id: &UserId, bytes: Bytes) -> Result<String> {
		// file names are derived from provider subject ids; refuse
		// anything that could escape the user's directory
		if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.contains("..") {
			return Err(StorageError::InvalidFileName(file_name.to_string()));
		}

		let dir = self.root.join(user_id.to_string());
		tokio::fs::create_dir_all(&dir).await?;

		let path = dir.join(file_name);
		tokio::fs::write(&path, &bytes).await?;

		tracing::debug!(path = %path.display(), "avatar stored");
		Ok(path.to_string_lossy().into_owned())
	}
}
