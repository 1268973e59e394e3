//! Persisted sync cache
//!
//! The cache is the inventory both sides agreed on at the end of the last successful
//! cycle. It is stored per connection identity (local root, remote root, host) and is
//! only trusted when that identity matches.

use crate::error::StateError;
use crate::inventory::Inventory;
use crate::logging::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk cache layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheFile {
	pub local: String,
	pub remote: String,
	pub host: String,
	pub list: Inventory,
}

/// Cache file name: the profile name when given, otherwise a hash of the identity
pub fn cache_name(profile: Option<&str>, local: &str, remote: &str, host: &str) -> String {
	match profile {
		Some(name) if !name.is_empty() => name.to_string(),
		_ => {
			let digest = blake3::hash(format!("{}:{}:{}", local, remote, host).as_bytes());
			hex::encode(&digest.as_bytes()[..16])
		}
	}
}

/// Lazily loaded cache for one connection identity
pub struct CacheStore {
	path: PathBuf,
	local: String,
	remote: String,
	host: String,
	loaded: bool,
	list: Option<Inventory>,
}

impl CacheStore {
	pub fn new(dir: &Path, profile: Option<&str>, local: &str, remote: &str, host: &str) -> Self {
		let name = cache_name(profile, local, remote, host);
		CacheStore {
			path: dir.join(format!("{}.cache", name)),
			local: local.to_string(),
			remote: remote.to_string(),
			host: host.to_string(),
			loaded: false,
			list: None,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Read and parse the cache file. `Ok(None)` when it does not exist.
	pub async fn read(&self) -> Result<Option<CacheFile>, StateError> {
		if !self.path.exists() {
			return Ok(None);
		}

		let contents = tokio::fs::read_to_string(&self.path)
			.await
			.map_err(|e| StateError::LoadFailed { source: Box::new(e) })?;

		serde_json::from_str(&contents).map(Some).map_err(|e| StateError::Corrupted {
			message: format!("Failed to parse cache JSON: {}", e),
		})
	}

	/// The cached inventory, loaded on first use. Unreadable files and identity
	/// mismatches are logged and yield no cache.
	pub async fn load(&mut self) -> Option<&Inventory> {
		if !self.loaded {
			self.loaded = true;
			self.list = match self.read().await {
				Ok(Some(file)) => {
					if file.local == self.local && file.remote == self.remote && file.host == self.host {
						debug!("Loaded cache {} ({} entries)", self.path.display(), file.list.len());
						Some(file.list)
					} else {
						warn!(
							"Cache {} belongs to {}:{}@{}, ignoring it",
							self.path.display(),
							file.local,
							file.remote,
							file.host
						);
						None
					}
				}
				Ok(None) => None,
				Err(e) => {
					warn!("Cannot use cache {}: {}", self.path.display(), e);
					None
				}
			};
		}
		self.list.as_ref()
	}

	/// Persist `list` as the new cache
	pub async fn save(&mut self, list: &Inventory) -> Result<(), StateError> {
		if let Some(dir) = self.path.parent() {
			if !dir.exists() {
				tokio::fs::create_dir_all(dir)
					.await
					.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
			}
		}

		let file = CacheFile {
			local: self.local.clone(),
			remote: self.remote.clone(),
			host: self.host.clone(),
			list: list.clone(),
		};
		let json = serde_json::to_string(&file)
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;

		tokio::fs::write(&self.path, json)
			.await
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
				.await
				.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
		}

		self.loaded = true;
		self.list = Some(file.list);
		Ok(())
	}
}


// vim: ts=4
