//! Filesystem operations on one side of the sync
//!
//! Shared by the client (local side) and the server (remote side). Paths coming from
//! the wire are validated before they touch the disk.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use super::error::ProtocolError;
use crate::config::{mode_mask, ModeConfig, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::exclusion::IgnoreMatcher;
use crate::inventory::{self, permission_bits, Inventory};
use crate::logging::*;

/// Prefix and suffix of partial receive files
pub const TEMP_PREFIX: &str = ".tmp-unisync-";
pub const TEMP_SUFFIX: &str = ".tmp";

/// A sync root plus the mode rules of its side
#[derive(Debug, Clone)]
pub struct LocalTree {
	root: PathBuf,
	modes: ModeConfig,
	is_local: bool,
	tmpdir: Option<PathBuf>,
	chunk_size: usize,
}

/// Check a wire path: relative, no `..`, no root or prefix components
pub fn is_path_safe(rel: &str) -> bool {
	let path = Path::new(rel);
	!rel.is_empty() &&
		path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl LocalTree {
	/// `is_local` selects which defaults of `modes` apply to this side
	pub fn new(root: impl Into<PathBuf>, modes: ModeConfig, is_local: bool) -> Self {
		LocalTree { root: root.into(), modes, is_local, tmpdir: None, chunk_size: DEFAULT_CHUNK_SIZE }
	}

	pub fn with_tmpdir(mut self, tmpdir: Option<PathBuf>) -> Self {
		self.tmpdir = tmpdir;
		self
	}

	/// Chunk size for outgoing files, clamped to `1..=MAX_CHUNK_SIZE`
	pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
		self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
		self
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn modes(&self) -> &ModeConfig {
		&self.modes
	}

	pub fn chunk_size(&self) -> usize {
		self.chunk_size
	}

	/// Absolute path of a wire path
	pub fn resolve(&self, rel: &str) -> Result<PathBuf, ProtocolError> {
		if !is_path_safe(rel) {
			return Err(ProtocolError::file(rel, "unsafe path"));
		}
		Ok(self.root.join(rel))
	}

	/// Create the root directory if it is missing
	pub async fn ensure_root(&self) -> io::Result<()> {
		tokio::fs::create_dir_all(&self.root).await
	}

	/// Walk the tree on the blocking pool
	pub async fn inventory(&self, matcher: &IgnoreMatcher) -> io::Result<Inventory> {
		let root = self.root.clone();
		let matcher = matcher.clone();
		tokio::task::spawn_blocking(move || inventory::build(&root, &matcher))
			.await
			.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
	}

	/// Create a directory. An existing directory is fine.
	pub async fn mkdir(&self, rel: &str, mode: u32) -> Result<(), ProtocolError> {
		let full = self.resolve(rel)?;
		let base = self.modes.dir_default(self.is_local);
		let mode = if mode != 0 { mode_mask(base, mode, self.modes.dir_mask) } else { base };

		match tokio::fs::create_dir(&full).await {
			Ok(()) => {}
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists && full.is_dir() => return Ok(()),
			Err(e) => return Err(ProtocolError::file(rel, e)),
		}
		set_mode(&full, mode).await.map_err(|e| ProtocolError::file(rel, e))?;
		debug!("mkdir {} ({:o})", rel, mode);
		Ok(())
	}

	/// Point `rel` at `target`, replacing whatever is there
	pub async fn symlink(&self, rel: &str, target: &str) -> Result<(), ProtocolError> {
		let full = self.resolve(rel)?;
		remove_path(&full).await.map_err(|e| ProtocolError::file(rel, e))?;
		create_symlink(target, &full).await.map_err(|e| ProtocolError::file(rel, e))?;
		debug!("symlink {} -> {}", rel, target);
		Ok(())
	}

	/// Apply the synchronized bits of `mode`, keeping the others
	pub async fn chmod(&self, rel: &str, mode: u32) -> Result<(), ProtocolError> {
		let full = self.resolve(rel)?;
		let meta = tokio::fs::symlink_metadata(&full).await.map_err(|e| ProtocolError::file(rel, e))?;
		if meta.file_type().is_symlink() || mode == 0 {
			return Ok(());
		}
		let current = permission_bits(&meta);
		let new = mode_mask(current, mode, self.modes.mask(meta.is_dir()));
		set_mode(&full, new).await.map_err(|e| ProtocolError::file(rel, e))?;
		debug!("chmod {} {:o} -> {:o}", rel, current, new);
		Ok(())
	}

	/// Remove a file, symlink or empty directory. A missing path counts as removed.
	pub async fn delete(&self, rel: &str) -> Result<(), ProtocolError> {
		let full = self.resolve(rel)?;
		remove_path(&full).await.map_err(|e| ProtocolError::file(rel, e))?;
		debug!("delete {}", rel);
		Ok(())
	}

	/// Mode for a received file: the declared bits under the mask, the rest from the
	/// existing file or the side default. A declared mode of 0 changes nothing.
	pub fn receive_mode(&self, target: &Path, declared: u32) -> u32 {
		let base = match fs::metadata(target) {
			Ok(meta) if meta.is_file() => permission_bits(&meta),
			_ => 0,
		};
		let base = if base != 0 { base } else { self.modes.file_default(self.is_local) };
		if declared == 0 {
			base
		} else {
			mode_mask(base, declared, self.modes.file_mask)
		}
	}

	/// Temporary file next to `target` (or in the temp directory override). It is
	/// removed when dropped unless persisted.
	pub fn create_temp(&self, rel: &str, target: &Path, declared: u32) -> Result<NamedTempFile, ProtocolError> {
		let dir = match (&self.tmpdir, target.parent()) {
			(Some(dir), _) => dir.clone(),
			(None, Some(parent)) => parent.to_path_buf(),
			(None, None) => self.root.clone(),
		};
		let temp = tempfile::Builder::new()
			.prefix(TEMP_PREFIX)
			.suffix(TEMP_SUFFIX)
			.tempfile_in(&dir)
			.map_err(|e| ProtocolError::file(rel, e))?;

		let mode = self.receive_mode(target, declared);
		set_mode_sync(temp.path(), mode).map_err(|e| ProtocolError::file(rel, e))?;
		Ok(temp)
	}
}

async fn remove_path(full: &Path) -> io::Result<()> {
	let meta = match tokio::fs::symlink_metadata(full).await {
		Ok(m) => m,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
		Err(e) => return Err(e),
	};
	if meta.is_dir() {
		tokio::fs::remove_dir(full).await
	} else {
		tokio::fs::remove_file(full).await
	}
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	tokio::fs::set_permissions(path, fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
	Ok(())
}

#[cfg(unix)]
fn set_mode_sync(path: &Path, mode: u32) -> io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode_sync(_path: &Path, _mode: u32) -> io::Result<()> {
	Ok(())
}

#[cfg(unix)]
async fn create_symlink(target: &str, full: &Path) -> io::Result<()> {
	tokio::fs::symlink(target, full).await
}

#[cfg(not(unix))]
async fn create_symlink(_target: &str, _full: &Path) -> io::Result<()> {
	Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks are not supported on this platform"))
}


// vim: ts=4
