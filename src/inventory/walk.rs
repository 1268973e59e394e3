//! Tree walk producing an inventory

use std::fs;
use std::io;
use std::path::Path;

use filetime::FileTime;

use super::{Inventory, InventoryEntry};
use crate::config::PERM_BITS;
use crate::exclusion::IgnoreMatcher;
use crate::logging::*;

/// Walk `root` and list everything not excluded by `matcher`.
///
/// Blocking; async callers run it on the blocking pool. Unreadable entries below the
/// root are logged and skipped, an unreadable root is an error.
pub fn build(root: &Path, matcher: &IgnoreMatcher) -> io::Result<Inventory> {
	let meta = fs::metadata(root)?;
	if !meta.is_dir() {
		return Err(io::Error::new(
			io::ErrorKind::InvalidInput,
			format!("{} is not a directory", root.display()),
		));
	}

	let mut inventory = Inventory::new();
	walk_dir(root, "", matcher, &mut inventory)?;
	debug!("Inventory of {}: {} entries", root.display(), inventory.len());
	Ok(inventory)
}

fn walk_dir(dir: &Path, prefix: &str, matcher: &IgnoreMatcher, out: &mut Inventory) -> io::Result<()> {
	let read = match fs::read_dir(dir) {
		Ok(r) => r,
		Err(e) if prefix.is_empty() => return Err(e),
		Err(e) => {
			warn!("Cannot read directory {}: {}", dir.display(), e);
			return Ok(());
		}
	};

	let mut names = Vec::new();
	for entry in read {
		match entry {
			Ok(e) => names.push(e.file_name()),
			Err(e) => debug!("Error reading directory entry: {}", e),
		}
	}
	names.sort();

	for name in names {
		let name = name.to_string_lossy().into_owned();
		let rel = if prefix.is_empty() { name.clone() } else { format!("{}/{}", prefix, name) };
		let path = dir.join(&name);

		let meta = match fs::symlink_metadata(&path) {
			Ok(m) => m,
			Err(e) => {
				warn!("Cannot access {}: {}", path.display(), e);
				continue;
			}
		};

		let file_type = meta.file_type();
		if matcher.is_ignored(&rel, file_type.is_dir()) {
			continue;
		}

		let mode = permission_bits(&meta);
		if file_type.is_symlink() {
			match fs::read_link(&path) {
				Ok(target) => {
					let mut entry = InventoryEntry::symlink(&rel, &target.to_string_lossy());
					entry.mode = mode;
					out.push(entry);
				}
				Err(e) => warn!("Cannot read link {}: {}", path.display(), e),
			}
		} else if file_type.is_dir() {
			out.push(InventoryEntry::dir(&rel, mode));
			walk_dir(&path, &rel, matcher, out)?;
		} else if file_type.is_file() {
			let mtime = FileTime::from_last_modification_time(&meta).unix_seconds();
			out.push(InventoryEntry::file(&rel, meta.len() as i64, mtime, mode));
		} else {
			debug!("Skipping special file {}", path.display());
		}
	}

	Ok(())
}

#[cfg(unix)]
pub(crate) fn permission_bits(meta: &fs::Metadata) -> u32 {
	use std::os::unix::fs::PermissionsExt;
	meta.permissions().mode() & PERM_BITS
}

#[cfg(not(unix))]
pub(crate) fn permission_bits(_meta: &fs::Metadata) -> u32 {
	0
}

#[cfg(test)]
mod tests {
	use super::*;
	use filetime::set_file_mtime;
	use tempfile::TempDir;

	#[test]
	fn test_walk_lists_files_dirs_and_links() {
		let tmp = TempDir::new().unwrap();
		let root = tmp.path();
		fs::create_dir_all(root.join("a/b")).unwrap();
		fs::write(root.join("a/b/file.txt"), b"hello").unwrap();
		fs::write(root.join("top.txt"), b"x").unwrap();
		set_file_mtime(root.join("top.txt"), FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
		#[cfg(unix)]
		std::os::unix::fs::symlink("top.txt", root.join("link")).unwrap();

		let inv = build(root, &IgnoreMatcher::default()).unwrap();
		let paths: Vec<&str> = inv.iter().map(|e| e.path.as_str()).collect();
		assert!(paths.contains(&"a"));
		assert!(paths.contains(&"a/b"));
		assert!(paths.contains(&"a/b/file.txt"));

		let top = inv.get("top.txt").unwrap();
		assert_eq!(top.size, 1);
		assert_eq!(top.modified_at, 1_700_000_000);
		assert!(top.is_file());
		assert!(inv.get("a").unwrap().is_dir);

		#[cfg(unix)]
		assert_eq!(inv.get("link").unwrap().symlink, "top.txt");
	}

	#[test]
	fn test_walk_skips_ignored_subtrees() {
		let tmp = TempDir::new().unwrap();
		let root = tmp.path();
		fs::create_dir_all(root.join(".git/objects")).unwrap();
		fs::write(root.join(".git/objects/x"), b"1").unwrap();
		fs::write(root.join("keep.rs"), b"1").unwrap();
		fs::write(root.join(".tmp-unisync-123.tmp"), b"partial").unwrap();

		let matcher = IgnoreMatcher::new(&[".git/".to_string()]).unwrap();
		let inv = build(root, &matcher).unwrap();
		assert_eq!(inv.len(), 1);
		assert!(inv.get("keep.rs").is_some());
	}

	#[test]
	fn test_missing_root_is_error() {
		let tmp = TempDir::new().unwrap();
		assert!(build(&tmp.path().join("nope"), &IgnoreMatcher::default()).is_err());
	}
}

// vim: ts=4
