//! Directory inventories
//!
//! An [`Inventory`] is a snapshot of one side of the sync: every path under the root
//! (relative, slash-separated) with its kind, size, modification time, permission bits
//! and symlink target. Inventories travel over the wire in RESLIST and are persisted as
//! the sync cache.

mod join;
mod walk;

pub use join::{join, JoinedEntry};
pub use walk::build;
pub(crate) use walk::permission_bits;

use serde::{Deserialize, Serialize};

fn is_zero(v: &i64) -> bool {
	*v == 0
}

fn is_false(v: &bool) -> bool {
	!*v
}

/// One path of an inventory
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InventoryEntry {
	pub path: String,

	/// File size in bytes (files only)
	#[serde(default, skip_serializing_if = "is_zero")]
	pub size: i64,

	/// Unix seconds (files only)
	#[serde(default, skip_serializing_if = "is_zero")]
	pub modified_at: i64,

	#[serde(default, skip_serializing_if = "is_false")]
	pub is_dir: bool,

	/// Link target, empty for anything but symlinks
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub symlink: String,

	/// Permission bits, 0 when unknown
	#[serde(default)]
	pub mode: u32,
}

impl InventoryEntry {
	pub fn file(path: &str, size: i64, modified_at: i64, mode: u32) -> Self {
		InventoryEntry { path: path.to_string(), size, modified_at, mode, ..Default::default() }
	}

	pub fn dir(path: &str, mode: u32) -> Self {
		InventoryEntry { path: path.to_string(), is_dir: true, mode, ..Default::default() }
	}

	pub fn symlink(path: &str, target: &str) -> Self {
		InventoryEntry { path: path.to_string(), symlink: target.to_string(), ..Default::default() }
	}

	pub fn is_symlink(&self) -> bool {
		!self.symlink.is_empty()
	}

	pub fn is_file(&self) -> bool {
		!self.is_dir && !self.is_symlink()
	}

	/// Number of path components
	pub fn depth(&self) -> usize {
		path_depth(&self.path)
	}

	/// Same kind and same content: size and mtime for files, target for symlinks.
	/// Permission bits are not part of the content.
	pub fn same_content(&self, other: &InventoryEntry) -> bool {
		if self.is_dir || other.is_dir {
			return self.is_dir == other.is_dir;
		}
		if self.is_symlink() || other.is_symlink() {
			return self.symlink == other.symlink;
		}
		self.size == other.size && self.modified_at == other.modified_at
	}
}

/// Number of components of a slash-separated path
pub fn path_depth(path: &str) -> usize {
	path.split('/').filter(|s| !s.is_empty()).count()
}

/// True when `long` lies strictly below `short`, compared by whole components
pub fn is_below(long: &str, short: &str) -> bool {
	let mut long_parts = long.split('/').filter(|s| !s.is_empty());
	for part in short.split('/').filter(|s| !s.is_empty()) {
		if long_parts.next() != Some(part) {
			return false;
		}
	}
	long_parts.next().is_some()
}

/// Snapshot of one side of the sync
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
	entries: Vec<InventoryEntry>,
}

impl Inventory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, entry: InventoryEntry) {
		self.entries.push(entry);
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, InventoryEntry> {
		self.entries.iter()
	}

	pub fn get(&self, path: &str) -> Option<&InventoryEntry> {
		self.entries.iter().find(|e| e.path == path)
	}

	pub fn entries(&self) -> &[InventoryEntry] {
		&self.entries
	}
}

impl From<Vec<InventoryEntry>> for Inventory {
	fn from(entries: Vec<InventoryEntry>) -> Self {
		Inventory { entries }
	}
}

impl FromIterator<InventoryEntry> for Inventory {
	fn from_iter<I: IntoIterator<Item = InventoryEntry>>(iter: I) -> Self {
		Inventory { entries: iter.into_iter().collect() }
	}
}

impl<'a> IntoIterator for &'a Inventory {
	type Item = &'a InventoryEntry;
	type IntoIter = std::slice::Iter<'a, InventoryEntry>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.iter()
	}
}


// vim: ts=4
