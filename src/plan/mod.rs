//! Sync plans
//!
//! A [`SyncPlan`] is the categorized outcome of the three-way merge of the local,
//! remote and cached inventories. Executing every list in order brings both sides
//! to the same state; a plan with every list empty means the sides are in sync.

mod builder;

pub use builder::{build, SyncPlanBuilder};

use std::fmt;

use crate::inventory::{is_below, path_depth, InventoryEntry};

/// One action of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanItem {
	pub path: String,

	/// Mode to apply (already masked for chmod and mkdir)
	pub mode: u32,

	pub is_dir: bool,

	/// Link target for symlink actions
	pub symlink: String,
}

impl PlanItem {
	pub fn new(path: &str, mode: u32) -> Self {
		PlanItem { path: path.to_string(), mode, is_dir: false, symlink: String::new() }
	}

	pub fn depth(&self) -> usize {
		path_depth(&self.path)
	}
}

impl From<&InventoryEntry> for PlanItem {
	fn from(entry: &InventoryEntry) -> Self {
		PlanItem {
			path: entry.path.clone(),
			mode: entry.mode,
			is_dir: entry.is_dir,
			symlink: entry.symlink.clone(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
	/// Files sent from local to remote
	pub push: Vec<PlanItem>,
	/// Files fetched from remote to local
	pub pull: Vec<PlanItem>,
	pub local_mkdir: Vec<PlanItem>,
	pub remote_mkdir: Vec<PlanItem>,
	pub local_symlink: Vec<PlanItem>,
	pub remote_symlink: Vec<PlanItem>,
	pub local_chmod: Vec<PlanItem>,
	pub remote_chmod: Vec<PlanItem>,
	pub local_del: Vec<PlanItem>,
	pub remote_del: Vec<PlanItem>,
}

impl SyncPlan {
	pub fn new() -> Self {
		Self::default()
	}

	/// True when there is nothing left to do
	pub fn is_synced(&self) -> bool {
		self.len() == 0
	}

	/// Total number of actions
	pub fn len(&self) -> usize {
		self.lists().iter().map(|l| l.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.is_synced()
	}

	fn lists(&self) -> [&Vec<PlanItem>; 10] {
		[
			&self.push,
			&self.pull,
			&self.local_mkdir,
			&self.remote_mkdir,
			&self.local_symlink,
			&self.remote_symlink,
			&self.local_chmod,
			&self.remote_chmod,
			&self.local_del,
			&self.remote_del,
		]
	}

	/// Order the lists and drop directory deletes for directories the same plan is
	/// about to populate on that side. A file in the way of new content is still
	/// deleted.
	pub(crate) fn finish(&mut self) {
		let local_creates: Vec<String> = self
			.pull
			.iter()
			.chain(&self.local_mkdir)
			.chain(&self.local_symlink)
			.map(|i| i.path.clone())
			.collect();
		let remote_creates: Vec<String> = self
			.push
			.iter()
			.chain(&self.remote_mkdir)
			.chain(&self.remote_symlink)
			.map(|i| i.path.clone())
			.collect();
		self.local_del.retain(|d| !d.is_dir || !local_creates.iter().any(|p| is_below(p, &d.path)));
		self.remote_del.retain(|d| !d.is_dir || !remote_creates.iter().any(|p| is_below(p, &d.path)));

		self.local_mkdir.sort_by_key(|i| i.depth());
		self.remote_mkdir.sort_by_key(|i| i.depth());
		self.local_del.sort_by_key(|i| std::cmp::Reverse(i.depth()));
		self.remote_del.sort_by_key(|i| std::cmp::Reverse(i.depth()));
	}
}

impl fmt::Display for SyncPlan {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"push {}, pull {}, mkdir {}/{}, symlink {}/{}, chmod {}/{}, delete {}/{} (local/remote)",
			self.push.len(),
			self.pull.len(),
			self.local_mkdir.len(),
			self.remote_mkdir.len(),
			self.local_symlink.len(),
			self.remote_symlink.len(),
			self.local_chmod.len(),
			self.remote_chmod.len(),
			self.local_del.len(),
			self.remote_del.len(),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_finish_orders_by_depth() {
		let mut plan = SyncPlan::new();
		for p in ["a/b/c", "a", "a/b"] {
			plan.remote_mkdir.push(PlanItem::new(p, 0o755));
			plan.local_del.push(PlanItem::new(p, 0));
		}
		plan.finish();
		let mk: Vec<&str> = plan.remote_mkdir.iter().map(|i| i.path.as_str()).collect();
		let del: Vec<&str> = plan.local_del.iter().map(|i| i.path.as_str()).collect();
		assert_eq!(mk, vec!["a", "a/b", "a/b/c"]);
		assert_eq!(del, vec!["a/b/c", "a/b", "a"]);
	}

	#[test]
	fn test_finish_keeps_directory_that_gets_content() {
		let mut plan = SyncPlan::new();
		let dir = PlanItem { is_dir: true, ..PlanItem::new("d", 0) };
		plan.local_del.push(dir);
		plan.local_del.push(PlanItem::new("other", 0));
		plan.pull.push(PlanItem::new("d/new.txt", 0o644));
		plan.finish();
		assert_eq!(plan.local_del, vec![PlanItem::new("other", 0)]);
	}

	#[test]
	fn test_finish_keeps_file_delete_below_creates() {
		let mut plan = SyncPlan::new();
		plan.remote_del.push(PlanItem::new("x", 0));
		plan.push.push(PlanItem::new("x/inner", 0o644));
		plan.finish();
		assert_eq!(plan.remote_del.len(), 1);
	}

	#[test]
	fn test_empty_plan_is_synced() {
		let mut plan = SyncPlan::new();
		assert!(plan.is_synced());
		plan.remote_chmod.push(PlanItem::new("x", 0o755));
		assert!(!plan.is_synced());
		assert_eq!(plan.len(), 1);
	}
}

// vim: ts=4
