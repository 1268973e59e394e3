//! Three-way merge of local, remote and cached inventories

use std::collections::{BTreeSet, HashMap, HashSet};

use super::{PlanItem, SyncPlan};
use crate::config::{mode_mask, ModeConfig};
use crate::inventory::{join, Inventory, InventoryEntry, JoinedEntry};
use crate::logging::*;
use crate::strategies::PreferPolicy;

/// Build a plan with the given policy and modes. See [`SyncPlanBuilder::build`].
pub fn build(
	local: &Inventory,
	remote: &Inventory,
	cache: Option<&Inventory>,
	prefer: PreferPolicy,
	modes: ModeConfig,
) -> SyncPlan {
	SyncPlanBuilder::new(prefer, modes).build(local, remote, cache)
}

#[derive(Debug, Clone, Copy)]
pub struct SyncPlanBuilder {
	prefer: PreferPolicy,
	modes: ModeConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
	Local,
	Remote,
}

impl Side {
	fn name(self) -> &'static str {
		match self {
			Side::Local => "local",
			Side::Remote => "remote",
		}
	}

	fn other(self) -> Side {
		match self {
			Side::Local => Side::Remote,
			Side::Remote => Side::Local,
		}
	}
}

// Proper ancestors of a relative path, shallowest first
fn ancestors(path: &str) -> impl Iterator<Item = &str> {
	path.match_indices('/').map(move |(i, _)| &path[..i])
}

// Present vs absent, kind and content against the last synced state
fn is_dirty(current: Option<&InventoryEntry>, cached: Option<&InventoryEntry>) -> bool {
	match (current, cached) {
		(None, None) => false,
		(Some(cur), Some(old)) => !cur.same_content(old),
		_ => true,
	}
}

impl SyncPlanBuilder {
	pub fn new(prefer: PreferPolicy, modes: ModeConfig) -> Self {
		SyncPlanBuilder { prefer, modes }
	}

	/// Classify every path of the union of the three inventories.
	///
	/// The cache is ignored when either side is completely empty, so an unpopulated
	/// side is filled instead of emptying the other one. Never fails: conflicts are
	/// resolved by the prefer policy and logged.
	pub fn build(&self, local: &Inventory, remote: &Inventory, cache: Option<&Inventory>) -> SyncPlan {
		let empty = Inventory::new();
		let cache = match cache {
			Some(c) if !local.is_empty() && !remote.is_empty() => c,
			_ => &empty,
		};

		let mut plan = SyncPlan::new();
		for entry in join(local, remote, cache) {
			self.classify(&entry, &mut plan);
		}
		self.complete_parents(local, remote, Side::Remote, &mut plan);
		self.complete_parents(remote, local, Side::Local, &mut plan);
		plan.finish();
		plan
	}

	fn classify(&self, entry: &JoinedEntry<'_>, plan: &mut SyncPlan) {
		let (local, remote, cache) = (entry.local, entry.remote, entry.cache);

		match (local, remote) {
			(None, None) => return,
			(Some(l), Some(r)) if l.is_dir != r.is_dir => {
				// The directory survives, the other kind is removed
				warn!("Type conflict on {}: keeping the directory", entry.path);
				if l.is_dir {
					plan.remote_del.push(PlanItem::from(r));
				} else {
					plan.local_del.push(PlanItem::from(l));
				}
				return;
			}
			_ => {}
		}

		if let (Some(l), Some(r)) = (local, remote) {
			if l.same_content(r) {
				self.compare_modes(l, r, cache, plan);
				return;
			}
		}

		let local_dirty = is_dirty(local, cache);
		let remote_dirty = is_dirty(remote, cache);
		let winner = match (local_dirty, remote_dirty) {
			(true, false) => Side::Local,
			(false, true) => Side::Remote,
			(both, _) => {
				let winner = self.resolve(local, remote);
				if both {
					warn!("Conflict on {}: changed on both sides, {} wins", entry.path, winner.name());
				} else {
					debug!("No history for {}: {} wins", entry.path, winner.name());
				}
				winner
			}
		};

		match winner {
			Side::Local => self.propagate(local, remote, Side::Remote, entry.path, plan),
			Side::Remote => self.propagate(remote, local, Side::Local, entry.path, plan),
		}
	}

	fn resolve(&self, local: Option<&InventoryEntry>, remote: Option<&InventoryEntry>) -> Side {
		let local_wins = match (local, remote) {
			(Some(l), Some(r)) => self.prefer.local_wins(l.modified_at, r.modified_at),
			// A deletion never beats existing data on timestamps
			(Some(_), None) if self.prefer.is_time_based() => true,
			(None, Some(_)) if self.prefer.is_time_based() => false,
			_ => self.prefer.local_wins(0, 0),
		};
		if local_wins {
			Side::Local
		} else {
			Side::Remote
		}
	}

	/// Make `target` side look like `src`
	fn propagate(
		&self,
		src: Option<&InventoryEntry>,
		dst: Option<&InventoryEntry>,
		target: Side,
		path: &str,
		plan: &mut SyncPlan,
	) {
		let to_local = target == Side::Local;
		let src = match src {
			Some(s) => s,
			None => {
				if let Some(d) = dst {
					let list = if to_local { &mut plan.local_del } else { &mut plan.remote_del };
					list.push(PlanItem::from(d));
				} else {
					debug!("Nothing to propagate for {}", path);
				}
				return;
			}
		};

		if src.is_dir {
			let base = self.modes.dir_default(to_local);
			let mode = if src.mode != 0 { mode_mask(base, src.mode, self.modes.dir_mask) } else { base };
			let item = PlanItem { mode, ..PlanItem::from(src) };
			if to_local {
				plan.local_mkdir.push(item);
			} else {
				plan.remote_mkdir.push(item);
			}
		} else if src.is_symlink() {
			if to_local {
				plan.local_symlink.push(PlanItem::from(src));
			} else {
				plan.remote_symlink.push(PlanItem::from(src));
			}
		} else {
			let base = match dst {
				Some(d) if d.mode != 0 && d.is_file() => d.mode,
				_ => self.modes.file_default(to_local),
			};
			let mode =
				if src.mode != 0 { mode_mask(base, src.mode, self.modes.file_mask) } else { base };
			let item = PlanItem { mode, ..PlanItem::from(src) };
			if to_local {
				plan.pull.push(item);
			} else {
				plan.push.push(item);
			}
		}
	}

	/// Everything created on `target` needs its ancestors there as directories.
	///
	/// A directory delete on the source side is dropped when content below it is
	/// propagated, and every ancestor missing on `target` gets a mkdir.
	fn complete_parents(&self, src: &Inventory, dst: &Inventory, target: Side, plan: &mut SyncPlan) {
		let to_local = target == Side::Local;
		let creates = if to_local {
			plan.pull.iter().chain(&plan.local_mkdir).chain(&plan.local_symlink)
		} else {
			plan.push.iter().chain(&plan.remote_mkdir).chain(&plan.remote_symlink)
		};
		let needed: BTreeSet<String> = creates.flat_map(|i| ancestors(&i.path)).map(str::to_string).collect();
		if needed.is_empty() {
			return;
		}

		let (src_del, dst_mkdir) = if to_local {
			(&mut plan.remote_del, &mut plan.local_mkdir)
		} else {
			(&mut plan.local_del, &mut plan.remote_mkdir)
		};
		src_del.retain(|d| {
			let keep = !d.is_dir || !needed.contains(&d.path);
			if !keep {
				debug!("Keeping {} on the {} side: content below it survives", d.path, target.other().name());
			}
			keep
		});

		let src_dirs: HashMap<&str, &InventoryEntry> =
			src.iter().filter(|e| e.is_dir).map(|e| (e.path.as_str(), e)).collect();
		let mut existing: HashSet<String> = dst.iter().filter(|e| e.is_dir).map(|e| e.path.clone()).collect();
		existing.extend(dst_mkdir.iter().map(|m| m.path.clone()));
		for dir in &needed {
			if existing.contains(dir) {
				continue;
			}
			let base = self.modes.dir_default(to_local);
			let mode = match src_dirs.get(dir.as_str()) {
				Some(e) if e.mode != 0 => mode_mask(base, e.mode, self.modes.dir_mask),
				_ => base,
			};
			debug!("Creating missing parent {} on the {} side", dir, target.name());
			dst_mkdir.push(PlanItem { path: dir.clone(), mode, is_dir: true, symlink: String::new() });
		}
	}

	fn compare_modes(
		&self,
		local: &InventoryEntry,
		remote: &InventoryEntry,
		cache: Option<&InventoryEntry>,
		plan: &mut SyncPlan,
	) {
		if local.is_symlink() || local.mode == 0 || remote.mode == 0 {
			return;
		}
		let mask = self.modes.mask(local.is_dir);
		if local.mode & mask == remote.mode & mask {
			return;
		}

		let mode_dirty = |e: &InventoryEntry| match cache {
			Some(c) if c.mode != 0 => c.mode & mask != e.mode & mask,
			_ => true,
		};
		let winner = match (mode_dirty(local), mode_dirty(remote)) {
			(true, false) => Side::Local,
			(false, true) => Side::Remote,
			_ => {
				let winner = self.resolve(Some(local), Some(remote));
				debug!("Mode conflict on {}: {} wins", local.path, winner.name());
				winner
			}
		};

		match winner {
			Side::Local => plan.remote_chmod.push(PlanItem {
				mode: mode_mask(remote.mode, local.mode, mask),
				..PlanItem::from(remote)
			}),
			Side::Remote => plan.local_chmod.push(PlanItem {
				mode: mode_mask(local.mode, remote.mode, mask),
				..PlanItem::from(local)
			}),
		}
	}
}


// vim: ts=4
