/// Sync plan tests - the three-way merge of local, remote and cached inventories
///
/// Tests verify:
/// 1. Identical sides with a matching cache produce an empty plan
/// 2. A side that alone differs from the cache always wins, whatever the policy
/// 3. Concurrent changes are resolved by the prefer policy (ties favor local)
/// 4. Directory creation runs parents first, deletion children first
/// 5. Directory/file type conflicts keep the directory
/// 6. New content below a deleted or missing directory recreates the directory
/// 7. The cache is ignored when one side is empty
use unisync::config::ModeConfig;
use unisync::inventory::{Inventory, InventoryEntry};
use unisync::plan::{build, SyncPlan};
use unisync::strategies::PreferPolicy;

const ALL_POLICIES: [PreferPolicy; 4] =
	[PreferPolicy::Newest, PreferPolicy::Oldest, PreferPolicy::Local, PreferPolicy::Remote];

/// Helper to build an inventory from entries
fn inv(entries: Vec<InventoryEntry>) -> Inventory {
	entries.into()
}

/// Helper to plan with default modes
fn plan(local: &Inventory, remote: &Inventory, cache: Option<&Inventory>, prefer: PreferPolicy) -> SyncPlan {
	build(local, remote, cache, prefer, ModeConfig::default())
}

fn paths(items: &[unisync::plan::PlanItem]) -> Vec<&str> {
	items.iter().map(|i| i.path.as_str()).collect()
}

// ===================================================================
// IDEMPOTENCE
// ===================================================================

#[test]
fn test_identical_sides_are_synced() {
	let side = inv(vec![
		InventoryEntry::dir("src", 0o755),
		InventoryEntry::file("src/main.rs", 120, 1_700_000_000, 0o644),
		InventoryEntry::symlink("latest", "src/main.rs"),
	]);
	for prefer in ALL_POLICIES {
		let p = plan(&side, &side, Some(&side), prefer);
		assert!(p.is_synced(), "{:?}: {}", prefer, p);
		assert_eq!(p.len(), 0);
	}
}

#[test]
fn test_deleted_on_both_sides_needs_nothing() {
	let cache = inv(vec![InventoryEntry::file("keep", 1, 1, 0o644), InventoryEntry::file("gone", 1, 1, 0o644)]);
	let side = inv(vec![InventoryEntry::file("keep", 1, 1, 0o644)]);
	assert!(plan(&side, &side, Some(&cache), PreferPolicy::Newest).is_synced());
}

// ===================================================================
// DIRTINESS
// ===================================================================

#[test]
fn test_local_change_always_pushes() {
	let cache = inv(vec![InventoryEntry::file("doc.txt", 1, 100, 0o644)]);
	// Older than the remote copy on purpose: timestamps must not matter
	let local = inv(vec![InventoryEntry::file("doc.txt", 2, 50, 0o644)]);
	for prefer in ALL_POLICIES {
		let p = plan(&local, &cache, Some(&cache), prefer);
		assert_eq!(paths(&p.push), vec!["doc.txt"], "{:?}", prefer);
		assert_eq!(p.len(), 1, "{:?}", prefer);
	}
}

#[test]
fn test_remote_change_always_pulls() {
	let cache = inv(vec![InventoryEntry::file("doc.txt", 1, 100, 0o644)]);
	let remote = inv(vec![InventoryEntry::file("doc.txt", 2, 50, 0o644)]);
	for prefer in ALL_POLICIES {
		let p = plan(&cache, &remote, Some(&cache), prefer);
		assert_eq!(paths(&p.pull), vec!["doc.txt"], "{:?}", prefer);
		assert_eq!(p.len(), 1, "{:?}", prefer);
	}
}

#[test]
fn test_deletion_propagates_from_dirty_side() {
	let cache = inv(vec![InventoryEntry::file("keep", 1, 1, 0o644), InventoryEntry::file("old.log", 9, 9, 0o644)]);
	let local = inv(vec![InventoryEntry::file("keep", 1, 1, 0o644)]);
	for prefer in ALL_POLICIES {
		let p = plan(&local, &cache, Some(&cache), prefer);
		assert_eq!(paths(&p.remote_del), vec!["old.log"], "{:?}", prefer);
		assert!(p.pull.is_empty());

		let p = plan(&cache, &local, Some(&cache), prefer);
		assert_eq!(paths(&p.local_del), vec!["old.log"], "{:?}", prefer);
		assert!(p.push.is_empty());
	}
}

// ===================================================================
// CONFLICT POLICIES
// ===================================================================

#[test]
fn test_concurrent_edit_policies() {
	let cache = inv(vec![InventoryEntry::file("f", 1, 100, 0o644)]);
	let local = inv(vec![InventoryEntry::file("f", 2, 300, 0o644)]);
	let remote = inv(vec![InventoryEntry::file("f", 3, 200, 0o644)]);

	let p = plan(&local, &remote, Some(&cache), PreferPolicy::Newest);
	assert_eq!((p.push.len(), p.pull.len()), (1, 0));

	let p = plan(&local, &remote, Some(&cache), PreferPolicy::Oldest);
	assert_eq!((p.push.len(), p.pull.len()), (0, 1));

	let p = plan(&local, &remote, Some(&cache), PreferPolicy::Local);
	assert_eq!((p.push.len(), p.pull.len()), (1, 0));

	let p = plan(&local, &remote, Some(&cache), PreferPolicy::Remote);
	assert_eq!((p.push.len(), p.pull.len()), (0, 1));
}

#[test]
fn test_timestamp_tie_favors_local() {
	let local = inv(vec![InventoryEntry::file("f", 2, 300, 0o644)]);
	let remote = inv(vec![InventoryEntry::file("f", 3, 300, 0o644)]);
	for prefer in [PreferPolicy::Newest, PreferPolicy::Oldest] {
		let p = plan(&local, &remote, None, prefer);
		assert_eq!(paths(&p.push), vec!["f"], "{:?}", prefer);
		assert!(p.pull.is_empty());
	}
}

#[test]
fn test_fixed_policies_ignore_timestamps() {
	let local = inv(vec![InventoryEntry::file("f", 2, 1, 0o644)]);
	let remote = inv(vec![InventoryEntry::file("f", 3, 999, 0o644)]);
	assert_eq!(paths(&plan(&local, &remote, None, PreferPolicy::Local).push), vec!["f"]);
	assert_eq!(paths(&plan(&remote, &local, None, PreferPolicy::Remote).pull), vec!["f"]);
}

#[test]
fn test_first_sync_newer_local_file_is_pushed() {
	let local = inv(vec![InventoryEntry::file("file.txt", 200, 1_700_000_100, 0o644)]);
	let remote = inv(vec![InventoryEntry::file("file.txt", 150, 1_700_000_000, 0o644)]);
	let p = plan(&local, &remote, None, PreferPolicy::Newest);
	assert_eq!(paths(&p.push), vec!["file.txt"]);
	assert!(p.pull.is_empty());
	assert_eq!(p.len(), 1);
}

#[test]
fn test_first_sync_keeps_one_sided_files() {
	let local = inv(vec![InventoryEntry::file("mine", 1, 1, 0o644)]);
	let remote = inv(vec![InventoryEntry::file("theirs", 1, 1, 0o644)]);
	let p = plan(&local, &remote, None, PreferPolicy::Oldest);
	assert_eq!(paths(&p.push), vec!["mine"]);
	assert_eq!(paths(&p.pull), vec!["theirs"]);
	assert!(p.local_del.is_empty() && p.remote_del.is_empty());
}

// ===================================================================
// ORDERING
// ===================================================================

#[test]
fn test_mkdir_parents_first() {
	let local = inv(vec![
		InventoryEntry::dir("a/b/c", 0o755),
		InventoryEntry::dir("a", 0o755),
		InventoryEntry::dir("a/b", 0o755),
		InventoryEntry::file("keep", 1, 1, 0o644),
	]);
	let remote = inv(vec![InventoryEntry::file("keep", 1, 1, 0o644)]);
	let p = plan(&local, &remote, None, PreferPolicy::Newest);
	assert_eq!(paths(&p.remote_mkdir), vec!["a", "a/b", "a/b/c"]);

	let p = plan(&remote, &local, None, PreferPolicy::Newest);
	assert_eq!(paths(&p.local_mkdir), vec!["a", "a/b", "a/b/c"]);
}

#[test]
fn test_delete_children_first() {
	let full = inv(vec![
		InventoryEntry::dir("a", 0o755),
		InventoryEntry::dir("a/b", 0o755),
		InventoryEntry::dir("a/b/c", 0o755),
		InventoryEntry::file("keep", 1, 1, 0o644),
	]);
	let trimmed = inv(vec![InventoryEntry::file("keep", 1, 1, 0o644)]);
	let p = plan(&trimmed, &full, Some(&full), PreferPolicy::Newest);
	assert_eq!(paths(&p.remote_del), vec!["a/b/c", "a/b", "a"]);
	assert!(p.remote_mkdir.is_empty() && p.local_mkdir.is_empty());
}

// ===================================================================
// TYPE CONFLICTS
// ===================================================================

// The non-directory side is removed, then the directory is created in its place
// for the content below it.
#[test]
fn test_type_conflict_keeps_directory() {
	let local = inv(vec![InventoryEntry::dir("x", 0o755), InventoryEntry::file("x/inner", 3, 10, 0o644)]);
	let remote = inv(vec![InventoryEntry::file("x", 5, 20, 0o644)]);
	for prefer in ALL_POLICIES {
		let p = plan(&local, &remote, None, prefer);
		assert_eq!(paths(&p.remote_del), vec!["x"], "{:?}", prefer);
		assert_eq!(paths(&p.remote_mkdir), vec!["x"], "{:?}", prefer);
		assert_eq!(paths(&p.push), vec!["x/inner"], "{:?}", prefer);
		assert!(p.pull.is_empty());
	}

	let p = plan(&remote, &local, Some(&remote), PreferPolicy::Local);
	assert_eq!(paths(&p.local_del), vec!["x"]);
	assert_eq!(paths(&p.local_mkdir), vec!["x"]);
	assert!(p.remote_del.is_empty());
}

#[test]
fn test_type_conflict_with_symlink() {
	let local = inv(vec![InventoryEntry::symlink("cfg", "/etc/cfg")]);
	let remote = inv(vec![InventoryEntry::dir("cfg", 0o755)]);
	let p = plan(&local, &remote, None, PreferPolicy::Local);
	assert_eq!(paths(&p.local_del), vec!["cfg"]);
	assert!(p.remote_symlink.is_empty());
}

// ===================================================================
// PARENT DIRECTORIES
// ===================================================================

#[test]
fn test_new_file_in_remotely_deleted_dir() {
	let cache = inv(vec![
		InventoryEntry::dir("d", 0o755),
		InventoryEntry::file("d/old", 1, 1, 0o644),
		InventoryEntry::file("k", 1, 1, 0o644),
	]);
	let local = inv(vec![
		InventoryEntry::dir("d", 0o755),
		InventoryEntry::file("d/new", 2, 2, 0o644),
		InventoryEntry::file("d/old", 1, 1, 0o644),
		InventoryEntry::file("k", 1, 1, 0o644),
	]);
	let remote = inv(vec![InventoryEntry::file("k", 1, 1, 0o644)]);

	for prefer in ALL_POLICIES {
		let p = plan(&local, &remote, Some(&cache), prefer);
		assert_eq!(paths(&p.remote_mkdir), vec!["d"], "{:?}", prefer);
		assert_eq!(paths(&p.push), vec!["d/new"], "{:?}", prefer);
		assert_eq!(paths(&p.local_del), vec!["d/old"], "{:?}", prefer);
		assert!(p.remote_del.is_empty() && p.local_mkdir.is_empty());
	}
}

#[test]
fn test_remote_edit_in_locally_deleted_dir() {
	let cache = inv(vec![
		InventoryEntry::dir("d", 0o755),
		InventoryEntry::file("d/f", 1, 1, 0o644),
		InventoryEntry::file("d/g", 1, 1, 0o644),
		InventoryEntry::file("k", 1, 1, 0o644),
	]);
	let local = inv(vec![InventoryEntry::file("k", 1, 1, 0o644)]);
	let remote = inv(vec![
		InventoryEntry::dir("d", 0o755),
		InventoryEntry::file("d/f", 9, 5, 0o644),
		InventoryEntry::file("d/g", 1, 1, 0o644),
		InventoryEntry::file("k", 1, 1, 0o644),
	]);

	// Under `local` the deletion wins the d/f conflict and the whole directory goes
	for prefer in [PreferPolicy::Newest, PreferPolicy::Oldest, PreferPolicy::Remote] {
		let p = plan(&local, &remote, Some(&cache), prefer);
		assert_eq!(paths(&p.local_mkdir), vec!["d"], "{:?}", prefer);
		assert_eq!(paths(&p.pull), vec!["d/f"], "{:?}", prefer);
		assert_eq!(paths(&p.remote_del), vec!["d/g"], "{:?}", prefer);
		assert!(p.local_del.is_empty() && p.remote_mkdir.is_empty());
	}

	let p = plan(&local, &remote, Some(&cache), PreferPolicy::Local);
	assert_eq!(paths(&p.remote_del), vec!["d/f", "d/g", "d"]);
	assert!(p.pull.is_empty() && p.local_mkdir.is_empty());
}

#[test]
fn test_deep_new_file_creates_every_parent() {
	let cache = inv(vec![InventoryEntry::dir("a", 0o755), InventoryEntry::file("k", 1, 1, 0o644)]);
	let local = inv(vec![
		InventoryEntry::dir("a", 0o755),
		InventoryEntry::dir("a/b", 0o755),
		InventoryEntry::file("a/b/c.txt", 1, 1, 0o644),
		InventoryEntry::file("k", 1, 1, 0o644),
	]);
	let remote = inv(vec![InventoryEntry::file("k", 1, 1, 0o644)]);
	let p = plan(&local, &remote, Some(&cache), PreferPolicy::Newest);
	assert_eq!(paths(&p.remote_mkdir), vec!["a", "a/b"]);
	assert!(p.local_del.is_empty());
}

// ===================================================================
// CACHE INVALIDATION
// ===================================================================

#[test]
fn test_empty_side_ignores_cache() {
	let cache = inv(vec![InventoryEntry::file("a", 1, 1, 0o644), InventoryEntry::file("b", 2, 2, 0o644)]);
	let empty = Inventory::new();

	// With the cache trusted this would delete everything locally
	let p = plan(&cache, &empty, Some(&cache), PreferPolicy::Newest);
	assert!(p.local_del.is_empty());
	assert_eq!(paths(&p.push), vec!["a", "b"]);

	let p = plan(&empty, &cache, Some(&cache), PreferPolicy::Newest);
	assert!(p.remote_del.is_empty());
	assert_eq!(paths(&p.pull), vec!["a", "b"]);
}

// ===================================================================
// PERMISSIONS
// ===================================================================

#[test]
fn test_mode_change_follows_dirty_side() {
	let cache = inv(vec![InventoryEntry::file("run.sh", 5, 10, 0o644)]);
	let remote = inv(vec![InventoryEntry::file("run.sh", 5, 10, 0o755)]);
	let p = plan(&cache, &remote, Some(&cache), PreferPolicy::Local);
	assert_eq!(paths(&p.local_chmod), vec!["run.sh"]);
	assert_eq!(p.local_chmod[0].mode, 0o744);
	assert!(p.pull.is_empty() && p.remote_chmod.is_empty());
}

#[test]
fn test_symlinks_never_chmod() {
	let mut local = InventoryEntry::symlink("l", "t");
	local.mode = 0o777;
	let mut remote = InventoryEntry::symlink("l", "t");
	remote.mode = 0o600;
	let p = plan(&inv(vec![local]), &inv(vec![remote]), None, PreferPolicy::Newest);
	assert!(p.is_synced());
}

// vim: ts=4
