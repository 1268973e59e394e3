//! Three-way join of inventories by path

use std::collections::BTreeMap;

use super::{Inventory, InventoryEntry};

/// Local, remote and cached state of one path. Any of them may be absent.
#[derive(Debug, Clone, Copy)]
pub struct JoinedEntry<'a> {
	pub path: &'a str,
	pub local: Option<&'a InventoryEntry>,
	pub remote: Option<&'a InventoryEntry>,
	pub cache: Option<&'a InventoryEntry>,
}

impl<'a> JoinedEntry<'a> {
	/// Whether local and remote disagree in existence, kind, content or mode
	pub fn sides_differ(&self) -> bool {
		match (self.local, self.remote) {
			(None, None) => false,
			(Some(l), Some(r)) => !l.same_content(r) || l.mode != r.mode,
			_ => true,
		}
	}
}

/// Union of all paths of the three inventories, in path order
pub fn join<'a>(
	local: &'a Inventory,
	remote: &'a Inventory,
	cache: &'a Inventory,
) -> Vec<JoinedEntry<'a>> {
	let mut index: BTreeMap<&'a str, JoinedEntry<'a>> = BTreeMap::new();

	fn slot<'m, 'e>(
		index: &'m mut BTreeMap<&'e str, JoinedEntry<'e>>,
		path: &'e str,
	) -> &'m mut JoinedEntry<'e> {
		index.entry(path).or_insert(JoinedEntry { path, local: None, remote: None, cache: None })
	}

	for entry in local {
		slot(&mut index, &entry.path).local = Some(entry);
	}
	for entry in remote {
		slot(&mut index, &entry.path).remote = Some(entry);
	}
	for entry in cache {
		slot(&mut index, &entry.path).cache = Some(entry);
	}

	index.into_values().collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_join_union() {
		let local: Inventory = vec![InventoryEntry::file("a", 1, 1, 0), InventoryEntry::dir("d", 0)].into();
		let remote: Inventory = vec![InventoryEntry::file("a", 2, 1, 0)].into();
		let cache: Inventory = vec![InventoryEntry::file("gone", 1, 1, 0)].into();

		let joined = join(&local, &remote, &cache);
		let paths: Vec<&str> = joined.iter().map(|j| j.path).collect();
		assert_eq!(paths, vec!["a", "d", "gone"]);

		assert!(joined[0].local.is_some() && joined[0].remote.is_some());
		assert!(joined[0].sides_differ());
		assert!(joined[1].remote.is_none());
		assert!(joined[2].local.is_none() && joined[2].remote.is_none() && joined[2].cache.is_some());
		assert!(!joined[2].sides_differ());
	}
}

// vim: ts=4
