//! Polling fallback: re-walk the tree and diff it against the previous walk

use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::WatchSignal;
use crate::done::Done;
use crate::exclusion::IgnoreMatcher;
use crate::inventory::{self, join, Inventory};
use crate::logging::*;

pub(super) struct PollSource {
	stop: Done<()>,
	task: JoinHandle<()>,
}

impl PollSource {
	pub(super) fn start(root: PathBuf, ignore: IgnoreMatcher, signal: WatchSignal, interval: Duration) -> Self {
		let stop = Done::new();
		let task = tokio::spawn(poll_loop(root, ignore, signal, interval, stop.clone()));
		PollSource { stop, task }
	}
}

impl Drop for PollSource {
	fn drop(&mut self) {
		self.stop.set(());
		self.task.abort();
	}
}

async fn walk(root: &PathBuf, ignore: &IgnoreMatcher) -> Option<Inventory> {
	let (root, ignore) = (root.clone(), ignore.clone());
	match tokio::task::spawn_blocking(move || inventory::build(&root, &ignore)).await {
		Ok(Ok(inv)) => Some(inv),
		Ok(Err(e)) => {
			warn!("Poll walk failed: {}", e);
			None
		}
		Err(e) => {
			warn!("Poll walk panicked: {}", e);
			None
		}
	}
}

/// Paths that differ between two walks
pub(super) fn changes(current: &Inventory, previous: &Inventory) -> Vec<String> {
	let empty = Inventory::new();
	join(current, previous, &empty)
		.into_iter()
		.filter(|j| j.sides_differ())
		.map(|j| j.path.to_string())
		.collect()
}

async fn poll_loop(root: PathBuf, ignore: IgnoreMatcher, signal: WatchSignal, interval: Duration, stop: Done<()>) {
	let mut previous = walk(&root, &ignore).await.unwrap_or_default();
	loop {
		tokio::select! {
			_ = stop.wait() => return,
			_ = tokio::time::sleep(interval) => {}
		}
		let current = match walk(&root, &ignore).await {
			Some(inv) => inv,
			None => continue,
		};
		for path in changes(&current, &previous) {
			signal.send(&path);
		}
		previous = current;
	}
}


// vim: ts=4
