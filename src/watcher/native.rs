//! Native filesystem events through `notify`

use std::path::{Path, PathBuf};

use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};

use super::WatchSignal;
use crate::logging::*;

pub(super) struct NativeSource {
	_watcher: RecommendedWatcher,
}

fn relative(root: &Path, path: &Path) -> Option<String> {
	let rel = path.strip_prefix(root).ok()?;
	let parts: Vec<String> = rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
	Some(parts.join("/"))
}

fn is_relevant(kind: &EventKind) -> bool {
	match kind {
		EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
		EventKind::Access(_) => false,
		_ => true,
	}
}

impl NativeSource {
	pub(super) fn start(root: &Path, signal: WatchSignal) -> notify::Result<Self> {
		let base: PathBuf = root.to_path_buf();
		let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
			Ok(event) => {
				if !is_relevant(&event.kind) {
					return;
				}
				for path in &event.paths {
					if let Some(rel) = relative(&base, path) {
						signal.send(&rel);
					}
				}
			}
			Err(e) => warn!("Watch error: {}", e),
		})?;
		watcher.watch(root, RecursiveMode::Recursive)?;
		Ok(NativeSource { _watcher: watcher })
	}
}


// vim: ts=4
