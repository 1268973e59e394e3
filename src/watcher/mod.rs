//! Change notification with a debounce handshake
//!
//! The watcher starts disarmed: events are observed and dropped. [`Watcher::ready`]
//! clears anything still queued and arms it; the next event that passes the ignore
//! patterns is delivered once and disarms the watcher again. A notification therefore
//! always refers to a change that happened after the last `ready`.
//!
//! Events come from the native OS API (`notify`) or from a polling re-walk of the tree.

mod native;
mod poll;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;

use crate::exclusion::IgnoreMatcher;
use crate::logging::*;
use crate::strategies::WatchMode;

struct State {
	armed: bool,
	pending: Option<String>,
}

struct Shared {
	state: Mutex<State>,
	wakeup: Notify,
	ignore: IgnoreMatcher,
}

impl Shared {
	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}
}

/// Handle the event sources use to report changed paths
#[derive(Clone)]
pub struct WatchSignal {
	shared: Arc<Shared>,
}

impl WatchSignal {
	/// Deliver `path` if the watcher is armed and the path is not ignored
	pub fn send(&self, path: &str) {
		if self.shared.ignore.is_ignored(path, true) {
			trace!("Ignored change: {}", path);
			return;
		}
		{
			let mut state = self.shared.lock();
			if !state.armed {
				return;
			}
			state.armed = false;
			state.pending = Some(path.to_string());
		}
		debug!("Change detected: {}", path);
		self.shared.wakeup.notify_one();
	}
}

enum Source {
	Idle,
	Native(native::NativeSource),
	Poll(poll::PollSource),
}

pub struct Watcher {
	signal: WatchSignal,
	source: Source,
}

impl Watcher {
	/// A watcher without an event source; changes arrive only through [`Watcher::send`]
	pub fn new(ignore: IgnoreMatcher) -> Self {
		let shared = Shared {
			state: Mutex::new(State { armed: false, pending: None }),
			wakeup: Notify::new(),
			ignore,
		};
		Watcher { signal: WatchSignal { shared: Arc::new(shared) }, source: Source::Idle }
	}

	/// Watch `root` with the requested source. A native watcher that cannot start
	/// falls back to polling.
	pub fn start(root: &Path, ignore: IgnoreMatcher, mode: WatchMode, poll_interval: Duration) -> Self {
		let mut watcher = Self::new(ignore.clone());
		let root: PathBuf = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

		watcher.source = match mode {
			WatchMode::Off => Source::Idle,
			WatchMode::Notify => match native::NativeSource::start(&root, watcher.signal()) {
				Ok(source) => {
					info!("Watching {}", root.display());
					Source::Native(source)
				}
				Err(e) => {
					warn!("Native watcher unavailable ({}), polling {} instead", e, root.display());
					Source::Poll(poll::PollSource::start(root, ignore, watcher.signal(), poll_interval))
				}
			},
			WatchMode::Poll => {
				info!("Polling {} every {:?}", root.display(), poll_interval);
				Source::Poll(poll::PollSource::start(root, ignore, watcher.signal(), poll_interval))
			}
		};
		watcher
	}

	pub fn signal(&self) -> WatchSignal {
		self.signal.clone()
	}

	/// Drop queued notifications and arm for the next change
	pub fn ready(&self) {
		let mut state = self.signal.shared.lock();
		state.pending = None;
		state.armed = true;
	}

	/// Report a change by hand
	pub fn send(&self, path: &str) {
		self.signal.send(path);
	}

	/// Wait for the next delivered notification
	pub async fn changed(&self) -> String {
		loop {
			let notified = self.signal.shared.wakeup.notified();
			if let Some(path) = self.try_changed() {
				return path;
			}
			notified.await;
		}
	}

	/// Take a delivered notification without waiting
	pub fn try_changed(&self) -> Option<String> {
		self.signal.shared.lock().pending.take()
	}

	pub fn is_armed(&self) -> bool {
		self.signal.shared.lock().armed
	}

	pub fn mode(&self) -> WatchMode {
		match self.source {
			Source::Idle => WatchMode::Off,
			Source::Native(_) => WatchMode::Notify,
			Source::Poll(_) => WatchMode::Poll,
		}
	}
}


// vim: ts=4
