//! Client side of a sync connection
//!
//! The client owns the local tree, the cache and the plan. One cycle lists both
//! sides, merges them against the cache and executes the plan through the node;
//! the run loop repeats the cycle whenever either side reports a change.

mod execute;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::connection::Connection;
use crate::error::{ConfigError, ConnectionError, SyncError};
use crate::exclusion::IgnoreMatcher;
use crate::inventory::Inventory;
use crate::logging::*;
use crate::plan::{self, SyncPlan};
use crate::progress::ProgressReporter;
use crate::protocol::{
	BoxedReader, BoxedWriter, Command, CommandKind, Hello, LocalTree, Node, Packet, ProtocolError, ReqList,
};
use crate::state::CacheStore;
use crate::strategies::WatchMode;
use crate::watcher::Watcher;

pub struct Client {
	node: Arc<Node>,
	config: Arc<Config>,
	tree: LocalTree,
	matcher: IgnoreMatcher,
	cache: CacheStore,
	watcher: Watcher,
	remote_changed: Arc<Notify>,
	progress: Option<ProgressReporter>,
	basepath: String,
	tasks: Vec<JoinHandle<()>>,
}

impl Drop for Client {
	fn drop(&mut self) {
		for task in &self.tasks {
			task.abort();
		}
	}
}

fn expand_home(path: &str) -> PathBuf {
	match (path.strip_prefix("~/"), std::env::var("HOME")) {
		(Some(rest), Ok(home)) => PathBuf::from(home).join(rest),
		_ => PathBuf::from(path),
	}
}

// FSEVENT wakes the run loop, PROGRESS is only logged
async fn handle_side(mut side_rx: mpsc::Receiver<Packet>, remote_changed: Arc<Notify>) {
	while let Some(packet) = side_rx.recv().await {
		match packet.command {
			Command::FsEvent(e) => {
				debug!("Remote change: {}", e.path);
				remote_changed.notify_one();
			}
			Command::Progress(p) => info!("Remote transfer {}% (eta {}s)", p.percent, p.eta),
			other => debug!("Ignoring {} on the side channel", other.kind()),
		}
	}
}

impl Client {
	/// Start a session over an established stream: HELLO, then WHATSUP
	pub async fn connect(
		reader: BoxedReader,
		writer: BoxedWriter,
		config: Arc<Config>,
	) -> Result<Client, SyncError> {
		let matcher = IgnoreMatcher::new(&config.ignore)
			.map_err(|e| ConfigError::Invalid { message: e.to_string() })?;
		let cache_dir = config.cache_dir()?;

		let root = expand_home(&config.local);
		tokio::fs::create_dir_all(&root).await?;
		let root = tokio::fs::canonicalize(&root).await?;
		let tree = LocalTree::new(root, config.modes(), true)
			.with_tmpdir(config.local_tmpdir.clone())
			.with_chunk_size(config.chunk_size);

		let (node, side_rx) = Node::new(reader, writer);
		let node = Arc::new(node);
		let remote_changed = Arc::new(Notify::new());
		let mut tasks = vec![tokio::spawn(handle_side(side_rx, Arc::clone(&remote_changed)))];

		let hello = Hello {
			remote: config.remote.clone(),
			ignore: config.ignore.clone(),
			modes: config.modes(),
			tmpdir: config.remote_tmpdir.clone(),
			chunk_size: config.chunk_size,
			progress: config.progress,
			watch: config.watch,
			poll_interval_secs: config.poll_interval_secs,
		};
		let basepath = match node.request(&Command::Hello(hello), CommandKind::Whatsup).await {
			Ok(Packet { command: Command::Whatsup(w), .. }) => w.basepath,
			Ok(other) => {
				return Err(ConnectionError::HandshakeFailed {
					message: format!("unexpected {}", other.command.kind()),
				}
				.into())
			}
			Err(e @ ProtocolError::Remote { .. }) => {
				return Err(ConnectionError::HandshakeFailed { message: e.message() }.into())
			}
			Err(e) => return Err(e.into()),
		};
		info!("Connected: {} <-> {}:{}", tree.root().display(), config.host, basepath);

		let local_id = tree.root().to_string_lossy().into_owned();
		let cache = CacheStore::new(&cache_dir, config.name.as_deref(), &local_id, &basepath, &config.host);

		let progress = if config.progress {
			let (reporter, mut rx) = ProgressReporter::channel();
			tasks.push(tokio::spawn(async move {
				while let Some(p) = rx.recv().await {
					info!("Upload {}% (eta {}s)", p.percent, p.eta);
				}
			}));
			Some(reporter)
		} else {
			None
		};

		let watcher = Watcher::start(
			tree.root(),
			matcher.clone(),
			config.watch,
			Duration::from_secs(config.poll_interval_secs.max(1)),
		);

		Ok(Client {
			node,
			config,
			tree,
			matcher,
			cache,
			watcher,
			remote_changed,
			progress,
			basepath,
			tasks,
		})
	}

	/// Absolute remote root reported by the server
	pub fn basepath(&self) -> &str {
		&self.basepath
	}

	pub fn tree(&self) -> &LocalTree {
		&self.tree
	}

	pub fn cache(&self) -> &CacheStore {
		&self.cache
	}

	/// REQLIST: the remote inventory
	pub async fn request_list(&self) -> Result<Inventory, ProtocolError> {
		let packet = self.node.request(&Command::ReqList(ReqList::default()), CommandKind::ResList).await?;
		match packet.command {
			Command::ResList(r) => Ok(r.filelist),
			other => Err(self.node.fail(ProtocolError::UnexpectedReply {
				expected: "RESLIST".into(),
				got: other.kind().to_string(),
			})),
		}
	}

	/// Both inventories and the plan that reconciles them
	pub async fn plan(&mut self) -> Result<(Inventory, SyncPlan), SyncError> {
		let local = self.tree.inventory(&self.matcher).await?;
		let remote = self.request_list().await?;
		let cache = self.cache.load().await;
		let plan = plan::build(&local, &remote, cache, self.config.prefer, self.config.modes());
		Ok((local, plan))
	}

	/// One cycle. Returns true when the sides were already in sync, in which case the
	/// cache is updated; otherwise the plan has been executed.
	pub async fn sync_once(&mut self) -> Result<bool, SyncError> {
		self.watcher.ready();
		let (local, plan) = self.plan().await?;
		if plan.is_synced() {
			if let Err(e) = self.cache.save(&local).await {
				warn!("{}", e);
			}
			debug!("In sync ({} entries)", local.len());
			return Ok(true);
		}
		info!("{}", plan);
		self.execute(&plan).await?;
		Ok(false)
	}

	/// Repeat cycles until in sync or out of attempts
	pub async fn sync(&mut self) -> Result<bool, SyncError> {
		for attempt in 1..=self.config.max_sync_attempts {
			match self.sync_once().await {
				Ok(true) => return Ok(true),
				Ok(false) => debug!("Cycle {} applied changes", attempt),
				Err(e) if !e.is_fatal() => warn!("Cycle {} failed: {}", attempt, e),
				Err(e) => return Err(e),
			}
		}
		warn!("Not in sync after {} attempts, waiting for the next change", self.config.max_sync_attempts);
		Ok(false)
	}

	/// Sync, then wait for a change on either side, forever
	pub async fn run(&mut self) -> Result<(), SyncError> {
		loop {
			self.sync().await?;
			tokio::select! {
				path = self.watcher.changed() => debug!("Local change: {}", path),
				_ = self.remote_changed.notified() => {}
				err = self.node.closed() => return Err(err.into()),
			}
		}
	}
}

async fn session(config: &Arc<Config>, once: bool) -> Result<(), SyncError> {
	let (reader, writer, _child) = Connection::connect(config).await?.into_parts();
	let mut client = Client::connect(reader, writer, Arc::clone(config)).await?;
	if once || config.watch == WatchMode::Off {
		if client.sync().await? {
			info!("In sync");
		}
		return Ok(());
	}
	client.run().await
}

/// Connect and keep the two trees in sync, reconnecting after failures. With
/// `once` (or watching off) a single sync is made.
pub async fn run(config: Config, once: bool) -> Result<(), SyncError> {
	let config = Arc::new(config);
	loop {
		match session(&config, once).await {
			Ok(()) => return Ok(()),
			Err(e @ SyncError::Config(_)) => return Err(e),
			Err(e) if once => return Err(e),
			Err(e) => error!("{}", e),
		}
		info!("Reconnecting in {}s", config.retry_delay_secs);
		tokio::time::sleep(Duration::from_secs(config.retry_delay_secs)).await;
	}
}

// vim: ts=4
