//! Server side of a sync connection
//!
//! The server owns the remote tree. It waits for HELLO, then answers requests one at a
//! time until the stream closes. Changes under its root are pushed to the client as
//! FSEVENT once the client has listed the tree.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::connection::Connection;
use crate::error::{ConnectionError, SyncError};
use crate::exclusion::IgnoreMatcher;
use crate::logging::*;
use crate::progress::ProgressReporter;
use crate::protocol::{
	BoxedReader, BoxedWriter, Command, FsEvent, Hello, LocalTree, Node, Packet, ProtocolError, ResList,
	Whatsup,
};
use crate::watcher::Watcher;

/// Everything set up by HELLO
struct Session {
	tree: LocalTree,
	matcher: IgnoreMatcher,
	watcher: Arc<Watcher>,
	events: JoinHandle<()>,
	progress: Option<(ProgressReporter, JoinHandle<()>)>,
}

impl Drop for Session {
	fn drop(&mut self) {
		self.events.abort();
		if let Some((_, task)) = &self.progress {
			task.abort();
		}
	}
}

pub struct Server {
	node: Arc<Node>,
}

// First failing item of a batch decides the reply; the rest are only logged
fn record(first: &mut Option<ProtocolError>, result: Result<(), ProtocolError>) {
	if let Err(e) = result {
		warn!("{}", e);
		if first.is_none() {
			*first = Some(e);
		}
	}
}

impl Server {
	pub fn new(reader: BoxedReader, writer: BoxedWriter) -> Self {
		// Nothing the client sends is asynchronous
		let (node, _side) = Node::with_side_kinds(reader, writer, &[]);
		Server { node: Arc::new(node) }
	}

	/// Serve on this process's stdin/stdout
	pub fn stdio() -> Self {
		let (reader, writer, _) = Connection::stdio().into_parts();
		Self::new(reader, writer)
	}

	/// Handle the connection until the client goes away
	pub async fn run(self) -> Result<(), SyncError> {
		let session = self.handshake().await?;
		loop {
			let packet = match self.node.recv().await {
				Ok(p) => p,
				Err(ProtocolError::Closed) => {
					info!("Client disconnected");
					return Ok(());
				}
				Err(e) => return Err(e.into()),
			};
			self.dispatch(&session, packet).await?;
		}
	}

	async fn handshake(&self) -> Result<Session, SyncError> {
		let packet = self.node.recv().await?;
		let hello = match packet.command {
			Command::Hello(h) => h,
			other => {
				let message = format!("expected HELLO, got {}", other.kind());
				self.node.send(&Command::err("", &message)).await?;
				return Err(ConnectionError::HandshakeFailed { message }.into());
			}
		};

		let session = match self.open_session(&hello).await {
			Ok(s) => s,
			Err(message) => {
				self.node.send(&Command::err(&hello.remote, &message)).await?;
				return Err(ConnectionError::HandshakeFailed { message }.into());
			}
		};

		let basepath = session.tree.root().to_string_lossy().into_owned();
		info!("Serving {}", basepath);
		self.node.send(&Command::Whatsup(Whatsup { basepath })).await?;
		Ok(session)
	}

	async fn open_session(&self, hello: &Hello) -> Result<Session, String> {
		let matcher = IgnoreMatcher::new(&hello.ignore).map_err(|e| e.to_string())?;

		let root = PathBuf::from(&hello.remote);
		tokio::fs::create_dir_all(&root)
			.await
			.map_err(|e| format!("cannot create {}: {}", root.display(), e))?;
		let root = tokio::fs::canonicalize(&root).await.unwrap_or(root);

		let tree = LocalTree::new(root, hello.modes.clone(), false)
			.with_tmpdir(hello.tmpdir.as_ref().map(PathBuf::from))
			.with_chunk_size(hello.chunk_size);

		let watcher = Arc::new(Watcher::start(
			tree.root(),
			matcher.clone(),
			hello.watch,
			Duration::from_secs(hello.poll_interval_secs.max(1)),
		));
		let events = {
			let node = Arc::clone(&self.node);
			let watcher = Arc::clone(&watcher);
			tokio::spawn(async move {
				loop {
					let path = watcher.changed().await;
					if let Err(e) = node.send(&Command::FsEvent(FsEvent { path })).await {
						debug!("Event forwarder stopped: {}", e);
						break;
					}
				}
			})
		};

		let progress = if hello.progress {
			Some(ProgressReporter::forward_to(Arc::clone(&self.node)))
		} else {
			None
		};

		Ok(Session { tree, matcher, watcher, events, progress })
	}

	async fn reply(&self, first: Option<ProtocolError>) -> Result<(), ProtocolError> {
		match first {
			None => self.node.send(&Command::ok()).await,
			Some(e) => self.node.send(&Command::err(e.path().unwrap_or(""), e.message())).await,
		}
	}

	async fn dispatch(&self, session: &Session, mut packet: Packet) -> Result<(), ProtocolError> {
		let tree = &session.tree;
		match packet.command {
			Command::ReqList(req) => {
				if !req.path.is_empty() {
					debug!("REQLIST for {} lists the whole tree", req.path);
				}
				session.watcher.ready();
				match tree.inventory(&session.matcher).await {
					Ok(filelist) => {
						debug!("Listing {} entries", filelist.len());
						self.node.send(&Command::ResList(ResList { filelist })).await
					}
					Err(e) => {
						warn!("Cannot list {}: {}", tree.root().display(), e);
						self.node.send(&Command::err("", e)).await
					}
				}
			}
			Command::Mkdir(m) => {
				let mut first = None;
				for item in &m.dirs {
					record(&mut first, tree.mkdir(&item.path, item.mode).await);
				}
				self.reply(first).await
			}
			Command::Symlink(s) => {
				let mut first = None;
				for item in &s.links {
					record(&mut first, tree.symlink(&item.path, &item.symlink).await);
				}
				self.reply(first).await
			}
			Command::Chmod(c) => {
				let mut first = None;
				for item in &c.actions {
					record(&mut first, tree.chmod(&item.path, item.mode).await);
				}
				self.reply(first).await
			}
			Command::Del(d) => {
				let mut first = None;
				for path in &d.paths {
					record(&mut first, tree.delete(path).await);
				}
				self.reply(first).await
			}
			Command::Pull(p) => {
				let reporter = session.progress.as_ref().map(|(r, _)| r);
				for path in &p.paths {
					match self.node.send_file(tree, path, reporter).await {
						Ok(()) => {}
						Err(e) if !e.is_fatal() => {}
						Err(e) => return Err(e),
					}
				}
				Ok(())
			}
			Command::Push(push) => {
				let path = push.path.clone();
				match self.node.receive_file(tree, push, packet.body.take()).await {
					Ok(()) => self.node.send(&Command::ok()).await,
					Err(e @ ProtocolError::Remote { .. }) => {
						warn!("Upload of {} aborted by client: {}", path, e);
						Ok(())
					}
					Err(e) if !e.is_fatal() => {
						warn!("Cannot store {}: {}", path, e);
						self.node.send(&Command::err(&path, e.message())).await
					}
					Err(e) => Err(e),
				}
			}
			Command::Err(e) => {
				warn!("Client error for {}: {}", e.path, e.err);
				Ok(())
			}
			Command::Ok(_) => {
				debug!("Stray OK from client");
				Ok(())
			}
			Command::Hello(_) => self.node.send(&Command::err("", "session already started")).await,
			other => Err(self.node.fail(ProtocolError::UnexpectedReply {
				expected: "request".into(),
				got: other.kind().to_string(),
			})),
		}
	}
}

/// `unisync serve`: speak the protocol on stdio
pub async fn serve() -> Result<(), SyncError> {
	Server::stdio().run().await
}

// vim: ts=4
