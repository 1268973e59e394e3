//! Chunked file transfer
//!
//! A file travels as one or more PUSH frames for the same path, each carrying at most
//! `chunk_size` bytes; the last one has `more: false` and may be empty. The receiver
//! writes into a temporary file and renames it over the target only after the last
//! chunk, then applies the declared modification time.

use filetime::FileTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::commands::{Command, CommandKind, Push};
use super::error::ProtocolError;
use super::file_operations::LocalTree;
use super::node::{Body, Node};
use crate::logging::*;
use crate::progress::ProgressReporter;

const WRITE_BUFFER: usize = 64 * 1024;

// Fill `buf` unless the file ends first
async fn read_full(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
	let mut filled = 0;
	while filled < buf.len() {
		let n = file.read(&mut buf[filled..]).await?;
		if n == 0 {
			break;
		}
		filled += n;
	}
	Ok(filled)
}

impl Node {
	/// Send `rel` from `tree` as PUSH chunks.
	///
	/// A file that cannot be read is reported to the peer with ERR, also when some
	/// chunks already went out, and returned as a per-operation error.
	pub async fn send_file(
		&self,
		tree: &LocalTree,
		rel: &str,
		progress: Option<&ProgressReporter>,
	) -> Result<(), ProtocolError> {
		match self.send_chunks(tree, rel, progress).await {
			Err(e) if !e.is_fatal() => {
				warn!("Cannot send {}: {}", rel, e);
				self.send(&Command::err(rel, e.message())).await?;
				Err(e)
			}
			other => other,
		}
	}

	async fn send_chunks(
		&self,
		tree: &LocalTree,
		rel: &str,
		progress: Option<&ProgressReporter>,
	) -> Result<(), ProtocolError> {
		let full = tree.resolve(rel)?;
		let mut file = tokio::fs::File::open(&full).await.map_err(|e| ProtocolError::file(rel, e))?;
		let meta = file.metadata().await.map_err(|e| ProtocolError::file(rel, e))?;
		if !meta.is_file() {
			return Err(ProtocolError::file(rel, "not a regular file"));
		}
		let modified_at = FileTime::from_last_modification_time(&meta).unix_seconds();
		let mode = crate::inventory::permission_bits(&meta);
		let mut meter = progress.map(|p| p.meter(meta.len()));

		let mut buf = vec![0u8; tree.chunk_size()];
		let mut sent: u64 = 0;
		loop {
			let n = read_full(&mut file, &mut buf).await.map_err(|e| ProtocolError::file(rel, e))?;
			let more = n == buf.len();
			let header = Push { path: rel.to_string(), modified_at, mode, length: n as u64, more };
			self.send_with_body(&Command::Push(header), &buf[..n]).await?;
			sent += n as u64;
			if let Some(m) = meter.as_mut() {
				m.advance(n as u64);
			}
			if !more {
				break;
			}
		}
		debug!("Sent {} ({} bytes)", rel, sent);
		Ok(())
	}

	/// Receive a file whose first PUSH frame is `first`. Later frames are taken from
	/// the reply queue.
	///
	/// Local failures (bad path, full disk) skip the rest of the transfer and are
	/// returned as per-operation errors. An ERR from the sender aborts the file. In
	/// every failure case the temporary file is removed.
	pub async fn receive_file(
		&self,
		tree: &LocalTree,
		first: Push,
		body: Option<Body>,
	) -> Result<(), ProtocolError> {
		let rel = first.path.clone();
		let target = match tree.resolve(&rel) {
			Ok(t) => t,
			Err(e) => {
				self.skip_transfer(first, body).await?;
				return Err(e);
			}
		};
		let temp = match tree.create_temp(&rel, &target, first.mode) {
			Ok(t) => t,
			Err(e) => {
				self.skip_transfer(first, body).await?;
				return Err(e);
			}
		};
		let std_file = match temp.as_file().try_clone() {
			Ok(f) => f,
			Err(e) => {
				self.skip_transfer(first, body).await?;
				return Err(ProtocolError::file(&rel, e));
			}
		};
		let mut file = tokio::fs::File::from_std(std_file);

		let mut header = first;
		let mut body = body;
		let mut buf = vec![0u8; WRITE_BUFFER];
		let mut received: u64 = 0;
		loop {
			if let Some(mut b) = body.take() {
				loop {
					let n = b.read(&mut buf).await.map_err(|e| self.fail(e.into()))?;
					if n == 0 {
						break;
					}
					if let Err(e) = file.write_all(&buf[..n]).await {
						drop(b);
						self.skip_transfer(header, None).await?;
						return Err(ProtocolError::file(&rel, e));
					}
					received += n as u64;
				}
			}
			if !header.more {
				break;
			}

			let mut packet = self.wait_for(CommandKind::Push).await?;
			header = match packet.command {
				Command::Push(p) if p.path == rel => p,
				Command::Push(p) => {
					return Err(self.fail(ProtocolError::UnexpectedReply {
						expected: format!("PUSH {}", rel),
						got: format!("PUSH {}", p.path),
					}))
				}
				other => {
					return Err(self.fail(ProtocolError::UnexpectedReply {
						expected: "PUSH".into(),
						got: other.kind().to_string(),
					}))
				}
			};
			body = packet.body.take();
		}

		file.flush().await.map_err(|e| ProtocolError::file(&rel, e))?;
		drop(file);
		temp.persist(&target).map_err(|e| ProtocolError::file(&rel, e.error))?;
		filetime::set_file_mtime(&target, FileTime::from_unix_time(header.modified_at, 0))
			.map_err(|e| ProtocolError::file(&rel, e))?;
		debug!("Received {} ({} bytes)", rel, received);
		Ok(())
	}

	// Consume the remaining frames of a transfer we cannot store
	async fn skip_transfer(&self, mut header: Push, body: Option<Body>) -> Result<(), ProtocolError> {
		drop(body);
		while header.more {
			let packet = self.wait_for(CommandKind::Push).await?;
			header = match packet.command {
				Command::Push(p) => p,
				other => {
					return Err(self.fail(ProtocolError::UnexpectedReply {
						expected: "PUSH".into(),
						got: other.kind().to_string(),
					}))
				}
			};
		}
		Ok(())
	}
}

// vim: ts=4
