//! Packet dispatcher
//!
//! A [`Node`] owns both halves of one connection. A background task reads frames,
//! decodes them and routes each packet to the reply queue or, for [`SIDE_KINDS`], to the
//! side queue handed out at construction. When a frame carries a body the stream itself
//! travels with the packet: the read task waits until the consumer drops the [`Body`]
//! before it reads the next line, so bodies are streamed without a second copy and a
//! slow consumer throttles the sender.
//!
//! Any decode or I/O error ends the read task and is stored in a [`Done`] cell; every
//! current and future caller then gets that error.

use std::fmt;
use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use super::commands::{Command, CommandKind, SIDE_KINDS};
use super::error::ProtocolError;
use crate::done::Done;
use crate::logging::*;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

const MAIN_QUEUE: usize = 16;
const SIDE_QUEUE: usize = 64;
const COPY_BUFFER: usize = 64 * 1024;
/// Longest command line accepted; RESLIST carries a whole inventory on one line
const MAX_LINE: usize = 64 * 1024 * 1024;

struct Handback {
	reader: BufReader<BoxedReader>,
	remaining: u64,
}

/// The raw bytes declared by a command, read straight from the connection
pub struct Body {
	reader: Option<BufReader<BoxedReader>>,
	len: u64,
	remaining: u64,
	handback: Option<oneshot::Sender<Handback>>,
}

impl Body {
	/// Declared length
	pub fn len(&self) -> u64 {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Bytes not consumed yet
	pub fn remaining(&self) -> u64 {
		self.remaining
	}

	/// Read up to `buf.len()` bytes of the body. Returns 0 once the body is drained.
	pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if self.remaining == 0 || buf.is_empty() {
			return Ok(0);
		}
		let reader = self
			.reader
			.as_mut()
			.ok_or_else(|| io::Error::new(io::ErrorKind::Other, "body already released"))?;
		let max = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
		let n = reader.read(&mut buf[..max]).await?;
		if n == 0 {
			return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
		}
		self.remaining -= n as u64;
		Ok(n)
	}

	/// Read the whole remaining body into memory
	pub async fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
		let mut out = Vec::with_capacity(self.remaining.min(COPY_BUFFER as u64) as usize);
		let mut buf = vec![0u8; COPY_BUFFER];
		loop {
			let n = self.read(&mut buf).await?;
			if n == 0 {
				return Ok(out);
			}
			out.extend_from_slice(&buf[..n]);
		}
	}
}

impl Drop for Body {
	fn drop(&mut self) {
		if let (Some(reader), Some(tx)) = (self.reader.take(), self.handback.take()) {
			let _ = tx.send(Handback { reader, remaining: self.remaining });
		}
	}
}

impl fmt::Debug for Body {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Body").field("len", &self.len).field("remaining", &self.remaining).finish()
	}
}

/// A decoded command and, for PUSH, its body
#[derive(Debug)]
pub struct Packet {
	pub command: Command,
	pub body: Option<Body>,
}

pub struct Node {
	writer: Mutex<BoxedWriter>,
	main_rx: Mutex<mpsc::Receiver<Packet>>,
	done: Done<ProtocolError>,
	reader_task: JoinHandle<()>,
}

impl Node {
	/// Start the dispatcher. Returns the node and the side queue receiver.
	pub fn new(reader: BoxedReader, writer: BoxedWriter) -> (Node, mpsc::Receiver<Packet>) {
		Self::with_side_kinds(reader, writer, SIDE_KINDS)
	}

	pub fn with_side_kinds(
		reader: BoxedReader,
		writer: BoxedWriter,
		side_kinds: &[CommandKind],
	) -> (Node, mpsc::Receiver<Packet>) {
		Self::start(reader, writer, side_kinds, MAX_LINE)
	}

	fn start(
		reader: BoxedReader,
		writer: BoxedWriter,
		side_kinds: &[CommandKind],
		max_line: usize,
	) -> (Node, mpsc::Receiver<Packet>) {
		let (main_tx, main_rx) = mpsc::channel(MAIN_QUEUE);
		let (side_tx, side_rx) = mpsc::channel(SIDE_QUEUE);
		let done = Done::new();
		let reader_task = tokio::spawn(read_loop(
			BufReader::new(reader),
			main_tx,
			side_tx,
			side_kinds.to_vec(),
			max_line,
			done.clone(),
		));
		let node = Node { writer: Mutex::new(writer), main_rx: Mutex::new(main_rx), done, reader_task };
		(node, side_rx)
	}

	/// The terminal error, if the connection is dead
	pub fn error(&self) -> Option<ProtocolError> {
		self.done.get()
	}

	/// Resolves with the terminal error once the connection dies
	pub async fn closed(&self) -> ProtocolError {
		self.done.wait().await
	}

	/// Mark the connection dead. Returns the error that actually ended it.
	pub fn fail(&self, err: ProtocolError) -> ProtocolError {
		self.done.set(err.clone());
		self.done.get().unwrap_or(err)
	}

	pub async fn send(&self, command: &Command) -> Result<(), ProtocolError> {
		self.send_with_body(command, &[]).await
	}

	/// Write the command line and its body under one lock
	pub async fn send_with_body(&self, command: &Command, body: &[u8]) -> Result<(), ProtocolError> {
		if let Some(err) = self.done.get() {
			return Err(err);
		}
		let line = command.encode()?;
		debug_assert_eq!(command.body_len(), body.len() as u64);

		let mut writer = self.writer.lock().await;
		let result: io::Result<()> = async {
			writer.write_all(&line).await?;
			if !body.is_empty() {
				writer.write_all(body).await?;
			}
			writer.flush().await
		}
		.await;
		drop(writer);

		match result {
			Ok(()) => {
				trace!("-> {}", String::from_utf8_lossy(&line).trim_end());
				Ok(())
			}
			Err(e) => Err(self.fail(e.into())),
		}
	}

	/// Next packet of the reply queue, whatever its kind
	pub async fn recv(&self) -> Result<Packet, ProtocolError> {
		if let Some(err) = self.done.get() {
			return Err(err);
		}
		let mut rx = self.main_rx.lock().await;
		tokio::select! {
			biased;
			packet = rx.recv() => match packet {
				Some(p) => Ok(p),
				None => Err(self.done.get().unwrap_or(ProtocolError::Closed)),
			},
			err = self.done.wait() => Err(err),
		}
	}

	/// Next reply, which must be of `kind`. ERR becomes a per-operation error, any other
	/// kind kills the connection.
	pub async fn wait_for(&self, kind: CommandKind) -> Result<Packet, ProtocolError> {
		let packet = self.recv().await?;
		let got = packet.command.kind();
		if got == kind {
			return Ok(packet);
		}
		if let Command::Err(e) = &packet.command {
			return Err(ProtocolError::Remote { err: e.err.clone(), path: e.path.clone() });
		}
		Err(self.fail(ProtocolError::UnexpectedReply {
			expected: kind.to_string(),
			got: got.to_string(),
		}))
	}

	/// Send `command` and wait for a reply of `kind`
	pub async fn request(&self, command: &Command, kind: CommandKind) -> Result<Packet, ProtocolError> {
		self.send(command).await?;
		self.wait_for(kind).await
	}
}

impl Drop for Node {
	fn drop(&mut self) {
		self.reader_task.abort();
	}
}

async fn read_loop(
	mut reader: BufReader<BoxedReader>,
	main_tx: mpsc::Sender<Packet>,
	side_tx: mpsc::Sender<Packet>,
	side_kinds: Vec<CommandKind>,
	max_line: usize,
	done: Done<ProtocolError>,
) {
	let watch = done.clone();
	let stop = watch.wait();
	tokio::pin!(stop);

	let err = loop {
		let mut line = String::new();
		let read = tokio::select! {
			biased;
			_ = &mut stop => return,
			r = read_line_capped(&mut reader, &mut line, max_line) => r,
		};
		match read {
			Ok(0) => break ProtocolError::Closed,
			Ok(_) => {}
			Err(e) => break e,
		}

		let command = match Command::decode(&line) {
			Ok(c) => c,
			Err(e) => break e,
		};
		trace!("<- {}", line.trim_end());

		let kind = command.kind();
		let to_side = side_kinds.contains(&kind);
		let body_len = command.body_len();

		if body_len == 0 {
			let packet = Packet { command, body: None };
			if to_side {
				if side_tx.send(packet).await.is_err() {
					debug!("Side queue closed, dropping {}", kind);
				}
			} else if main_tx.send(packet).await.is_err() {
				break ProtocolError::Closed;
			}
			continue;
		}

		let (tx, rx) = oneshot::channel();
		let body = Body { reader: Some(reader), len: body_len, remaining: body_len, handback: Some(tx) };
		let packet = Packet { command, body: Some(body) };
		// A packet nobody takes is dropped here, which hands the stream back
		let _ = if to_side { side_tx.send(packet).await } else { main_tx.send(packet).await };

		let handback = tokio::select! {
			biased;
			_ = &mut stop => return,
			h = rx => h,
		};
		let Handback { reader: returned, remaining } = match handback {
			Ok(h) => h,
			Err(_) => break ProtocolError::Decode("body of a frame was never released".into()),
		};
		reader = returned;

		if remaining > 0 {
			debug!("Discarding {} unread body bytes of {}", remaining, kind);
			match tokio::io::copy(&mut (&mut reader).take(remaining), &mut tokio::io::sink()).await {
				Ok(n) if n == remaining => {}
				Ok(_) => break ProtocolError::Closed,
				Err(e) => break e.into(),
			}
		}
	};

	debug!("Read loop ended: {}", err);
	done.set(err);
}

// Never buffers more than `max` bytes of a line
async fn read_line_capped(
	reader: &mut BufReader<BoxedReader>,
	line: &mut String,
	max: usize,
) -> Result<usize, ProtocolError> {
	let n = (&mut *reader).take(max as u64 + 1).read_line(line).await?;
	if n > max {
		return Err(ProtocolError::Decode(format!("command line longer than {} bytes", max)));
	}
	Ok(n)
}


// vim: ts=4
