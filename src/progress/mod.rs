//! Transfer progress reporting
//!
//! Transfers feed a [`ProgressMeter`]; at most once per [`REPORT_INTERVAL`] it pushes a
//! snapshot into a bounded queue without blocking. A forwarder task drains the queue
//! and sends PROGRESS through the node's serialized write path.

pub mod constants;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use constants::*;

use crate::logging::*;
use crate::protocol::{Command, Node, Progress};

/// Cheap handle creating meters that report into one queue
#[derive(Debug, Clone)]
pub struct ProgressReporter {
	tx: mpsc::Sender<Progress>,
}

impl ProgressReporter {
	pub fn channel() -> (Self, mpsc::Receiver<Progress>) {
		let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
		(ProgressReporter { tx }, rx)
	}

	/// Reporter whose updates are sent as PROGRESS on `node`
	pub fn forward_to(node: Arc<Node>) -> (Self, JoinHandle<()>) {
		let (reporter, mut rx) = Self::channel();
		let task = tokio::spawn(async move {
			while let Some(progress) = rx.recv().await {
				if let Err(e) = node.send(&Command::Progress(progress)).await {
					debug!("Progress forwarder stopped: {}", e);
					break;
				}
			}
		});
		(reporter, task)
	}

	pub fn meter(&self, total: u64) -> ProgressMeter {
		let now = Instant::now();
		ProgressMeter { tx: self.tx.clone(), total, done: 0, started: now, last_report: now }
	}
}

/// Progress of one transfer
#[derive(Debug)]
pub struct ProgressMeter {
	tx: mpsc::Sender<Progress>,
	total: u64,
	done: u64,
	started: Instant,
	last_report: Instant,
}

impl ProgressMeter {
	/// Account `n` more bytes
	pub fn advance(&mut self, n: u64) {
		self.done = self.done.saturating_add(n);
		if self.last_report.elapsed() >= REPORT_INTERVAL {
			self.last_report = Instant::now();
			// a full queue means the peer is behind anyway
			let _ = self.tx.try_send(self.snapshot());
		}
	}

	pub fn snapshot(&self) -> Progress {
		snapshot(self.done, self.total, self.started.elapsed().as_secs())
	}
}

fn snapshot(done: u64, total: u64, elapsed_secs: u64) -> Progress {
	if total == 0 || done >= total {
		return Progress { percent: 100, eta: 0 };
	}
	let percent = (done.saturating_mul(100) / total) as u8;
	let eta = if done == 0 { 0 } else { elapsed_secs.saturating_mul(total - done) / done };
	Progress { percent, eta }
}


// vim: ts=4
