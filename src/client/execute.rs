//! Plan execution
//!
//! Structural changes go first (deletes, directories, links, modes, each local side
//! before the remote one), file bodies last. Per-item failures are logged and left
//! for the next cycle; only connection-fatal errors stop the plan.

use super::Client;
use crate::logging::*;
use crate::plan::{PlanItem, SyncPlan};
use crate::protocol::{
	Chmod, Command, CommandKind, Del, LinkItem, Mkdir, ModeItem, ProtocolError, Pull, Symlink,
};

// Per-operation failures are logged, fatal ones returned
fn tolerate(what: &str, result: Result<(), ProtocolError>) -> Result<(), ProtocolError> {
	match result {
		Err(e) if !e.is_fatal() => {
			warn!("{} failed: {}", what, e);
			Ok(())
		}
		other => other,
	}
}

fn mode_items(items: &[PlanItem]) -> Vec<ModeItem> {
	items.iter().map(|i| ModeItem { path: i.path.clone(), mode: i.mode }).collect()
}

impl Client {
	pub(super) async fn execute(&mut self, plan: &SyncPlan) -> Result<(), ProtocolError> {
		for item in &plan.local_del {
			tolerate("local delete", self.tree.delete(&item.path).await)?;
		}
		if !plan.remote_del.is_empty() {
			let paths = plan.remote_del.iter().map(|i| i.path.clone()).collect();
			self.remote_batch(Command::Del(Del { paths })).await?;
		}

		for item in &plan.local_mkdir {
			tolerate("local mkdir", self.tree.mkdir(&item.path, item.mode).await)?;
		}
		if !plan.remote_mkdir.is_empty() {
			self.remote_batch(Command::Mkdir(Mkdir { dirs: mode_items(&plan.remote_mkdir) })).await?;
		}

		for item in &plan.local_symlink {
			tolerate("local symlink", self.tree.symlink(&item.path, &item.symlink).await)?;
		}
		if !plan.remote_symlink.is_empty() {
			let links = plan
				.remote_symlink
				.iter()
				.map(|i| LinkItem { path: i.path.clone(), symlink: i.symlink.clone(), mode: i.mode })
				.collect();
			self.remote_batch(Command::Symlink(Symlink { links })).await?;
		}

		for item in &plan.local_chmod {
			tolerate("local chmod", self.tree.chmod(&item.path, item.mode).await)?;
		}
		if !plan.remote_chmod.is_empty() {
			self.remote_batch(Command::Chmod(Chmod { actions: mode_items(&plan.remote_chmod) })).await?;
		}

		for item in &plan.push {
			self.push(item).await?;
		}
		if !plan.pull.is_empty() {
			self.pull(&plan.pull).await?;
		}
		Ok(())
	}

	// One batch command, one OK or ERR
	async fn remote_batch(&self, command: Command) -> Result<(), ProtocolError> {
		let what = format!("remote {}", command.kind());
		let result = self.node.request(&command, CommandKind::Ok).await.map(|_| ());
		tolerate(&what, result)
	}

	async fn push(&self, item: &PlanItem) -> Result<(), ProtocolError> {
		match self.node.send_file(&self.tree, &item.path, self.progress.as_ref()).await {
			Ok(()) => {}
			// Already reported to the server with ERR
			Err(e) if !e.is_fatal() => return Ok(()),
			Err(e) => return Err(e),
		}
		let ack = self.node.wait_for(CommandKind::Ok).await.map(|_| ());
		tolerate(&format!("push {}", item.path), ack)
	}

	// PULL is answered per path, in order, with a PUSH sequence or an ERR
	async fn pull(&self, items: &[PlanItem]) -> Result<(), ProtocolError> {
		let paths: Vec<String> = items.iter().map(|i| i.path.clone()).collect();
		self.node.send(&Command::Pull(Pull { paths: paths.clone() })).await?;

		for path in &paths {
			let mut packet = self.node.recv().await?;
			match packet.command {
				Command::Push(push) if push.path == *path => {
					let result = self.node.receive_file(&self.tree, push, packet.body.take()).await;
					tolerate(&format!("pull {}", path), result)?;
				}
				Command::Err(e) => warn!("pull {} failed: {}", path, e.err),
				other => {
					let got = match &other {
						Command::Push(p) => format!("PUSH {}", p.path),
						cmd => cmd.kind().to_string(),
					};
					return Err(self.node.fail(ProtocolError::UnexpectedReply {
						expected: format!("PUSH {}", path),
						got,
					}));
				}
			}
		}
		Ok(())
	}
}

// vim: ts=4
