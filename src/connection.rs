//! Transports carrying the protocol stream
//!
//! Every transport ends up as a boxed reader/writer pair. The client side spawns the
//! server as a subprocess (through ssh, or locally); the server side speaks on its own
//! stdin/stdout.

use std::process::Stdio;

use crate::config::Config;
use crate::error::ConnectionError;
use crate::logging::*;
use crate::protocol::{BoxedReader, BoxedWriter};
use crate::strategies::Method;

/// An established byte stream to the peer
pub struct Connection {
	pub reader: BoxedReader,
	pub writer: BoxedWriter,

	/// Subprocess serving the other end, killed when dropped
	pub child: Option<tokio::process::Child>,
}

impl std::fmt::Debug for Connection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Connection").field("pid", &self.child.as_ref().and_then(|c| c.id())).finish()
	}
}

/// Argument vector for the configured transport
pub fn command_line(config: &Config) -> Vec<String> {
	let mut argv: Vec<String> = Vec::new();
	if config.method == Method::Ssh {
		argv.extend(config.ssh_command.split_whitespace().map(String::from));
		if let Some(port) = config.port {
			argv.push("-p".to_string());
			argv.push(port.to_string());
		}
		match &config.user {
			Some(user) if !user.is_empty() => argv.push(format!("{}@{}", user, config.host)),
			_ => argv.push(config.host.clone()),
		}
	}
	argv.extend(config.remote_command.split_whitespace().map(String::from));
	argv
}

impl Connection {
	/// Spawn the server for `config` and attach to its stdio
	pub async fn connect(config: &Config) -> Result<Connection, ConnectionError> {
		let argv = command_line(config);
		let (program, args) = argv.split_first().ok_or_else(|| ConnectionError::SpawnFailed {
			cmd: String::new(),
			source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line"),
		})?;
		debug!("Spawning {}", argv.join(" "));

		let mut child = tokio::process::Command::new(program)
			.args(args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| match config.method {
				Method::Ssh => ConnectionError::SshFailed { host: config.host.clone(), source: e },
				Method::Local => ConnectionError::SpawnFailed { cmd: argv.join(" "), source: e },
			})?;

		let stdin = child
			.stdin
			.take()
			.ok_or(ConnectionError::StdioUnavailable { what: "stdin".to_string() })?;
		let stdout = child
			.stdout
			.take()
			.ok_or(ConnectionError::StdioUnavailable { what: "stdout".to_string() })?;

		Ok(Connection { reader: Box::new(stdout), writer: Box::new(stdin), child: Some(child) })
	}

	/// This process's stdin/stdout, for `serve`
	pub fn stdio() -> Connection {
		Connection {
			reader: Box::new(tokio::io::stdin()),
			writer: Box::new(tokio::io::stdout()),
			child: None,
		}
	}

	pub fn into_parts(self) -> (BoxedReader, BoxedWriter, Option<tokio::process::Child>) {
		(self.reader, self.writer, self.child)
	}
}


// vim: ts=4
