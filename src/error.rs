//! Error types for unisync operations

use std::error::Error;
use std::fmt;
use std::io;

use crate::protocol::ProtocolError;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// I/O error
	Io(io::Error),

	/// Invalid configuration
	InvalidConfig { message: String },

	/// Connection error (nested)
	Connection(ConnectionError),

	/// Protocol error (nested)
	Protocol(ProtocolError),

	/// State error (nested)
	State(StateError),

	/// Config error (nested)
	Config(ConfigError),

	/// Generic error message
	Other { message: String },
}

impl SyncError {
	/// Whether the error ends the connection (and the orchestration should reconnect)
	pub fn is_fatal(&self) -> bool {
		match self {
			SyncError::Protocol(e) => e.is_fatal(),
			_ => true,
		}
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Connection(e) => write!(f, "Connection error: {}", e),
			SyncError::Protocol(e) => write!(f, "Protocol error: {}", e),
			SyncError::State(e) => write!(f, "State error: {}", e),
			SyncError::Config(e) => write!(f, "Config error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<ConnectionError> for SyncError {
	fn from(e: ConnectionError) -> Self {
		SyncError::Connection(e)
	}
}

impl From<ProtocolError> for SyncError {
	fn from(e: ProtocolError) -> Self {
		SyncError::Protocol(e)
	}
}

impl From<StateError> for SyncError {
	fn from(e: StateError) -> Self {
		SyncError::State(e)
	}
}

impl From<ConfigError> for SyncError {
	fn from(e: ConfigError) -> Self {
		SyncError::Config(e)
	}
}

/// Connection-specific errors
#[derive(Debug)]
pub enum ConnectionError {
	/// SSH subprocess failed to start
	SshFailed { host: String, source: io::Error },

	/// Subprocess spawn failed
	SpawnFailed { cmd: String, source: io::Error },

	/// Protocol handshake failed
	HandshakeFailed { message: String },

	/// Stdio unavailable
	StdioUnavailable { what: String },
}

impl fmt::Display for ConnectionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConnectionError::SshFailed { host, source } => {
				write!(f, "SSH connection to {} failed: {}", host, source)
			}
			ConnectionError::SpawnFailed { cmd, source } => {
				write!(f, "Failed to spawn '{}': {}", cmd, source)
			}
			ConnectionError::HandshakeFailed { message } => {
				write!(f, "Handshake failed: {}", message)
			}
			ConnectionError::StdioUnavailable { what } => {
				write!(f, "Stdio unavailable: {}", what)
			}
		}
	}
}

impl Error for ConnectionError {}

/// Cache persistence errors
#[derive(Debug)]
pub enum StateError {
	/// Failed to load state
	LoadFailed { source: Box<dyn Error + Send + Sync> },

	/// Failed to save state
	SaveFailed { source: Box<dyn Error + Send + Sync> },

	/// State file is corrupted
	Corrupted { message: String },

	/// Invalid state directory
	InvalidDirectory { path: String },
}

impl fmt::Display for StateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateError::LoadFailed { source } => write!(f, "Failed to load cache: {}", source),
			StateError::SaveFailed { source } => write!(f, "Failed to save cache: {}", source),
			StateError::Corrupted { message } => write!(f, "Cache corrupted: {}", message),
			StateError::InvalidDirectory { path } => {
				write!(f, "Invalid cache directory: {}", path)
			}
		}
	}
}

impl Error for StateError {}

/// Config file errors
#[derive(Debug)]
pub enum ConfigError {
	/// Config file could not be read
	ReadFailed { path: String, source: io::Error },

	/// Config file could not be parsed
	ParseFailed { path: String, message: String },

	/// A value failed validation
	Invalid { message: String },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::ReadFailed { path, source } => {
				write!(f, "Cannot read config {}: {}", path, source)
			}
			ConfigError::ParseFailed { path, message } => {
				write!(f, "Cannot parse config {}: {}", path, message)
			}
			ConfigError::Invalid { message } => write!(f, "{}", message),
		}
	}
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_protocol_errors_keep_fatality() {
		let per_op: SyncError =
			ProtocolError::Remote { err: "denied".into(), path: "a.txt".into() }.into();
		assert!(!per_op.is_fatal());

		let fatal: SyncError = ProtocolError::Closed.into();
		assert!(fatal.is_fatal());
	}

	#[test]
	fn test_display_includes_context() {
		let err = ConnectionError::SpawnFailed {
			cmd: "ssh host unisync serve".into(),
			source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
		};
		assert!(err.to_string().contains("ssh host unisync serve"));

		let err = ConfigError::Invalid { message: "local path is required".into() };
		assert_eq!(SyncError::from(err).to_string(), "Config error: local path is required");
	}
}

// vim: ts=4
