//! Protocol error types
//!
//! Errors are split in two classes. Connection-fatal errors end the read loop and are
//! broadcast to every waiter; per-operation errors concern one path and leave the
//! connection usable.

use std::fmt;
use std::io;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
	/// I/O error on the connection stream
	Io { kind: io::ErrorKind, message: String },
	/// Undecodable line or unknown keyword
	Decode(String),
	/// Command could not be serialized
	Encode(String),
	/// A reply of the wrong type, or an out-of-order frame
	UnexpectedReply { expected: String, got: String },
	/// The peer closed the stream
	Closed,
	/// The peer answered ERR for a path
	Remote { err: String, path: String },
	/// A local operation on one path failed
	File { path: String, message: String },
}

impl ProtocolError {
	/// Build a per-path failure
	pub fn file(path: &str, err: impl fmt::Display) -> Self {
		ProtocolError::File { path: path.to_string(), message: err.to_string() }
	}

	/// Whether the connection is unusable after this error
	pub fn is_fatal(&self) -> bool {
		!matches!(self, ProtocolError::Remote { .. } | ProtocolError::File { .. })
	}

	/// Path a per-operation error refers to
	pub fn path(&self) -> Option<&str> {
		match self {
			ProtocolError::Remote { path, .. } | ProtocolError::File { path, .. } => Some(path),
			_ => None,
		}
	}

	/// Message suitable for an ERR reply
	pub fn message(&self) -> String {
		match self {
			ProtocolError::Remote { err, .. } => err.clone(),
			ProtocolError::File { message, .. } => message.clone(),
			other => other.to_string(),
		}
	}
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolError::Io { message, .. } => write!(f, "I/O error: {}", message),
			ProtocolError::Decode(msg) => write!(f, "Decode error: {}", msg),
			ProtocolError::Encode(msg) => write!(f, "Encode error: {}", msg),
			ProtocolError::UnexpectedReply { expected, got } => {
				write!(f, "Protocol violation: expected {}, got {}", expected, got)
			}
			ProtocolError::Closed => write!(f, "Connection closed"),
			ProtocolError::Remote { err, path } => write!(f, "Remote error on {}: {}", path, err),
			ProtocolError::File { path, message } => write!(f, "{}: {}", path, message),
		}
	}
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for ProtocolError {
	fn from(e: io::Error) -> Self {
		if e.kind() == io::ErrorKind::UnexpectedEof {
			return ProtocolError::Closed;
		}
		ProtocolError::Io { kind: e.kind(), message: e.to_string() }
	}
}

impl From<serde_json::Error> for ProtocolError {
	fn from(e: serde_json::Error) -> Self {
		ProtocolError::Decode(e.to_string())
	}
}


// vim: ts=4
