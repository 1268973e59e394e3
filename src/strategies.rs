//! Strategy and mode enums
//!
//! Each enum parses from lowercase strings (config files and CLI) and
//! displays back in the same form.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// PREFER POLICY
// ============================================================================

/// Which side wins when both sides changed, or when there is no cache to tell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PreferPolicy {
	/// Greater modification time wins, local on ties
	#[default]
	Newest,

	/// Smaller modification time wins, local on ties
	Oldest,

	/// Local always wins
	Local,

	/// Remote always wins
	Remote,
}

impl FromStr for PreferPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"newest" => Ok(Self::Newest),
			"oldest" => Ok(Self::Oldest),
			"local" => Ok(Self::Local),
			"remote" => Ok(Self::Remote),
			_ => Err(format!(
				"Unknown prefer policy: {}. Valid options: newest, oldest, local, remote",
				s
			)),
		}
	}
}

impl std::fmt::Display for PreferPolicy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Newest => write!(f, "newest"),
			Self::Oldest => write!(f, "oldest"),
			Self::Local => write!(f, "local"),
			Self::Remote => write!(f, "remote"),
		}
	}
}

impl PreferPolicy {
	/// Decide a conflict between two timestamps. Returns true when local wins.
	pub fn local_wins(self, local_mtime: i64, remote_mtime: i64) -> bool {
		match self {
			Self::Newest => local_mtime >= remote_mtime,
			Self::Oldest => local_mtime <= remote_mtime,
			Self::Local => true,
			Self::Remote => false,
		}
	}

	/// Whether the policy looks at timestamps at all
	pub fn is_time_based(self) -> bool {
		matches!(self, Self::Newest | Self::Oldest)
	}
}

// ============================================================================
// WATCH MODE
// ============================================================================

/// Source of filesystem change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WatchMode {
	/// Native OS notifications, polling when they are unavailable
	#[default]
	Notify,

	/// Periodic re-walk of the tree
	Poll,

	/// No change notifications
	Off,
}

impl FromStr for WatchMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"notify" | "native" => Ok(Self::Notify),
			"poll" => Ok(Self::Poll),
			"off" | "none" => Ok(Self::Off),
			_ => Err(format!("Unknown watch mode: {}. Valid options: notify, poll, off", s)),
		}
	}
}

impl std::fmt::Display for WatchMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Notify => write!(f, "notify"),
			Self::Poll => write!(f, "poll"),
			Self::Off => write!(f, "off"),
		}
	}
}

// ============================================================================
// CONNECTION METHOD
// ============================================================================

/// How the client reaches the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
	/// External ssh subprocess running the remote command
	#[default]
	Ssh,

	/// Local subprocess running the remote command
	Local,
}

impl FromStr for Method {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"ssh" => Ok(Self::Ssh),
			"local" => Ok(Self::Local),
			_ => Err(format!("Unknown connection method: {}. Valid options: ssh, local", s)),
		}
	}
}

impl std::fmt::Display for Method {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Ssh => write!(f, "ssh"),
			Self::Local => write!(f, "local"),
		}
	}
}


// vim: ts=4
