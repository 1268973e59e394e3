//! Wire commands
//!
//! Every frame is one line `KEYWORD <json>\n`. PUSH additionally declares a body of
//! `length` raw bytes that follows the line immediately.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ProtocolError;
use crate::config::{ModeConfig, DEFAULT_CHUNK_SIZE};
use crate::inventory::Inventory;
use crate::strategies::WatchMode;

// ============================================================================
// KEYWORDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
	Hello,
	Whatsup,
	ReqList,
	ResList,
	Mkdir,
	Symlink,
	Chmod,
	Del,
	Pull,
	Push,
	Ok,
	Err,
	FsEvent,
	Progress,
}

/// Kinds delivered on the side queue instead of the reply queue
pub const SIDE_KINDS: &[CommandKind] = &[CommandKind::FsEvent, CommandKind::Progress];

impl CommandKind {
	pub fn keyword(self) -> &'static str {
		match self {
			CommandKind::Hello => "HELLO",
			CommandKind::Whatsup => "WHATSUP",
			CommandKind::ReqList => "REQLIST",
			CommandKind::ResList => "RESLIST",
			CommandKind::Mkdir => "MKDIR",
			CommandKind::Symlink => "SYMLINK",
			CommandKind::Chmod => "CHMOD",
			CommandKind::Del => "DEL",
			CommandKind::Pull => "PULL",
			CommandKind::Push => "PUSH",
			CommandKind::Ok => "OK",
			CommandKind::Err => "ERR",
			CommandKind::FsEvent => "FSEVENT",
			CommandKind::Progress => "PROGRESS",
		}
	}

	pub fn from_keyword(keyword: &str) -> Option<Self> {
		let kind = match keyword {
			"HELLO" => CommandKind::Hello,
			"WHATSUP" => CommandKind::Whatsup,
			"REQLIST" => CommandKind::ReqList,
			"RESLIST" => CommandKind::ResList,
			"MKDIR" => CommandKind::Mkdir,
			"SYMLINK" => CommandKind::Symlink,
			"CHMOD" => CommandKind::Chmod,
			"DEL" => CommandKind::Del,
			"PULL" => CommandKind::Pull,
			"PUSH" => CommandKind::Push,
			"OK" => CommandKind::Ok,
			"ERR" => CommandKind::Err,
			"FSEVENT" => CommandKind::FsEvent,
			"PROGRESS" => CommandKind::Progress,
			_ => return None,
		};
		Some(kind)
	}
}

impl fmt::Display for CommandKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.keyword())
	}
}

// ============================================================================
// PAYLOADS
// ============================================================================

fn default_chunk_size() -> usize {
	DEFAULT_CHUNK_SIZE
}

fn default_poll_interval() -> u64 {
	2
}

/// Session setup sent by the client as the first command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hello {
	/// Root directory on the server
	pub remote: String,
	#[serde(default)]
	pub ignore: Vec<String>,
	#[serde(default)]
	pub modes: ModeConfig,
	/// Directory for partial files on the server
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tmpdir: Option<String>,
	#[serde(default = "default_chunk_size")]
	pub chunk_size: usize,
	/// Whether the server should emit PROGRESS
	#[serde(default)]
	pub progress: bool,
	/// How the server watches its tree
	#[serde(default)]
	pub watch: WatchMode,
	#[serde(default = "default_poll_interval")]
	pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whatsup {
	/// Absolute root as seen by the server
	pub basepath: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqList {
	#[serde(default)]
	pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResList {
	pub filelist: Inventory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeItem {
	pub path: String,
	#[serde(default)]
	pub mode: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkItem {
	pub path: String,
	pub symlink: String,
	#[serde(default)]
	pub mode: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mkdir {
	pub dirs: Vec<ModeItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symlink {
	pub links: Vec<LinkItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chmod {
	pub actions: Vec<ModeItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Del {
	pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pull {
	pub paths: Vec<String>,
}

/// One chunk of a file transfer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Push {
	pub path: String,
	pub modified_at: i64,
	#[serde(default)]
	pub mode: u32,
	/// Bytes of body following this line
	pub length: u64,
	/// Another chunk of the same file follows
	pub more: bool,
}

/// Payload of OK
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {}

/// Payload of ERR
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
	pub err: String,
	#[serde(default)]
	pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsEvent {
	pub path: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
	/// 0..=100
	pub percent: u8,
	/// Estimated seconds left
	pub eta: u64,
}

// ============================================================================
// COMMAND
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	Hello(Hello),
	Whatsup(Whatsup),
	ReqList(ReqList),
	ResList(ResList),
	Mkdir(Mkdir),
	Symlink(Symlink),
	Chmod(Chmod),
	Del(Del),
	Pull(Pull),
	Push(Push),
	Ok(Ack),
	Err(ErrorReply),
	FsEvent(FsEvent),
	Progress(Progress),
}

fn parse<T: DeserializeOwned>(kind: CommandKind, payload: &str) -> Result<T, ProtocolError> {
	serde_json::from_str(payload)
		.map_err(|e| ProtocolError::Decode(format!("invalid {} payload: {}", kind, e)))
}

impl Command {
	pub fn ok() -> Self {
		Command::Ok(Ack {})
	}

	pub fn err(path: &str, err: impl fmt::Display) -> Self {
		Command::Err(ErrorReply { err: err.to_string(), path: path.to_string() })
	}

	pub fn kind(&self) -> CommandKind {
		match self {
			Command::Hello(_) => CommandKind::Hello,
			Command::Whatsup(_) => CommandKind::Whatsup,
			Command::ReqList(_) => CommandKind::ReqList,
			Command::ResList(_) => CommandKind::ResList,
			Command::Mkdir(_) => CommandKind::Mkdir,
			Command::Symlink(_) => CommandKind::Symlink,
			Command::Chmod(_) => CommandKind::Chmod,
			Command::Del(_) => CommandKind::Del,
			Command::Pull(_) => CommandKind::Pull,
			Command::Push(_) => CommandKind::Push,
			Command::Ok(_) => CommandKind::Ok,
			Command::Err(_) => CommandKind::Err,
			Command::FsEvent(_) => CommandKind::FsEvent,
			Command::Progress(_) => CommandKind::Progress,
		}
	}

	/// Raw bytes following the command line
	pub fn body_len(&self) -> u64 {
		match self {
			Command::Push(p) => p.length,
			_ => 0,
		}
	}

	fn payload_json(&self) -> Result<String, serde_json::Error> {
		match self {
			Command::Hello(p) => serde_json::to_string(p),
			Command::Whatsup(p) => serde_json::to_string(p),
			Command::ReqList(p) => serde_json::to_string(p),
			Command::ResList(p) => serde_json::to_string(p),
			Command::Mkdir(p) => serde_json::to_string(p),
			Command::Symlink(p) => serde_json::to_string(p),
			Command::Chmod(p) => serde_json::to_string(p),
			Command::Del(p) => serde_json::to_string(p),
			Command::Pull(p) => serde_json::to_string(p),
			Command::Push(p) => serde_json::to_string(p),
			Command::Ok(p) => serde_json::to_string(p),
			Command::Err(p) => serde_json::to_string(p),
			Command::FsEvent(p) => serde_json::to_string(p),
			Command::Progress(p) => serde_json::to_string(p),
		}
	}

	/// Encode the command line, newline included
	pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
		let json = self.payload_json().map_err(|e| ProtocolError::Encode(e.to_string()))?;
		Ok(format!("{} {}\n", self.kind(), json).into_bytes())
	}

	/// Decode one command line. Unknown keywords are a decode error.
	pub fn decode(line: &str) -> Result<Self, ProtocolError> {
		let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
		let (keyword, payload) = line.split_once(' ').unwrap_or((line, ""));
		let payload = if payload.trim().is_empty() { "{}" } else { payload };

		let kind = CommandKind::from_keyword(keyword)
			.ok_or_else(|| ProtocolError::Decode(format!("unknown command {:?}", keyword)))?;

		let command = match kind {
			CommandKind::Hello => Command::Hello(parse(kind, payload)?),
			CommandKind::Whatsup => Command::Whatsup(parse(kind, payload)?),
			CommandKind::ReqList => Command::ReqList(parse(kind, payload)?),
			CommandKind::ResList => Command::ResList(parse(kind, payload)?),
			CommandKind::Mkdir => Command::Mkdir(parse(kind, payload)?),
			CommandKind::Symlink => Command::Symlink(parse(kind, payload)?),
			CommandKind::Chmod => Command::Chmod(parse(kind, payload)?),
			CommandKind::Del => Command::Del(parse(kind, payload)?),
			CommandKind::Pull => Command::Pull(parse(kind, payload)?),
			CommandKind::Push => Command::Push(parse(kind, payload)?),
			CommandKind::Ok => Command::Ok(parse(kind, payload)?),
			CommandKind::Err => Command::Err(parse(kind, payload)?),
			CommandKind::FsEvent => Command::FsEvent(parse(kind, payload)?),
			CommandKind::Progress => Command::Progress(parse(kind, payload)?),
		};
		Ok(command)
	}
}


// vim: ts=4
