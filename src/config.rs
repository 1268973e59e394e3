//! Client configuration
//!
//! A single `Config` value is loaded once (TOML or JSON5 file), validated, wrapped in
//! an `Arc` and handed to every component that needs it. The server side receives the
//! subset it needs through the HELLO command.

use crate::error::ConfigError;
use crate::strategies::{Method, PreferPolicy, WatchMode};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

/// Permission bits carried across the wire and through the masks
pub const PERM_BITS: u32 = 0o777;

/// Default size of one PUSH chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// Largest chunk either side will buffer, whatever the peer asks for
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

// ============================================================================
// PERMISSION MODES
// ============================================================================

/// Permission value written as an octal string in config files (`"0644"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mode(pub u32);

impl Mode {
	pub fn bits(self) -> u32 {
		self.0 & PERM_BITS
	}

	pub fn parse(s: &str) -> Result<Self, String> {
		let trimmed = s.trim();
		let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
		u32::from_str_radix(digits, 8)
			.map(Mode)
			.map_err(|_| format!("Invalid octal mode: {}", s))
	}
}

impl fmt::Display for Mode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:04o}", self.0)
	}
}

impl Serialize for Mode {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_string())
	}
}

struct ModeVisitor;

impl<'de> Visitor<'de> for ModeVisitor {
	type Value = Mode;

	fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str("an octal permission string or an integer")
	}

	fn visit_str<E: de::Error>(self, v: &str) -> Result<Mode, E> {
		Mode::parse(v).map_err(E::custom)
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> Result<Mode, E> {
		u32::try_from(v).map(Mode).map_err(|_| E::custom(format!("mode out of range: {}", v)))
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> Result<Mode, E> {
		u32::try_from(v).map(Mode).map_err(|_| E::custom(format!("mode out of range: {}", v)))
	}

	fn visit_f64<E: de::Error>(self, v: f64) -> Result<Mode, E> {
		if v.fract() != 0.0 || v < 0.0 || v > f64::from(u32::MAX) {
			return Err(E::custom(format!("mode out of range: {}", v)));
		}
		Ok(Mode(v as u32))
	}
}

impl<'de> Deserialize<'de> for Mode {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		deserializer.deserialize_any(ModeVisitor)
	}
}

/// Combine two modes: bits selected by `mask` come from `new`, the rest from `base`
pub fn mode_mask(base: u32, new: u32, mask: u32) -> u32 {
	((new & mask) | (base & !mask)) & PERM_BITS
}

/// Default modes and masks for both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeConfig {
	pub local_file: u32,
	pub local_dir: u32,
	pub remote_file: u32,
	pub remote_dir: u32,
	pub file_mask: u32,
	pub dir_mask: u32,
}

impl Default for ModeConfig {
	fn default() -> Self {
		ModeConfig {
			local_file: 0o644,
			local_dir: 0o755,
			remote_file: 0o644,
			remote_dir: 0o755,
			file_mask: 0o100,
			dir_mask: 0,
		}
	}
}

impl ModeConfig {
	/// Mode given to new files on one side
	pub fn file_default(&self, local: bool) -> u32 {
		if local {
			self.local_file
		} else {
			self.remote_file
		}
	}

	/// Mode given to new directories on one side
	pub fn dir_default(&self, local: bool) -> u32 {
		if local {
			self.local_dir
		} else {
			self.remote_dir
		}
	}

	/// Which permission bits are synchronized
	pub fn mask(&self, is_dir: bool) -> u32 {
		if is_dir {
			self.dir_mask
		} else {
			self.file_mask
		}
	}
}

// ============================================================================
// MAIN CONFIGURATION STRUCT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	// ========================================================================
	// IDENTITY
	// ========================================================================
	/// Profile name; names the cache file when set
	pub name: Option<String>,

	/// Local root directory
	pub local: String,

	/// Remote root directory
	pub remote: String,

	/// Remote host (ssh method)
	pub host: String,

	/// Remote user (ssh method)
	pub user: Option<String>,

	/// Remote ssh port
	pub port: Option<u16>,

	// ========================================================================
	// TRANSPORT
	// ========================================================================
	pub method: Method,

	/// Executable used for the ssh method
	pub ssh_command: String,

	/// Command line started on the far side, must speak the protocol on stdio
	pub remote_command: String,

	// ========================================================================
	// SYNC BEHAVIOR
	// ========================================================================
	pub prefer: PreferPolicy,

	/// Gitignore-style patterns applied on both sides
	pub ignore: Vec<String>,

	pub chmod_local: Mode,
	pub chmod_local_dir: Mode,
	pub chmod_remote: Mode,
	pub chmod_remote_dir: Mode,
	pub chmod_mask: Mode,
	pub chmod_dir_mask: Mode,

	/// Directory for partial downloads (defaults to the target's own directory)
	pub local_tmpdir: Option<PathBuf>,

	/// Directory for partial uploads on the remote side
	pub remote_tmpdir: Option<String>,

	/// Bytes per PUSH chunk
	pub chunk_size: usize,

	/// Send PROGRESS updates from the server
	pub progress: bool,

	// ========================================================================
	// ORCHESTRATION
	// ========================================================================
	/// Delay between reconnect attempts
	pub retry_delay_secs: u64,

	/// Plan/execute rounds per cycle before giving up until the next change
	pub max_sync_attempts: u32,

	pub watch: WatchMode,

	/// Interval of the polling watcher
	pub poll_interval_secs: u64,

	/// Cache directory (defaults to ~/.unisync)
	pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			name: None,
			local: String::new(),
			remote: String::new(),
			host: String::new(),
			user: None,
			port: None,
			method: Method::default(),
			ssh_command: "ssh".to_string(),
			remote_command: "unisync serve".to_string(),
			prefer: PreferPolicy::Newest,
			ignore: Vec::new(),
			chmod_local: Mode(0o644),
			chmod_local_dir: Mode(0o755),
			chmod_remote: Mode(0o644),
			chmod_remote_dir: Mode(0o755),
			chmod_mask: Mode(0o100),
			chmod_dir_mask: Mode(0),
			local_tmpdir: None,
			remote_tmpdir: None,
			chunk_size: DEFAULT_CHUNK_SIZE,
			progress: true,
			retry_delay_secs: 5,
			max_sync_attempts: 3,
			watch: WatchMode::default(),
			poll_interval_secs: 2,
			cache_dir: None,
		}
	}
}

impl Config {
	/// Load a config file: TOML for `.toml`, JSON5 (plain JSON included) otherwise
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let display = path.display().to_string();
		let contents = std::fs::read_to_string(path)
			.map_err(|e| ConfigError::ReadFailed { path: display.clone(), source: e })?;

		let is_toml = path.extension().map(|ext| ext == "toml").unwrap_or(false);
		let config = if is_toml {
			Self::from_toml_str(&contents)
		} else {
			Self::from_json5_str(&contents)
		}
		.map_err(|message| ConfigError::ParseFailed { path: display, message })?;

		config.validate()?;
		Ok(config)
	}

	pub fn from_toml_str(s: &str) -> Result<Self, String> {
		toml::from_str(s).map_err(|e| e.to_string())
	}

	pub fn from_json5_str(s: &str) -> Result<Self, String> {
		json5::from_str(s).map_err(|e| e.to_string())
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.local.is_empty() {
			return Err(ConfigError::Invalid { message: "local path is required".into() });
		}
		if self.remote.is_empty() {
			return Err(ConfigError::Invalid { message: "remote path is required".into() });
		}
		if self.method == Method::Ssh && self.host.is_empty() {
			return Err(ConfigError::Invalid {
				message: "host is required for the ssh method".into(),
			});
		}
		if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
			return Err(ConfigError::Invalid {
				message: format!("chunk_size must be between 1 and {}", MAX_CHUNK_SIZE),
			});
		}
		if self.max_sync_attempts == 0 {
			return Err(ConfigError::Invalid {
				message: "max_sync_attempts must be at least 1".into(),
			});
		}
		for mode in [
			self.chmod_local,
			self.chmod_local_dir,
			self.chmod_remote,
			self.chmod_remote_dir,
			self.chmod_mask,
			self.chmod_dir_mask,
		] {
			if mode.0 & !PERM_BITS != 0 {
				return Err(ConfigError::Invalid {
					message: format!("permission value {} has bits outside 0777", mode),
				});
			}
		}
		Ok(())
	}

	pub fn modes(&self) -> ModeConfig {
		ModeConfig {
			local_file: self.chmod_local.bits(),
			local_dir: self.chmod_local_dir.bits(),
			remote_file: self.chmod_remote.bits(),
			remote_dir: self.chmod_remote_dir.bits(),
			file_mask: self.chmod_mask.bits(),
			dir_mask: self.chmod_dir_mask.bits(),
		}
	}

	/// Directory holding cache files, created on demand by the cache store
	pub fn cache_dir(&self) -> Result<PathBuf, ConfigError> {
		if let Some(dir) = &self.cache_dir {
			return Ok(dir.clone());
		}
		std::env::var("HOME")
			.map(|home| PathBuf::from(home).join(".unisync"))
			.map_err(|_| ConfigError::Invalid {
				message: "Could not determine HOME directory!".into(),
			})
	}
}


// vim: ts=4
