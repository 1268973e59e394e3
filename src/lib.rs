//! # unisync - two-way directory synchronizer
//!
//! unisync keeps a local and a remote directory tree identical. Each side is listed,
//! the two listings are merged against the listing both sides agreed on last time,
//! and the resulting plan is executed over a line-based protocol spoken through any
//! duplex byte stream (usually `ssh host unisync serve`). File changes on either side
//! trigger the next cycle.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use unisync::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("project.toml".as_ref())?;
//!     unisync::client::run(config, true).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Planning without a connection
//!
//! ```rust,ignore
//! use unisync::{inventory, plan, exclusion::IgnoreMatcher};
//!
//! let matcher = IgnoreMatcher::new(&[".git/".to_string()])?;
//! let local = inventory::build("./a".as_ref(), &matcher)?;
//! let remote = inventory::build("./b".as_ref(), &matcher)?;
//! let plan = plan::build(&local, &remote, None, Default::default(), Default::default());
//! println!("{}", plan);
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod done;
pub mod error;
pub mod exclusion;
pub mod inventory;
pub mod logging;
pub mod plan;
pub mod progress;
pub mod protocol;
pub mod serve;
pub mod state;
pub mod strategies;
pub mod watcher;

// Re-export commonly used types and functions
pub use config::{Config, ModeConfig};
pub use error::{ConfigError, ConnectionError, StateError, SyncError};
pub use inventory::{Inventory, InventoryEntry};
pub use plan::{SyncPlan, SyncPlanBuilder};
pub use strategies::{PreferPolicy, WatchMode};

// vim: ts=4
