//! Logging prelude module for convenient access to tracing macros.
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("synced {} files", n);
//! warn!("cannot chmod {}: {}", path, err);
//! ```

pub use tracing::{debug, error, info, trace, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// `RUST_LOG` takes precedence; otherwise `default_level` is used. Output always
/// goes to stderr since stdout carries the protocol stream in `serve` mode.
///
/// ```bash
/// RUST_LOG=debug unisync sync project.toml
/// RUST_LOG=unisync::protocol=trace unisync sync project.toml
/// ```
pub fn init_tracing(default_level: &str) {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
		)
		.with_writer(std::io::stderr)
		.init();
}

// vim: ts=4
