//! Progress reporting constants

use std::time::Duration;

/// Minimum time between two reports of one transfer
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Reports waiting to be sent; newer ones are dropped while it is full
pub const QUEUE_CAPACITY: usize = 8;

// vim: ts=4
