//! Timing defaults for requests and the keep-alive loop.

use std::time::Duration;

/// Deadline for a request to be answered
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Heartbeat interval used when the device does not report one
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);
