//! Observability and Metrics
//!
//! Counters for datagrams and request outcomes, shared by every device on the
//! process-wide channel.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Total datagrams sent
    pub packets_sent: AtomicU64,
    /// Total datagrams received
    pub packets_received: AtomicU64,
    /// Total bytes sent
    pub bytes_sent: AtomicU64,
    /// Total bytes received
    pub bytes_received: AtomicU64,
    /// Requests registered with the correlator
    pub requests_sent: AtomicU64,
    /// Requests completed by a matching reply
    pub requests_fulfilled: AtomicU64,
    /// Requests completed by their deadline
    pub requests_timed_out: AtomicU64,
    /// Requests abandoned by their caller
    pub requests_cancelled: AtomicU64,
    /// Total encryption operations
    pub encryption_total: AtomicU64,
    /// Successful encryption operations
    pub encryption_success: AtomicU64,
    /// Inbound datagrams the decoder rejected
    pub decode_errors: AtomicU64,
    /// Unsolicited relay change reports delivered to a handler
    pub unsolicited_reports: AtomicU64,
    /// Valid datagrams that matched nothing
    pub dropped_packets: AtomicU64,
    /// Socket errors
    pub connection_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            requests_sent: AtomicU64::new(0),
            requests_fulfilled: AtomicU64::new(0),
            requests_timed_out: AtomicU64::new(0),
            requests_cancelled: AtomicU64::new(0),
            encryption_total: AtomicU64::new(0),
            encryption_success: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            unsolicited_reports: AtomicU64::new(0),
            dropped_packets: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a datagram sent
    pub fn packet_sent(&self, byte_count: u64) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a datagram received
    pub fn packet_received(&self, byte_count: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_fulfilled(&self) {
        self.requests_fulfilled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_timed_out(&self) {
        self.requests_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_cancelled(&self) {
        self.requests_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an encryption attempt
    pub fn encryption_attempt(&self) {
        self.encryption_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful encryption
    pub fn encryption_success(&self) {
        self.encryption_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unsolicited_report(&self) {
        self.unsolicited_reports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_dropped(&self) {
        self.dropped_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection error
    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_fulfilled: self.requests_fulfilled.load(Ordering::Relaxed),
            requests_timed_out: self.requests_timed_out.load(Ordering::Relaxed),
            requests_cancelled: self.requests_cancelled.load(Ordering::Relaxed),
            encryption_total: self.encryption_total.load(Ordering::Relaxed),
            encryption_success: self.encryption_success.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unsolicited_reports: self.unsolicited_reports.load(Ordering::Relaxed),
            dropped_packets: self.dropped_packets.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            packets_sent = snapshot.packets_sent,
            packets_received = snapshot.packets_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            requests_sent = snapshot.requests_sent,
            requests_fulfilled = snapshot.requests_fulfilled,
            requests_timed_out = snapshot.requests_timed_out,
            requests_cancelled = snapshot.requests_cancelled,
            encryption_total = snapshot.encryption_total,
            encryption_success = snapshot.encryption_success,
            decode_errors = snapshot.decode_errors,
            unsolicited_reports = snapshot.unsolicited_reports,
            dropped_packets = snapshot.dropped_packets,
            connection_errors = snapshot.connection_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Protocol metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub requests_sent: u64,
    pub requests_fulfilled: u64,
    pub requests_timed_out: u64,
    pub requests_cancelled: u64,
    pub encryption_total: u64,
    pub encryption_success: u64,
    pub decode_errors: u64,
    pub unsolicited_reports: u64,
    pub dropped_packets: u64,
    pub connection_errors: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
