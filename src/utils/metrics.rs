//! Observability and Metrics
//!
//! Process-wide counters for the Yar framing, codec and acceptor layers.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently active connections
    pub connections_active: AtomicU64,
    /// Temporary accept failures that were retried
    pub accept_retries: AtomicU64,
    /// Connection handlers that panicked
    pub handler_panics: AtomicU64,
    /// Complete frames decoded off the wire
    pub frames_received: AtomicU64,
    /// Total bytes received in complete frames
    pub bytes_received: AtomicU64,
    /// Reply frames written
    pub responses_sent: AtomicU64,
    /// Total bytes written in reply frames
    pub bytes_sent: AtomicU64,
    /// Frames rejected for a bad body length or truncation
    pub framing_errors: AtomicU64,
    /// Request envelopes or parameters that failed to decode
    pub decode_errors: AtomicU64,
    /// Packager hints with no registered packager
    pub packager_misses: AtomicU64,
    /// Replies whose dispatch id was unknown
    pub sequence_mismatches: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            accept_retries: AtomicU64::new(0),
            handler_panics: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            responses_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            framing_errors: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            packager_misses: AtomicU64::new(0),
            sequence_mismatches: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new connection
    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closed
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn accept_retry(&self) {
        self.accept_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_panic(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decoded frame of `byte_count` bytes (header included)
    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a written reply of `byte_count` bytes (header included)
    pub fn response_sent(&self, byte_count: u64) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packager_miss(&self) {
        self.packager_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sequence_mismatch(&self) {
        self.sequence_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            accept_retries: self.accept_retries.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            packager_misses: self.packager_misses.load(Ordering::Relaxed),
            sequence_mismatches: self.sequence_mismatches.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            accept_retries = snapshot.accept_retries,
            handler_panics = snapshot.handler_panics,
            frames_received = snapshot.frames_received,
            bytes_received = snapshot.bytes_received,
            responses_sent = snapshot.responses_sent,
            bytes_sent = snapshot.bytes_sent,
            framing_errors = snapshot.framing_errors,
            decode_errors = snapshot.decode_errors,
            packager_misses = snapshot.packager_misses,
            sequence_mismatches = snapshot.sequence_mismatches,
            uptime_seconds = snapshot.uptime_seconds,
            "Yar metrics snapshot"
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
    pub connections_total: u64,
    pub connections_active: u64,
    pub accept_retries: u64,
    pub handler_panics: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub responses_sent: u64,
    pub bytes_sent: u64,
    pub framing_errors: u64,
    pub decode_errors: u64,
    pub packager_misses: u64,
    pub sequence_mismatches: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Initialize metrics collection (call once at startup)
pub fn init_metrics() {
    let _ = global_metrics();
    info!("Metrics collection initialized");
}

/// Logs the elapsed time of an operation when dropped
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
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
