//! Verification counters
//!
//! - Counters only, monotonic
//! - Reset only when the owning storage is created
//! - Atomic, so a snapshot can be taken from another thread

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters of one verification storage.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Blocks verified and returned to callers
    blocks_read: AtomicU64,
    /// Blocks hashed and committed
    blocks_written: AtomicU64,
    /// Never-written blocks served as zeros
    cleared_blocks_read: AtomicU64,
    /// Hash mismatches reported
    corruptions_detected: AtomicU64,
    /// Upper-layer windows loaded from hash storage
    signature_reads: AtomicU64,
    /// Upper-layer windows written to hash storage
    signature_writes: AtomicU64,
    /// Completed flushes
    flushes: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment blocks read
    pub fn increment_blocks_read(&self) {
        self.blocks_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment blocks written
    pub fn increment_blocks_written(&self) {
        self.blocks_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment cleared blocks served
    pub fn increment_cleared_blocks(&self) {
        self.cleared_blocks_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment corruptions detected
    pub fn increment_corruptions(&self) {
        self.corruptions_detected.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment signature window reads
    pub fn increment_signature_reads(&self) {
        self.signature_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment signature window writes
    pub fn increment_signature_writes(&self) {
        self.signature_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment flushes
    pub fn increment_flushes(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            cleared_blocks_read: self.cleared_blocks_read.load(Ordering::Relaxed),
            corruptions_detected: self.corruptions_detected.load(Ordering::Relaxed),
            signature_reads: self.signature_reads.load(Ordering::Relaxed),
            signature_writes: self.signature_writes.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub blocks_read: u64,
    pub blocks_written: u64,
    pub cleared_blocks_read: u64,
    pub corruptions_detected: u64,
    pub signature_reads: u64,
    pub signature_writes: u64,
    pub flushes: u64,
}
