//! Observable events of the verification layer
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Storage bound to its sub-storages and ready
    StorageInitialized,
    /// Initialization rejected
    StorageInitializeFailed,
    /// References released
    StorageFinalized,
    /// Data then hash storage flushed
    StorageFlushed,

    // Verification
    /// Block hash mismatch (FATAL)
    BlockCorruption,
    /// Never-written block served as zeros
    ClearedBlockRead,

    // Range operations
    /// Blocks returned to the cleared state
    RangeZeroed,
    /// Signatures made unverifiable
    SignatureDestroyed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StorageInitialized => "INTEGRITY_STORAGE_INITIALIZED",
            Event::StorageInitializeFailed => "INTEGRITY_STORAGE_INITIALIZE_FAILED",
            Event::StorageFinalized => "INTEGRITY_STORAGE_FINALIZED",
            Event::StorageFlushed => "INTEGRITY_STORAGE_FLUSHED",
            Event::BlockCorruption => "BLOCK_CORRUPTION",
            Event::ClearedBlockRead => "CLEARED_BLOCK_READ",
            Event::RangeZeroed => "RANGE_ZEROED",
            Event::SignatureDestroyed => "SIGNATURE_DESTROYED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::BlockCorruption)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
