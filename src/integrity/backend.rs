//! # Block Storage Trait

use std::fmt;

use super::errors::{StorageError, StorageResult};

/// Range operations forwarded through storage layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationId {
    /// Zero the range
    FillZero,
    /// Make the stored signatures for the range unverifiable
    DestroySignature,
    /// Drop any cached state for the range
    Invalidate,
    /// Report properties of the range
    QueryRange,
}

impl OperationId {
    /// Returns the string representation used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationId::FillZero => "FILL_ZERO",
            OperationId::DestroySignature => "DESTROY_SIGNATURE",
            OperationId::Invalidate => "INVALIDATE",
            OperationId::QueryRange => "QUERY_RANGE",
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a `QueryRange` operation.
///
/// Results from several storages are combined with `merge`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryRangeInfo {
    /// Bitwise flags describing the range
    pub flags: u32,
}

impl QueryRangeInfo {
    /// Range is served from memory
    pub const FLAG_IN_MEMORY: u32 = 1 << 0;
    /// Range is backed by a persistent file
    pub const FLAG_PERSISTENT: u32 = 1 << 1;
    /// Range is covered by hash verification
    pub const FLAG_VERIFIED: u32 = 1 << 2;

    /// Create info with the given flags
    pub fn with_flags(flags: u32) -> Self {
        Self { flags }
    }

    /// Combines another storage's info into this one
    pub fn merge(&mut self, other: &QueryRangeInfo) {
        self.flags |= other.flags;
    }

    /// Returns whether all bits of `flag` are set
    pub fn has(&self, flag: u32) -> bool {
        self.flags & flag == flag
    }
}

/// Backend trait for random-access block storage
pub trait BlockStorage {
    /// Read `buf.len()` bytes starting at `offset`
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()>;

    /// Write `buf` starting at `offset`
    fn write(&mut self, offset: u64, buf: &[u8]) -> StorageResult<()>;

    /// Current size in bytes
    fn get_size(&mut self) -> StorageResult<u64>;

    /// Resize the storage
    fn set_size(&mut self, size: u64) -> StorageResult<()>;

    /// Make previous writes durable
    fn flush(&mut self) -> StorageResult<()>;

    /// Apply a range operation
    fn operate_range(
        &mut self,
        op: OperationId,
        offset: u64,
        size: u64,
    ) -> StorageResult<QueryRangeInfo>;
}

impl<S: BlockStorage + ?Sized> BlockStorage for &mut S {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> StorageResult<()> {
        (**self).write(offset, buf)
    }

    fn get_size(&mut self) -> StorageResult<u64> {
        (**self).get_size()
    }

    fn set_size(&mut self, size: u64) -> StorageResult<()> {
        (**self).set_size(size)
    }

    fn flush(&mut self) -> StorageResult<()> {
        (**self).flush()
    }

    fn operate_range(
        &mut self,
        op: OperationId,
        offset: u64,
        size: u64,
    ) -> StorageResult<QueryRangeInfo> {
        (**self).operate_range(op, offset, size)
    }
}

impl<S: BlockStorage + ?Sized> BlockStorage for Box<S> {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> StorageResult<()> {
        (**self).write(offset, buf)
    }

    fn get_size(&mut self) -> StorageResult<u64> {
        (**self).get_size()
    }

    fn set_size(&mut self, size: u64) -> StorageResult<()> {
        (**self).set_size(size)
    }

    fn flush(&mut self) -> StorageResult<()> {
        (**self).flush()
    }

    fn operate_range(
        &mut self,
        op: OperationId,
        offset: u64,
        size: u64,
    ) -> StorageResult<QueryRangeInfo> {
        (**self).operate_range(op, offset, size)
    }
}

/// Checks that `[offset, offset + size)` lies within `[0, limit)`.
pub(crate) fn check_range(offset: u64, size: u64, limit: u64) -> StorageResult<()> {
    match offset.checked_add(size) {
        Some(end) if end <= limit => Ok(()),
        _ => Err(StorageError::out_of_range(offset, size, limit)),
    }
}
