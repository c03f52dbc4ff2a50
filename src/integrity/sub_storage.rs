//! # Sub-Storage Window
//!
//! Exposes `[offset, offset + size)` of a parent storage as a storage of its
//! own. Hash and data regions of one backing store are addressed this way.

use super::backend::{check_range, BlockStorage, OperationId, QueryRangeInfo};
use super::errors::{StorageError, StorageResult};

/// Fixed-size window over a parent storage.
#[derive(Debug, Clone)]
pub struct SubStorage<S> {
    parent: S,
    offset: u64,
    size: u64,
}

impl<S: BlockStorage> SubStorage<S> {
    /// Creates a window, verifying it fits inside the parent.
    pub fn new(mut parent: S, offset: u64, size: u64) -> StorageResult<Self> {
        let parent_size = parent.get_size()?;
        check_range(offset, size, parent_size)?;
        Ok(Self {
            parent,
            offset,
            size,
        })
    }

    /// Returns the window start within the parent.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Consumes the window, returning the parent.
    pub fn into_inner(self) -> S {
        self.parent
    }
}

impl<S: BlockStorage> BlockStorage for SubStorage<S> {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        check_range(offset, buf.len() as u64, self.size)?;
        self.parent.read(self.offset + offset, buf)
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> StorageResult<()> {
        check_range(offset, buf.len() as u64, self.size)?;
        self.parent.write(self.offset + offset, buf)
    }

    fn get_size(&mut self) -> StorageResult<u64> {
        Ok(self.size)
    }

    fn set_size(&mut self, _size: u64) -> StorageResult<()> {
        Err(StorageError::unsupported("Sub-storage windows have a fixed size"))
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.parent.flush()
    }

    fn operate_range(
        &mut self,
        op: OperationId,
        offset: u64,
        size: u64,
    ) -> StorageResult<QueryRangeInfo> {
        check_range(offset, size, self.size)?;
        self.parent.operate_range(op, self.offset + offset, size)
    }
}
