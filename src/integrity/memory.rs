//! # In-Memory Backend

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::backend::{check_range, BlockStorage, OperationId, QueryRangeInfo};
use super::errors::{StorageError, StorageResult};

/// In-memory block storage.
///
/// Clones share the same bytes, so several storage layers (or a reopened
/// verification instance) can address one backing buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryStorage {
    /// Create a zero-filled storage of `size` bytes
    pub fn new(size: usize) -> Self {
        Self::from_vec(vec![0u8; size])
    }

    /// Create a storage holding `bytes`
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(bytes)),
        }
    }

    /// Copy out the current contents
    pub fn contents(&self) -> StorageResult<Vec<u8>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Vec<u8>>> {
        self.bytes.lock().map_err(|_| {
            StorageError::io_error(
                "Memory storage lock poisoned",
                io::Error::other("poisoned lock"),
            )
        })
    }
}

impl BlockStorage for MemoryStorage {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let bytes = self.lock()?;
        check_range(offset, buf.len() as u64, bytes.len() as u64)?;

        let start = offset as usize;
        buf.copy_from_slice(&bytes[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> StorageResult<()> {
        let mut bytes = self.lock()?;
        check_range(offset, buf.len() as u64, bytes.len() as u64)?;

        let start = offset as usize;
        bytes[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn get_size(&mut self) -> StorageResult<u64> {
        Ok(self.lock()?.len() as u64)
    }

    fn set_size(&mut self, size: u64) -> StorageResult<()> {
        self.lock()?.resize(size as usize, 0);
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn operate_range(
        &mut self,
        op: OperationId,
        offset: u64,
        size: u64,
    ) -> StorageResult<QueryRangeInfo> {
        match op {
            OperationId::FillZero => {
                let mut bytes = self.lock()?;
                check_range(offset, size, bytes.len() as u64)?;
                let start = offset as usize;
                bytes[start..start + size as usize].fill(0);
                Ok(QueryRangeInfo::default())
            }
            OperationId::Invalidate => Ok(QueryRangeInfo::default()),
            OperationId::QueryRange => {
                Ok(QueryRangeInfo::with_flags(QueryRangeInfo::FLAG_IN_MEMORY))
            }
            OperationId::DestroySignature => Err(StorageError::unsupported(format!(
                "{} is not supported by memory storage",
                op
            ))),
        }
    }
}
