//! Buffer manager for hash-storage pages
//!
//! Signature reads and writes borrow their working memory from a
//! `BufferManager`. The manager may be shared by many storage instances, so
//! it is `Send + Sync`. Every acquired buffer is wrapped in a `PooledBuffer`,
//! which hands it back on drop; no exit path can leak cache capacity.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::errors::{StorageError, StorageResult};

/// A buffer lent out by a `BufferManager`.
#[derive(Debug)]
pub struct BufferHandle {
    data: Vec<u8>,
}

impl BufferHandle {
    /// Wraps an owned allocation.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Returns the buffer length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consumes the handle, returning the allocation.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

/// Supplies and reclaims cache memory.
pub trait BufferManager: Send + Sync {
    /// Acquires a zero-filled buffer of exactly `size` bytes.
    ///
    /// Fails with `AERO_RESOURCE_EXHAUSTED` under memory pressure.
    fn acquire(&self, size: usize) -> StorageResult<BufferHandle>;

    /// Returns a buffer previously obtained from `acquire`.
    fn release(&self, handle: BufferHandle);
}

/// Scoped buffer that is released back to its manager on drop.
pub struct PooledBuffer<'a> {
    manager: &'a dyn BufferManager,
    handle: Option<BufferHandle>,
}

impl<'a> PooledBuffer<'a> {
    /// Acquires `size` bytes from `manager`.
    pub fn acquire(manager: &'a dyn BufferManager, size: usize) -> StorageResult<Self> {
        let handle = manager.acquire(size)?;
        Ok(Self {
            manager,
            handle: Some(handle),
        })
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.handle.as_ref().map(|h| h.data.as_slice()).unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self.handle.as_mut() {
            Some(h) => h.data.as_mut_slice(),
            None => &mut [],
        }
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.manager.release(handle);
        }
    }
}

/// Capacity-limited in-memory buffer manager.
///
/// Released buffers are kept on a free list and reused by later acquisitions
/// of the same size. Outstanding bytes never exceed the configured capacity.
#[derive(Debug)]
pub struct MemoryBufferManager {
    capacity: usize,
    in_use: AtomicUsize,
    free_list: Mutex<Vec<Vec<u8>>>,
    max_free: usize,
}

impl MemoryBufferManager {
    /// Create a manager that lends out at most `capacity` bytes at once.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            in_use: AtomicUsize::new(0),
            free_list: Mutex::new(Vec::new()),
            max_free: 16,
        }
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of bytes currently lent out.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    fn reserve(&self, size: usize) -> StorageResult<()> {
        let mut current = self.in_use.load(Ordering::Acquire);
        loop {
            let available = self.capacity.saturating_sub(current);
            if size > available {
                return Err(StorageError::resource_exhausted(size, available));
            }
            match self.in_use.compare_exchange_weak(
                current,
                current + size,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    fn take_free(&self, size: usize) -> Option<Vec<u8>> {
        let mut free = self.free_list.lock().ok()?;
        let pos = free.iter().position(|b| b.len() == size)?;
        Some(free.swap_remove(pos))
    }
}

impl Default for MemoryBufferManager {
    fn default() -> Self {
        Self::new(1024 * 1024)
    }
}

impl BufferManager for MemoryBufferManager {
    fn acquire(&self, size: usize) -> StorageResult<BufferHandle> {
        self.reserve(size)?;

        let data = match self.take_free(size) {
            Some(mut reused) => {
                reused.fill(0);
                reused
            }
            None => vec![0u8; size],
        };
        Ok(BufferHandle::new(data))
    }

    /// Handles issued by another manager are accepted; accounting never
    /// drops below zero.
    fn release(&self, handle: BufferHandle) {
        let data = handle.into_inner();
        let len = data.len();
        let _ = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(len))
            });

        if let Ok(mut free) = self.free_list.lock() {
            if free.len() < self.max_free {
                free.push(data);
            }
        }
    }
}
