//! Block integrity verification storage
//!
//! One level of a block-hash tree. Data storage holds the payload, hash
//! storage holds one 32-byte `BlockHash` per verification block at offset
//! `block_index * 32`. Every read recomputes the block hash and compares it
//! to the stored entry before any byte reaches the caller.
//!
//! # Invariants
//!
//! - Hashes produced by `write` always carry the validation bit, so the
//!   all-zero entry is reserved for "never written"
//! - The candidate hash on read is marker-forced by the same routine as on
//!   write; the bit is never masked out of the comparison
//! - A mismatch is only tolerated for a cleared block: `is_real_data == false`,
//!   `allow_cleared_blocks == true`, all-zero data and an all-zero entry
//! - Data is flushed before hashes
//! - The logical size is fixed at initialization
//!
//! # Failure semantics
//!
//! A failed read may leave the blocks verified before the failing one in the
//! caller's buffer. Only a successful overall result means the buffer can be
//! trusted. Writes are atomic per block only: a failure partway through a
//! multi-block write leaves earlier blocks committed and verifiable, and the
//! failing block and later ones untouched. Hash entries are patched in the
//! loaded upper-layer window and written back once per window.

use std::mem;
use std::ops::Range;
use std::sync::Arc;

use super::backend::{check_range, BlockStorage, OperationId, QueryRangeInfo};
use super::buffer::{BufferManager, MemoryBufferManager, PooledBuffer};
use super::config::VerificationConfig;
use super::errors::{StorageError, StorageResult};
use super::hash::{
    compute_block_hash, BlockHash, HashGenerator, HashGeneratorFactory, HashSalt,
    Sha256GeneratorFactory, HASH_SIZE,
};
use crate::observability::{
    log_event_with_fields, Event, Logger, MetricsRegistry, MetricsSnapshot, Severity,
};

/// Collaborators and settings bound at initialization.
#[derive(Clone)]
pub struct InitializeParams {
    /// Sizes and verification policy
    pub config: VerificationConfig,
    /// Source of hash-storage working buffers
    pub buffer_manager: Arc<dyn BufferManager>,
    /// Source of digest generators
    pub hash_generator_factory: Arc<dyn HashGeneratorFactory>,
    /// Salt; when `None`, the salt in `config` (if any) is used
    pub salt: Option<HashSalt>,
}

impl InitializeParams {
    /// SHA-256 hashing and a private 1 MiB buffer manager.
    pub fn new(config: VerificationConfig) -> Self {
        Self {
            config,
            buffer_manager: Arc::new(MemoryBufferManager::default()),
            hash_generator_factory: Arc::new(Sha256GeneratorFactory),
            salt: None,
        }
    }

    /// Use a shared buffer manager.
    pub fn with_buffer_manager(mut self, buffer_manager: Arc<dyn BufferManager>) -> Self {
        self.buffer_manager = buffer_manager;
        self
    }

    /// Use a different digest.
    pub fn with_hash_generator_factory(
        mut self,
        hash_generator_factory: Arc<dyn HashGeneratorFactory>,
    ) -> Self {
        self.hash_generator_factory = hash_generator_factory;
        self
    }

    /// Mix `salt` into every block hash.
    pub fn with_salt(mut self, salt: HashSalt) -> Self {
        self.salt = Some(salt);
        self
    }
}

/// A loaded upper-layer window of hash storage.
struct SignatureWindow<'m> {
    /// Byte offset of the window within hash storage
    offset: u64,
    buffer: PooledBuffer<'m>,
    /// Holds entries not yet written back
    dirty: bool,
}

impl SignatureWindow<'_> {
    fn range_of(&self, entry_offset: u64) -> Option<Range<usize>> {
        let end = self.offset + self.buffer.len() as u64;
        if entry_offset >= self.offset && entry_offset + HASH_SIZE as u64 <= end {
            let start = (entry_offset - self.offset) as usize;
            Some(start..start + HASH_SIZE)
        } else {
            None
        }
    }

    fn entry(&self, entry_offset: u64) -> Option<BlockHash> {
        self.range_of(entry_offset)
            .and_then(|range| BlockHash::from_slice(&self.buffer[range]))
    }
}

/// Storages and settings of a ready instance.
struct Bound<H, D> {
    hash_storage: H,
    data_storage: D,
    block_size: u64,
    block_order: u32,
    upper_layer_block_size: u64,
    data_size: u64,
    hash_storage_size: u64,
    buffer_manager: Arc<dyn BufferManager>,
    hash_generator_factory: Arc<dyn HashGeneratorFactory>,
    salt: Option<HashSalt>,
    is_real_data: bool,
    is_writable: bool,
    allow_cleared_blocks: bool,
}

enum State<H, D> {
    Uninitialized,
    Ready(Bound<H, D>),
    Finalized,
}

/// Storage that verifies every block against its stored hash.
pub struct IntegrityVerificationStorage<H: BlockStorage, D: BlockStorage> {
    state: State<H, D>,
    metrics: MetricsRegistry,
}

impl<H: BlockStorage, D: BlockStorage> Default for IntegrityVerificationStorage<H, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: BlockStorage, D: BlockStorage> IntegrityVerificationStorage<H, D> {
    /// Creates an uninitialized instance.
    pub fn new() -> Self {
        Self {
            state: State::Uninitialized,
            metrics: MetricsRegistry::new(),
        }
    }

    /// Creates and initializes an instance in one step.
    pub fn open(hash_storage: H, data_storage: D, params: InitializeParams) -> StorageResult<Self> {
        let mut storage = Self::new();
        storage.initialize(hash_storage, data_storage, params)?;
        Ok(storage)
    }

    /// Binds the sub-storages and configuration.
    ///
    /// # Errors
    ///
    /// `AERO_INTEGRITY_CONFIGURATION` if the block sizes are not positive
    /// powers of two, the hash storage cannot hold one entry per block, or
    /// the instance was already initialized or finalized.
    pub fn initialize(
        &mut self,
        hash_storage: H,
        data_storage: D,
        params: InitializeParams,
    ) -> StorageResult<()> {
        let result = self.bind(hash_storage, data_storage, params);
        if let Err(ref e) = result {
            Logger::error(
                Event::StorageInitializeFailed.as_str(),
                &[("reason", &e.to_string())],
            );
        }
        result
    }

    fn bind(
        &mut self,
        mut hash_storage: H,
        mut data_storage: D,
        params: InitializeParams,
    ) -> StorageResult<()> {
        match self.state {
            State::Uninitialized => {}
            State::Ready(_) => return Err(StorageError::configuration("Storage is already initialized")),
            State::Finalized => return Err(StorageError::configuration("Storage has been finalized")),
        }

        let InitializeParams {
            config,
            buffer_manager,
            hash_generator_factory,
            salt,
        } = params;
        config.validate()?;

        let data_size = data_storage.get_size()?;
        let hash_storage_size = hash_storage.get_size()?;
        let block_count = data_size.div_ceil(config.block_size);
        let required = block_count
            .checked_mul(HASH_SIZE as u64)
            .ok_or_else(|| StorageError::configuration("Data storage too large"))?;
        if hash_storage_size < required {
            return Err(StorageError::configuration(format!(
                "Hash storage holds {} bytes, {} blocks need {}",
                hash_storage_size, block_count, required
            )));
        }

        let salt = match salt {
            Some(salt) => Some(salt),
            None => config.decode_salt()?,
        };

        log_event_with_fields(
            Event::StorageInitialized,
            &[
                ("block_size", &config.block_size.to_string()),
                ("data_size", &data_size.to_string()),
                ("salted", if salt.is_some() { "true" } else { "false" }),
                ("writable", if config.is_writable { "true" } else { "false" }),
            ],
        );

        self.state = State::Ready(Bound {
            hash_storage,
            data_storage,
            block_size: config.block_size,
            block_order: config.block_order(),
            upper_layer_block_size: config.upper_layer_block_size,
            data_size,
            hash_storage_size,
            buffer_manager,
            hash_generator_factory,
            salt,
            is_real_data: config.is_real_data,
            is_writable: config.is_writable,
            allow_cleared_blocks: config.allow_cleared_blocks,
        });
        Ok(())
    }

    /// Releases the sub-storages. Idempotent; also run on drop.
    pub fn finalize(&mut self) {
        if let State::Ready(_) = self.state {
            self.state = State::Finalized;
            log_event_with_fields(Event::StorageFinalized, &[]);
        }
    }

    /// Finalizes and hands back the sub-storages as `(hash, data)`.
    ///
    /// Returns `None` if the instance was never initialized or already
    /// finalized.
    pub fn into_parts(mut self) -> Option<(H, D)> {
        match mem::replace(&mut self.state, State::Finalized) {
            State::Ready(bound) => {
                log_event_with_fields(Event::StorageFinalized, &[]);
                Some((bound.hash_storage, bound.data_storage))
            }
            State::Uninitialized | State::Finalized => None,
        }
    }

    /// Returns whether the instance is initialized and not finalized.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Returns whether writes are permitted.
    pub fn is_writable(&self) -> bool {
        match self.state {
            State::Ready(ref bound) => bound.is_writable,
            _ => false,
        }
    }

    /// Verification block size, once initialized.
    pub fn block_size(&self) -> Option<u64> {
        match self.state {
            State::Ready(ref bound) => Some(bound.block_size),
            _ => None,
        }
    }

    /// Upper-layer block size, once initialized.
    pub fn upper_layer_block_size(&self) -> Option<u64> {
        match self.state {
            State::Ready(ref bound) => Some(bound.upper_layer_block_size),
            _ => None,
        }
    }

    /// Counters for this instance.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn ready(&self) -> StorageResult<&Bound<H, D>> {
        match self.state {
            State::Ready(ref bound) => Ok(bound),
            State::Uninitialized => Err(StorageError::configuration("Storage is not initialized")),
            State::Finalized => Err(StorageError::configuration("Storage has been finalized")),
        }
    }

    fn ready_mut(&mut self) -> StorageResult<(&mut Bound<H, D>, &MetricsRegistry)> {
        match self.state {
            State::Ready(ref mut bound) => Ok((bound, &self.metrics)),
            State::Uninitialized => Err(StorageError::configuration("Storage is not initialized")),
            State::Finalized => Err(StorageError::configuration("Storage has been finalized")),
        }
    }

    /// Size of the data storage.
    pub fn get_size(&mut self) -> StorageResult<u64> {
        let (bound, _) = self.ready_mut()?;
        bound.data_storage.get_size()
    }

    /// Always fails: the hash layout is derived from the size fixed at
    /// initialization.
    pub fn set_size(&mut self, _size: u64) -> StorageResult<()> {
        Err(StorageError::unsupported(
            "Integrity verification storage cannot be resized",
        ))
    }

    /// Reads and verifies `buf.len()` bytes at `offset`.
    ///
    /// Both `offset` and `buf.len()` must be multiples of the block size.
    ///
    /// # Errors
    ///
    /// `AERO_DATA_CORRUPTION` naming the first block whose hash does not
    /// match. Blocks before it may already have been copied into `buf`.
    pub fn read(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let (bound, metrics) = self.ready_mut()?;
        bound.check_request(offset, buf.len())?;
        bound.read_verified(offset, buf, metrics)
    }

    /// Hashes and writes `buf` at `offset`, block by block.
    ///
    /// # Errors
    ///
    /// `AERO_INTEGRITY_PERMISSION_DENIED` on a read-only instance, before any
    /// other check.
    pub fn write(&mut self, offset: u64, buf: &[u8]) -> StorageResult<()> {
        let (bound, metrics) = self.ready_mut()?;
        bound.check_writable()?;
        bound.check_request(offset, buf.len())?;
        bound.write_hashed(offset, buf, metrics)
    }

    /// Flushes data storage, then hash storage.
    pub fn flush(&mut self) -> StorageResult<()> {
        let (bound, metrics) = self.ready_mut()?;
        bound.data_storage.flush()?;
        bound.hash_storage.flush()?;
        metrics.increment_flushes();
        Logger::trace(Event::StorageFlushed.as_str(), &[]);
        Ok(())
    }

    /// Applies a range operation to both sub-storages.
    ///
    /// Data storage receives the data range; hash storage receives the range
    /// of `BlockHash` entries covering it.
    pub fn operate_range(
        &mut self,
        op: OperationId,
        offset: u64,
        size: u64,
    ) -> StorageResult<QueryRangeInfo> {
        let (bound, _) = self.ready_mut()?;
        match op {
            OperationId::Invalidate | OperationId::QueryRange => {
                bound.forward_range(op, offset, size)
            }
            OperationId::FillZero => {
                bound.check_writable()?;
                bound.check_signature_range(offset, size)?;
                bound.clear_range(offset, size)?;
                Ok(QueryRangeInfo::default())
            }
            OperationId::DestroySignature => {
                bound.check_writable()?;
                bound.check_signature_range(offset, size)?;
                bound.destroy_signatures(offset, size)?;
                Ok(QueryRangeInfo::default())
            }
        }
    }

    /// Computes the stored form of the hash of `buf` without any I/O.
    pub fn calc_block_hash(&self, buf: &[u8]) -> StorageResult<BlockHash> {
        let bound = self.ready()?;
        let mut generator = bound.hash_generator_factory.create();
        Ok(compute_block_hash(generator.as_mut(), bound.salt.as_ref(), buf))
    }
}

impl<H: BlockStorage, D: BlockStorage> Drop for IntegrityVerificationStorage<H, D> {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl<H: BlockStorage, D: BlockStorage> BlockStorage for IntegrityVerificationStorage<H, D> {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        IntegrityVerificationStorage::read(self, offset, buf)
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> StorageResult<()> {
        IntegrityVerificationStorage::write(self, offset, buf)
    }

    fn get_size(&mut self) -> StorageResult<u64> {
        IntegrityVerificationStorage::get_size(self)
    }

    fn set_size(&mut self, size: u64) -> StorageResult<()> {
        IntegrityVerificationStorage::set_size(self, size)
    }

    fn flush(&mut self) -> StorageResult<()> {
        IntegrityVerificationStorage::flush(self)
    }

    fn operate_range(
        &mut self,
        op: OperationId,
        offset: u64,
        size: u64,
    ) -> StorageResult<QueryRangeInfo> {
        IntegrityVerificationStorage::operate_range(self, op, offset, size)
    }
}

impl<H: BlockStorage, D: BlockStorage> Bound<H, D> {
    fn align_down(&self, value: u64) -> u64 {
        value & !(self.block_size - 1)
    }

    fn align_up(&self, value: u64) -> u64 {
        self.align_down(value + (self.block_size - 1))
    }

    fn is_aligned(&self, value: u64) -> bool {
        value & (self.block_size - 1) == 0
    }

    fn entry_offset(&self, block_index: u64) -> u64 {
        block_index * HASH_SIZE as u64
    }

    /// Window size for hash-storage I/O; never smaller than one entry.
    fn window_size(&self) -> u64 {
        self.upper_layer_block_size.max(HASH_SIZE as u64)
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.is_writable {
            Ok(())
        } else {
            Err(StorageError::permission_denied(
                "Integrity verification storage is read-only",
            ))
        }
    }

    fn check_request(&self, offset: u64, len: usize) -> StorageResult<()> {
        let len = len as u64;
        if !self.is_aligned(offset) || !self.is_aligned(len) {
            return Err(StorageError::invalid_argument(format!(
                "Request offset {} and size {} must be multiples of the block size {}",
                offset, len, self.block_size
            )));
        }
        check_range(offset, len, self.align_up(self.data_size))
    }

    fn check_signature_range(&self, offset: u64, size: u64) -> StorageResult<()> {
        if !self.is_aligned(offset) {
            return Err(StorageError::invalid_argument(format!(
                "Range offset {} must be a multiple of the block size {}",
                offset, self.block_size
            )));
        }
        check_range(offset, size, self.data_size)?;
        if !self.is_aligned(size) && offset + size != self.data_size {
            return Err(StorageError::invalid_argument(format!(
                "Range size {} must be block aligned or end at the data size",
                size
            )));
        }
        Ok(())
    }

    /// Reads a block into `scratch`, zero-padding past the end of data.
    fn read_block(&mut self, block_offset: u64, scratch: &mut [u8]) -> StorageResult<()> {
        let available = self.data_size.saturating_sub(block_offset).min(self.block_size) as usize;
        self.data_storage.read(block_offset, &mut scratch[..available])?;
        scratch[available..].fill(0);
        Ok(())
    }

    /// Loads the upper-layer window of hash storage containing `entry_offset`.
    fn load_window<'m>(
        &mut self,
        manager: &'m dyn BufferManager,
        entry_offset: u64,
        metrics: &MetricsRegistry,
    ) -> StorageResult<SignatureWindow<'m>> {
        check_range(entry_offset, HASH_SIZE as u64, self.hash_storage_size)?;

        let window_size = self.window_size();
        let window_offset = entry_offset & !(window_size - 1);
        let window_end = (window_offset + window_size).min(self.hash_storage_size);

        let mut buffer = PooledBuffer::acquire(manager, (window_end - window_offset) as usize)?;
        self.hash_storage.read(window_offset, &mut buffer)?;
        metrics.increment_signature_reads();

        Ok(SignatureWindow {
            offset: window_offset,
            buffer,
            dirty: false,
        })
    }

    /// Returns the stored hash of `block_index`, reusing `window` when it
    /// already covers the entry.
    fn read_block_signature<'m>(
        &mut self,
        window: &mut Option<SignatureWindow<'m>>,
        manager: &'m dyn BufferManager,
        block_index: u64,
        metrics: &MetricsRegistry,
    ) -> StorageResult<BlockHash> {
        let entry_offset = self.entry_offset(block_index);
        if let Some(hash) = window.as_ref().and_then(|w| w.entry(entry_offset)) {
            return Ok(hash);
        }

        // Drop the previous window before acquiring the next one
        *window = None;
        let loaded = self.load_window(manager, entry_offset, metrics)?;
        let hash = loaded
            .entry(entry_offset)
            .ok_or_else(|| StorageError::out_of_range(entry_offset, HASH_SIZE as u64, self.hash_storage_size))?;
        *window = Some(loaded);
        Ok(hash)
    }

    /// Makes `window` cover `entry_offset`, storing the previous window if it
    /// holds patched entries. Returns the entry's range within the window.
    fn prepare_window<'m>(
        &mut self,
        window: &mut Option<SignatureWindow<'m>>,
        manager: &'m dyn BufferManager,
        entry_offset: u64,
        metrics: &MetricsRegistry,
    ) -> StorageResult<Range<usize>> {
        if let Some(range) = window.as_ref().and_then(|w| w.range_of(entry_offset)) {
            return Ok(range);
        }

        if let Some(previous) = window.take() {
            self.store_window(&previous, metrics)?;
        }
        let loaded = self.load_window(manager, entry_offset, metrics)?;
        let range = loaded.range_of(entry_offset).ok_or_else(|| {
            StorageError::out_of_range(entry_offset, HASH_SIZE as u64, self.hash_storage_size)
        })?;
        *window = Some(loaded);
        Ok(range)
    }

    /// Writes a patched window back to hash storage.
    fn store_window(
        &mut self,
        window: &SignatureWindow<'_>,
        metrics: &MetricsRegistry,
    ) -> StorageResult<()> {
        if window.dirty {
            self.hash_storage.write(window.offset, &window.buffer)?;
            metrics.increment_signature_writes();
        }
        Ok(())
    }

    fn is_cleared_block(&self, stored: &BlockHash, data: &[u8]) -> bool {
        !self.is_real_data
            && self.allow_cleared_blocks
            && stored.is_cleared()
            && data.iter().all(|&b| b == 0)
    }

    fn read_verified(
        &mut self,
        offset: u64,
        buf: &mut [u8],
        metrics: &MetricsRegistry,
    ) -> StorageResult<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let manager = Arc::clone(&self.buffer_manager);
        let mut generator = self.hash_generator_factory.create();
        let mut window: Option<SignatureWindow<'_>> = None;
        let block_size = self.block_size as usize;
        let mut scratch = vec![0u8; block_size];
        let first_block = offset >> self.block_order;

        for (i, dst) in buf.chunks_exact_mut(block_size).enumerate() {
            let block_index = first_block + i as u64;
            let block_offset = block_index << self.block_order;

            let stored =
                self.read_block_signature(&mut window, manager.as_ref(), block_index, metrics)?;
            self.read_block(block_offset, &mut scratch)?;
            let computed = self.hash_block(generator.as_mut(), &scratch);

            if computed.ct_matches(&stored) {
                dst.copy_from_slice(&scratch);
                metrics.increment_blocks_read();
                continue;
            }

            if self.is_cleared_block(&stored, &scratch) {
                dst.fill(0);
                metrics.increment_cleared_blocks();
                if Logger::enabled(Severity::Trace) {
                    Logger::trace(
                        Event::ClearedBlockRead.as_str(),
                        &[("block_index", &block_index.to_string())],
                    );
                }
                continue;
            }

            metrics.increment_corruptions();
            log_event_with_fields(
                Event::BlockCorruption,
                &[
                    ("block_index", &block_index.to_string()),
                    ("byte_offset", &block_offset.to_string()),
                ],
            );
            return Err(StorageError::corrupted_block(block_index, block_offset));
        }

        Ok(())
    }

    fn write_hashed(&mut self, offset: u64, buf: &[u8], metrics: &MetricsRegistry) -> StorageResult<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let manager = Arc::clone(&self.buffer_manager);
        let mut window: Option<SignatureWindow<'_>> = None;
        let result = self.write_blocks(offset, buf, manager.as_ref(), &mut window, metrics);

        // Blocks committed before a failure still get their hashes
        let stored = match window.take() {
            Some(pending) => self.store_window(&pending, metrics),
            None => Ok(()),
        };
        result.and(stored)
    }

    fn write_blocks<'m>(
        &mut self,
        offset: u64,
        buf: &[u8],
        manager: &'m dyn BufferManager,
        window: &mut Option<SignatureWindow<'m>>,
        metrics: &MetricsRegistry,
    ) -> StorageResult<()> {
        let mut generator = self.hash_generator_factory.create();
        let block_size = self.block_size as usize;
        let mut tail = Vec::with_capacity(block_size);
        let first_block = offset >> self.block_order;

        for (i, src) in buf.chunks_exact(block_size).enumerate() {
            let block_index = first_block + i as u64;
            let block_offset = block_index << self.block_order;
            let available = self.data_size.saturating_sub(block_offset).min(self.block_size) as usize;

            // Bytes past the end of data hash as zeros, matching the read path
            let hash = if available < block_size {
                tail.clear();
                tail.extend_from_slice(&src[..available]);
                tail.resize(block_size, 0);
                self.hash_block(generator.as_mut(), &tail)
            } else {
                self.hash_block(generator.as_mut(), src)
            };

            // The window is loaded before the data changes, so a failed
            // acquire or hash read leaves this block untouched
            let entry_offset = self.entry_offset(block_index);
            let range = self.prepare_window(window, manager, entry_offset, metrics)?;

            self.data_storage.write(block_offset, &src[..available])?;
            if let Some(w) = window.as_mut() {
                w.buffer[range].copy_from_slice(hash.as_bytes());
                w.dirty = true;
            }
            metrics.increment_blocks_written();
        }

        Ok(())
    }

    fn hash_block(&self, generator: &mut dyn HashGenerator, data: &[u8]) -> BlockHash {
        compute_block_hash(generator, self.salt.as_ref(), data)
    }

    fn forward_range(
        &mut self,
        op: OperationId,
        offset: u64,
        size: u64,
    ) -> StorageResult<QueryRangeInfo> {
        if offset > self.data_size {
            return Err(StorageError::out_of_range(offset, size, self.data_size));
        }

        let aligned_offset = self.align_down(offset);
        let end = offset.saturating_add(size).min(self.data_size);
        let aligned_end = self.align_up(end);
        let data_end = aligned_end.min(self.data_size);

        let mut info =
            self.data_storage
                .operate_range(op, aligned_offset, data_end - aligned_offset)?;

        let sign_offset = self.entry_offset(aligned_offset >> self.block_order);
        let sign_size = self.entry_offset((aligned_end - aligned_offset) >> self.block_order);
        let hash_info = self.hash_storage.operate_range(op, sign_offset, sign_size)?;
        info.merge(&hash_info);

        if op == OperationId::QueryRange {
            info.flags |= QueryRangeInfo::FLAG_VERIFIED;
        }
        Ok(info)
    }

    /// Zeros the data range and its hash entries, returning the blocks to the
    /// cleared state.
    fn clear_range(&mut self, offset: u64, size: u64) -> StorageResult<()> {
        if size == 0 {
            return Ok(());
        }

        self.data_storage.operate_range(OperationId::FillZero, offset, size)?;

        let manager = Arc::clone(&self.buffer_manager);
        let (sign_offset, sign_size) = self.signature_extent(offset, size);
        let chunk = self.window_size().min(sign_size);
        let zeros = PooledBuffer::acquire(manager.as_ref(), chunk as usize)?;

        let mut done = 0u64;
        while done < sign_size {
            let len = (sign_size - done).min(chunk) as usize;
            self.hash_storage.write(sign_offset + done, &zeros[..len])?;
            done += len as u64;
        }

        log_event_with_fields(
            Event::RangeZeroed,
            &[("offset", &offset.to_string()), ("size", &size.to_string())],
        );
        Ok(())
    }

    /// Inverts every hash byte except the validation bit.
    fn destroy_signatures(&mut self, offset: u64, size: u64) -> StorageResult<()> {
        if size == 0 {
            return Ok(());
        }

        let manager = Arc::clone(&self.buffer_manager);
        let (sign_offset, sign_size) = self.signature_extent(offset, size);
        let chunk = self.window_size().min(sign_size);
        let mut buffer = PooledBuffer::acquire(manager.as_ref(), chunk as usize)?;

        let mut done = 0u64;
        while done < sign_size {
            let len = (sign_size - done).min(chunk) as usize;
            let region = &mut buffer[..len];
            self.hash_storage.read(sign_offset + done, region)?;
            for (i, byte) in region.iter_mut().enumerate() {
                *byte ^= if (i + 1) % HASH_SIZE == 0 { 0x7F } else { 0xFF };
            }
            self.hash_storage.write(sign_offset + done, region)?;
            done += len as u64;
        }

        log_event_with_fields(
            Event::SignatureDestroyed,
            &[("offset", &offset.to_string()), ("size", &size.to_string())],
        );
        Ok(())
    }

    /// Hash-storage byte range covering the blocks of `[offset, offset + size)`.
    fn signature_extent(&self, offset: u64, size: u64) -> (u64, u64) {
        let first = offset >> self.block_order;
        let count = self.align_up(size) >> self.block_order;
        (self.entry_offset(first), self.entry_offset(count))
    }
}
