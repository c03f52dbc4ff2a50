//! Integrity Verification Tests
//!
//! Tests for guarantees:
//! - Every read is verified against the stored block hash
//! - Corruption in data or hash storage is never ignored
//! - Never-written blocks read as zeros only when allowed
//! - Hashes persist across instances and process restarts
//! - Verification levels compose into a hash tree

use aeroverify::integrity::{
    BlockStorage, FileStorage, InitializeParams, IntegrityVerificationStorage, MemoryStorage,
    OperationId, QueryRangeInfo, StorageError, StorageErrorCode, StorageResult, SubStorage,
    VerificationConfig, HASH_SIZE,
};
use base64::Engine;
use rand::Rng;
use std::fs;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};

// =============================================================================
// Test Utilities
// =============================================================================

const BLOCK: u64 = 16384;

fn patterned_block(seed: u8) -> Vec<u8> {
    (0..BLOCK as usize)
        .map(|i| seed.wrapping_add((i % 253) as u8))
        .collect()
}

fn writable_params(block_size: u64) -> InitializeParams {
    InitializeParams::new(VerificationConfig::writable(block_size))
}

/// Two 16 KiB blocks: a patterned block followed by an explicit zero block.
fn write_two_blocks() -> (MemoryStorage, MemoryStorage, Vec<u8>) {
    let hash = MemoryStorage::new(HASH_SIZE * 2);
    let data = MemoryStorage::new((BLOCK * 2) as usize);

    let mut payload = patterned_block(0x21);
    payload.extend(vec![0u8; BLOCK as usize]);

    let mut storage =
        IntegrityVerificationStorage::open(hash.clone(), data.clone(), writable_params(BLOCK))
            .unwrap();
    storage.write(0, &payload).unwrap();
    storage.flush().unwrap();

    (hash, data, payload)
}

/// Memory storage that records flushes and can fail one write offset.
struct RecordingStorage {
    name: &'static str,
    inner: MemoryStorage,
    journal: Arc<Mutex<Vec<&'static str>>>,
    fail_write_at: Option<u64>,
}

impl RecordingStorage {
    fn new(name: &'static str, inner: MemoryStorage, journal: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self {
            name,
            inner,
            journal,
            fail_write_at: None,
        }
    }
}

impl BlockStorage for RecordingStorage {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        self.inner.read(offset, buf)
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> StorageResult<()> {
        if self.fail_write_at == Some(offset) {
            return Err(StorageError::io_error(
                format!("{} write failed at {}", self.name, offset),
                io::Error::other("device error"),
            ));
        }
        self.inner.write(offset, buf)
    }

    fn get_size(&mut self) -> StorageResult<u64> {
        self.inner.get_size()
    }

    fn set_size(&mut self, size: u64) -> StorageResult<()> {
        self.inner.set_size(size)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.journal.lock().unwrap().push(self.name);
        self.inner.flush()
    }

    fn operate_range(
        &mut self,
        op: OperationId,
        offset: u64,
        size: u64,
    ) -> StorageResult<QueryRangeInfo> {
        self.inner.operate_range(op, offset, size)
    }
}

// =============================================================================
// Verified Round Trips
// =============================================================================

/// Blocks written by one instance verify in a fresh instance.
#[test]
fn test_written_blocks_verify_in_new_instance() {
    let (hash, data, payload) = write_two_blocks();

    let mut storage =
        IntegrityVerificationStorage::open(hash, data, writable_params(BLOCK)).unwrap();
    assert_eq!(storage.get_size().unwrap(), BLOCK * 2);

    let mut out = vec![0u8; payload.len()];
    storage.read(0, &mut out).unwrap();
    assert_eq!(out, payload);
}

/// A read-only instance verifies sealed data written earlier.
#[test]
fn test_read_only_instance_verifies_sealed_data() {
    let (hash, data, payload) = write_two_blocks();

    let mut storage = IntegrityVerificationStorage::open(
        hash,
        data,
        InitializeParams::new(VerificationConfig::read_only(BLOCK)),
    )
    .unwrap();

    let mut out = vec![0u8; BLOCK as usize];
    storage.read(BLOCK, &mut out).unwrap();
    assert_eq!(out, &payload[BLOCK as usize..]);
}

// =============================================================================
// Corruption Is Never Ignored
// =============================================================================

/// A damaged hash entry fails only its own block.
#[test]
fn test_hash_corruption_fails_only_its_block() {
    let (mut hash, data, payload) = write_two_blocks();

    let mut entry = [0u8; 1];
    hash.read(0, &mut entry).unwrap();
    entry[0] ^= 0x01;
    hash.write(0, &entry).unwrap();

    let mut storage =
        IntegrityVerificationStorage::open(hash, data, writable_params(BLOCK)).unwrap();

    let mut out = vec![0u8; BLOCK as usize];
    let err = storage.read(0, &mut out).unwrap_err();
    assert_eq!(err.code(), StorageErrorCode::AeroDataCorruption);
    assert!(err.is_fatal());

    storage.read(BLOCK, &mut out).unwrap();
    assert_eq!(out, &payload[BLOCK as usize..]);
}

/// Any single flipped data bit is detected.
#[test]
fn test_random_data_bit_flip_detected() {
    let (hash, mut data, _) = write_two_blocks();
    let mut rng = rand::thread_rng();

    let offset = rng.gen_range(0..BLOCK * 2);
    let bit = 1u8 << rng.gen_range(0..8u32);
    let mut byte = [0u8; 1];
    data.read(offset, &mut byte).unwrap();
    byte[0] ^= bit;
    data.write(offset, &byte).unwrap();

    let mut storage =
        IntegrityVerificationStorage::open(hash, data, writable_params(BLOCK)).unwrap();

    let mut out = vec![0u8; (BLOCK * 2) as usize];
    let err = storage.read(0, &mut out).unwrap_err();
    assert_eq!(err.code(), StorageErrorCode::AeroDataCorruption);

    let expected = format!("block_index: {}", offset / BLOCK);
    assert!(
        err.details().unwrap().starts_with(&expected),
        "Corruption should name block {}, got: {}",
        offset / BLOCK,
        err
    );
}

/// Replaying a stale hash over new data is detected.
#[test]
fn test_stale_hash_detected() {
    let hash = MemoryStorage::new(HASH_SIZE);
    let data = MemoryStorage::new(BLOCK as usize);
    let mut storage =
        IntegrityVerificationStorage::open(hash.clone(), data, writable_params(BLOCK)).unwrap();

    storage.write(0, &patterned_block(1)).unwrap();
    let stale = hash.contents().unwrap();
    storage.write(0, &patterned_block(2)).unwrap();

    let mut hash_view = hash.clone();
    hash_view.write(0, &stale).unwrap();

    let mut out = vec![0u8; BLOCK as usize];
    assert!(storage.read(0, &mut out).is_err());
}

// =============================================================================
// Cleared Blocks
// =============================================================================

/// Never-written blocks read as zeros in a writable instance.
#[test]
fn test_never_written_blocks_read_as_zero() {
    let mut storage = IntegrityVerificationStorage::open(
        MemoryStorage::new(HASH_SIZE * 2),
        MemoryStorage::new((BLOCK * 2) as usize),
        writable_params(BLOCK),
    )
    .unwrap();

    let mut out = vec![0xEEu8; (BLOCK * 2) as usize];
    storage.read(0, &mut out).unwrap();
    assert!(out.iter().all(|&b| b == 0));
}

/// Sealed data never treats an all-zero hash as valid.
#[test]
fn test_sealed_data_rejects_cleared_blocks() {
    let mut storage = IntegrityVerificationStorage::open(
        MemoryStorage::new(HASH_SIZE),
        MemoryStorage::new(BLOCK as usize),
        InitializeParams::new(VerificationConfig::read_only(BLOCK)),
    )
    .unwrap();

    let mut out = vec![0u8; BLOCK as usize];
    let err = storage.read(0, &mut out).unwrap_err();
    assert_eq!(err.code(), StorageErrorCode::AeroDataCorruption);
}

// =============================================================================
// Persistence
// =============================================================================

/// Hashes and data survive closing and reopening the backing files.
#[test]
fn test_file_backed_storage_survives_reopen() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let hash_path = temp_dir.path().join("level.hash");
    let data_path = temp_dir.path().join("level.data");
    let payload = patterned_block(0x40);

    {
        let hash = FileStorage::create(&hash_path, HASH_SIZE as u64).unwrap();
        let data = FileStorage::create(&data_path, BLOCK).unwrap();
        let mut storage =
            IntegrityVerificationStorage::open(hash, data, writable_params(BLOCK)).unwrap();
        storage.write(0, &payload).unwrap();
        storage.flush().unwrap();
    }

    {
        let hash = FileStorage::open(&hash_path).unwrap();
        let data = FileStorage::open(&data_path).unwrap();
        let mut storage =
            IntegrityVerificationStorage::open(hash, data, writable_params(BLOCK)).unwrap();
        let mut out = vec![0u8; BLOCK as usize];
        storage.read(0, &mut out).unwrap();
        assert_eq!(out, payload);
    }

    // Corrupt the data file on disk
    {
        let mut contents = fs::read(&data_path).unwrap();
        let mid = contents.len() / 2;
        contents[mid] ^= 0xFF;
        fs::write(&data_path, contents).unwrap();
    }

    let hash = FileStorage::open(&hash_path).unwrap();
    let data = FileStorage::open(&data_path).unwrap();
    let mut storage =
        IntegrityVerificationStorage::open(hash, data, writable_params(BLOCK)).unwrap();
    let mut out = vec![0u8; BLOCK as usize];
    assert!(
        storage.read(0, &mut out).is_err(),
        "Corruption on disk must cause explicit failure"
    );
}

/// Configuration and salt load from a JSON file.
#[test]
fn test_salted_config_from_file() {
    let salt = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"block_size": 4096, "upper_layer_block_size": 4096, "is_writable": true, "allow_cleared_blocks": true, "salt": "{}"}}"#,
        salt
    )
    .unwrap();

    let config = VerificationConfig::load(file.path()).unwrap();
    let hash = MemoryStorage::new(HASH_SIZE);
    let data = MemoryStorage::new(4096);

    let mut salted =
        IntegrityVerificationStorage::open(hash.clone(), data.clone(), InitializeParams::new(config))
            .unwrap();
    salted.write(0, &vec![0x5Cu8; 4096]).unwrap();
    drop(salted);

    // Same bytes, no salt
    let mut unsalted =
        IntegrityVerificationStorage::open(hash, data, writable_params(4096)).unwrap();
    let mut out = vec![0u8; 4096];
    let err = unsalted.read(0, &mut out).unwrap_err();
    assert_eq!(err.code(), StorageErrorCode::AeroDataCorruption);
}

// =============================================================================
// Composition
// =============================================================================

/// Hash and data regions can share one backing store.
#[test]
fn test_hash_and_data_in_one_backing_store() {
    let hash_region = 4096u64;
    let backing = MemoryStorage::new((hash_region + BLOCK * 2) as usize);

    let hash = SubStorage::new(backing.clone(), 0, hash_region).unwrap();
    let data = SubStorage::new(backing.clone(), hash_region, BLOCK * 2).unwrap();
    let mut storage =
        IntegrityVerificationStorage::open(hash, data, writable_params(BLOCK)).unwrap();

    let mut payload = patterned_block(3);
    payload.extend(patterned_block(4));
    storage.write(0, &payload).unwrap();

    let raw = backing.contents().unwrap();
    assert_eq!(&raw[hash_region as usize..], payload.as_slice());
    assert!(raw[..HASH_SIZE * 2].iter().any(|&b| b != 0));

    let mut out = vec![0u8; payload.len()];
    storage.read(0, &mut out).unwrap();
    assert_eq!(out, payload);
}

/// A level's hashes can themselves be verified by a lower level.
#[test]
fn test_two_level_hash_tree() {
    let data_block = 512u64;
    let data_blocks = 4u64;
    let level1_size = data_blocks * HASH_SIZE as u64;

    let master = MemoryStorage::new(HASH_SIZE);
    let level1_data = MemoryStorage::new(level1_size as usize);
    let level1 = IntegrityVerificationStorage::open(
        master,
        level1_data.clone(),
        writable_params(level1_size),
    )
    .unwrap();

    let mut config = VerificationConfig::writable(data_block);
    config.upper_layer_block_size = level1_size;
    let mut level2 = IntegrityVerificationStorage::open(
        level1,
        MemoryStorage::new((data_block * data_blocks) as usize),
        InitializeParams::new(config),
    )
    .unwrap();

    let payload: Vec<u8> = (0..data_block * data_blocks).map(|i| (i % 199) as u8).collect();
    level2.write(0, &payload).unwrap();
    level2.flush().unwrap();

    let mut out = vec![0u8; payload.len()];
    level2.read(0, &mut out).unwrap();
    assert_eq!(out, payload);

    // Tamper with a level-2 hash inside level-1 data
    let mut raw = level1_data.clone();
    let mut byte = [0u8; 1];
    raw.read(HASH_SIZE as u64, &mut byte).unwrap();
    byte[0] ^= 0x80;
    raw.write(HASH_SIZE as u64, &byte).unwrap();

    let err = level2.read(0, &mut out).unwrap_err();
    assert_eq!(err.code(), StorageErrorCode::AeroDataCorruption);
}

// =============================================================================
// Ordering and Partial Failure
// =============================================================================

/// Data storage is flushed before hash storage.
#[test]
fn test_flush_orders_data_before_hash() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let hash = RecordingStorage::new("hash", MemoryStorage::new(HASH_SIZE), journal.clone());
    let data = RecordingStorage::new("data", MemoryStorage::new(BLOCK as usize), journal.clone());

    let mut storage =
        IntegrityVerificationStorage::open(hash, data, writable_params(BLOCK)).unwrap();
    storage.write(0, &patterned_block(9)).unwrap();
    storage.flush().unwrap();

    assert_eq!(*journal.lock().unwrap(), vec!["data", "hash"]);
}

/// A failed block leaves earlier blocks committed and later blocks untouched.
#[test]
fn test_failed_block_write_is_atomic_per_block() {
    let block = 512u64;
    let hash = MemoryStorage::new(HASH_SIZE * 3);
    let data = MemoryStorage::new((block * 3) as usize);

    {
        let mut sealer =
            IntegrityVerificationStorage::open(hash.clone(), data.clone(), writable_params(block))
                .unwrap();
        sealer.write(0, &vec![0x01u8; (block * 3) as usize]).unwrap();
    }
    let sealed_hash = hash.contents().unwrap();

    let journal = Arc::new(Mutex::new(Vec::new()));
    let mut failing = RecordingStorage::new("data", data.clone(), journal);
    failing.fail_write_at = Some(block);

    let mut storage =
        IntegrityVerificationStorage::open(hash.clone(), failing, writable_params(block)).unwrap();
    let err = storage.write(0, &vec![0x02u8; (block * 3) as usize]).unwrap_err();
    assert_eq!(err.code(), StorageErrorCode::AeroStorageIoError);
    drop(storage);

    // Block 2 keeps its old hash entry
    let entries = hash.contents().unwrap();
    let third = HASH_SIZE * 2..HASH_SIZE * 3;
    assert_eq!(&entries[third.clone()], &sealed_hash[third]);

    let mut verifier =
        IntegrityVerificationStorage::open(hash, data, writable_params(block)).unwrap();
    let mut out = vec![0u8; (block * 3) as usize];
    verifier.read(0, &mut out).unwrap();

    let block = block as usize;
    assert!(out[..block].iter().all(|&b| b == 0x02));
    assert!(out[block..].iter().all(|&b| b == 0x01));
}
