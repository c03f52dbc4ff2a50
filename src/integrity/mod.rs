//! Integrity verification subsystem for aeroverify
//!
//! One level of a block-hash tree. Every read is verified against a SHA-256
//! hash stored in a separate hash storage; every write updates that hash.
//!
//! # Design Principles
//!
//! - Verified on every read, before bytes reach the caller
//! - Halt on corruption: a mismatch is a fatal error, never repaired
//! - Never-written blocks are distinguishable from written ones
//! - Levels compose: a verification storage is itself a `BlockStorage`
//!
//! # Invariants Enforced
//!
//! - Written hashes always carry the validation bit
//! - Hash comparison is constant-time
//! - Data is flushed before hashes
//! - The logical size never changes after initialization

mod backend;
mod buffer;
mod config;
mod errors;
mod file;
mod hash;
mod memory;
mod sub_storage;
mod verification;

pub use backend::{BlockStorage, OperationId, QueryRangeInfo};
pub use buffer::{BufferHandle, BufferManager, MemoryBufferManager, PooledBuffer};
pub use config::{ConfigError, ConfigResult, VerificationConfig};
pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use file::FileStorage;
pub use hash::{
    compute_block_hash, BlockHash, HashGenerator, HashGeneratorFactory, HashSalt,
    Sha256Generator, Sha256GeneratorFactory, HASH_SIZE, SALT_SIZE,
};
pub use memory::MemoryStorage;
pub use sub_storage::SubStorage;
pub use verification::{InitializeParams, IntegrityVerificationStorage};
