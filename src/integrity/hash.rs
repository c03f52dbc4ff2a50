//! Block hashes and pluggable hash generation
//!
//! A `BlockHash` is the 32-byte digest stored for every verification block.
//! The top bit of its last byte is the validation bit: every hash produced by
//! a write has it set, so the all-zero entry can only mean "never written".

use std::fmt;

use base64::Engine as _;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::errors::{StorageError, StorageResult};

/// Size in bytes of one stored block hash
pub const HASH_SIZE: usize = 32;

/// Size in bytes of a hash salt
pub const SALT_SIZE: usize = 32;

const VALIDATION_BIT: u8 = 0x80;

/// Digest stored for a single verification block.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHash([u8; HASH_SIZE]);

impl BlockHash {
    /// The sentinel value of an entry that was never written.
    pub const CLEARED: BlockHash = BlockHash([0u8; HASH_SIZE]);

    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copies a hash out of a 32-byte slice.
    ///
    /// Returns `None` if the slice has the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; HASH_SIZE] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Returns the raw bytes mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; HASH_SIZE] {
        &mut self.0
    }

    /// Forces the validation bit to 1.
    pub fn set_validation_bit(&mut self) {
        self.0[HASH_SIZE - 1] |= VALIDATION_BIT;
    }

    /// Returns whether the validation bit is set.
    pub fn has_validation_bit(&self) -> bool {
        self.0[HASH_SIZE - 1] & VALIDATION_BIT != 0
    }

    /// Returns whether this is the never-written sentinel.
    pub fn is_cleared(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Constant-time comparison against another hash.
    pub fn ct_matches(&self, other: &BlockHash) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

/// Extra bytes mixed into every block hash of one storage instance.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HashSalt([u8; SALT_SIZE]);

impl HashSalt {
    /// Wraps raw salt bytes.
    pub fn new(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Decodes a salt from standard base64.
    pub fn from_base64(encoded: &str) -> StorageResult<Self> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| StorageError::configuration(format!("Invalid salt encoding: {}", e)))?;
        let bytes: [u8; SALT_SIZE] = decoded.as_slice().try_into().map_err(|_| {
            StorageError::configuration(format!(
                "Salt must be {} bytes, got {}",
                SALT_SIZE,
                decoded.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

impl fmt::Debug for HashSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashSalt(<redacted>)")
    }
}

/// Stateful digest computation.
pub trait HashGenerator {
    /// Resets the generator to its initial state.
    fn initialize(&mut self);

    /// Feeds bytes into the digest.
    fn update(&mut self, data: &[u8]);

    /// Writes the digest of everything fed since the last `initialize`.
    fn get_hash(&mut self, out: &mut [u8; HASH_SIZE]);
}

/// Produces a fresh generator per hash computation.
pub trait HashGeneratorFactory: Send + Sync {
    /// Creates a new, initialized generator.
    fn create(&self) -> Box<dyn HashGenerator>;
}

/// SHA-256 backed generator.
#[derive(Default, Clone)]
pub struct Sha256Generator {
    hasher: Sha256,
}

impl fmt::Debug for Sha256Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sha256Generator")
    }
}

impl Sha256Generator {
    /// Create a new generator
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashGenerator for Sha256Generator {
    fn initialize(&mut self) {
        self.hasher = Sha256::new();
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.hasher, data);
    }

    fn get_hash(&mut self, out: &mut [u8; HASH_SIZE]) {
        let digest = self.hasher.finalize_reset();
        out.copy_from_slice(&digest);
    }
}

/// Factory for `Sha256Generator`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256GeneratorFactory;

impl HashGeneratorFactory for Sha256GeneratorFactory {
    fn create(&self) -> Box<dyn HashGenerator> {
        Box::new(Sha256Generator::new())
    }
}

/// Computes the stored form of a block hash: `H(salt || data)` with the
/// validation bit forced.
///
/// Reads and writes both go through this routine, so a stored hash and a
/// freshly computed one agree on the validation bit.
pub fn compute_block_hash(
    generator: &mut dyn HashGenerator,
    salt: Option<&HashSalt>,
    data: &[u8],
) -> BlockHash {
    generator.initialize();
    if let Some(salt) = salt {
        generator.update(salt.as_bytes());
    }
    generator.update(data);

    let mut hash = BlockHash::default();
    generator.get_hash(hash.as_bytes_mut());
    hash.set_validation_bit();
    hash
}
