//! Verification configuration
//!
//! Immutable once a storage instance is initialized. Built in code or loaded
//! from a JSON file:
//!
//! ```json
//! {
//!   "block_size": 16384,
//!   "upper_layer_block_size": 16384,
//!   "is_real_data": false,
//!   "is_writable": true,
//!   "allow_cleared_blocks": true,
//!   "salt": "<base64, 32 bytes>"
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::errors::{StorageError, StorageResult};
use super::hash::HashSalt;

/// Errors raised while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for StorageError {
    fn from(err: ConfigError) -> Self {
        StorageError::configuration(err.to_string())
    }
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration of one verification level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Size of a verification block in bytes (power of two).
    pub block_size: u64,
    /// Alignment used for hash-storage I/O (power of two).
    pub upper_layer_block_size: u64,
    /// Whether all-zero content is expected to occur legitimately.
    #[serde(default)]
    pub is_real_data: bool,
    /// Whether writes are permitted.
    #[serde(default)]
    pub is_writable: bool,
    /// Whether never-written, all-zero blocks read back as zeros.
    #[serde(default)]
    pub allow_cleared_blocks: bool,
    /// Optional base64-encoded salt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            block_size: 16 * 1024,
            upper_layer_block_size: 16 * 1024,
            is_real_data: false,
            is_writable: false,
            allow_cleared_blocks: false,
            salt: None,
        }
    }
}

impl VerificationConfig {
    /// Create a read-only configuration with the given sizes.
    pub fn new(block_size: u64, upper_layer_block_size: u64) -> Self {
        Self {
            block_size,
            upper_layer_block_size,
            ..Self::default()
        }
    }

    /// Create a read-only configuration for sealed, real data.
    pub fn read_only(block_size: u64) -> Self {
        Self {
            block_size,
            upper_layer_block_size: block_size,
            is_real_data: true,
            ..Self::default()
        }
    }

    /// Create a writable configuration that tolerates cleared blocks.
    pub fn writable(block_size: u64) -> Self {
        Self {
            block_size,
            upper_layer_block_size: block_size,
            is_writable: true,
            allow_cleared_blocks: true,
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON text and validates it.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&contents)
    }

    /// Validates sizes and salt encoding.
    pub fn validate(&self) -> StorageResult<()> {
        self.check().map_err(StorageError::from)
    }

    fn check(&self) -> ConfigResult<()> {
        if !is_power_of_two(self.block_size) {
            return Err(ConfigError::Invalid(format!(
                "block_size {} is not a positive power of two",
                self.block_size
            )));
        }
        if !is_power_of_two(self.upper_layer_block_size) {
            return Err(ConfigError::Invalid(format!(
                "upper_layer_block_size {} is not a positive power of two",
                self.upper_layer_block_size
            )));
        }
        if let Some(ref encoded) = self.salt {
            HashSalt::from_base64(encoded).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    /// log2 of the block size.
    pub fn block_order(&self) -> u32 {
        self.block_size.trailing_zeros()
    }

    /// log2 of the upper-layer block size.
    pub fn upper_layer_block_order(&self) -> u32 {
        self.upper_layer_block_size.trailing_zeros()
    }

    /// Decodes the configured salt, if any.
    pub fn decode_salt(&self) -> StorageResult<Option<HashSalt>> {
        self.salt.as_deref().map(HashSalt::from_base64).transpose()
    }
}

fn is_power_of_two(value: u64) -> bool {
    value != 0 && value.is_power_of_two()
}
