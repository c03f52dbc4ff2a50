//! Integrity storage error types
//!
//! Error codes:
//! - AERO_INTEGRITY_CONFIGURATION (ERROR severity)
//! - AERO_INTEGRITY_UNSUPPORTED (ERROR severity)
//! - AERO_INTEGRITY_INVALID_ARGUMENT (ERROR severity)
//! - AERO_INTEGRITY_PERMISSION_DENIED (ERROR severity)
//! - AERO_DATA_CORRUPTION (FATAL severity)
//! - AERO_RESOURCE_EXHAUSTED (ERROR severity, retryable)
//! - AERO_STORAGE_IO_ERROR (ERROR severity)

use std::fmt;
use std::io;

/// Severity levels for integrity errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, caller continues
    Error,
    /// Stored data can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Error codes raised by the verification layer and its backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Bad sizes, double initialize, use before ready or after finalize
    AeroIntegrityConfiguration,
    /// Operation the storage never supports (resize)
    AeroIntegrityUnsupported,
    /// Misaligned or out-of-range request, undersized buffer
    AeroIntegrityInvalidArgument,
    /// Write on a read-only instance
    AeroIntegrityPermissionDenied,
    /// Block hash mismatch
    AeroDataCorruption,
    /// Buffer manager could not supply cache space
    AeroResourceExhausted,
    /// Backing storage I/O failure
    AeroStorageIoError,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::AeroIntegrityConfiguration => "AERO_INTEGRITY_CONFIGURATION",
            StorageErrorCode::AeroIntegrityUnsupported => "AERO_INTEGRITY_UNSUPPORTED",
            StorageErrorCode::AeroIntegrityInvalidArgument => "AERO_INTEGRITY_INVALID_ARGUMENT",
            StorageErrorCode::AeroIntegrityPermissionDenied => {
                "AERO_INTEGRITY_PERMISSION_DENIED"
            }
            StorageErrorCode::AeroDataCorruption => "AERO_DATA_CORRUPTION",
            StorageErrorCode::AeroResourceExhausted => "AERO_RESOURCE_EXHAUSTED",
            StorageErrorCode::AeroStorageIoError => "AERO_STORAGE_IO_ERROR",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::AeroDataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Returns whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageErrorCode::AeroResourceExhausted)
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error with full context
#[derive(Debug)]
pub struct StorageError {
    /// Error code
    code: StorageErrorCode,
    /// Human-readable message
    message: String,
    /// Optional details about the error context
    details: Option<String>,
    /// Underlying IO error if applicable
    source: Option<io::Error>,
}

impl StorageError {
    fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a configuration error (bad sizes, wrong lifecycle state)
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::AeroIntegrityConfiguration, message)
    }

    /// Create an unsupported operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::AeroIntegrityUnsupported, message)
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::AeroIntegrityInvalidArgument, message)
    }

    /// Create an invalid argument error for a range outside the storage
    pub fn out_of_range(offset: u64, size: u64, limit: u64) -> Self {
        Self {
            code: StorageErrorCode::AeroIntegrityInvalidArgument,
            message: "Range exceeds storage bounds".to_string(),
            details: Some(format!(
                "offset: {}, size: {}, limit: {}",
                offset, size, limit
            )),
            source: None,
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::AeroIntegrityPermissionDenied, message)
    }

    /// Create a data corruption error for a verification block (FATAL)
    pub fn corrupted_block(block_index: u64, byte_offset: u64) -> Self {
        Self {
            code: StorageErrorCode::AeroDataCorruption,
            message: "Block hash mismatch".to_string(),
            details: Some(format!(
                "block_index: {}, byte_offset: {}",
                block_index, byte_offset
            )),
            source: None,
        }
    }

    /// Create a resource exhausted error
    pub fn resource_exhausted(requested: usize, available: usize) -> Self {
        Self {
            code: StorageErrorCode::AeroResourceExhausted,
            message: "Buffer manager cannot supply cache space".to_string(),
            details: Some(format!("requested: {}, available: {}", requested, available)),
            source: None,
        }
    }

    /// Create a backing storage I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::AeroStorageIoError,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error means stored data cannot be trusted
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns whether the caller may retry after relieving pressure elsewhere
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
