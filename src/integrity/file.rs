//! # Local File Backend

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::backend::{check_range, BlockStorage, OperationId, QueryRangeInfo};
use super::errors::{StorageError, StorageResult};

/// Block storage backed by a local file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    file: File,
}

impl FileStorage {
    /// Opens an existing file for reading and writing.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                StorageError::io_error(format!("Failed to open {}", path.display()), e)
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Creates (or truncates) a zero-filled file of `size` bytes.
    pub fn create(path: &Path, size: u64) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| {
                StorageError::io_error(format!("Failed to create {}", path.display()), e)
            })?;

        file.set_len(size).map_err(|e| {
            StorageError::io_error(format!("Failed to size {}", path.display()), e)
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn len(&self) -> StorageResult<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| StorageError::io_error("Failed to read file metadata", e))
    }

    fn seek_to(&mut self, offset: u64) -> StorageResult<()> {
        self.file.seek(SeekFrom::Start(offset)).map_err(|e| {
            StorageError::io_error(format!("Failed to seek to offset {}", offset), e)
        })?;
        Ok(())
    }
}

impl BlockStorage for FileStorage {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        check_range(offset, buf.len() as u64, self.len()?)?;
        self.seek_to(offset)?;
        self.file.read_exact(buf).map_err(|e| {
            StorageError::io_error(format!("Failed to read at offset {}", offset), e)
        })
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> StorageResult<()> {
        check_range(offset, buf.len() as u64, self.len()?)?;
        self.seek_to(offset)?;
        self.file.write_all(buf).map_err(|e| {
            StorageError::io_error(format!("Failed to write at offset {}", offset), e)
        })
    }

    fn get_size(&mut self) -> StorageResult<u64> {
        self.len()
    }

    fn set_size(&mut self, size: u64) -> StorageResult<()> {
        self.file
            .set_len(size)
            .map_err(|e| StorageError::io_error("Failed to resize file", e))
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file
            .sync_all()
            .map_err(|e| StorageError::io_error("Failed to fsync file", e))
    }

    fn operate_range(
        &mut self,
        op: OperationId,
        offset: u64,
        size: u64,
    ) -> StorageResult<QueryRangeInfo> {
        match op {
            OperationId::FillZero => {
                check_range(offset, size, self.len()?)?;
                let zeros = vec![0u8; size.min(64 * 1024) as usize];
                let mut written = 0u64;
                while written < size {
                    let chunk = (size - written).min(zeros.len() as u64) as usize;
                    self.write(offset + written, &zeros[..chunk])?;
                    written += chunk as u64;
                }
                Ok(QueryRangeInfo::default())
            }
            OperationId::Invalidate => Ok(QueryRangeInfo::default()),
            OperationId::QueryRange => {
                Ok(QueryRangeInfo::with_flags(QueryRangeInfo::FLAG_PERSISTENT))
            }
            OperationId::DestroySignature => Err(StorageError::unsupported(format!(
                "{} is not supported by file storage",
                op
            ))),
        }
    }
}
