//! # Domain Errors
//!
//! Error types for the Part Storage subsystem.
//!
//! ## Design Principles
//!
//! - Backend races (`DiskError::NotFound`, `DiskError::AlreadyExists`) are
//!   distinguishable from contract violations so callers can pattern-match
//! - Contract violations (`LogicalError`, `NotEnoughSpace`,
//!   `DirectoryAlreadyExists`) are surfaced unchanged
//! - No panics in domain logic (use Result instead)

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Crate-wide result alias.
pub type PartStorageResult<T> = Result<T, PartStorageError>;

/// Errors produced by part lifecycle operations.
#[derive(Debug, Error)]
pub enum PartStorageError {
    /// The operation assumes a directory or file that is missing.
    #[error("Part directory {path} doesn't exist. Most likely it is a logical error.")]
    FileDoesNotExist { path: String },

    /// Destination collision without an explicit overwrite flag.
    #[error("Part directory {path} already exists")]
    DirectoryAlreadyExists { path: String },

    /// The volume could not lease the requested bytes.
    #[error("Cannot reserve {requested} bytes, not enough space")]
    NotEnoughSpace { requested: u64 },

    /// Programming or contract violation.
    #[error("Logical error: {message}")]
    LogicalError { message: String },

    /// A live file disagrees with the checksum manifest.
    #[error("Corruption: file {file} has size {actual_size}, expected {expected_size}")]
    Corruption {
        file: String,
        expected_size: u64,
        actual_size: u64,
    },

    /// A metadata file (checksums, columns, version) could not be parsed or
    /// failed its own integrity check.
    #[error("Corrupted metadata in {path}: {reason}")]
    CorruptedMetadata { path: String, reason: String },

    /// Failure reported by the disk backend.
    #[error(transparent)]
    Disk(#[from] DiskError),
}

impl PartStorageError {
    pub(crate) fn logical(message: impl Into<String>) -> Self {
        PartStorageError::LogicalError {
            message: message.into(),
        }
    }

    pub(crate) fn corrupted(path: impl Into<String>, reason: impl Into<String>) -> Self {
        PartStorageError::CorruptedMetadata {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is an expected backend race rather than a contract
    /// violation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PartStorageError::Disk(DiskError::NotFound { .. })
                | PartStorageError::Disk(DiskError::AlreadyExists { .. })
        )
    }

    /// Whether the underlying disk reported a missing path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PartStorageError::Disk(DiskError::NotFound { .. }))
    }
}

/// Errors reported by a `Disk` implementation.
#[derive(Debug, Error)]
pub enum DiskError {
    /// Path does not exist.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Path already exists where creation was requested.
    #[error("Path already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// Directory is not empty.
    #[error("Directory not empty: {path}")]
    NotEmpty { path: PathBuf },

    /// Any other I/O failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failure injected by a test backend.
    #[error("Injected failure in {operation} at {path}")]
    InjectedFailure {
        operation: &'static str,
        path: PathBuf,
    },
}

impl DiskError {
    /// Classify an `io::Error` raised while touching `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => DiskError::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::AlreadyExists => DiskError::AlreadyExists {
                path: path.to_path_buf(),
            },
            _ => DiskError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn not_found(path: &Path) -> Self {
        DiskError::NotFound {
            path: path.to_path_buf(),
        }
    }

    pub fn already_exists(path: &Path) -> Self {
        DiskError::AlreadyExists {
            path: path.to_path_buf(),
        }
    }
}
