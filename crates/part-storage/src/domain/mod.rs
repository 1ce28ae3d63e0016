//! # Domain Layer
//!
//! Value types, on-disk formats and errors. Nothing here performs I/O except
//! through the `Disk` port passed in by the caller.

pub mod checksums;
pub mod columns;
pub mod errors;
pub mod layout;
pub mod location;
pub mod types;
pub mod version;

pub use checksums::{ChecksumManifest, FileChecksum, FileHash, ProjectionChecksums};
pub use columns::{ColumnDescription, ColumnList};
pub use errors::{DiskError, PartStorageError, PartStorageResult};
pub use location::{LocationCell, PartLocation};
pub use types::{FreezeOptions, PartStorageConfig, RemoveOptions, StorageKind};
pub use version::{csn, Csn, TransactionId, VersionMetadata, VersionState, WhichCsn};
