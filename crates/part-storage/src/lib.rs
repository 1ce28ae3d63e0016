//! # Part Storage
//!
//! Crash-safe on-disk lifecycle of immutable data parts. A part is a
//! directory of column files plus metadata; this crate owns every structural
//! mutation of that directory.
//!
//! ## Lifecycle
//!
//! ```text
//! PartStorageBuilder ──finish()──→ PartStorage ──rename()──→ PartStorage
//!   (write files,                     │
//!    checksums, columns,              ├──freeze()/clone_part()──→ snapshot
//!    txn_version)                     ├──backup()──→ BackupEntries
//!                                     └──remove()──→ delete_tmp_<part> ──→ gone
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Atomic metadata | `checksums.txt`, `columns.txt` and `txn_version.txt` are written to `.tmp` and published by move/replace |
//! | Two-phase removal | A part is moved to `delete_tmp_<part>` before any file is deleted |
//! | Targeted removal | A non-empty manifest removes only the files it names; any failure falls back to recursive removal |
//! | Shared data | Shared removal never frees blobs still referenced elsewhere unless explicitly allowed |
//! | Whole-value location | Readers see either the old or the new `(root, part_dir)`, never a mix |
//! | Leases | Reservations return their bytes when dropped |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Layout, manifest, columns and version formats, errors, config
//! - `ports/` - `PartReader` (inbound), `Disk` and `Volume` (outbound)
//! - `adapters/` - `LocalDisk`, `InMemoryDisk`, `SingleDiskVolume`, diagnostic sinks
//! - `service/` - `PartStorage`, `PartStorageBuilder`, backup and recovery
//!
//! ## Usage
//!
//! ```ignore
//! use part_storage::{LocalDisk, PartStorageBuilder, SingleDiskVolume, StorageContext};
//!
//! let disk = Arc::new(LocalDisk::new("default", "/var/lib/data")?);
//! let volume = Arc::new(SingleDiskVolume::new("main", disk));
//! let ctx = StorageContext::new(PartStorageConfig::from_env());
//!
//! let builder = PartStorageBuilder::new(volume, "store/t1", "tmp_insert_all_1_1_0", ctx);
//! builder.create_directories()?;
//! // ... write column files, checksums.txt, columns.txt ...
//! let part = builder.finish()?;
//! part.rename("all_1_1_0", false, true)?;
//!
//! part.remove(&RemoveOptions::new(), &manifest, &[])?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export key types for convenience
pub use adapters::{
    DiagnosticEvent, DiagnosticSink, DiskOperation, InMemoryDisk, LocalDisk, RecordingSink,
    Reservation, SingleDiskVolume, TracingSink,
};
pub use domain::{
    csn, ChecksumManifest, ColumnDescription, ColumnList, Csn, DiskError, FileChecksum, FileHash,
    FreezeOptions, PartLocation, PartStorageConfig, PartStorageError, PartStorageResult,
    ProjectionChecksums, RemoveOptions, StorageKind, TransactionId, VersionMetadata, VersionState,
    WhichCsn,
};
pub use ports::inbound::{DirectoryEntry, PartReader};
pub use ports::outbound::{
    Disk, DiskPtr, FileStat, FileWriter, ReadSettings, RemoveRequest, SyncGuard, Volume,
    VolumePtr, WriteMode,
};
pub use service::{
    recover_interrupted_removals, BackupEntries, BackupEntry, BackupStaging, PartStorage,
    PartStorageBuilder, RecoveryError, RecoveryReport, StorageContext, TemporaryDirectory,
};
