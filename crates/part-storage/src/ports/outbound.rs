//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the Part Storage service.
//!
//! These are the interfaces this library requires the host application to
//! implement: a path-addressable `Disk` and a `Volume` that hands out space
//! reservations. Two disks ship with the crate (`LocalDisk`, `InMemoryDisk`)
//! along with `SingleDiskVolume`.

use crate::adapters::Reservation;
use crate::domain::errors::DiskError;
use crate::domain::types::StorageKind;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Shared handle to a disk.
pub type DiskPtr = Arc<dyn Disk>;

/// Shared handle to a volume.
pub type VolumePtr = Arc<dyn Volume>;

/// How `write_file` treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Truncate (or create) the file.
    Rewrite,
    /// Append to the file, creating it if missing.
    Append,
}

/// Read buffering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSettings {
    pub buffer_size: usize,
}

impl Default for ReadSettings {
    fn default() -> Self {
        Self {
            buffer_size: 1024 * 1024,
        }
    }
}

impl ReadSettings {
    /// Shrink the buffer to `file_size` when the file is smaller.
    pub fn adjust_buffer_size(mut self, file_size: u64) -> Self {
        let file_size = usize::try_from(file_size).unwrap_or(usize::MAX);
        self.buffer_size = self.buffer_size.min(file_size.max(1));
        self
    }
}

/// One entry of a batch removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveRequest {
    pub path: PathBuf,
    /// Tolerate a missing file.
    pub if_exists: bool,
}

impl RemoveRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            if_exists: false,
        }
    }

    pub fn if_exists(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            if_exists: true,
        }
    }
}

/// Size, modification time and sharing of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub last_modified: SystemTime,
    /// Other references to the same data (hardlinks, shared blobs).
    pub ref_count: u32,
}

/// Buffered writer returned by `Disk::write_file`.
pub trait FileWriter: Write + Send {
    /// Flush buffered bytes to the backend.
    fn finalize(&mut self) -> Result<(), DiskError>;

    /// Flush and make the content durable.
    fn sync(&mut self) -> Result<(), DiskError>;
}

/// Scoped directory fsync: the directory is synced when the guard drops.
pub trait SyncGuard: Send {}

/// Abstract path-addressable store.
///
/// All paths are relative to the disk root.
///
/// Production: `LocalDisk` (std::fs)
/// Testing: `InMemoryDisk`
pub trait Disk: Send + Sync {
    /// Disk name, unique within a host.
    fn name(&self) -> &str;

    /// Root of the disk, for logs and full paths.
    fn path(&self) -> &Path;

    /// Storage kind backing this disk.
    fn storage_kind(&self) -> StorageKind;

    /// Short backend type name ("local", "memory").
    fn disk_type(&self) -> &'static str;

    fn exists(&self, path: &Path) -> bool;
    fn is_directory(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;

    fn file_size(&self, path: &Path) -> Result<u64, DiskError>;
    fn last_modified(&self, path: &Path) -> Result<SystemTime, DiskError>;
    fn set_last_modified(&self, path: &Path, time: SystemTime) -> Result<(), DiskError>;

    /// Number of other references to the file's underlying data.
    fn ref_count(&self, path: &Path) -> Result<u32, DiskError>;

    /// Open a file for buffered sequential reading.
    fn read_file(
        &self,
        path: &Path,
        settings: &ReadSettings,
        read_hint: Option<usize>,
        file_size: Option<u64>,
    ) -> Result<Box<dyn Read + Send>, DiskError>;

    fn write_file(
        &self,
        path: &Path,
        buf_size: usize,
        mode: WriteMode,
    ) -> Result<Box<dyn FileWriter>, DiskError>;

    /// Create an empty file; fails if it already exists.
    fn create_file(&self, path: &Path) -> Result<(), DiskError>;

    /// Move a file; fails if the destination exists.
    fn move_file(&self, from: &Path, to: &Path) -> Result<(), DiskError>;

    /// Atomically replace `to` with `from`.
    fn replace_file(&self, from: &Path, to: &Path) -> Result<(), DiskError>;

    fn move_directory(&self, from: &Path, to: &Path) -> Result<(), DiskError>;

    /// Recursively copy `from` to `to` within this disk.
    fn copy(&self, from: &Path, to: &Path) -> Result<(), DiskError>;

    fn create_hard_link(&self, src: &Path, dst: &Path) -> Result<(), DiskError>;

    fn create_directory(&self, path: &Path) -> Result<(), DiskError>;
    fn create_directories(&self, path: &Path) -> Result<(), DiskError>;

    fn remove_file(&self, path: &Path) -> Result<(), DiskError>;
    fn remove_file_if_exists(&self, path: &Path) -> Result<(), DiskError>;

    /// Remove an empty directory.
    fn remove_directory(&self, path: &Path) -> Result<(), DiskError>;

    /// Remove a file or a tree. Succeeds when `path` does not exist.
    fn remove_recursive(&self, path: &Path) -> Result<(), DiskError>;

    /// Remove a tree, decrementing shared references instead of freeing data
    /// when `keep_shared` is set or the file name is in `names_not_to_remove`.
    /// Succeeds when `path` does not exist.
    fn remove_shared_recursive(
        &self,
        path: &Path,
        keep_shared: bool,
        names_not_to_remove: &HashSet<String>,
    ) -> Result<(), DiskError>;

    /// Batch variant of shared removal for an explicit file list.
    fn remove_shared_files(
        &self,
        files: &[RemoveRequest],
        keep_shared: bool,
        names_not_to_remove: &HashSet<String>,
    ) -> Result<(), DiskError>;

    /// Names of the direct children of `path`, sorted.
    fn list_files(&self, path: &Path) -> Result<Vec<String>, DiskError>;

    /// Backend-assigned stable identity of a file.
    fn unique_id(&self, path: &Path) -> Result<String, DiskError>;

    /// Mark a file read-only.
    fn set_read_only(&self, path: &Path) -> Result<(), DiskError>;

    fn is_remote(&self) -> bool;
    fn is_broken(&self) -> bool;
    fn supports_zero_copy_replication(&self) -> bool;
    fn supports_parallel_write(&self) -> bool;

    /// Guard that fsyncs `path` when dropped.
    fn directory_sync_guard(&self, path: &Path) -> Result<Box<dyn SyncGuard>, DiskError>;

    /// Free bytes available to new writes.
    fn available_space(&self) -> Result<u64, DiskError>;
}

/// A set of disks with a shared space-reservation policy.
pub trait Volume: Send + Sync {
    fn name(&self) -> &str;

    fn disk(&self) -> DiskPtr;

    /// Lease `bytes`; `None` when the volume cannot satisfy the request.
    fn reserve(&self, bytes: u64) -> Option<Reservation>;
}
