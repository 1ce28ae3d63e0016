//! # Part Storage Service - Backup
//!
//! Backup entries for a part. Checksummed files are hardlinked into a
//! per-disk staging directory so the backup reads a stable copy even if the
//! part is removed meanwhile; untracked small files are read eagerly.

use super::{PartStorage, StorageContext};
use crate::adapters::diagnostics::DiagnosticSink;
use crate::domain::checksums::{hash_bytes, ChecksumManifest, FileHash};
use crate::domain::errors::PartStorageResult;
use crate::ports::inbound::PartReader;
use crate::ports::outbound::{DiskPtr, ReadSettings};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Directory removed recursively when dropped.
pub struct TemporaryDirectory {
    disk: DiskPtr,
    path: PathBuf,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl TemporaryDirectory {
    /// Create `path` on `disk`.
    pub fn create(
        disk: DiskPtr,
        path: impl Into<PathBuf>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> PartStorageResult<Self> {
        let path = path.into();
        disk.create_directories(&path)?;
        Ok(Self {
            disk,
            path,
            diagnostics,
        })
    }

    /// Path relative to the disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn disk(&self) -> &DiskPtr {
        &self.disk
    }
}

impl fmt::Debug for TemporaryDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryDirectory")
            .field("disk", &self.disk.name())
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for TemporaryDirectory {
    fn drop(&mut self) {
        if !self.disk.exists(&self.path) {
            return;
        }
        if let Err(e) = self.disk.remove_recursive(&self.path) {
            self.diagnostics.emit(
                tracing::Level::WARN,
                &format!(
                    "Cannot remove temporary directory {}: {}",
                    self.disk.path().join(&self.path).display(),
                    e
                ),
            );
        }
    }
}

/// One staging directory per disk, shared by every entry created on it.
#[derive(Debug, Default)]
pub struct BackupStaging {
    directories: HashMap<String, Arc<TemporaryDirectory>>,
}

impl BackupStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Staging directory on `disk`, created on first use.
    pub fn directory_for(
        &mut self,
        disk: &DiskPtr,
        ctx: &StorageContext,
    ) -> PartStorageResult<Arc<TemporaryDirectory>> {
        if let Some(dir) = self.directories.get(disk.name()) {
            return Ok(Arc::clone(dir));
        }
        let path = format!(
            "{}{}",
            ctx.config.backup_staging_prefix,
            Uuid::new_v4().simple()
        );
        let dir = Arc::new(TemporaryDirectory::create(
            Arc::clone(disk),
            path,
            Arc::clone(&ctx.diagnostics),
        )?);
        self.directories
            .insert(disk.name().to_string(), Arc::clone(&dir));
        Ok(dir)
    }

    /// Number of disks with a staging directory.
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}

/// A file to be written into a backup.
pub enum BackupEntry {
    /// Hardlinked copy of a checksummed file. Keeps its staging directory
    /// alive.
    ImmutableFile {
        disk: DiskPtr,
        path: PathBuf,
        size: u64,
        checksum: FileHash,
        staging: Arc<TemporaryDirectory>,
    },
    /// Content of an untracked file, read when the entry was created.
    SmallFile { data: Vec<u8> },
}

/// Entries keyed by `part_dir/file`.
pub type BackupEntries = Vec<(String, BackupEntry)>;

impl BackupEntry {
    pub fn size(&self) -> u64 {
        match self {
            BackupEntry::ImmutableFile { size, .. } => *size,
            BackupEntry::SmallFile { data } => data.len() as u64,
        }
    }

    pub fn checksum(&self) -> FileHash {
        match self {
            BackupEntry::ImmutableFile { checksum, .. } => *checksum,
            BackupEntry::SmallFile { data } => hash_bytes(data),
        }
    }

    /// Staging directory holding the hardlink, if any.
    pub fn staging_path(&self) -> Option<&Path> {
        match self {
            BackupEntry::ImmutableFile { staging, .. } => Some(staging.path()),
            BackupEntry::SmallFile { .. } => None,
        }
    }

    /// Open the entry's content.
    pub fn read(&self) -> PartStorageResult<Box<dyn Read + Send>> {
        match self {
            BackupEntry::ImmutableFile {
                disk, path, size, ..
            } => {
                let settings = ReadSettings::default().adjust_buffer_size(*size);
                Ok(disk.read_file(path, &settings, None, Some(*size))?)
            }
            BackupEntry::SmallFile { data } => Ok(Box::new(Cursor::new(data.clone()))),
        }
    }
}

impl fmt::Debug for BackupEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupEntry::ImmutableFile {
                disk,
                path,
                size,
                checksum,
                ..
            } => f
                .debug_struct("ImmutableFile")
                .field("disk", &disk.name())
                .field("path", path)
                .field("size", size)
                .field("checksum", &format!("{:032x}", checksum))
                .finish(),
            BackupEntry::SmallFile { data } => f
                .debug_struct("SmallFile")
                .field("size", &data.len())
                .finish(),
        }
    }
}

impl PartStorage {
    /// Append backup entries for this part to `entries`.
    ///
    /// Every manifest file is hardlinked into `staging/<part_dir>/`; each
    /// name in `files_without_checksums` becomes a small-file entry.
    pub fn backup(
        &self,
        staging: &mut BackupStaging,
        manifest: &ChecksumManifest,
        files_without_checksums: &BTreeSet<String>,
        entries: &mut BackupEntries,
    ) -> PartStorageResult<()> {
        let disk = self.disk();
        let location = self.location.load();
        let staging_dir = staging.directory_for(&disk, &self.ctx)?;
        let staged_part = staging_dir.path().join(location.part_dir());
        disk.create_directories(&staged_part)?;

        for (name, checksum) in manifest.files() {
            let hardlink = staged_part.join(name);
            disk.create_hard_link(&location.file_path(name), &hardlink)?;
            entries.push((
                format!("{}/{}", location.part_dir(), name),
                BackupEntry::ImmutableFile {
                    disk: Arc::clone(&disk),
                    path: hardlink,
                    size: checksum.file_size,
                    checksum: checksum.file_hash,
                    staging: Arc::clone(&staging_dir),
                },
            ));
        }

        for name in files_without_checksums {
            let data = self.read_to_end(name)?;
            entries.push((
                format!("{}/{}", location.part_dir(), name),
                BackupEntry::SmallFile { data },
            ));
        }
        Ok(())
    }
}
