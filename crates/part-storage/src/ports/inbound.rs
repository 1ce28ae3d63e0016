//! # Inbound Ports (Driving Ports)
//!
//! Read operations shared by `PartStorage` and `PartStorageBuilder`.
//!
//! Implementors supply their volume and current location; everything else is
//! derived. All paths taken by these methods are relative to the part
//! directory.

use crate::domain::errors::{DiskError, PartStorageResult};
use crate::domain::location::PartLocation;
use crate::ports::outbound::{Disk, DiskPtr, FileStat, ReadSettings, VolumePtr};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Direct child of a part (or nested) directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_file: bool,
}

/// Read access to a part directory.
pub trait PartReader {
    /// Volume the part lives on.
    fn volume(&self) -> &VolumePtr;

    /// Current location snapshot.
    fn location(&self) -> Arc<PartLocation>;

    fn disk(&self) -> DiskPtr {
        self.volume().disk()
    }

    /// `root_path/part_dir`, relative to the disk.
    fn relative_path(&self) -> PathBuf {
        self.location().relative_path()
    }

    /// Absolute path of the part directory.
    fn full_path(&self) -> PathBuf {
        self.disk().path().join(self.relative_path())
    }

    /// Absolute path of the parent directory.
    fn full_root_path(&self) -> PathBuf {
        self.disk().path().join(self.location().root_path())
    }

    /// Whether the part directory exists.
    fn exists(&self) -> bool {
        self.disk().exists(&self.relative_path())
    }

    /// Whether `path` exists inside the part.
    fn exists_path(&self, path: &str) -> bool {
        self.disk().exists(&self.relative_path().join(path))
    }

    fn is_directory(&self, path: &str) -> bool {
        self.disk().is_directory(&self.relative_path().join(path))
    }

    fn file_size(&self, path: &str) -> PartStorageResult<u64> {
        Ok(self.disk().file_size(&self.relative_path().join(path))?)
    }

    fn stat(&self, path: &str) -> PartStorageResult<FileStat> {
        let disk = self.disk();
        let full = self.relative_path().join(path);
        Ok(FileStat {
            size: disk.file_size(&full)?,
            last_modified: disk.last_modified(&full)?,
            ref_count: disk.ref_count(&full)?,
        })
    }

    /// Open `path` for buffered sequential reading.
    fn read_file(
        &self,
        path: &str,
        settings: &ReadSettings,
        read_hint: Option<usize>,
        file_size: Option<u64>,
    ) -> PartStorageResult<Box<dyn Read + Send>> {
        Ok(self.disk().read_file(
            &self.relative_path().join(path),
            settings,
            read_hint,
            file_size,
        )?)
    }

    /// Read the whole of `path`.
    fn read_to_end(&self, path: &str) -> PartStorageResult<Vec<u8>> {
        let disk = self.disk();
        let full = self.relative_path().join(path);
        let size = disk.file_size(&full)?;
        let settings = ReadSettings::default().adjust_buffer_size(size);
        let mut input = disk.read_file(&full, &settings, None, Some(size))?;
        let mut data = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        input
            .read_to_end(&mut data)
            .map_err(|e| DiskError::from_io(&full, e))?;
        Ok(data)
    }

    /// Direct children of the part directory.
    fn iterate(&self) -> PartStorageResult<Vec<DirectoryEntry>> {
        self.iterate_directory("")
    }

    /// Direct children of a nested directory of the part.
    fn iterate_directory(&self, path: &str) -> PartStorageResult<Vec<DirectoryEntry>> {
        let disk = self.disk();
        let dir = self.relative_path().join(path);
        let names = disk.list_files(&dir)?;
        Ok(names
            .into_iter()
            .map(|name| {
                let is_file = disk.is_file(&dir.join(&name));
                DirectoryEntry { name, is_file }
            })
            .collect())
    }

    /// Bytes of every file below the part directory.
    fn total_size_on_disk(&self) -> PartStorageResult<u64> {
        total_size(self.disk().as_ref(), &self.relative_path())
    }
}

/// Sum of file sizes below `root`, walked with an explicit worklist.
pub(crate) fn total_size(disk: &dyn Disk, root: &Path) -> PartStorageResult<u64> {
    if disk.is_file(root) {
        return Ok(disk.file_size(root)?);
    }
    let mut total = 0u64;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for name in disk.list_files(&dir)? {
            let path = dir.join(name);
            if disk.is_file(&path) {
                total += disk.file_size(&path)?;
            } else {
                pending.push(path);
            }
        }
    }
    Ok(total)
}
