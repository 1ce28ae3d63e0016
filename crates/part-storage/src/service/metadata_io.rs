//! # Part Storage Service - Metadata I/O
//!
//! Checksums, columns, version metadata and marker files of a part.

use super::helpers::{self, Durability, Publish};
use super::PartStorage;
use crate::adapters::volume::Reservation;
use crate::domain::checksums::ChecksumManifest;
use crate::domain::columns::ColumnList;
use crate::domain::errors::{DiskError, PartStorageError, PartStorageResult};
use crate::domain::layout::{CHECKSUMS_FILE, COLUMNS_FILE, DELETE_ON_DESTROY_MARKER, TXN_VERSION_FILE};
use crate::domain::version::{VersionMetadata, WhichCsn};
use crate::ports::inbound::PartReader;
use crate::ports::outbound::{Disk, ReadSettings, WriteMode};
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Buffer used for small appends to the version file.
const APPEND_BUFFER_SIZE: usize = 256;

impl PartStorage {
    // =========================================================================
    // CHECKSUMS AND COLUMNS
    // =========================================================================

    /// Write `checksums.txt` through a temporary file.
    pub fn write_checksums(&self, manifest: &ChecksumManifest) -> PartStorageResult<()> {
        let disk = self.disk();
        helpers::write_atomically(
            disk.as_ref(),
            &self.relative_path().join(CHECKSUMS_FILE),
            self.ctx.config.write_buffer_size,
            Publish::Move,
            Durability::default(),
            &self.ctx,
            |out| manifest.write(out),
        )
    }

    /// Write `columns.txt` through a temporary file.
    pub fn write_columns(&self, columns: &ColumnList) -> PartStorageResult<()> {
        let disk = self.disk();
        helpers::write_atomically(
            disk.as_ref(),
            &self.relative_path().join(COLUMNS_FILE),
            self.ctx.config.write_buffer_size,
            Publish::Move,
            Durability::default(),
            &self.ctx,
            |out| columns.write(out),
        )
    }

    pub fn read_checksums(&self) -> PartStorageResult<ChecksumManifest> {
        let disk = self.disk();
        let mut input = open_for_reading(disk.as_ref(), &self.relative_path().join(CHECKSUMS_FILE))?;
        ChecksumManifest::read(&mut input)
    }

    pub fn read_columns(&self) -> PartStorageResult<ColumnList> {
        let disk = self.disk();
        let mut input = open_for_reading(disk.as_ref(), &self.relative_path().join(COLUMNS_FILE))?;
        ColumnList::read(&mut input)
    }

    /// Verify live file sizes against `manifest`.
    pub fn check_consistency(&self, manifest: &ChecksumManifest) -> PartStorageResult<()> {
        manifest.check_sizes(self.disk().as_ref(), &self.relative_path())
    }

    // =========================================================================
    // VERSION METADATA
    // =========================================================================

    /// Persist the full version file: write and fsync `txn_version.txt.tmp`,
    /// then atomically replace the real file.
    pub fn write_version_metadata(
        &self,
        version: &VersionMetadata,
        fsync_part_dir: bool,
    ) -> PartStorageResult<()> {
        let disk = self.disk();
        let part_path = self.relative_path();
        let durability = Durability {
            sync_file: true,
            sync_dir: fsync_part_dir.then_some(part_path.as_path()),
        };
        helpers::write_atomically(
            disk.as_ref(),
            &part_path.join(TXN_VERSION_FILE),
            self.ctx.config.write_buffer_size,
            Publish::Replace,
            durability,
            &self.ctx,
            |out| version.write(out),
        )
    }

    /// Append a CSN record. Not fsynced: CSNs can be restored from the
    /// transaction log after a hard restart.
    pub fn append_csn_to_version_metadata(
        &self,
        version: &VersionMetadata,
        which: WhichCsn,
    ) -> PartStorageResult<()> {
        let disk = self.disk();
        let path = self.relative_path().join(TXN_VERSION_FILE);
        let mut out = disk.write_file(&path, APPEND_BUFFER_SIZE, WriteMode::Append)?;
        version
            .write_csn(&mut out, which)
            .map_err(|e| DiskError::from_io(&path, e))?;
        out.finalize()?;
        Ok(())
    }

    /// Append a removal TID record; `clear` appends an empty one.
    ///
    /// Only a non-empty removal TID is fsynced. A lost clear is repaired when
    /// metadata is reconciled after restart.
    pub fn append_removal_tid_to_version_metadata(
        &self,
        version: &VersionMetadata,
        clear: bool,
    ) -> PartStorageResult<()> {
        let disk = self.disk();
        let path = self.relative_path().join(TXN_VERSION_FILE);
        let mut out = disk.write_file(&path, APPEND_BUFFER_SIZE, WriteMode::Append)?;
        version
            .write_removal_tid(&mut out, clear)
            .map_err(|e| DiskError::from_io(&path, e))?;
        out.finalize()?;
        if !clear {
            out.sync()?;
        }
        Ok(())
    }

    /// Load version metadata, resolving interrupted writes.
    ///
    /// - `txn_version.txt` present: parse it; a stale `.tmp` beside it is
    ///   reported and removed.
    /// - Only `txn_version.txt.tmp`: the creating transaction never committed.
    ///   The part is `RolledBack` and the temporary file is removed.
    /// - Neither: the part predates transactions and is `Prehistoric`.
    pub fn load_version_metadata(&self) -> PartStorageResult<VersionMetadata> {
        let disk = self.disk();
        let path = self.relative_path().join(TXN_VERSION_FILE);
        let tmp = helpers::tmp_path(&path);

        if disk.exists(&path) {
            let mut input = open_for_reading(disk.as_ref(), &path)?;
            let version = VersionMetadata::read(&mut input)?;
            if disk.exists(&tmp) {
                self.remove_stale_version_tmp(disk.as_ref(), &tmp)?;
            }
            return Ok(version);
        }

        if !disk.exists(&tmp) {
            return Ok(VersionMetadata::prehistoric());
        }

        // Content of the temporary file may be broken, it is only reported
        self.remove_stale_version_tmp(disk.as_ref(), &tmp)?;
        Ok(VersionMetadata::rolled_back())
    }

    fn remove_stale_version_tmp(&self, disk: &dyn Disk, tmp: &Path) -> PartStorageResult<()> {
        let last_modified = disk
            .last_modified(tmp)?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut content = Vec::new();
        open_for_reading(disk, tmp)?
            .read_to_end(&mut content)
            .map_err(|e| DiskError::from_io(tmp, e))?;

        self.ctx.warn(format!(
            "Found file {} that was last modified on {}, has size {} and the following content: {}",
            disk.path().join(tmp).display(),
            last_modified,
            content.len(),
            String::from_utf8_lossy(&content)
        ));
        disk.remove_file(tmp)?;
        Ok(())
    }

    pub fn remove_version_metadata(&self) -> PartStorageResult<()> {
        Ok(self
            .disk()
            .remove_file_if_exists(&self.relative_path().join(TXN_VERSION_FILE))?)
    }

    // =========================================================================
    // MARKERS
    // =========================================================================

    /// Create the empty delete-on-destroy marker. Failures are reported to
    /// the sink, not returned.
    pub fn write_delete_on_destroy_marker(&self) {
        let disk = self.disk();
        let marker = self.relative_path().join(DELETE_ON_DESTROY_MARKER);
        if let Err(e) = disk.create_file(&marker) {
            self.ctx.error(format!(
                "{} (while creating DeleteOnDestroy marker: `{}`)",
                e,
                self.full_path_of(&marker).display()
            ));
        }
    }

    pub fn remove_delete_on_destroy_marker(&self) -> PartStorageResult<()> {
        Ok(self
            .disk()
            .remove_file_if_exists(&self.relative_path().join(DELETE_ON_DESTROY_MARKER))?)
    }

    // =========================================================================
    // RESERVATIONS
    // =========================================================================

    /// Reserve `bytes` on the part's volume.
    pub fn reserve(&self, bytes: u64) -> PartStorageResult<Reservation> {
        self.volume
            .reserve(bytes)
            .ok_or(PartStorageError::NotEnoughSpace { requested: bytes })
    }

    pub fn try_reserve(&self, bytes: u64) -> Option<Reservation> {
        self.volume.reserve(bytes)
    }
}

fn open_for_reading(disk: &dyn Disk, path: &Path) -> PartStorageResult<Box<dyn Read + Send>> {
    let size = disk.file_size(path)?;
    let settings = ReadSettings::default().adjust_buffer_size(size);
    Ok(disk.read_file(path, &settings, None, Some(size))?)
}
