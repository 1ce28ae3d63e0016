//! # Part Storage Service - Builder
//!
//! Write path used while a part directory is being constructed.

use super::{PartStorage, StorageContext};
use crate::adapters::volume::Reservation;
use crate::domain::errors::{PartStorageError, PartStorageResult};
use crate::domain::layout;
use crate::domain::location::{LocationCell, PartLocation};
use crate::domain::types::StorageKind;
use crate::ports::inbound::PartReader;
use crate::ports::outbound::{FileWriter, SyncGuard, VolumePtr, WriteMode};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Mutating view over a part directory under construction.
///
/// Reservations taken through the builder live as long as the builder and
/// are returned to the volume by `finish()` or on drop.
pub struct PartStorageBuilder {
    volume: VolumePtr,
    location: LocationCell,
    ctx: StorageContext,
    reservations: Mutex<Vec<Reservation>>,
}

impl PartReader for PartStorageBuilder {
    fn volume(&self) -> &VolumePtr {
        &self.volume
    }

    fn location(&self) -> Arc<PartLocation> {
        self.location.load()
    }
}

impl fmt::Debug for PartStorageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartStorageBuilder")
            .field("volume", &self.volume.name())
            .field("location", &self.location.load())
            .field("reserved", &self.reserved_bytes())
            .finish()
    }
}

impl PartStorageBuilder {
    pub fn new(
        volume: VolumePtr,
        root_path: impl Into<PathBuf>,
        part_dir: impl Into<String>,
        ctx: StorageContext,
    ) -> Self {
        Self::at(volume, PartLocation::new(root_path, part_dir), ctx)
    }

    fn at(volume: VolumePtr, location: PartLocation, ctx: StorageContext) -> Self {
        Self {
            volume,
            location: LocationCell::new(location),
            ctx,
            reservations: Mutex::new(Vec::new()),
        }
    }

    pub fn context(&self) -> &StorageContext {
        &self.ctx
    }

    /// Create the part directory and any missing parents.
    pub fn create_directories(&self) -> PartStorageResult<()> {
        Ok(self.disk().create_directories(&self.relative_path())?)
    }

    /// Create the `<name>.proj` subdirectory.
    pub fn create_projection(&self, name: &str) -> PartStorageResult<()> {
        let dir = self.relative_path().join(layout::projection_dir(name));
        Ok(self.disk().create_directory(&dir)?)
    }

    /// Builder over the projection `name` of this part.
    pub fn projection(&self, name: &str) -> PartStorageBuilder {
        let location = self.location.load().nested(layout::projection_dir(name));
        PartStorageBuilder::at(self.volume.clone(), location, self.ctx.clone())
    }

    /// Open `path` for writing, truncating any previous content.
    pub fn write_file(&self, path: &str, buf_size: usize) -> PartStorageResult<Box<dyn FileWriter>> {
        let full = self.relative_path().join(path);
        Ok(self.disk().write_file(&full, buf_size, WriteMode::Rewrite)?)
    }

    pub fn remove_file(&self, path: &str) -> PartStorageResult<()> {
        Ok(self.disk().remove_file(&self.relative_path().join(path))?)
    }

    /// Remove the whole part directory.
    pub fn remove_recursive(&self) -> PartStorageResult<()> {
        Ok(self.disk().remove_recursive(&self.relative_path())?)
    }

    /// Remove the part directory, keeping shared data on remote disks when
    /// `keep_in_remote_fs` is set.
    pub fn remove_shared_recursive(&self, keep_in_remote_fs: bool) -> PartStorageResult<()> {
        Ok(self.disk().remove_shared_recursive(
            &self.relative_path(),
            keep_in_remote_fs,
            &HashSet::new(),
        )?)
    }

    /// Hardlink `from` of `source` as `to` in this part.
    ///
    /// Only defined between two on-disk storages on the same disk. Any other
    /// pairing fails before the disk is touched.
    pub fn create_hard_link_from(
        &self,
        source: &dyn PartReader,
        from: &str,
        to: &str,
    ) -> PartStorageResult<()> {
        let source_disk = source.disk();
        let disk = self.disk();

        match (source_disk.storage_kind(), disk.storage_kind()) {
            (StorageKind::OnDisk, StorageKind::OnDisk) => {}
            (StorageKind::OnDisk, other) | (other, _) => {
                return Err(PartStorageError::logical(format!(
                    "Cannot create hardlink from different storage. Expected on-disk storage, got {}",
                    other
                )))
            }
        }
        if source_disk.name() != disk.name() {
            return Err(PartStorageError::logical(format!(
                "Cannot create hardlink from disk {} to disk {}",
                source_disk.name(),
                disk.name()
            )));
        }

        Ok(disk.create_hard_link(
            &source.relative_path().join(from),
            &self.relative_path().join(to),
        )?)
    }

    /// Reserve `bytes` and hold the lease until the builder finishes.
    pub fn reserve(&self, bytes: u64) -> PartStorageResult<()> {
        let reservation = self
            .volume
            .reserve(bytes)
            .ok_or(PartStorageError::NotEnoughSpace { requested: bytes })?;
        self.reservations.lock().push(reservation);
        Ok(())
    }

    /// Bytes currently held by this builder.
    pub fn reserved_bytes(&self) -> u64 {
        self.reservations.lock().iter().map(Reservation::size).sum()
    }

    /// Guard that fsyncs the part directory when dropped.
    pub fn directory_sync_guard(&self) -> PartStorageResult<Box<dyn SyncGuard>> {
        Ok(self.disk().directory_sync_guard(&self.relative_path())?)
    }

    pub fn set_relative_path(&self, part_dir: impl Into<String>) {
        let part_dir = part_dir.into();
        self.location.update(|loc| loc.with_part_dir(part_dir));
    }

    /// Read-only storage over the current location. The builder stays usable.
    pub fn storage(&self) -> PartStorage {
        PartStorage::at(
            self.volume.clone(),
            (*self.location.load()).clone(),
            self.ctx.clone(),
        )
    }

    /// Finish construction: release reservations, fsync the part directory
    /// when configured, and hand over a `PartStorage`.
    pub fn finish(self) -> PartStorageResult<PartStorage> {
        let Self {
            volume,
            location,
            ctx,
            reservations,
        } = self;
        drop(reservations);

        let location = (*location.load()).clone();
        if ctx.config.fsync_part_dir {
            let _sync_guard = volume.disk().directory_sync_guard(&location.relative_path())?;
        }
        Ok(PartStorage::at(volume, location, ctx))
    }
}
