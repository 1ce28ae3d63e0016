//! # Part Storage Service - Lifecycle
//!
//! Structural operations on a finished part: rename, change of root,
//! two-phase removal, freeze and clone.
//!
//! ## Removal
//!
//! ```text
//! root/part  --move-->  root/delete_tmp_part  --clear-->  (gone)
//! ```
//!
//! The move makes the part invisible under its name before any file is
//! deleted, so two parts with the same name at different roots never race.
//! Clearing removes exactly the files named by the checksum manifest and
//! falls back to a recursive shared removal when the manifest is empty or
//! any targeted removal fails.

use super::helpers;
use super::PartStorage;
use crate::adapters::volume::SingleDiskVolume;
use crate::domain::checksums::{ChecksumManifest, ProjectionChecksums};
use crate::domain::errors::{DiskError, PartStorageError, PartStorageResult};
use crate::domain::layout::{
    self, CHECKSUMS_FILE, COLUMNS_FILE, DEFAULT_COMPRESSION_CODEC_FILE, DELETE_ON_DESTROY_MARKER,
    TXN_VERSION_FILE,
};
use crate::domain::location::PartLocation;
use crate::domain::types::{FreezeOptions, RemoveOptions};
use crate::ports::inbound::PartReader;
use crate::ports::outbound::{Disk, DiskPtr, RemoveRequest, VolumePtr};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

impl PartStorage {
    // =========================================================================
    // RENAME
    // =========================================================================

    /// Move the part to `root_path/new_relative_path`.
    ///
    /// `new_relative_path` may contain subdirectories (`detached/broken_x`).
    /// An existing destination is removed when `remove_new_dir_if_exists` is
    /// set, otherwise the call fails with `DirectoryAlreadyExists`.
    pub fn rename(
        &self,
        new_relative_path: &str,
        remove_new_dir_if_exists: bool,
        fsync_part_dir: bool,
    ) -> PartStorageResult<()> {
        let disk = self.disk();
        let location = self.location.load();
        let from = location.relative_path();

        if !disk.exists(&from) {
            return Err(PartStorageError::FileDoesNotExist {
                path: self.full_path_of(&from).display().to_string(),
            });
        }

        let last = new_relative_path.rsplit('/').next().unwrap_or_default();
        if last.is_empty() || last == "." || last == ".." {
            return Err(PartStorageError::logical(format!(
                "Cannot rename from {} to {}. Destination should end with a part directory name",
                from.display(),
                new_relative_path
            )));
        }
        let new_path = location.root_path().join(new_relative_path);
        let part_dir = last.to_string();
        let new_root = new_path.parent().map(Path::to_path_buf).unwrap_or_default();

        if disk.exists(&new_path) {
            if !remove_new_dir_if_exists {
                return Err(PartStorageError::DirectoryAlreadyExists {
                    path: self.full_path_of(&new_path).display().to_string(),
                });
            }
            let files = disk.list_files(&new_path)?;
            self.ctx.warn(format!(
                "Part directory {} already exists and contains {} files. Removing it.",
                self.full_path_of(&new_path).display(),
                files.len()
            ));
            disk.remove_recursive(&new_path)?;
        }

        disk.set_last_modified(&from, SystemTime::now())?;
        disk.move_directory(&from, &new_path)?;
        self.location.store(PartLocation::new(new_root, part_dir));

        if fsync_part_dir {
            let _sync_guard = disk.directory_sync_guard(&new_path)?;
        }
        Ok(())
    }

    /// Replace the `from_root` prefix of the root path with `to_root`.
    ///
    /// Only the handle changes; the directory must already have been moved.
    pub fn change_root_path(&self, from_root: &str, to_root: &str) -> PartStorageResult<()> {
        let location = self.location.load();
        let suffix = location
            .root_path()
            .strip_prefix(from_root)
            .map_err(|_| {
                PartStorageError::logical(format!(
                    "Cannot change part root to {} because it is not a prefix of current root {}",
                    from_root,
                    location.root_path().display()
                ))
            })?
            .to_path_buf();

        let new_root = if suffix.as_os_str().is_empty() {
            PathBuf::from(to_root)
        } else {
            Path::new(to_root).join(suffix)
        };
        self.location.store(location.with_root_path(new_root));
        Ok(())
    }

    // =========================================================================
    // REMOVE
    // =========================================================================

    /// Remove the part directory.
    ///
    /// `manifest` and `projections` describe the files to delete; an empty
    /// manifest forces recursive removal. A part that has already vanished is
    /// reported and treated as removed.
    pub fn remove(
        &self,
        options: &RemoveOptions,
        manifest: &ChecksumManifest,
        projections: &[ProjectionChecksums],
    ) -> PartStorageResult<()> {
        let disk = self.disk();
        let location = self.location.load();
        let from = location.relative_path();
        let to = location
            .root_path()
            .join(layout::delete_tmp_name(location.part_dir()));

        if disk.exists(&to) {
            self.ctx.warn(format!(
                "Directory {} (to which part must be renamed before removing) already exists. \
                 Most likely this is due to unclean restart or race condition. Removing it.",
                self.full_path_of(&to).display()
            ));
            if let Err(e) = disk.remove_shared_recursive(
                &to,
                options.keep_shared(),
                &options.names_not_to_remove,
            ) {
                self.ctx.error(format!(
                    "Cannot recursively remove directory {}. Exception: {}",
                    self.full_path_of(&to).display(),
                    e
                ));
                return Err(e.into());
            }
        }

        match disk.move_directory(&from, &to) {
            Ok(()) => {}
            Err(DiskError::NotFound { .. }) => {
                self.ctx.error(format!(
                    "Directory {} (part to remove) doesn't exist or one of nested files has gone. \
                     Most likely this is due to manual removing. This should be discouraged. Ignoring.",
                    self.full_path_of(&to).display()
                ));
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let mut projection_dirs = HashSet::new();
        for projection in projections {
            let dir_name = layout::projection_dir(&projection.name);
            self.clear_directory(
                disk.as_ref(),
                &to.join(&dir_name),
                options,
                &projection.checksums,
                &HashSet::new(),
                true,
            )?;
            projection_dirs.insert(dir_name);
        }

        self.clear_directory(disk.as_ref(), &to, options, manifest, &projection_dirs, false)
    }

    fn clear_directory(
        &self,
        disk: &dyn Disk,
        dir: &Path,
        options: &RemoveOptions,
        manifest: &ChecksumManifest,
        skip_directories: &HashSet<String>,
        is_projection: bool,
    ) -> PartStorageResult<()> {
        let keep_shared = options.keep_shared();
        let names = &options.names_not_to_remove;

        if manifest.is_empty() {
            if is_projection {
                self.ctx.error(format!(
                    "Cannot quickly remove directory {} by removing files; fallback to recursive removal. \
                     Reason: checksums.txt is missing",
                    self.full_path_of(dir).display()
                ));
            }
            disk.remove_shared_recursive(dir, keep_shared, names)?;
            return Ok(());
        }

        let mut batch: Vec<RemoveRequest> = manifest
            .file_names()
            .filter(|name| !skip_directories.contains(*name))
            .map(|name| RemoveRequest::new(dir.join(name)))
            .collect();
        batch.push(RemoveRequest::new(dir.join(CHECKSUMS_FILE)));
        batch.push(RemoveRequest::new(dir.join(COLUMNS_FILE)));
        batch.push(RemoveRequest::if_exists(dir.join(DEFAULT_COMPRESSION_CODEC_FILE)));
        batch.push(RemoveRequest::if_exists(dir.join(DELETE_ON_DESTROY_MARKER)));
        if !is_projection {
            batch.push(RemoveRequest::if_exists(dir.join(TXN_VERSION_FILE)));
        }

        let targeted = disk
            .remove_shared_files(&batch, keep_shared, names)
            .and_then(|()| disk.remove_directory(dir));

        if let Err(e) = targeted {
            self.ctx.error(format!(
                "Cannot quickly remove directory {} by removing files; fallback to recursive removal. \
                 Reason: {}",
                self.full_path_of(dir).display(),
                e
            ));
            disk.remove_shared_recursive(dir, keep_shared, names)?;
        }
        Ok(())
    }

    // =========================================================================
    // FREEZE AND CLONE
    // =========================================================================

    /// Snapshot the part into `to/dir_path` on the same disk.
    ///
    /// Files are hardlinked (or copied). `save_metadata` runs once after the
    /// tree is in place; the delete-on-destroy marker and version file are
    /// then dropped from the snapshot.
    pub fn freeze(
        &self,
        to: impl AsRef<Path>,
        dir_path: &str,
        options: FreezeOptions,
        save_metadata: impl FnOnce(&DiskPtr),
    ) -> PartStorageResult<PartStorage> {
        let to = to.as_ref();
        let disk = self.disk();
        disk.create_directories(to)?;

        let snapshot = to.join(dir_path);
        helpers::link_tree(disk.as_ref(), &self.relative_path(), &snapshot, options)?;

        save_metadata(&disk);

        disk.remove_file_if_exists(&snapshot.join(DELETE_ON_DESTROY_MARKER))?;
        disk.remove_file_if_exists(&snapshot.join(TXN_VERSION_FILE))?;

        Ok(self.storage_on(disk, to, dir_path))
    }

    /// Copy the part into `to/dir_path` on the same disk, replacing any
    /// previous copy there.
    pub fn clone_part(&self, to: impl AsRef<Path>, dir_path: &str) -> PartStorageResult<PartStorage> {
        let to = to.as_ref();
        let disk = self.disk();
        let target = to.join(dir_path);

        self.discard_previous_clone(disk.as_ref(), &target)?;
        disk.create_directories(to)?;
        disk.copy(&self.relative_path(), &target)?;
        disk.remove_file_if_exists(&target.join(DELETE_ON_DESTROY_MARKER))?;

        Ok(self.storage_on(disk, to, dir_path))
    }

    /// Copy the part into `to/dir_path` on the disk of `destination`.
    ///
    /// Uses the backend copy when both sides are the same disk and a
    /// streaming copy otherwise.
    pub fn clone_part_to(
        &self,
        destination: &VolumePtr,
        to: impl AsRef<Path>,
        dir_path: &str,
    ) -> PartStorageResult<PartStorage> {
        let source = self.disk();
        let dest = destination.disk();
        if source.name() == dest.name() {
            return self.clone_part(to, dir_path);
        }

        let to = to.as_ref();
        let target = to.join(dir_path);

        self.discard_previous_clone(dest.as_ref(), &target)?;
        dest.create_directories(to)?;
        helpers::copy_tree_across(
            source.as_ref(),
            &self.relative_path(),
            dest.as_ref(),
            &target,
            self.ctx.config.write_buffer_size,
        )?;
        dest.remove_file_if_exists(&target.join(DELETE_ON_DESTROY_MARKER))?;

        Ok(self.storage_on(dest, to, dir_path))
    }

    fn discard_previous_clone(&self, disk: &dyn Disk, target: &Path) -> PartStorageResult<()> {
        if disk.exists(target) {
            self.ctx.warn(format!(
                "Path {} already exists. Will remove it and clone again.",
                disk.path().join(target).display()
            ));
            disk.remove_recursive(target)?;
        }
        Ok(())
    }

    /// Storage at `to/dir_path` on a fresh single-disk volume over `disk`.
    fn storage_on(&self, disk: DiskPtr, to: &Path, dir_path: &str) -> PartStorage {
        let volume: VolumePtr = Arc::new(SingleDiskVolume::for_disk(disk));
        PartStorage::at(volume, PartLocation::new(to, dir_path), self.ctx.clone())
    }
}
