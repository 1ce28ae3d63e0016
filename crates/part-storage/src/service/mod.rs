//! # Part Storage Service
//!
//! Storage handles over part directories.
//!
//! ## Architecture
//!
//! - `PartStorage` is the read-mostly handle of a finished part. It owns the
//!   structural lifecycle operations (rename, remove, freeze, clone, backup)
//!   and version metadata I/O.
//! - `PartStorageBuilder` is the write path used while a part is being
//!   constructed; `finish()` turns it into a `PartStorage`.
//! - Both read through the `PartReader` port and report diagnostics to the
//!   sink in their `StorageContext`.
//!
//! Callers serialize structural operations on a given part. Reads are safe
//! from any number of threads.

mod backup;
mod builder;
mod helpers;
mod lifecycle;
mod metadata_io;
mod recovery;

pub use backup::{BackupEntries, BackupEntry, BackupStaging, TemporaryDirectory};
pub use builder::PartStorageBuilder;
pub use recovery::{recover_interrupted_removals, RecoveryError, RecoveryReport};

use crate::adapters::diagnostics::{DiagnosticSink, TracingSink};
use crate::domain::errors::{PartStorageError, PartStorageResult};
use crate::domain::layout::{self, CHECKSUMS_FILE, DETACHED_DIR};
use crate::domain::location::{LocationCell, PartLocation};
use crate::domain::types::{PartStorageConfig, StorageKind};
use crate::ports::inbound::PartReader;
use crate::ports::outbound::VolumePtr;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

// =============================================================================
// STORAGE CONTEXT
// =============================================================================

/// Configuration and diagnostics shared by storages and builders.
#[derive(Clone)]
pub struct StorageContext {
    pub config: Arc<PartStorageConfig>,
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl StorageContext {
    /// Context reporting to `tracing` under the configured logger name.
    pub fn new(config: PartStorageConfig) -> Self {
        let sink = TracingSink::new(config.logger_name.clone());
        Self {
            config: Arc::new(config),
            diagnostics: Arc::new(sink),
        }
    }

    /// Replace the diagnostic sink.
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub(crate) fn warn(&self, message: impl AsRef<str>) {
        self.diagnostics.emit(Level::WARN, message.as_ref());
    }

    pub(crate) fn error(&self, message: impl AsRef<str>) {
        self.diagnostics.emit(Level::ERROR, message.as_ref());
    }

    pub(crate) fn info(&self, message: impl AsRef<str>) {
        self.diagnostics.emit(Level::INFO, message.as_ref());
    }
}

impl Default for StorageContext {
    fn default() -> Self {
        Self::new(PartStorageConfig::default())
    }
}

impl fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// PART STORAGE
// =============================================================================

/// Handle over one part directory `(volume, root_path, part_dir)`.
pub struct PartStorage {
    volume: VolumePtr,
    location: LocationCell,
    ctx: StorageContext,
}

impl PartReader for PartStorage {
    fn volume(&self) -> &VolumePtr {
        &self.volume
    }

    fn location(&self) -> Arc<PartLocation> {
        self.location.load()
    }
}

impl fmt::Debug for PartStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartStorage")
            .field("volume", &self.volume.name())
            .field("location", &self.location.load())
            .finish()
    }
}

impl PartStorage {
    pub fn new(
        volume: VolumePtr,
        root_path: impl Into<PathBuf>,
        part_dir: impl Into<String>,
        ctx: StorageContext,
    ) -> Self {
        Self::at(volume, PartLocation::new(root_path, part_dir), ctx)
    }

    pub(crate) fn at(volume: VolumePtr, location: PartLocation, ctx: StorageContext) -> Self {
        Self {
            volume,
            location: LocationCell::new(location),
            ctx,
        }
    }

    pub fn context(&self) -> &StorageContext {
        &self.ctx
    }

    pub fn root_path(&self) -> PathBuf {
        self.location.load().root_path().to_path_buf()
    }

    pub fn part_dir(&self) -> String {
        self.location.load().part_dir().to_string()
    }

    /// Point this handle at another directory under the same root without
    /// touching the disk.
    pub fn set_relative_path(&self, part_dir: impl Into<String>) {
        let part_dir = part_dir.into();
        self.location.update(|loc| loc.with_part_dir(part_dir));
    }

    pub fn disk_name(&self) -> String {
        self.disk().name().to_string()
    }

    pub fn disk_type(&self) -> &'static str {
        self.disk().disk_type()
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.disk().storage_kind()
    }

    /// Disk root, for log messages.
    pub fn disk_path_for_logs(&self) -> String {
        self.disk().path().display().to_string()
    }

    pub fn is_stored_on_remote_disk(&self) -> bool {
        self.disk().is_remote()
    }

    pub fn supports_zero_copy_replication(&self) -> bool {
        self.disk().supports_zero_copy_replication()
    }

    pub fn supports_parallel_write(&self) -> bool {
        self.disk().supports_parallel_write()
    }

    pub fn is_broken(&self) -> bool {
        self.disk().is_broken()
    }

    /// Whether the part's disk is one of `disk_names`.
    pub fn is_stored_on_disk(&self, disk_names: &HashSet<String>) -> bool {
        disk_names.contains(self.disk().name())
    }

    /// Modification time of the part directory.
    pub fn last_modified(&self) -> PartStorageResult<std::time::SystemTime> {
        Ok(self.disk().last_modified(&self.relative_path())?)
    }

    /// Backend identity of `checksums.txt`, used for zero-copy replication.
    pub fn unique_id(&self) -> PartStorageResult<String> {
        let disk = self.disk();
        if !disk.supports_zero_copy_replication() {
            return Err(PartStorageError::logical(format!(
                "Disk {} doesn't support zero-copy replication",
                disk.name()
            )));
        }
        Ok(disk.unique_id(&self.relative_path().join(CHECKSUMS_FILE))?)
    }

    /// First free directory name for detaching this part with `prefix`.
    ///
    /// Probes `prefix_part`, `prefix_part_try1`, ... under the root (or its
    /// `detached` subdirectory). When every probe collides the last probed
    /// name is returned.
    pub fn relative_path_for_prefix(&self, prefix: &str, detached: bool) -> String {
        let location = self.location.load();
        let disk = self.disk();
        let mut parent = location.root_path().to_path_buf();
        if detached {
            parent.push(DETACHED_DIR);
        }

        let tries = self.ctx.config.detach_max_tries.max(1);
        let mut candidate = String::new();
        for try_no in 0..tries {
            candidate = layout::detach_candidate(prefix, location.part_dir(), try_no);
            if !disk.exists(&parent.join(&candidate)) {
                return candidate;
            }
            self.ctx.warn(format!(
                "Directory {} (to detach to) already exists. Will detach to directory with '_tryN' suffix.",
                candidate
            ));
        }
        candidate
    }

    /// Storage of the projection `name` of this part.
    pub fn projection(&self, name: &str) -> PartStorage {
        let location = self.location.load().nested(layout::projection_dir(name));
        PartStorage::at(self.volume.clone(), location, self.ctx.clone())
    }

    pub(crate) fn full_path_of(&self, path: &Path) -> PathBuf {
        self.disk().path().join(path)
    }
}
