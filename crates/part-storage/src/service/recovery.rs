//! # Startup Recovery
//!
//! Finishes removals interrupted by a crash.
//!
//! ## Algorithm
//!
//! 1. List the direct children of a table root
//! 2. Pick directories named `delete_tmp_*` (moved aside by `remove`)
//! 3. Remove each with shared data kept, since other replicas may still
//!    reference it
//! 4. Return a report (directories removed, errors encountered)

use super::StorageContext;
use crate::domain::errors::PartStorageResult;
use crate::domain::layout::DELETE_TMP_PREFIX;
use crate::ports::outbound::VolumePtr;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

/// Result of a recovery scan.
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// Directory names removed, in scan order
    pub removed: Vec<String>,
    /// Directories that could not be removed (non-fatal)
    pub errors: Vec<RecoveryError>,
    /// Duration of the scan in milliseconds
    pub duration_ms: u64,
}

impl RecoveryReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every residue was removed.
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_removed(&mut self, directory: impl Into<String>) {
        self.removed.push(directory.into());
    }

    pub fn add_error(&mut self, error: RecoveryError) {
        self.errors.push(error);
    }
}

/// A residue that survived recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryError {
    pub directory: String,
    pub message: String,
}

impl RecoveryError {
    pub fn new(directory: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            message: message.into(),
        }
    }
}

/// Remove every `delete_tmp_*` directory directly under `root_path`.
///
/// Only a failure to list `root_path` is returned; per-directory failures are
/// reported to the sink and recorded in the report.
pub fn recover_interrupted_removals(
    volume: &VolumePtr,
    root_path: &Path,
    ctx: &StorageContext,
) -> PartStorageResult<RecoveryReport> {
    let start = Instant::now();
    let disk = volume.disk();
    let mut report = RecoveryReport::new();

    let residues: Vec<String> = disk
        .list_files(root_path)?
        .into_iter()
        .filter(|name| name.starts_with(DELETE_TMP_PREFIX))
        .filter(|name| disk.is_directory(&root_path.join(name)))
        .collect();

    for name in residues {
        let dir = root_path.join(&name);
        match disk.remove_shared_recursive(&dir, true, &HashSet::new()) {
            Ok(()) => {
                ctx.info(format!(
                    "Removed directory {} left by an interrupted part removal",
                    disk.path().join(&dir).display()
                ));
                report.add_removed(name);
            }
            Err(e) => {
                ctx.error(format!(
                    "Cannot remove directory {} left by an interrupted part removal: {}",
                    disk.path().join(&dir).display(),
                    e
                ));
                report.add_error(RecoveryError::new(name, e.to_string()));
            }
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    Ok(report)
}
