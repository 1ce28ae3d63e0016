//! # Value Objects
//!
//! Configuration for the Part Storage subsystem.
//!
//! All values have defaults suitable for production; hosts either build a
//! config with the `with_*` methods, embed it in their own configuration file
//! (it is `serde`-deserializable), or read it from the environment.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration shared by every storage and builder created from the same
/// `StorageContext`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartStorageConfig {
    /// How many `_tryN` names to probe when choosing a detach destination
    /// (default: 10).
    pub detach_max_tries: usize,

    /// Whether builders fsync the part directory when they finish
    /// (default: false).
    ///
    /// Directory fsyncs are only needed when the *existence* of files must
    /// survive a hard restart, not just their content.
    pub fsync_part_dir: bool,

    /// Buffer size for metadata file writes (default: 4 KiB).
    pub write_buffer_size: usize,

    /// Prefix of per-disk backup staging directories (default: `tmp/backup_`).
    pub backup_staging_prefix: String,

    /// Logger name attached to every diagnostic event
    /// (default: `DataPartStorage`).
    pub logger_name: String,
}

impl Default for PartStorageConfig {
    fn default() -> Self {
        Self {
            detach_max_tries: 10,
            fsync_part_dir: false,
            write_buffer_size: 4096,
            backup_staging_prefix: "tmp/backup_".to_string(),
            logger_name: "DataPartStorage".to_string(),
        }
    }
}

impl PartStorageConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PART_STORAGE_DETACH_MAX_TRIES`: detach probe bound (default: 10)
    /// - `PART_STORAGE_FSYNC_PART_DIR`: fsync part directories (default: false)
    /// - `PART_STORAGE_WRITE_BUFFER_SIZE`: metadata write buffer (default: 4096)
    /// - `PART_STORAGE_BACKUP_PREFIX`: staging prefix (default: tmp/backup_)
    /// - `PART_STORAGE_LOGGER`: logger name (default: DataPartStorage)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            detach_max_tries: env::var("PART_STORAGE_DETACH_MAX_TRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.detach_max_tries),

            fsync_part_dir: env::var("PART_STORAGE_FSYNC_PART_DIR")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.fsync_part_dir),

            write_buffer_size: env::var("PART_STORAGE_WRITE_BUFFER_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.write_buffer_size),

            backup_staging_prefix: env::var("PART_STORAGE_BACKUP_PREFIX")
                .unwrap_or(defaults.backup_staging_prefix),

            logger_name: env::var("PART_STORAGE_LOGGER").unwrap_or(defaults.logger_name),
        }
    }

    /// Set the detach probe bound.
    pub fn with_detach_max_tries(mut self, tries: usize) -> Self {
        self.detach_max_tries = tries;
        self
    }

    /// Enable or disable part directory fsync on builder completion.
    pub fn with_fsync_part_dir(mut self, fsync: bool) -> Self {
        self.fsync_part_dir = fsync;
        self
    }

    /// Set the metadata write buffer size.
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Set the backup staging prefix.
    pub fn with_backup_staging_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.backup_staging_prefix = prefix.into();
        self
    }

    /// Set the logger name.
    pub fn with_logger_name(mut self, name: impl Into<String>) -> Self {
        self.logger_name = name.into();
        self
    }
}
