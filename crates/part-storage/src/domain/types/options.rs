//! # Operation Options
//!
//! Flags accepted by lifecycle operations, and the closed set of storage kinds.

use std::collections::HashSet;

/// Concrete storage kind behind a part.
///
/// Hardlinks are only defined between two `OnDisk` storages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Files on a path-addressable disk with native hardlinks.
    OnDisk,
    /// Objects in a remote store addressed through local metadata.
    RemoteObject,
    /// Process-local test backend.
    InMemory,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::OnDisk => "on-disk",
            StorageKind::RemoteObject => "remote-object",
            StorageKind::InMemory => "in-memory",
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for `PartStorage::remove`.
#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    /// Free shared (reference-counted) data instead of only dropping this
    /// part's references.
    pub can_remove_shared_data: bool,
    /// File names whose shared data must be kept regardless.
    pub names_not_to_remove: HashSet<String>,
}

impl RemoveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shared_data_removal(mut self, allowed: bool) -> Self {
        self.can_remove_shared_data = allowed;
        self
    }

    pub fn keep_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names_not_to_remove
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// `keep_shared` flag passed to the disk.
    pub(crate) fn keep_shared(&self) -> bool {
        !self.can_remove_shared_data
    }
}

/// Options for `PartStorage::freeze`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreezeOptions {
    /// Mark every source file read-only after linking it.
    pub make_source_readonly: bool,
    /// Copy file contents instead of hardlinking.
    pub copy_instead_of_hardlink: bool,
}
