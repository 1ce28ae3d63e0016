//! # Part Location
//!
//! A part is addressed by `(root_path, part_dir)` relative to its disk. The
//! pair is an immutable value; `rename` and `change_root_path` swap a whole new
//! value into a `LocationCell` so readers never observe a half-updated path.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable `(root_path, part_dir)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartLocation {
    root_path: PathBuf,
    part_dir: String,
}

impl PartLocation {
    pub fn new(root_path: impl Into<PathBuf>, part_dir: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            part_dir: part_dir.into(),
        }
    }

    /// Parent directory, relative to the disk.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// The part's own directory name.
    pub fn part_dir(&self) -> &str {
        &self.part_dir
    }

    /// `root_path/part_dir`, relative to the disk.
    pub fn relative_path(&self) -> PathBuf {
        self.root_path.join(&self.part_dir)
    }

    /// `root_path/part_dir/file`, relative to the disk.
    pub fn file_path(&self, file: impl AsRef<Path>) -> PathBuf {
        self.relative_path().join(file)
    }

    pub fn with_part_dir(&self, part_dir: impl Into<String>) -> Self {
        Self {
            root_path: self.root_path.clone(),
            part_dir: part_dir.into(),
        }
    }

    pub fn with_root_path(&self, root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            part_dir: self.part_dir.clone(),
        }
    }

    /// Location of a nested directory of this part (projections).
    pub fn nested(&self, dir_name: impl Into<String>) -> Self {
        Self {
            root_path: self.relative_path(),
            part_dir: dir_name.into(),
        }
    }
}

/// Single updatable cell holding the current location.
#[derive(Debug)]
pub struct LocationCell {
    current: RwLock<Arc<PartLocation>>,
}

impl LocationCell {
    pub fn new(location: PartLocation) -> Self {
        Self {
            current: RwLock::new(Arc::new(location)),
        }
    }

    /// Snapshot of the current location.
    pub fn load(&self) -> Arc<PartLocation> {
        Arc::clone(&self.current.read())
    }

    /// Replace the location as a whole.
    pub fn store(&self, location: PartLocation) {
        *self.current.write() = Arc::new(location);
    }

    /// Replace the location with `f(current)`.
    pub fn update(&self, f: impl FnOnce(&PartLocation) -> PartLocation) {
        let mut guard = self.current.write();
        let next = f(&guard);
        *guard = Arc::new(next);
    }
}

impl Clone for LocationCell {
    fn clone(&self) -> Self {
        Self::new((*self.load()).clone())
    }
}
