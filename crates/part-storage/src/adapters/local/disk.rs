use crate::domain::errors::DiskError;
use crate::domain::types::StorageKind;
use crate::ports::outbound::{Disk, FileWriter, ReadSettings, RemoveRequest, SyncGuard, WriteMode};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Disk backed by a directory of the local filesystem.
///
/// Hardlinks are native; there is no shared data, so the shared-removal
/// calls behave like their plain counterparts.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    name: String,
    root: PathBuf,
}

impl LocalDisk {
    /// Disk rooted at `root`. The directory is created if missing.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Result<Self, DiskError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| DiskError::from_io(&root, e))?;
        Ok(Self {
            name: name.into(),
            root,
        })
    }

    fn full(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn io<T>(&self, path: &Path, result: std::io::Result<T>) -> Result<T, DiskError> {
        result.map_err(|e| DiskError::from_io(path, e))
    }

    fn require_absent(&self, path: &Path) -> Result<(), DiskError> {
        if self.full(path).symlink_metadata().is_ok() {
            return Err(DiskError::already_exists(path));
        }
        Ok(())
    }

    /// Remove a file or a whole tree. A missing path is already removed.
    fn remove_tree(&self, path: &Path) -> Result<(), DiskError> {
        let full = self.full(path);
        let result = match full.symlink_metadata() {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&full),
            Ok(_) => fs::remove_file(&full),
            Err(e) => Err(e),
        };
        match result {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(DiskError::from_io(path, e)),
            _ => Ok(()),
        }
    }
}

impl Disk for LocalDisk {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.root
    }

    fn storage_kind(&self) -> StorageKind {
        StorageKind::OnDisk
    }

    fn disk_type(&self) -> &'static str {
        "local"
    }

    fn exists(&self, path: &Path) -> bool {
        self.full(path).symlink_metadata().is_ok()
    }

    fn is_directory(&self, path: &Path) -> bool {
        self.full(path).is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        self.full(path).is_file()
    }

    fn file_size(&self, path: &Path) -> Result<u64, DiskError> {
        Ok(self.io(path, fs::metadata(self.full(path)))?.len())
    }

    fn last_modified(&self, path: &Path) -> Result<SystemTime, DiskError> {
        let metadata = self.io(path, fs::metadata(self.full(path)))?;
        self.io(path, metadata.modified())
    }

    fn set_last_modified(&self, path: &Path, time: SystemTime) -> Result<(), DiskError> {
        let file = self.io(path, File::open(self.full(path)))?;
        self.io(path, file.set_modified(time))
    }

    #[cfg(unix)]
    fn ref_count(&self, path: &Path) -> Result<u32, DiskError> {
        use std::os::unix::fs::MetadataExt;
        let metadata = self.io(path, fs::metadata(self.full(path)))?;
        Ok(u32::try_from(metadata.nlink().saturating_sub(1)).unwrap_or(u32::MAX))
    }

    #[cfg(not(unix))]
    fn ref_count(&self, path: &Path) -> Result<u32, DiskError> {
        self.io(path, fs::metadata(self.full(path)))?;
        Ok(0)
    }

    fn read_file(
        &self,
        path: &Path,
        settings: &ReadSettings,
        _read_hint: Option<usize>,
        file_size: Option<u64>,
    ) -> Result<Box<dyn Read + Send>, DiskError> {
        let file = self.io(path, File::open(self.full(path)))?;
        let settings = match file_size {
            Some(size) => settings.adjust_buffer_size(size),
            None => *settings,
        };
        Ok(Box::new(BufReader::with_capacity(settings.buffer_size, file)))
    }

    fn write_file(
        &self,
        path: &Path,
        buf_size: usize,
        mode: WriteMode,
    ) -> Result<Box<dyn FileWriter>, DiskError> {
        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            WriteMode::Rewrite => options.write(true).truncate(true),
            WriteMode::Append => options.append(true),
        };
        let file = self.io(path, options.open(self.full(path)))?;
        Ok(Box::new(LocalFileWriter {
            path: path.to_path_buf(),
            inner: BufWriter::with_capacity(buf_size.max(1), file),
        }))
    }

    fn create_file(&self, path: &Path) -> Result<(), DiskError> {
        self.io(
            path,
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.full(path)),
        )?;
        Ok(())
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<(), DiskError> {
        self.require_absent(to)?;
        self.io(from, fs::rename(self.full(from), self.full(to)))
    }

    fn replace_file(&self, from: &Path, to: &Path) -> Result<(), DiskError> {
        self.io(from, fs::rename(self.full(from), self.full(to)))
    }

    fn move_directory(&self, from: &Path, to: &Path) -> Result<(), DiskError> {
        if !self.is_directory(from) {
            return Err(DiskError::not_found(from));
        }
        self.require_absent(to)?;
        self.io(from, fs::rename(self.full(from), self.full(to)))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<(), DiskError> {
        self.require_absent(to)?;
        if self.is_file(from) {
            self.io(from, fs::copy(self.full(from), self.full(to)))?;
            return Ok(());
        }
        if !self.is_directory(from) {
            return Err(DiskError::not_found(from));
        }

        let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
        while let Some((src, dst)) = pending.pop() {
            self.io(&dst, fs::create_dir(self.full(&dst)))?;
            for entry in self.io(&src, fs::read_dir(self.full(&src)))? {
                let entry = self.io(&src, entry)?;
                let name = entry.file_name();
                let (child_src, child_dst) = (src.join(&name), dst.join(&name));
                if self.io(&child_src, entry.file_type())?.is_dir() {
                    pending.push((child_src, child_dst));
                } else {
                    self.io(
                        &child_src,
                        fs::copy(self.full(&child_src), self.full(&child_dst)),
                    )?;
                }
            }
        }
        Ok(())
    }

    fn create_hard_link(&self, src: &Path, dst: &Path) -> Result<(), DiskError> {
        self.io(dst, fs::hard_link(self.full(src), self.full(dst)))
    }

    fn create_directory(&self, path: &Path) -> Result<(), DiskError> {
        self.io(path, fs::create_dir(self.full(path)))
    }

    fn create_directories(&self, path: &Path) -> Result<(), DiskError> {
        self.io(path, fs::create_dir_all(self.full(path)))
    }

    fn remove_file(&self, path: &Path) -> Result<(), DiskError> {
        self.io(path, fs::remove_file(self.full(path)))
    }

    fn remove_file_if_exists(&self, path: &Path) -> Result<(), DiskError> {
        match fs::remove_file(self.full(path)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(DiskError::from_io(path, e)),
            _ => Ok(()),
        }
    }

    fn remove_directory(&self, path: &Path) -> Result<(), DiskError> {
        let full = self.full(path);
        let is_empty = self
            .io(path, fs::read_dir(&full))?
            .next()
            .is_none();
        if !is_empty {
            return Err(DiskError::NotEmpty {
                path: path.to_path_buf(),
            });
        }
        self.io(path, fs::remove_dir(&full))
    }

    fn remove_recursive(&self, path: &Path) -> Result<(), DiskError> {
        self.remove_tree(path)
    }

    fn remove_shared_recursive(
        &self,
        path: &Path,
        _keep_shared: bool,
        _names_not_to_remove: &HashSet<String>,
    ) -> Result<(), DiskError> {
        self.remove_tree(path)
    }

    fn remove_shared_files(
        &self,
        files: &[RemoveRequest],
        _keep_shared: bool,
        _names_not_to_remove: &HashSet<String>,
    ) -> Result<(), DiskError> {
        for request in files {
            if request.if_exists {
                self.remove_file_if_exists(&request.path)?;
            } else {
                self.remove_file(&request.path)?;
            }
        }
        Ok(())
    }

    fn list_files(&self, path: &Path) -> Result<Vec<String>, DiskError> {
        let mut names = Vec::new();
        for entry in self.io(path, fs::read_dir(self.full(path)))? {
            let entry = self.io(path, entry)?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn unique_id(&self, path: &Path) -> Result<String, DiskError> {
        if !self.exists(path) {
            return Err(DiskError::not_found(path));
        }
        Ok(path.display().to_string())
    }

    fn set_read_only(&self, path: &Path) -> Result<(), DiskError> {
        let full = self.full(path);
        let mut permissions = self.io(path, fs::metadata(&full))?.permissions();
        permissions.set_readonly(true);
        self.io(path, fs::set_permissions(&full, permissions))
    }

    fn is_remote(&self) -> bool {
        false
    }

    fn is_broken(&self) -> bool {
        false
    }

    fn supports_zero_copy_replication(&self) -> bool {
        false
    }

    fn supports_parallel_write(&self) -> bool {
        false
    }

    fn directory_sync_guard(&self, path: &Path) -> Result<Box<dyn SyncGuard>, DiskError> {
        let dir = self.io(path, File::open(self.full(path)))?;
        Ok(Box::new(LocalSyncGuard { dir }))
    }

    #[cfg(feature = "space-probe")]
    fn available_space(&self) -> Result<u64, DiskError> {
        self.io(&self.root, fs2::available_space(&self.root))
    }

    #[cfg(not(feature = "space-probe"))]
    fn available_space(&self) -> Result<u64, DiskError> {
        Ok(u64::MAX)
    }
}

struct LocalFileWriter {
    path: PathBuf,
    inner: BufWriter<File>,
}

impl Write for LocalFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl FileWriter for LocalFileWriter {
    fn finalize(&mut self) -> Result<(), DiskError> {
        self.inner
            .flush()
            .map_err(|e| DiskError::from_io(&self.path, e))
    }

    fn sync(&mut self) -> Result<(), DiskError> {
        self.finalize()?;
        self.inner
            .get_ref()
            .sync_all()
            .map_err(|e| DiskError::from_io(&self.path, e))
    }
}

/// Fsyncs the directory when dropped.
struct LocalSyncGuard {
    dir: File,
}

impl SyncGuard for LocalSyncGuard {}

impl Drop for LocalSyncGuard {
    fn drop(&mut self) {
        let _ = self.dir.sync_all();
    }
}
