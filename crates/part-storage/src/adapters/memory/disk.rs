use crate::domain::errors::DiskError;
use crate::domain::types::StorageKind;
use crate::ports::outbound::{Disk, FileWriter, ReadSettings, RemoveRequest, SyncGuard, WriteMode};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// File content shared by every hardlink pointing at it.
#[derive(Debug, Clone)]
struct Inode {
    data: Vec<u8>,
    links: u32,
    modified: SystemTime,
    read_only: bool,
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Directory { modified: SystemTime },
    File { inode: u64 },
}

/// A recorded disk call, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskOperation {
    pub name: &'static str,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<PathBuf, Entry>,
    inodes: HashMap<u64, Inode>,
    next_inode: u64,
    /// Blobs whose last link was removed while shared data had to be kept.
    retained: HashMap<u64, Inode>,
    failpoints: Vec<(&'static str, Option<PathBuf>)>,
    journal: Vec<DiskOperation>,
}

impl MemoryState {
    fn record(&mut self, name: &'static str, path: &Path) {
        self.journal.push(DiskOperation {
            name,
            path: path.to_path_buf(),
        });
    }

    fn check_failpoint(&self, operation: &'static str, path: &Path) -> Result<(), DiskError> {
        let hit = self.failpoints.iter().any(|(op, target)| {
            *op == operation && target.as_ref().map_or(true, |t| t == path)
        });
        if hit {
            return Err(DiskError::InjectedFailure {
                operation,
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    fn is_dir(&self, key: &Path) -> bool {
        key.as_os_str().is_empty() || matches!(self.entries.get(key), Some(Entry::Directory { .. }))
    }

    fn exists(&self, key: &Path) -> bool {
        key.as_os_str().is_empty() || self.entries.contains_key(key)
    }

    fn inode_of(&self, key: &Path) -> Result<u64, DiskError> {
        match self.entries.get(key) {
            Some(Entry::File { inode }) => Ok(*inode),
            _ => Err(DiskError::not_found(key)),
        }
    }

    fn inode(&self, key: &Path) -> Result<&Inode, DiskError> {
        let id = self.inode_of(key)?;
        self.inodes.get(&id).ok_or_else(|| DiskError::not_found(key))
    }

    fn inode_mut(&mut self, key: &Path) -> Result<&mut Inode, DiskError> {
        let id = self.inode_of(key)?;
        self.inodes.get_mut(&id).ok_or_else(|| DiskError::not_found(key))
    }

    fn require_parent_dir(&self, key: &Path) -> Result<(), DiskError> {
        match key.parent() {
            Some(parent) if !self.is_dir(parent) => Err(DiskError::not_found(parent)),
            _ => Ok(()),
        }
    }

    fn require_absent(&self, key: &Path) -> Result<(), DiskError> {
        if self.exists(key) {
            return Err(DiskError::already_exists(key));
        }
        Ok(())
    }

    /// Every entry strictly below `key`, parents before children.
    fn descendants(&self, key: &Path) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|p| p.as_path() != key && p.starts_with(key))
            .cloned()
            .collect()
    }

    fn new_file(&mut self, key: PathBuf, data: Vec<u8>) {
        let id = self.next_inode;
        self.next_inode += 1;
        self.inodes.insert(
            id,
            Inode {
                data,
                links: 1,
                modified: SystemTime::now(),
                read_only: false,
            },
        );
        self.entries.insert(key, Entry::File { inode: id });
    }

    /// Drop the link at `key`. When it was the last one, the blob is either
    /// freed or kept aside depending on `retain`.
    fn unlink(&mut self, key: &Path, retain: bool) -> Result<(), DiskError> {
        let id = self.inode_of(key)?;
        self.entries.remove(key);
        let Some(inode) = self.inodes.get_mut(&id) else {
            return Ok(());
        };
        inode.links = inode.links.saturating_sub(1);
        if inode.links == 0 {
            if let Some(inode) = self.inodes.remove(&id) {
                if retain {
                    self.retained.insert(id, inode);
                }
            }
        }
        Ok(())
    }

    fn used_bytes(&self) -> u64 {
        self.inodes.values().map(|i| i.data.len() as u64).sum()
    }
}

/// Process-local disk with hardlinks, reference-counted blobs, configurable
/// capabilities and failure injection.
///
/// Production uses `LocalDisk`. A remote-flagged instance keeps blobs whose
/// last link is removed with `keep_shared` set, which is how a zero-copy
/// backend leaves data referenced by another replica in place.
#[derive(Debug, Clone)]
pub struct InMemoryDisk {
    name: String,
    root: PathBuf,
    kind: StorageKind,
    remote: bool,
    zero_copy: bool,
    parallel_write: bool,
    broken: bool,
    capacity: u64,
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryDisk {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            root: PathBuf::from(format!("memory://{}/", name)),
            name,
            kind: StorageKind::InMemory,
            remote: false,
            zero_copy: false,
            parallel_write: false,
            broken: false,
            capacity: u64::MAX,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Behave like a remote object store with zero-copy replication.
    pub fn remote(mut self) -> Self {
        self.kind = StorageKind::RemoteObject;
        self.remote = true;
        self.zero_copy = true;
        self
    }

    /// Report a different storage kind (e.g. emulate an on-disk backend).
    pub fn emulating(mut self, kind: StorageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_zero_copy(mut self, enabled: bool) -> Self {
        self.zero_copy = enabled;
        self
    }

    pub fn with_parallel_write(mut self, enabled: bool) -> Self {
        self.parallel_write = enabled;
        self
    }

    pub fn with_broken(mut self, broken: bool) -> Self {
        self.broken = broken;
        self
    }

    /// Total bytes this disk can hold.
    pub fn with_capacity(mut self, bytes: u64) -> Self {
        self.capacity = bytes;
        self
    }

    /// Fail every future `operation` call.
    pub fn fail_on(&self, operation: &'static str) {
        self.state.lock().failpoints.push((operation, None));
    }

    /// Fail future `operation` calls on exactly `path`.
    pub fn fail_on_path(&self, operation: &'static str, path: impl AsRef<Path>) {
        let key = normalize(path.as_ref());
        self.state.lock().failpoints.push((operation, Some(key)));
    }

    pub fn clear_failures(&self) {
        self.state.lock().failpoints.clear();
    }

    /// Every call recorded so far.
    pub fn operations(&self) -> Vec<DiskOperation> {
        self.state.lock().journal.clone()
    }

    /// Whether `operation` was called at all.
    pub fn was_called(&self, operation: &str) -> bool {
        self.state.lock().journal.iter().any(|op| op.name == operation)
    }

    pub fn clear_operations(&self) {
        self.state.lock().journal.clear();
    }

    /// Blobs kept alive by shared removals.
    pub fn retained_blobs(&self) -> usize {
        self.state.lock().retained.len()
    }

    /// Create a file with `data`, creating parent directories as needed.
    pub fn put_file(&self, path: impl AsRef<Path>, data: &[u8]) -> Result<(), DiskError> {
        let key = normalize(path.as_ref());
        let mut state = self.state.lock();
        if let Some(parent) = key.parent() {
            create_all(&mut state, parent)?;
        }
        match state.entries.get(&key) {
            Some(Entry::Directory { .. }) => Err(DiskError::already_exists(&key)),
            Some(Entry::File { .. }) => {
                let inode = state.inode_mut(&key)?;
                inode.data = data.to_vec();
                inode.modified = SystemTime::now();
                Ok(())
            }
            None => {
                state.new_file(key, data.to_vec());
                Ok(())
            }
        }
    }

    /// Content of the file at `path`.
    pub fn file_content(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let key = normalize(path.as_ref());
        self.state.lock().inode(&key).ok().map(|i| i.data.clone())
    }

    pub fn is_read_only(&self, path: impl AsRef<Path>) -> bool {
        let key = normalize(path.as_ref());
        self.state
            .lock()
            .inode(&key)
            .map(|i| i.read_only)
            .unwrap_or(false)
    }

    /// Every path below `path`, relative to it, sorted.
    pub fn tree(&self, path: impl AsRef<Path>) -> Vec<PathBuf> {
        let key = normalize(path.as_ref());
        let state = self.state.lock();
        state
            .descendants(&key)
            .into_iter()
            .filter_map(|p| p.strip_prefix(&key).ok().map(Path::to_path_buf))
            .collect()
    }

    fn begin(
        &self,
        operation: &'static str,
        path: &Path,
    ) -> Result<(MutexGuard<'_, MemoryState>, PathBuf), DiskError> {
        let key = normalize(path);
        let mut state = self.state.lock();
        state.record(operation, &key);
        state.check_failpoint(operation, &key)?;
        Ok((state, key))
    }

    fn keeps_shared_data(&self, keep_shared: bool, key: &Path, names: &HashSet<String>) -> bool {
        if !self.remote && !self.zero_copy {
            return false;
        }
        keep_shared
            || key
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| names.contains(n))
    }
}

/// Keep only the normal components of `path`.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

fn create_all(state: &mut MemoryState, key: &Path) -> Result<(), DiskError> {
    let mut current = PathBuf::new();
    for part in key.iter() {
        current.push(part);
        match state.entries.get(&current) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File { .. }) => return Err(DiskError::already_exists(&current)),
            None => {
                state.entries.insert(
                    current.clone(),
                    Entry::Directory {
                        modified: SystemTime::now(),
                    },
                );
            }
        }
    }
    Ok(())
}

impl Disk for InMemoryDisk {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.root
    }

    fn storage_kind(&self) -> StorageKind {
        self.kind
    }

    fn disk_type(&self) -> &'static str {
        "memory"
    }

    fn exists(&self, path: &Path) -> bool {
        self.state.lock().exists(&normalize(path))
    }

    fn is_directory(&self, path: &Path) -> bool {
        self.state.lock().is_dir(&normalize(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(
            self.state.lock().entries.get(&normalize(path)),
            Some(Entry::File { .. })
        )
    }

    fn file_size(&self, path: &Path) -> Result<u64, DiskError> {
        let key = normalize(path);
        Ok(self.state.lock().inode(&key)?.data.len() as u64)
    }

    fn last_modified(&self, path: &Path) -> Result<SystemTime, DiskError> {
        let key = normalize(path);
        let state = self.state.lock();
        match state.entries.get(&key) {
            Some(Entry::Directory { modified }) => Ok(*modified),
            Some(Entry::File { .. }) => Ok(state.inode(&key)?.modified),
            None => Err(DiskError::not_found(&key)),
        }
    }

    fn set_last_modified(&self, path: &Path, time: SystemTime) -> Result<(), DiskError> {
        let (mut state, key) = self.begin("set_last_modified", path)?;
        match state.entries.get_mut(&key) {
            Some(Entry::Directory { modified }) => {
                *modified = time;
                Ok(())
            }
            Some(Entry::File { .. }) => {
                state.inode_mut(&key)?.modified = time;
                Ok(())
            }
            None => Err(DiskError::not_found(&key)),
        }
    }

    fn ref_count(&self, path: &Path) -> Result<u32, DiskError> {
        let key = normalize(path);
        Ok(self.state.lock().inode(&key)?.links.saturating_sub(1))
    }

    fn read_file(
        &self,
        path: &Path,
        _settings: &ReadSettings,
        _read_hint: Option<usize>,
        _file_size: Option<u64>,
    ) -> Result<Box<dyn Read + Send>, DiskError> {
        let (state, key) = self.begin("read_file", path)?;
        let data = state.inode(&key)?.data.clone();
        Ok(Box::new(Cursor::new(data)))
    }

    fn write_file(
        &self,
        path: &Path,
        buf_size: usize,
        mode: WriteMode,
    ) -> Result<Box<dyn FileWriter>, DiskError> {
        let (mut state, key) = self.begin("write_file", path)?;
        state.require_parent_dir(&key)?;
        if state.is_dir(&key) {
            return Err(DiskError::already_exists(&key));
        }

        if !state.entries.contains_key(&key) {
            state.new_file(key.clone(), Vec::new());
        }
        let inode_id = state.inode_of(&key)?;
        let inode = state.inode_mut(&key)?;
        if inode.read_only {
            return Err(DiskError::Io {
                path: key,
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }
        if mode == WriteMode::Rewrite {
            inode.data.clear();
        }
        inode.modified = SystemTime::now();

        Ok(Box::new(MemoryFileWriter {
            state: Arc::clone(&self.state),
            path: key,
            inode: inode_id,
            buffer: Vec::with_capacity(buf_size.min(1 << 20)),
        }))
    }

    fn create_file(&self, path: &Path) -> Result<(), DiskError> {
        let (mut state, key) = self.begin("create_file", path)?;
        state.require_parent_dir(&key)?;
        state.require_absent(&key)?;
        state.new_file(key, Vec::new());
        Ok(())
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<(), DiskError> {
        let (mut state, from) = self.begin("move_file", from)?;
        let to = normalize(to);
        let inode = state.inode_of(&from)?;
        state.require_parent_dir(&to)?;
        state.require_absent(&to)?;
        state.entries.remove(&from);
        state.entries.insert(to, Entry::File { inode });
        Ok(())
    }

    fn replace_file(&self, from: &Path, to: &Path) -> Result<(), DiskError> {
        let (mut state, from) = self.begin("replace_file", from)?;
        let to = normalize(to);
        let inode = state.inode_of(&from)?;
        state.require_parent_dir(&to)?;
        if state.is_dir(&to) {
            return Err(DiskError::already_exists(&to));
        }
        if state.entries.contains_key(&to) {
            state.unlink(&to, false)?;
        }
        state.entries.remove(&from);
        state.entries.insert(to, Entry::File { inode });
        Ok(())
    }

    fn move_directory(&self, from: &Path, to: &Path) -> Result<(), DiskError> {
        let (mut state, from) = self.begin("move_directory", from)?;
        let to = normalize(to);
        if !state.entries.contains_key(&from) || !state.is_dir(&from) {
            return Err(DiskError::not_found(&from));
        }
        state.require_parent_dir(&to)?;
        state.require_absent(&to)?;
        if to.starts_with(&from) {
            return Err(DiskError::Io {
                path: to,
                source: io::Error::from(io::ErrorKind::InvalidInput),
            });
        }

        let mut moved = vec![from.clone()];
        moved.extend(state.descendants(&from));
        for old in moved {
            if let Some(entry) = state.entries.remove(&old) {
                let suffix = old.strip_prefix(&from).unwrap_or(Path::new(""));
                state.entries.insert(to.join(suffix), entry);
            }
        }
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<(), DiskError> {
        let (mut state, from) = self.begin("copy", from)?;
        let to = normalize(to);
        if !state.exists(&from) {
            return Err(DiskError::not_found(&from));
        }
        state.require_parent_dir(&to)?;
        state.require_absent(&to)?;

        let mut sources = vec![from.clone()];
        sources.extend(state.descendants(&from));
        for source in sources {
            let suffix = source.strip_prefix(&from).unwrap_or(Path::new(""));
            let target = if suffix.as_os_str().is_empty() {
                to.clone()
            } else {
                to.join(suffix)
            };
            match state.entries.get(&source).copied() {
                Some(Entry::Directory { .. }) => {
                    state.entries.insert(
                        target,
                        Entry::Directory {
                            modified: SystemTime::now(),
                        },
                    );
                }
                Some(Entry::File { .. }) => {
                    let data = state.inode(&source)?.data.clone();
                    state.new_file(target, data);
                }
                None => {}
            }
        }
        Ok(())
    }

    fn create_hard_link(&self, src: &Path, dst: &Path) -> Result<(), DiskError> {
        let (mut state, src) = self.begin("create_hard_link", src)?;
        let dst = normalize(dst);
        let inode = state.inode_of(&src)?;
        state.require_parent_dir(&dst)?;
        state.require_absent(&dst)?;
        state.inode_mut(&src)?.links += 1;
        state.entries.insert(dst, Entry::File { inode });
        Ok(())
    }

    fn create_directory(&self, path: &Path) -> Result<(), DiskError> {
        let (mut state, key) = self.begin("create_directory", path)?;
        state.require_parent_dir(&key)?;
        state.require_absent(&key)?;
        state.entries.insert(
            key,
            Entry::Directory {
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn create_directories(&self, path: &Path) -> Result<(), DiskError> {
        let (mut state, key) = self.begin("create_directories", path)?;
        create_all(&mut state, &key)
    }

    fn remove_file(&self, path: &Path) -> Result<(), DiskError> {
        let (mut state, key) = self.begin("remove_file", path)?;
        state.unlink(&key, false)
    }

    fn remove_file_if_exists(&self, path: &Path) -> Result<(), DiskError> {
        let (mut state, key) = self.begin("remove_file_if_exists", path)?;
        if state.entries.contains_key(&key) {
            state.unlink(&key, false)?;
        }
        Ok(())
    }

    fn remove_directory(&self, path: &Path) -> Result<(), DiskError> {
        let (mut state, key) = self.begin("remove_directory", path)?;
        if !matches!(state.entries.get(&key), Some(Entry::Directory { .. })) {
            return Err(DiskError::not_found(&key));
        }
        if !state.descendants(&key).is_empty() {
            return Err(DiskError::NotEmpty { path: key });
        }
        state.entries.remove(&key);
        Ok(())
    }

    fn remove_recursive(&self, path: &Path) -> Result<(), DiskError> {
        let (mut state, key) = self.begin("remove_recursive", path)?;
        remove_tree(&mut state, &key, |_| false)
    }

    fn remove_shared_recursive(
        &self,
        path: &Path,
        keep_shared: bool,
        names_not_to_remove: &HashSet<String>,
    ) -> Result<(), DiskError> {
        let (mut state, key) = self.begin("remove_shared_recursive", path)?;
        remove_tree(&mut state, &key, |file| {
            self.keeps_shared_data(keep_shared, file, names_not_to_remove)
        })
    }

    fn remove_shared_files(
        &self,
        files: &[RemoveRequest],
        keep_shared: bool,
        names_not_to_remove: &HashSet<String>,
    ) -> Result<(), DiskError> {
        let mut state = self.state.lock();
        for request in files {
            let key = normalize(&request.path);
            state.record("remove_shared_files", &key);
            state.check_failpoint("remove_shared_files", &key)?;
            if !state.entries.contains_key(&key) {
                if request.if_exists {
                    continue;
                }
                return Err(DiskError::not_found(&key));
            }
            let retain = self.keeps_shared_data(keep_shared, &key, names_not_to_remove);
            state.unlink(&key, retain)?;
        }
        Ok(())
    }

    fn list_files(&self, path: &Path) -> Result<Vec<String>, DiskError> {
        let (state, key) = self.begin("list_files", path)?;
        if !state.is_dir(&key) {
            return Err(DiskError::not_found(&key));
        }
        Ok(state
            .entries
            .keys()
            .filter(|p| p.parent() == Some(key.as_path()))
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect())
    }

    fn unique_id(&self, path: &Path) -> Result<String, DiskError> {
        let key = normalize(path);
        let inode = self.state.lock().inode_of(&key)?;
        Ok(format!("{}/blob_{:08}", self.name, inode))
    }

    fn set_read_only(&self, path: &Path) -> Result<(), DiskError> {
        let (mut state, key) = self.begin("set_read_only", path)?;
        state.inode_mut(&key)?.read_only = true;
        Ok(())
    }

    fn is_remote(&self) -> bool {
        self.remote
    }

    fn is_broken(&self) -> bool {
        self.broken
    }

    fn supports_zero_copy_replication(&self) -> bool {
        self.zero_copy
    }

    fn supports_parallel_write(&self) -> bool {
        self.parallel_write
    }

    fn directory_sync_guard(&self, path: &Path) -> Result<Box<dyn SyncGuard>, DiskError> {
        let (state, key) = self.begin("directory_sync_guard", path)?;
        if !state.is_dir(&key) {
            return Err(DiskError::not_found(&key));
        }
        Ok(Box::new(MemorySyncGuard {
            state: Arc::clone(&self.state),
            path: key,
        }))
    }

    fn available_space(&self) -> Result<u64, DiskError> {
        Ok(self.capacity.saturating_sub(self.state.lock().used_bytes()))
    }
}

/// Remove `key` and everything below it; `retain(file)` decides whether a
/// file's blob is kept when its last link goes away.
fn remove_tree(
    state: &mut MemoryState,
    key: &Path,
    retain: impl Fn(&Path) -> bool,
) -> Result<(), DiskError> {
    match state.entries.get(key).copied() {
        None => Ok(()),
        Some(Entry::File { .. }) => state.unlink(key, retain(key)),
        Some(Entry::Directory { .. }) => {
            // Children first
            for path in state.descendants(key).into_iter().rev() {
                match state.entries.get(&path).copied() {
                    Some(Entry::File { .. }) => {
                        let keep = retain(&path);
                        state.unlink(&path, keep)?;
                    }
                    Some(Entry::Directory { .. }) => {
                        state.entries.remove(&path);
                    }
                    None => {}
                }
            }
            state.entries.remove(key);
            Ok(())
        }
    }
}

/// Buffered writer over one inode. Bytes reach the inode on finalize, sync
/// or drop.
struct MemoryFileWriter {
    state: Arc<Mutex<MemoryState>>,
    path: PathBuf,
    inode: u64,
    buffer: Vec<u8>,
}

impl MemoryFileWriter {
    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        // Writes to an unlinked file are lost, as on a real filesystem
        if let Some(inode) = state.inodes.get_mut(&self.inode) {
            inode.data.extend_from_slice(&self.buffer);
            inode.modified = SystemTime::now();
        }
        self.buffer.clear();
    }
}

impl Write for MemoryFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer();
        Ok(())
    }
}

impl FileWriter for MemoryFileWriter {
    fn finalize(&mut self) -> Result<(), DiskError> {
        self.flush_buffer();
        Ok(())
    }

    fn sync(&mut self) -> Result<(), DiskError> {
        self.flush_buffer();
        let mut state = self.state.lock();
        state.record("sync_file", &self.path);
        state.check_failpoint("sync_file", &self.path)
    }
}

impl Drop for MemoryFileWriter {
    fn drop(&mut self) {
        self.flush_buffer();
    }
}

struct MemorySyncGuard {
    state: Arc<Mutex<MemoryState>>,
    path: PathBuf,
}

impl SyncGuard for MemorySyncGuard {}

impl Drop for MemorySyncGuard {
    fn drop(&mut self) {
        self.state.lock().record("sync_directory", &self.path);
    }
}
