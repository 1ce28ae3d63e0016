//! # Part Storage Service - Helpers
//!
//! Write-then-publish protocol for metadata files and worklist tree walks
//! used by freeze and clone.

use super::StorageContext;
use crate::domain::errors::{DiskError, PartStorageResult};
use crate::domain::layout::TMP_SUFFIX;
use crate::domain::types::FreezeOptions;
use crate::ports::outbound::{Disk, FileWriter, ReadSettings, WriteMode};
use std::io;
use std::path::{Path, PathBuf};

/// How the temporary file takes the place of the real one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Publish {
    /// `move_file`: the destination must not exist.
    Move,
    /// `replace_file`: atomically overwrite the destination.
    Replace,
}

/// Durability requested for an atomic write.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Durability<'a> {
    /// fsync the temporary file before publishing it.
    pub sync_file: bool,
    /// Hold a sync guard on this directory across the publish step.
    pub sync_dir: Option<&'a Path>,
}

/// `<path>.tmp`
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Write `path` through `<path>.tmp`.
///
/// On any failure the temporary file is removed best-effort; a failure of
/// that cleanup is reported to the sink and the original error is returned.
pub(crate) fn write_atomically(
    disk: &dyn Disk,
    path: &Path,
    buf_size: usize,
    publish: Publish,
    durability: Durability<'_>,
    ctx: &StorageContext,
    body: impl FnOnce(&mut dyn FileWriter) -> io::Result<()>,
) -> PartStorageResult<()> {
    let tmp = tmp_path(path);

    let attempt = || -> PartStorageResult<()> {
        {
            let mut out = disk.write_file(&tmp, buf_size, WriteMode::Rewrite)?;
            body(out.as_mut()).map_err(|e| DiskError::from_io(&tmp, e))?;
            out.finalize()?;
            if durability.sync_file {
                out.sync()?;
            }
        }

        let _sync_guard = match durability.sync_dir {
            Some(dir) => Some(disk.directory_sync_guard(dir)?),
            None => None,
        };
        match publish {
            Publish::Move => disk.move_file(&tmp, path)?,
            Publish::Replace => disk.replace_file(&tmp, path)?,
        }
        Ok(())
    };

    attempt().inspect_err(|_| discard_tmp(disk, &tmp, ctx))
}

/// Remove a leftover temporary file, reporting instead of failing.
pub(crate) fn discard_tmp(disk: &dyn Disk, tmp: &Path, ctx: &StorageContext) {
    if !disk.exists(tmp) {
        return;
    }
    if let Err(e) = disk.remove_file(tmp) {
        ctx.error(format!(
            "Cannot remove temporary file {}: {}",
            disk.path().join(tmp).display(),
            e
        ));
    }
}

/// Hardlink (or copy) every file below `from` into `to`, creating `to` and
/// its subdirectories.
pub(crate) fn link_tree(
    disk: &dyn Disk,
    from: &Path,
    to: &Path,
    options: FreezeOptions,
) -> PartStorageResult<()> {
    disk.create_directories(to)?;

    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src_dir, dst_dir)) = pending.pop() {
        for name in disk.list_files(&src_dir)? {
            let src = src_dir.join(&name);
            let dst = dst_dir.join(&name);
            if disk.is_directory(&src) {
                disk.create_directory(&dst)?;
                pending.push((src, dst));
                continue;
            }

            if options.copy_instead_of_hardlink {
                disk.copy(&src, &dst)?;
            } else {
                disk.create_hard_link(&src, &dst)?;
            }
            if options.make_source_readonly {
                disk.set_read_only(&src)?;
            }
        }
    }
    Ok(())
}

/// Stream every file below `from` on `src` into `to` on `dst`.
pub(crate) fn copy_tree_across(
    src: &dyn Disk,
    from: &Path,
    dst: &dyn Disk,
    to: &Path,
    buf_size: usize,
) -> PartStorageResult<()> {
    dst.create_directories(to)?;

    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src_dir, dst_dir)) = pending.pop() {
        for name in src.list_files(&src_dir)? {
            let src_path = src_dir.join(&name);
            let dst_path = dst_dir.join(&name);
            if src.is_directory(&src_path) {
                dst.create_directory(&dst_path)?;
                pending.push((src_path, dst_path));
                continue;
            }

            let size = src.file_size(&src_path)?;
            let settings = ReadSettings::default().adjust_buffer_size(size);
            let mut input = src.read_file(&src_path, &settings, None, Some(size))?;
            let mut output = dst.write_file(&dst_path, buf_size, WriteMode::Rewrite)?;
            io::copy(&mut input, &mut output).map_err(|e| DiskError::from_io(&dst_path, e))?;
            output.finalize()?;
        }
    }
    Ok(())
}
