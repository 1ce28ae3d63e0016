//! Fixtures shared by unit tests and the workspace test crate.

use crate::adapters::{InMemoryDisk, LocalDisk, RecordingSink, SingleDiskVolume};
use crate::domain::checksums::ChecksumManifest;
use crate::domain::columns::ColumnList;
use crate::domain::errors::{DiskError, PartStorageResult};
use crate::domain::types::PartStorageConfig;
use crate::ports::outbound::VolumePtr;
use crate::service::{PartStorage, PartStorageBuilder, StorageContext};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Table root used by most fixtures.
pub const TABLE_ROOT: &str = "store/t1";

/// `data.bin` (100 bytes) and `data.mrk` (8 bytes).
pub fn sample_files() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("data.bin", (0..100u8).collect()),
        ("data.mrk", vec![0xAB; 8]),
    ]
}

pub fn sample_columns() -> ColumnList {
    let mut columns = ColumnList::new();
    columns.push("id", "UInt64");
    columns.push("payload", "String");
    columns
}

/// Fresh in-memory disk and a volume over it.
pub fn memory_volume(name: &str) -> (InMemoryDisk, VolumePtr) {
    let disk = InMemoryDisk::new(name);
    let volume = volume_over(disk.clone());
    (disk, volume)
}

/// Volume over an already configured in-memory disk.
pub fn volume_over(disk: InMemoryDisk) -> VolumePtr {
    Arc::new(SingleDiskVolume::for_disk(Arc::new(disk)))
}

/// Volume over a `LocalDisk` rooted at `root`.
pub fn local_volume(name: &str, root: &Path) -> Result<VolumePtr, DiskError> {
    let disk = LocalDisk::new(name, root)?;
    Ok(Arc::new(SingleDiskVolume::for_disk(Arc::new(disk))))
}

/// Context whose diagnostics are captured for assertions.
pub fn recording_context() -> (StorageContext, Arc<RecordingSink>) {
    recording_context_with(PartStorageConfig::default())
}

pub fn recording_context_with(config: PartStorageConfig) -> (StorageContext, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let ctx = StorageContext::new(config).with_diagnostics(sink.clone());
    (ctx, sink)
}

/// Write `files`, `checksums.txt` and `columns.txt` through `builder`.
pub fn populate_part(
    builder: &PartStorageBuilder,
    files: &[(&str, Vec<u8>)],
) -> PartStorageResult<ChecksumManifest> {
    builder.create_directories()?;

    let mut manifest = ChecksumManifest::new();
    for (name, data) in files {
        let mut out = builder.write_file(name, 4096)?;
        out.write_all(data)
            .map_err(|e| DiskError::from_io(Path::new(name), e))?;
        out.finalize()?;
        manifest.add_file_from_bytes(*name, data);
    }

    let storage = builder.storage();
    storage.write_checksums(&manifest)?;
    storage.write_columns(&sample_columns())?;
    Ok(manifest)
}

/// Finished part `part_dir` under `TABLE_ROOT` holding `sample_files()`.
pub fn sample_part(
    volume: &VolumePtr,
    part_dir: &str,
    ctx: &StorageContext,
) -> PartStorageResult<(PartStorage, ChecksumManifest)> {
    let builder = PartStorageBuilder::new(volume.clone(), TABLE_ROOT, part_dir, ctx.clone());
    let manifest = populate_part(&builder, &sample_files())?;
    Ok((builder.finish()?, manifest))
}
