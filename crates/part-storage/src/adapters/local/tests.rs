//! # Local Disk Tests

use super::*;
use crate::domain::errors::DiskError;
use crate::ports::outbound::{Disk, FileWriter, ReadSettings, RemoveRequest, WriteMode};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn create_disk() -> (TempDir, LocalDisk) {
    let temp_dir = TempDir::new().unwrap();
    let disk = LocalDisk::new("default", temp_dir.path().join("disk")).unwrap();
    (temp_dir, disk)
}

fn write(disk: &LocalDisk, path: &str, data: &[u8]) {
    let mut out = disk
        .write_file(Path::new(path), 4096, WriteMode::Rewrite)
        .unwrap();
    out.write_all(data).unwrap();
    out.finalize().unwrap();
}

fn read(disk: &LocalDisk, path: &str) -> Vec<u8> {
    let mut input = disk
        .read_file(Path::new(path), &ReadSettings::default(), None, None)
        .unwrap();
    let mut out = Vec::new();
    input.read_to_end(&mut out).unwrap();
    out
}

#[test]
fn test_write_read_and_append() {
    let (_tmp, disk) = create_disk();
    disk.create_directories(Path::new("store/p")).unwrap();

    write(&disk, "store/p/txn_version.txt", b"version: 1\n");
    let mut out = disk
        .write_file(Path::new("store/p/txn_version.txt"), 256, WriteMode::Append)
        .unwrap();
    out.write_all(b"creation_csn: 5\n").unwrap();
    out.sync().unwrap();

    assert_eq!(
        read(&disk, "store/p/txn_version.txt"),
        b"version: 1\ncreation_csn: 5\n"
    );
    assert_eq!(disk.file_size(Path::new("store/p/txn_version.txt")).unwrap(), 27);
}

#[test]
fn test_create_file_is_exclusive() {
    let (_tmp, disk) = create_disk();
    disk.create_file(Path::new("marker")).unwrap();
    let err = disk.create_file(Path::new("marker")).unwrap_err();
    assert!(matches!(err, DiskError::AlreadyExists { .. }));
}

#[cfg(unix)]
#[test]
fn test_hard_link_ref_count() {
    let (_tmp, disk) = create_disk();
    write(&disk, "a.bin", b"x");
    disk.create_hard_link(Path::new("a.bin"), Path::new("b.bin"))
        .unwrap();

    assert_eq!(disk.ref_count(Path::new("a.bin")).unwrap(), 1);
    disk.remove_file(Path::new("a.bin")).unwrap();
    assert_eq!(read(&disk, "b.bin"), b"x");
}

#[test]
fn test_move_directory_refuses_existing_destination() {
    let (_tmp, disk) = create_disk();
    disk.create_directories(Path::new("src")).unwrap();
    disk.create_directories(Path::new("dst")).unwrap();

    let err = disk
        .move_directory(Path::new("src"), Path::new("dst"))
        .unwrap_err();
    assert!(matches!(err, DiskError::AlreadyExists { .. }));

    disk.move_directory(Path::new("src"), Path::new("moved"))
        .unwrap();
    assert!(disk.is_directory(Path::new("moved")));
}

#[test]
fn test_copy_tree() {
    let (_tmp, disk) = create_disk();
    disk.create_directories(Path::new("p/agg.proj")).unwrap();
    write(&disk, "p/data.bin", b"1");
    write(&disk, "p/agg.proj/data.bin", b"2");

    disk.copy(Path::new("p"), Path::new("q")).unwrap();

    assert_eq!(disk.list_files(Path::new("q")).unwrap(), vec!["agg.proj", "data.bin"]);
    assert_eq!(read(&disk, "q/agg.proj/data.bin"), b"2");
}

#[test]
fn test_remove_directory_requires_empty() {
    let (_tmp, disk) = create_disk();
    disk.create_directories(Path::new("p")).unwrap();
    write(&disk, "p/data.bin", b"1");

    let err = disk.remove_directory(Path::new("p")).unwrap_err();
    assert!(matches!(err, DiskError::NotEmpty { .. }));

    disk.remove_shared_files(
        &[
            RemoveRequest::new("p/data.bin"),
            RemoveRequest::if_exists("p/columns.txt"),
        ],
        true,
        &HashSet::new(),
    )
    .unwrap();
    disk.remove_directory(Path::new("p")).unwrap();
    assert!(!disk.exists(Path::new("p")));
}

#[test]
fn test_set_last_modified() {
    let (_tmp, disk) = create_disk();
    disk.create_directories(Path::new("p")).unwrap();

    let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    disk.set_last_modified(Path::new("p"), when).unwrap();
    assert_eq!(disk.last_modified(Path::new("p")).unwrap(), when);
}

#[test]
fn test_missing_paths_map_to_not_found() {
    let (_tmp, disk) = create_disk();
    assert!(matches!(
        disk.file_size(Path::new("nope")).unwrap_err(),
        DiskError::NotFound { .. }
    ));
    disk.remove_file_if_exists(Path::new("nope")).unwrap();
}

#[test]
fn test_recursive_removal_of_missing_path_succeeds() {
    let (_tmp, disk) = create_disk();
    disk.create_directories(Path::new("p")).unwrap();

    disk.remove_recursive(Path::new("p/gone.proj")).unwrap();
    disk.remove_shared_recursive(Path::new("p/gone.proj"), false, &HashSet::new())
        .unwrap();
    assert!(disk.is_directory(Path::new("p")));
}

#[test]
fn test_sync_guard_and_capabilities() {
    let (_tmp, disk) = create_disk();
    disk.create_directories(Path::new("p")).unwrap();

    let guard = disk.directory_sync_guard(Path::new("p")).unwrap();
    drop(guard);

    assert!(!disk.is_remote());
    assert!(!disk.supports_zero_copy_replication());
    assert!(disk.available_space().unwrap() > 0);
}
