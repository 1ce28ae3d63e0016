//! # Part Storage Benchmarks
//!
//! | Operation | Backend | Claim |
//! |-----------|---------|-------|
//! | Removal by manifest | in-memory | no directory listing, cost linear in manifest size |
//! | Recursive removal | in-memory | baseline for an empty manifest |
//! | Rename | in-memory | constant cost, independent of part size |
//! | Version metadata write | local disk | dominated by the file fsync |

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use part_storage::test_utils::{local_volume, memory_volume, populate_part, TABLE_ROOT};
use part_storage::{
    ChecksumManifest, PartStorage, PartStorageBuilder, RemoveOptions, StorageContext,
    TransactionId, VersionMetadata, VolumePtr,
};
use std::time::Duration;

/// Part with `file_count` column files of 1 KiB each.
fn build_part(
    volume: &VolumePtr,
    part_dir: &str,
    file_count: usize,
) -> (PartStorage, ChecksumManifest) {
    let ctx = StorageContext::default();
    let files: Vec<(String, Vec<u8>)> = (0..file_count)
        .map(|i| (format!("col_{:04}.bin", i), vec![(i % 251) as u8; 1024]))
        .collect();
    let files: Vec<(&str, Vec<u8>)> = files.iter().map(|(n, d)| (n.as_str(), d.clone())).collect();

    let builder = PartStorageBuilder::new(volume.clone(), TABLE_ROOT, part_dir, ctx);
    let manifest = populate_part(&builder, &files).expect("populate part");
    (builder.finish().expect("finish part"), manifest)
}

// ============================================================================
// REMOVAL
// ============================================================================

fn bench_removal(c: &mut Criterion) {
    let mut group = c.benchmark_group("part-storage-remove");
    group.measurement_time(Duration::from_secs(5));

    for file_count in [8usize, 64, 512] {
        group.bench_with_input(
            BenchmarkId::new("manifest", file_count),
            &file_count,
            |b, &count| {
                let (_disk, volume) = memory_volume("bench");
                let mut block = 0u64;
                b.iter_batched(
                    || {
                        block += 1;
                        build_part(&volume, &format!("all_{0}_{0}_0", block), count)
                    },
                    |(part, manifest)| {
                        part.remove(&RemoveOptions::new(), black_box(&manifest), &[])
                            .expect("remove")
                    },
                    BatchSize::SmallInput,
                );
            },
        );

        group.bench_with_input(
            BenchmarkId::new("recursive", file_count),
            &file_count,
            |b, &count| {
                let (_disk, volume) = memory_volume("bench");
                let empty = ChecksumManifest::new();
                let mut block = 0u64;
                b.iter_batched(
                    || {
                        block += 1;
                        build_part(&volume, &format!("all_{0}_{0}_0", block), count).0
                    },
                    |part| {
                        part.remove(&RemoveOptions::new(), black_box(&empty), &[])
                            .expect("remove")
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

// ============================================================================
// RENAME
// ============================================================================

fn bench_rename(c: &mut Criterion) {
    let mut group = c.benchmark_group("part-storage-rename");

    for file_count in [8usize, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(file_count), &file_count, |b, &count| {
            let (_disk, volume) = memory_volume("bench");
            let (part, _) = build_part(&volume, "tmp_insert_all_1_1_0", count);
            let mut flip = false;
            b.iter(|| {
                let target = if flip { "tmp_insert_all_1_1_0" } else { "all_1_1_0" };
                flip = !flip;
                part.rename(black_box(target), false, false).expect("rename");
            });
        });
    }
    group.finish();
}

// ============================================================================
// VERSION METADATA
// ============================================================================

fn bench_version_metadata(c: &mut Criterion) {
    let mut group = c.benchmark_group("part-storage-version-metadata");
    group.sample_size(20);

    let tmp = tempfile::TempDir::new().expect("temp dir");
    let volume = local_volume("bench", tmp.path()).expect("local volume");
    let (part, _) = build_part(&volume, "all_1_1_0", 1);
    let version = VersionMetadata::created_by(TransactionId::new(10, 1, uuid::Uuid::new_v4()));

    group.bench_function("write_synced", |b| {
        b.iter(|| part.write_version_metadata(black_box(&version), false).expect("write"))
    });
    group.bench_function("load", |b| {
        b.iter(|| black_box(part.load_version_metadata().expect("load")))
    });
    group.finish();
}

criterion_group!(benches, bench_removal, bench_rename, bench_version_metadata);
criterion_main!(benches);
