//! # Crash Recovery
//!
//! Each test recreates the on-disk residue a crash would leave at a specific
//! point of an operation, then checks that the next operation (or the
//! startup scan) converges to a clean state.
//!
//! | Crash point | Residue | Resolution |
//! |-------------|---------|------------|
//! | After `remove` moved the part | `delete_tmp_<part>` | `recover_interrupted_removals` |
//! | Same, then the part is recreated and removed again | stale `delete_tmp_<part>` | `remove` clears it with a warning |
//! | Before `txn_version.txt.tmp` was published | only the `.tmp` | `load_version_metadata` → `RolledBack` |
//! | After publishing, before cleanup | `.tmp` beside the real file | `load_version_metadata` removes the `.tmp` |
//! | While writing `checksums.txt.tmp` | half-written `.tmp` | next `write_checksums` rewrites it |

#[cfg(test)]
mod tests {
    use super::super::init_tracing;
    use part_storage::test_utils::{
        local_volume, populate_part, recording_context, sample_files, TABLE_ROOT,
    };
    use part_storage::{
        recover_interrupted_removals, ChecksumManifest, PartReader, PartStorage,
        PartStorageBuilder, RemoveOptions, StorageContext, TransactionId, VersionMetadata,
        VersionState, VolumePtr,
    };
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use tracing::Level;
    use uuid::Uuid;

    fn local_part(
        volume: &VolumePtr,
        part_dir: &str,
        ctx: &StorageContext,
    ) -> (PartStorage, ChecksumManifest) {
        let builder = PartStorageBuilder::new(volume.clone(), TABLE_ROOT, part_dir, ctx.clone());
        let manifest = populate_part(&builder, &sample_files()).unwrap();
        (builder.finish().unwrap(), manifest)
    }

    fn table_dir(tmp: &TempDir) -> PathBuf {
        tmp.path().join("disk").join(TABLE_ROOT)
    }

    // =============================================================================
    // INTERRUPTED REMOVAL
    // =============================================================================

    #[test]
    fn test_startup_scan_finishes_interrupted_removals() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, sink) = recording_context();
        let (survivor, _) = local_part(&volume, "all_1_1_0", &ctx);
        let (_victim, _) = local_part(&volume, "all_2_2_0", &ctx);

        // Crash right after the first phase of removal
        let table = table_dir(&tmp);
        fs::rename(table.join("all_2_2_0"), table.join("delete_tmp_all_2_2_0")).unwrap();

        let report = recover_interrupted_removals(&volume, Path::new(TABLE_ROOT), &ctx).unwrap();

        assert!(report.is_successful());
        assert_eq!(report.removed, vec!["delete_tmp_all_2_2_0".to_string()]);
        assert!(!table.join("delete_tmp_all_2_2_0").exists());
        assert!(survivor.exists());
        assert!(sink.contains(Level::INFO, "left by an interrupted part removal"));
    }

    #[test]
    fn test_remove_clears_residue_of_previous_attempt() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, sink) = recording_context();
        let table = table_dir(&tmp);

        // First incarnation crashed mid-removal
        let (_first, _) = local_part(&volume, "all_5_5_0", &ctx);
        fs::rename(table.join("all_5_5_0"), table.join("delete_tmp_all_5_5_0")).unwrap();

        // A part with the same name was fetched again and is now removed
        let (second, manifest) = local_part(&volume, "all_5_5_0", &ctx);
        second.remove(&RemoveOptions::new(), &manifest, &[]).unwrap();

        assert!(!table.join("delete_tmp_all_5_5_0").exists());
        assert!(!table.join("all_5_5_0").exists());
        assert_eq!(sink.at_level(Level::WARN).len(), 1);
        assert!(sink.at_level(Level::ERROR).is_empty());
    }

    #[test]
    fn test_remove_tolerates_untracked_files() {
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, sink) = recording_context();
        let (part, manifest) = local_part(&volume, "all_1_1_0", &ctx);
        fs::write(table_dir(&tmp).join("all_1_1_0/core.dump"), b"oops").unwrap();

        part.remove(&RemoveOptions::new(), &manifest, &[]).unwrap();

        assert!(!table_dir(&tmp).join("delete_tmp_all_1_1_0").exists());
        assert!(sink.contains(Level::ERROR, "fallback to recursive removal"));
    }

    // =============================================================================
    // INTERRUPTED METADATA WRITES
    // =============================================================================

    #[test]
    fn test_unpublished_version_file_rolls_back() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, sink) = recording_context();
        let (part, _) = local_part(&volume, "tmp_insert_all_9_9_0", &ctx);

        let tmp_file = table_dir(&tmp).join("tmp_insert_all_9_9_0/txn_version.txt.tmp");
        fs::write(&tmp_file, b"version: 1\ncreation_tid: (10, 1, ").unwrap();

        let version = part.load_version_metadata().unwrap();
        assert_eq!(version.state(), VersionState::RolledBack);
        assert!(!tmp_file.exists());
        assert!(sink.contains(Level::WARN, "txn_version.txt.tmp"));
    }

    #[test]
    fn test_published_version_file_wins_over_stale_tmp() {
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, _sink) = recording_context();
        let (part, _) = local_part(&volume, "all_1_1_0", &ctx);

        let version = VersionMetadata::created_by(TransactionId::new(3, 4, Uuid::new_v4()));
        part.write_version_metadata(&version, false).unwrap();
        let tmp_file = table_dir(&tmp).join("all_1_1_0/txn_version.txt.tmp");
        fs::write(&tmp_file, b"partial").unwrap();

        assert_eq!(part.load_version_metadata().unwrap(), version);
        assert!(!tmp_file.exists());
    }

    #[test]
    fn test_half_written_checksums_tmp_is_rewritten() {
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, _sink) = recording_context();

        let builder =
            PartStorageBuilder::new(volume.clone(), TABLE_ROOT, "tmp_insert_all_4_4_0", ctx);
        builder.create_directories().unwrap();
        fs::write(
            table_dir(&tmp).join("tmp_insert_all_4_4_0/checksums.txt.tmp"),
            b"checksums format version: 4\ngarb",
        )
        .unwrap();

        let manifest = populate_part(&builder, &sample_files()).unwrap();
        let part = builder.finish().unwrap();

        assert_eq!(part.read_checksums().unwrap(), manifest);
        assert!(!part.exists_path("checksums.txt.tmp"));
    }
}
