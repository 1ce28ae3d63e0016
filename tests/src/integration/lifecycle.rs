//! # Part Lifecycle on a Local Disk
//!
//! Drives a part through its whole life on a real filesystem:
//!
//! 1. **Build**: `tmp_insert_*` directory, column files, `checksums.txt`,
//!    `columns.txt`, `txn_version.txt`
//! 2. **Publish**: rename to the final name with a directory fsync
//! 3. **Snapshot**: freeze into `shadow/`, clone to a second disk, backup
//! 4. **Remove**: two-phase removal driven by the checksum manifest

#[cfg(test)]
mod tests {
    use super::super::init_tracing;
    use part_storage::test_utils::{
        local_volume, populate_part, recording_context, sample_columns, sample_files, TABLE_ROOT,
    };
    use part_storage::{
        BackupEntries, BackupStaging, ChecksumManifest, FreezeOptions, PartReader, PartStorage,
        PartStorageBuilder, PartStorageError, ProjectionChecksums, RemoveOptions, StorageContext,
        StorageKind,
        TransactionId, VersionMetadata, VersionState, VolumePtr, WhichCsn,
    };
    use std::collections::BTreeSet;
    use std::io::Read;
    use std::path::Path;
    use tempfile::TempDir;
    use uuid::Uuid;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn local_part(
        volume: &VolumePtr,
        part_dir: &str,
        ctx: &StorageContext,
    ) -> (PartStorage, ChecksumManifest) {
        let builder = PartStorageBuilder::new(volume.clone(), TABLE_ROOT, part_dir, ctx.clone());
        let manifest = populate_part(&builder, &sample_files()).unwrap();
        (builder.finish().unwrap(), manifest)
    }

    // =============================================================================
    // FULL LIFECYCLE
    // =============================================================================

    #[test]
    fn test_insert_publish_and_remove() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, sink) = recording_context();

        // Build under a temporary name
        let (part, manifest) = local_part(&volume, "tmp_insert_all_1_1_0", &ctx);
        assert_eq!(part.storage_kind(), StorageKind::OnDisk);
        let tid = TransactionId::new(10, 1, Uuid::new_v4());
        let mut version = VersionMetadata::created_by(tid);
        part.write_version_metadata(&version, true).unwrap();

        // Publish
        part.rename("all_1_1_0", false, true).unwrap();
        assert_eq!(part.part_dir(), "all_1_1_0");
        assert!(tmp.path().join("disk/store/t1/all_1_1_0/data.bin").is_file());
        assert!(!tmp.path().join("disk/store/t1/tmp_insert_all_1_1_0").exists());

        version.creation_csn = 11;
        part.append_csn_to_version_metadata(&version, WhichCsn::Creation)
            .unwrap();
        assert_eq!(
            part.load_version_metadata().unwrap().state(),
            VersionState::Committed
        );
        assert_eq!(part.read_checksums().unwrap(), manifest);
        assert_eq!(part.read_columns().unwrap(), sample_columns());
        part.check_consistency(&manifest).unwrap();

        // Remove
        part.write_delete_on_destroy_marker();
        part.remove(&RemoveOptions::new(), &manifest, &[]).unwrap();

        let table = tmp.path().join("disk/store/t1");
        assert!(!table.join("all_1_1_0").exists());
        assert!(!table.join("delete_tmp_all_1_1_0").exists());
        assert!(sink.events().is_empty(), "unexpected diagnostics: {:?}", sink.events());
    }

    #[test]
    fn test_detach_into_free_name() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, sink) = recording_context();
        let (part, _) = local_part(&volume, "all_3_3_0", &ctx);

        let detached = tmp.path().join("disk/store/t1/detached");
        std::fs::create_dir_all(detached.join("broken_all_3_3_0")).unwrap();

        let name = part.relative_path_for_prefix("broken", true);
        assert_eq!(name, "broken_all_3_3_0_try1");
        part.rename(&format!("detached/{}", name), false, true).unwrap();

        assert!(detached.join("broken_all_3_3_0_try1/checksums.txt").is_file());
        assert_eq!(part.root_path(), Path::new(TABLE_ROOT).join("detached"));
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn test_remove_with_missing_projection_directory() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, sink) = recording_context();
        let (part, manifest) = local_part(&volume, "all_1_1_0", &ctx);

        let mut projection_manifest = ChecksumManifest::new();
        projection_manifest.add_file_from_bytes("data.bin", &[1, 2, 3]);
        let projections = vec![ProjectionChecksums::new("p", projection_manifest)];
        part.remove(&RemoveOptions::new(), &manifest, &projections)
            .unwrap();

        let table = tmp.path().join("disk/store/t1");
        assert!(!table.join("all_1_1_0").exists());
        assert!(!table.join("delete_tmp_all_1_1_0").exists());
        assert_eq!(sink.at_level(tracing::Level::ERROR).len(), 1);
    }

    #[test]
    fn test_rename_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, _sink) = recording_context();
        let (first, _) = local_part(&volume, "tmp_merge_all_1_2_1", &ctx);
        let (_second, _) = local_part(&volume, "all_1_2_1", &ctx);

        let err = first.rename("all_1_2_1", false, false).unwrap_err();
        assert!(matches!(err, PartStorageError::DirectoryAlreadyExists { .. }));
        assert!(first.exists());
    }

    // =============================================================================
    // SNAPSHOTS
    // =============================================================================

    #[test]
    fn test_freeze_survives_part_removal() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, _sink) = recording_context();
        let (part, manifest) = local_part(&volume, "all_1_1_0", &ctx);
        part.write_delete_on_destroy_marker();

        let mut metadata_saved = 0;
        let frozen = part
            .freeze("shadow/increment_1/store/t1", "all_1_1_0", FreezeOptions::default(), |_| {
                metadata_saved += 1
            })
            .unwrap();
        assert_eq!(metadata_saved, 1);
        assert!(!frozen.exists_path("delete-on-destroy.txt"));

        #[cfg(unix)]
        assert_eq!(part.stat("data.bin").unwrap().ref_count, 1);

        part.remove(&RemoveOptions::new(), &manifest, &[]).unwrap();
        assert!(!part.exists());
        assert_eq!(frozen.read_to_end("data.bin").unwrap(), sample_files()[0].1);
        frozen.check_consistency(&manifest).unwrap();
    }

    #[test]
    fn test_clone_between_local_disks() {
        let tmp = TempDir::new().unwrap();
        let hot = local_volume("hot", &tmp.path().join("hot")).unwrap();
        let cold = local_volume("cold", &tmp.path().join("cold")).unwrap();
        let (ctx, _sink) = recording_context();
        let (part, manifest) = local_part(&hot, "all_1_1_0", &ctx);
        part.write_delete_on_destroy_marker();

        let moved = part.clone_part_to(&cold, "moving", "all_1_1_0").unwrap();

        assert_eq!(moved.disk_name(), "cold");
        assert!(tmp.path().join("cold/moving/all_1_1_0/data.mrk").is_file());
        assert!(!moved.exists_path("delete-on-destroy.txt"));
        assert_eq!(moved.read_checksums().unwrap(), manifest);
        #[cfg(unix)]
        assert_eq!(part.stat("data.bin").unwrap().ref_count, 0);
    }

    #[test]
    fn test_backup_reads_stable_copies() {
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, _sink) = recording_context();
        let (part, manifest) = local_part(&volume, "all_1_1_0", &ctx);

        let mut staging = BackupStaging::new();
        let mut entries = BackupEntries::new();
        let small: BTreeSet<String> = ["columns.txt".to_string()].into_iter().collect();
        part.backup(&mut staging, &manifest, &small, &mut entries)
            .unwrap();
        part.remove(&RemoveOptions::new(), &manifest, &[]).unwrap();

        for (name, entry) in &entries {
            let mut content = Vec::new();
            entry.read().unwrap().read_to_end(&mut content).unwrap();
            assert_eq!(content.len() as u64, entry.size(), "{}", name);
        }

        let staging_root = tmp
            .path()
            .join("disk")
            .join(entries[0].1.staging_path().unwrap());
        assert!(staging_root.is_dir());
        drop(staging);
        drop(entries);
        assert!(!staging_root.exists());
    }

    #[test]
    fn test_builder_hardlinks_unchanged_files() {
        let tmp = TempDir::new().unwrap();
        let volume = local_volume("default", &tmp.path().join("disk")).unwrap();
        let (ctx, _sink) = recording_context();
        let (source, _) = local_part(&volume, "all_1_1_0", &ctx);

        // A mutation rewrites data.bin but keeps the marks file
        let builder =
            PartStorageBuilder::new(volume.clone(), TABLE_ROOT, "tmp_mut_all_1_1_0_2", ctx.clone());
        let mut manifest =
            populate_part(&builder, &[("data.bin", vec![7u8; 50])]).unwrap();
        builder
            .create_hard_link_from(&source, "data.mrk", "data.mrk")
            .unwrap();
        manifest.add_file_from_bytes("data.mrk", &[0xAB; 8]);
        let mutated = builder.finish().unwrap();

        mutated.rename("all_1_1_0_2", false, false).unwrap();
        mutated.check_consistency(&manifest).unwrap();
        #[cfg(unix)]
        assert_eq!(source.stat("data.mrk").unwrap().ref_count, 1);
    }
}
