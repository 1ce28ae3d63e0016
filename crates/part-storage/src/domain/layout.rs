//! # On-Disk Layout
//!
//! File and directory names that make up a part directory. These names are
//! bit-relevant for compatibility with parts written by earlier versions.
//!
//! ```text
//! <root>/<part_dir>/
//! ├── checksums.txt
//! ├── columns.txt
//! ├── txn_version.txt
//! ├── delete-on-destroy.txt
//! ├── default_compression_codec.txt
//! └── <name>.proj/
//! ```

/// Checksum manifest.
pub const CHECKSUMS_FILE: &str = "checksums.txt";

/// Column name/type list.
pub const COLUMNS_FILE: &str = "columns.txt";

/// Transactional version metadata.
pub const TXN_VERSION_FILE: &str = "txn_version.txt";

/// Empty marker: the part must be deleted when its owner is destroyed.
pub const DELETE_ON_DESTROY_MARKER: &str = "delete-on-destroy.txt";

/// Optional default codec description.
pub const DEFAULT_COMPRESSION_CODEC_FILE: &str = "default_compression_codec.txt";

/// Suffix marking an interrupted write-then-replace.
pub const TMP_SUFFIX: &str = ".tmp";

/// Prefix marking an interrupted removal.
pub const DELETE_TMP_PREFIX: &str = "delete_tmp_";

/// Subdirectory of the table root holding detached parts.
pub const DETACHED_DIR: &str = "detached";

/// Suffix of projection subdirectories.
pub const PROJECTION_SUFFIX: &str = ".proj";

/// Directory name of the projection `name`.
pub fn projection_dir(name: &str) -> String {
    format!("{}{}", name, PROJECTION_SUFFIX)
}

/// Name the part directory is moved to before its contents are deleted.
pub fn delete_tmp_name(part_dir: &str) -> String {
    format!("{}{}", DELETE_TMP_PREFIX, part_dir)
}

/// Candidate directory name for detach probing.
///
/// Attempt 0 is `prefix_part`, attempt N is `prefix_part_tryN`. An empty
/// prefix yields the bare part name.
pub fn detach_candidate(prefix: &str, part_dir: &str, try_no: usize) -> String {
    let mut name = String::with_capacity(prefix.len() + part_dir.len() + 8);
    if !prefix.is_empty() {
        name.push_str(prefix);
        name.push('_');
    }
    name.push_str(part_dir);
    if try_no > 0 {
        name.push_str("_try");
        name.push_str(&try_no.to_string());
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detach_candidate_naming() {
        assert_eq!(detach_candidate("broken", "all_1_1_0", 0), "broken_all_1_1_0");
        assert_eq!(
            detach_candidate("broken", "all_1_1_0", 3),
            "broken_all_1_1_0_try3"
        );
        assert_eq!(detach_candidate("", "all_1_1_0", 0), "all_1_1_0");
        assert_eq!(detach_candidate("", "all_1_1_0", 1), "all_1_1_0_try1");
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(projection_dir("agg"), "agg.proj");
        assert_eq!(delete_tmp_name("all_1_1_0"), "delete_tmp_all_1_1_0");
    }
}
