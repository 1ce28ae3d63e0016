//! # Checksum Manifest
//!
//! Ordered mapping `file name -> (size, hash)` persisted as `checksums.txt`.

use crate::domain::errors::{PartStorageError, PartStorageResult};
use crate::domain::layout::CHECKSUMS_FILE;
use crate::ports::outbound::Disk;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

/// 128-bit file hash.
pub type FileHash = u128;

/// First line of the serialized manifest.
const FORMAT_HEADER: &str = "checksums format version: 1";

/// Size and hash of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileChecksum {
    pub file_size: u64,
    pub file_hash: FileHash,
}

impl FileChecksum {
    pub fn new(file_size: u64, file_hash: FileHash) -> Self {
        Self {
            file_size,
            file_hash,
        }
    }

    /// Checksum of an in-memory file body.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self {
            file_size: data.len() as u64,
            file_hash: hash_bytes(data),
        }
    }
}

/// Hash of `data`: the first 16 bytes of its SHA-256 digest.
pub fn hash_bytes(data: &[u8]) -> FileHash {
    let digest = Sha256::digest(data);
    truncate_digest(&digest)
}

fn truncate_digest(digest: &[u8]) -> FileHash {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(bytes)
}

/// Checksums of every data file of a part.
///
/// An empty manifest is a valid state: the part was not fully materialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    files: BTreeMap<String, FileChecksum>,
}

/// Checksums of one projection, stored under `<name>.proj/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionChecksums {
    pub name: String,
    pub checksums: ChecksumManifest,
}

impl ProjectionChecksums {
    pub fn new(name: impl Into<String>, checksums: ChecksumManifest) -> Self {
        Self {
            name: name.into(),
            checksums,
        }
    }
}

impl ChecksumManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` with an explicit size and hash.
    pub fn add_file(&mut self, name: impl Into<String>, file_size: u64, file_hash: FileHash) {
        self.files
            .insert(name.into(), FileChecksum::new(file_size, file_hash));
    }

    /// Record `name` by hashing its content.
    pub fn add_file_from_bytes(&mut self, name: impl Into<String>, data: &[u8]) {
        self.files.insert(name.into(), FileChecksum::of_bytes(data));
    }

    pub fn get(&self, name: &str) -> Option<&FileChecksum> {
        self.files.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FileChecksum> {
        self.files.remove(name)
    }

    /// Entries in file-name order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileChecksum)> {
        self.files.iter().map(|(name, sum)| (name.as_str(), sum))
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of all recorded file sizes.
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|sum| sum.file_size).sum()
    }

    /// Hash covering every entry in order.
    pub fn manifest_hash(&self) -> FileHash {
        let mut hasher = Sha256::new();
        for (name, sum) in &self.files {
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update(sum.file_size.to_le_bytes());
            hasher.update(sum.file_hash.to_le_bytes());
        }
        truncate_digest(&hasher.finalize())
    }

    /// Serialize in file-name order, followed by the manifest hash.
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{}", FORMAT_HEADER)?;
        writeln!(out, "{} files:", self.files.len())?;
        for (name, sum) in &self.files {
            writeln!(out, "{}", name)?;
            writeln!(out, "\tsize: {}", sum.file_size)?;
            writeln!(out, "\thash: {}", encode_hash(sum.file_hash))?;
        }
        writeln!(out, "manifest hash: {}", encode_hash(self.manifest_hash()))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write(&mut buf);
        buf
    }

    /// Parse a serialized manifest and verify its manifest hash.
    pub fn read<R: Read>(input: &mut R) -> PartStorageResult<Self> {
        let mut text = String::new();
        input
            .read_to_string(&mut text)
            .map_err(|e| PartStorageError::corrupted(CHECKSUMS_FILE, e.to_string()))?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> PartStorageResult<Self> {
        let bad = |reason: String| PartStorageError::corrupted(CHECKSUMS_FILE, reason);
        let mut lines = text.lines();

        match lines.next() {
            Some(FORMAT_HEADER) => {}
            other => return Err(bad(format!("unexpected header {:?}", other))),
        }

        let count_line = lines
            .next()
            .ok_or_else(|| bad("missing file count".to_string()))?;
        let count: usize = count_line
            .strip_suffix(" files:")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| bad(format!("malformed file count {:?}", count_line)))?;

        let mut manifest = ChecksumManifest::new();
        for _ in 0..count {
            let name = lines
                .next()
                .ok_or_else(|| bad("truncated entry list".to_string()))?;
            let size = lines
                .next()
                .and_then(|l| l.strip_prefix("\tsize: "))
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| bad(format!("malformed size for {}", name)))?;
            let hash = lines
                .next()
                .and_then(|l| l.strip_prefix("\thash: "))
                .and_then(decode_hash)
                .ok_or_else(|| bad(format!("malformed hash for {}", name)))?;
            manifest.add_file(name, size, hash);
        }

        if manifest.len() != count {
            return Err(bad(format!("duplicate entries: expected {} files", count)));
        }

        let recorded = lines
            .next()
            .and_then(|l| l.strip_prefix("manifest hash: "))
            .and_then(decode_hash)
            .ok_or_else(|| bad("missing manifest hash".to_string()))?;
        let actual = manifest.manifest_hash();
        if recorded != actual {
            return Err(bad(format!(
                "manifest hash mismatch: recorded {}, computed {}",
                encode_hash(recorded),
                encode_hash(actual)
            )));
        }

        Ok(manifest)
    }

    /// Verify that every recorded file under `dir` has its recorded size.
    pub fn check_sizes(&self, disk: &dyn Disk, dir: &Path) -> PartStorageResult<()> {
        for (name, sum) in &self.files {
            let actual_size = disk.file_size(&dir.join(name))?;
            if actual_size != sum.file_size {
                return Err(PartStorageError::Corruption {
                    file: dir.join(name).display().to_string(),
                    expected_size: sum.file_size,
                    actual_size,
                });
            }
        }
        Ok(())
    }

    /// Verify that `other` records exactly the same files, sizes and hashes.
    pub fn check_equal(&self, other: &ChecksumManifest) -> PartStorageResult<()> {
        if let Some(extra) = other.files.keys().find(|name| !self.files.contains_key(*name)) {
            return Err(PartStorageError::corrupted(
                extra.as_str(),
                "unexpected file in part",
            ));
        }

        for (name, expected) in &self.files {
            let Some(actual) = other.files.get(name) else {
                return Err(PartStorageError::corrupted(name.as_str(), "no file in part"));
            };
            if actual.file_size != expected.file_size {
                return Err(PartStorageError::Corruption {
                    file: name.clone(),
                    expected_size: expected.file_size,
                    actual_size: actual.file_size,
                });
            }
            if actual.file_hash != expected.file_hash {
                return Err(PartStorageError::corrupted(
                    name.as_str(),
                    format!(
                        "checksum mismatch: expected {}, got {}",
                        encode_hash(expected.file_hash),
                        encode_hash(actual.file_hash)
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, FileChecksum)> for ChecksumManifest {
    fn from_iter<I: IntoIterator<Item = (String, FileChecksum)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

fn encode_hash(hash: FileHash) -> String {
    hex::encode(hash.to_be_bytes())
}

fn decode_hash(text: &str) -> Option<FileHash> {
    let bytes: [u8; 16] = hex::decode(text).ok()?.try_into().ok()?;
    Some(u128::from_be_bytes(bytes))
}
