//! # Checksums Module
//!
//! Checksum manifest of a part and its projections.
//!
//! ## Module Structure
//!
//! - `manifest` - ChecksumManifest, FileChecksum, ProjectionChecksums
//! - `tests` - Unit tests

mod manifest;


pub use manifest::{
    hash_bytes, ChecksumManifest, FileChecksum, FileHash, ProjectionChecksums,
};
