//! # In-Memory Disk
//!
//! Test backend implementing the full `Disk` port: hardlinks share inodes,
//! shared removal can keep blobs alive, and any operation can be made to
//! fail with `fail_on`.

mod disk;


pub use disk::{DiskOperation, InMemoryDisk};
