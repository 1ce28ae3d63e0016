//! # Types Module
//!
//! Configuration and immutable value types.

mod config;
mod options;


// Re-export public types
pub use config::PartStorageConfig;
pub use options::{FreezeOptions, RemoveOptions, StorageKind};
