//! # Local Disk
//!
//! Production `Disk` over `std::fs`. Free space is probed with `fs2` when the
//! `space-probe` feature is enabled.

mod disk;

#[cfg(test)]
mod tests;

pub use disk::LocalDisk;
