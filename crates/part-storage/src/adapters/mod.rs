//! # Adapters Module
//!
//! Concrete implementations of the outbound ports.
//!
//! ## Modules
//!
//! - `local`: `LocalDisk` over the local filesystem
//! - `memory`: `InMemoryDisk` for tests, with failure injection
//! - `volume`: `SingleDiskVolume` and `Reservation`
//! - `diagnostics`: `DiagnosticSink` with tracing and recording sinks

pub mod diagnostics;
pub mod local;
pub mod memory;
pub mod volume;

pub use diagnostics::{DiagnosticEvent, DiagnosticSink, RecordingSink, TracingSink};
pub use local::LocalDisk;
pub use memory::{DiskOperation, InMemoryDisk};
pub use volume::{Reservation, SingleDiskVolume};
