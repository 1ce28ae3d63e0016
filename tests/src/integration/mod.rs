//! # Integration Tests
//!
//! Every test runs on a `LocalDisk` rooted in a fresh temporary directory.
//! Set `RUST_LOG=part_storage=debug` to see the storage diagnostics.

pub mod crash_recovery;
pub mod lifecycle;

use std::sync::Once;

static INIT: Once = Once::new();

/// Route `tracing` output to the test harness once per process.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
