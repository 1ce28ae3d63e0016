//! # Version Module
//!
//! MVCC version metadata persisted in `txn_version.txt`.
//!
//! ## State Machine
//!
//! ```text
//! Uninitialized ──(no files)──────────────► Prehistoric
//!       │
//!       ├──(only txn_version.txt.tmp)──────► RolledBack
//!       │
//!       └──(txn_version.txt)──► CreationPending ──► Committed
//!                                                    │    ▲
//!                                  append removal_tid│    │append empty removal_tid
//!                                                    ▼    │
//!                                              MarkedForRemoval
//! ```

mod metadata;


pub use metadata::{
    csn, Csn, TransactionId, VersionMetadata, VersionState, WhichCsn,
};
