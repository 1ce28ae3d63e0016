//! # Version Metadata
//!
//! Transaction identifiers and commit sequence numbers governing a part's
//! visibility, with the append-structured `txn_version.txt` format.

use crate::domain::errors::{PartStorageError, PartStorageResult};
use crate::domain::layout::TXN_VERSION_FILE;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;
use uuid::Uuid;

/// Commit sequence number.
pub type Csn = u64;

/// Reserved CSN values.
pub mod csn {
    use super::Csn;

    /// Not yet known (creation or removal not committed).
    pub const UNKNOWN: Csn = 0;
    /// Parts written before transactions existed.
    pub const PREHISTORIC: Csn = 1;
    /// Commit in progress.
    pub const COMMITTING: Csn = 2;
    /// Upper bound of the reserved range.
    pub const MAX_RESERVED: Csn = 32;
    /// Transaction rolled back.
    pub const ROLLED_BACK: Csn = u64::MAX;
}

const FORMAT_HEADER: &str = "version: 1";

/// Identifier of the transaction that created or removed a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId {
    pub start_csn: Csn,
    pub local_tid: u64,
    pub host_id: Uuid,
}

impl TransactionId {
    /// No transaction.
    pub const EMPTY: TransactionId = TransactionId::new(0, 0, Uuid::nil());
    /// Legacy parts without version metadata.
    pub const PREHISTORIC: TransactionId = TransactionId::new(csn::PREHISTORIC, 1, Uuid::nil());
    /// Placeholder for parts whose creation was interrupted.
    pub const DUMMY: TransactionId = TransactionId::new(csn::PREHISTORIC, 2, Uuid::nil());

    pub const fn new(start_csn: Csn, local_tid: u64, host_id: Uuid) -> Self {
        Self {
            start_csn,
            local_tid,
            host_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn is_prehistoric(&self) -> bool {
        *self == Self::PREHISTORIC
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.start_csn, self.local_tid, self.host_id
        )
    }
}

impl FromStr for TransactionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| format!("transaction id {:?} is not parenthesized", s))?;

        let mut parts = inner.split(',').map(str::trim);
        let (Some(start), Some(local), Some(host), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("transaction id {:?} must have three fields", s));
        };

        Ok(TransactionId {
            start_csn: start.parse().map_err(|_| format!("bad start_csn {:?}", start))?,
            local_tid: local.parse().map_err(|_| format!("bad local_tid {:?}", local))?,
            host_id: Uuid::parse_str(host).map_err(|e| format!("bad host_id: {}", e))?,
        })
    }
}

/// Which CSN record to append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhichCsn {
    Creation,
    Removal,
}

/// Lifecycle state derived from version metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionState {
    /// Creation TID not set.
    Uninitialized,
    /// Written before transactions existed.
    Prehistoric,
    /// Creation was interrupted; the part must be removed.
    RolledBack,
    /// Created by a transaction that has not committed yet.
    CreationPending,
    /// Created and committed.
    Committed,
    /// A transaction has locked the part for removal.
    MarkedForRemoval,
}

/// MVCC metadata of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionMetadata {
    pub creation_tid: TransactionId,
    pub creation_csn: Csn,
    pub removal_tid: TransactionId,
    pub removal_csn: Csn,
}

impl VersionMetadata {
    /// Metadata of a part being created by `tid`.
    pub fn created_by(tid: TransactionId) -> Self {
        Self {
            creation_tid: tid,
            ..Self::default()
        }
    }

    /// Metadata assumed for parts without a version file.
    pub fn prehistoric() -> Self {
        Self {
            creation_tid: TransactionId::PREHISTORIC,
            creation_csn: csn::PREHISTORIC,
            ..Self::default()
        }
    }

    /// Metadata assumed for parts whose version file was never published.
    pub fn rolled_back() -> Self {
        Self {
            creation_tid: TransactionId::DUMMY,
            creation_csn: csn::ROLLED_BACK,
            ..Self::default()
        }
    }

    pub fn state(&self) -> VersionState {
        if self.creation_tid.is_empty() {
            VersionState::Uninitialized
        } else if self.creation_csn == csn::ROLLED_BACK {
            VersionState::RolledBack
        } else if !self.removal_tid.is_empty() {
            VersionState::MarkedForRemoval
        } else if self.creation_tid.is_prehistoric() {
            VersionState::Prehistoric
        } else if self.creation_csn == csn::UNKNOWN {
            VersionState::CreationPending
        } else {
            VersionState::Committed
        }
    }

    /// Full serialization.
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{}", FORMAT_HEADER)?;
        writeln!(out, "creation_tid: {}", self.creation_tid)?;
        if self.creation_csn != csn::UNKNOWN {
            self.write_csn(out, WhichCsn::Creation)?;
        }
        if !self.removal_tid.is_empty() {
            self.write_removal_tid(out, false)?;
        }
        if self.removal_csn != csn::UNKNOWN {
            self.write_csn(out, WhichCsn::Removal)?;
        }
        Ok(())
    }

    /// Single CSN record, for appending.
    pub fn write_csn<W: Write + ?Sized>(&self, out: &mut W, which: WhichCsn) -> std::io::Result<()> {
        match which {
            WhichCsn::Creation => writeln!(out, "creation_csn: {}", self.creation_csn),
            WhichCsn::Removal => writeln!(out, "removal_csn: {}", self.removal_csn),
        }
    }

    /// Removal TID record, for appending. `clear` writes an empty TID.
    pub fn write_removal_tid<W: Write + ?Sized>(&self, out: &mut W, clear: bool) -> std::io::Result<()> {
        let tid = if clear {
            TransactionId::EMPTY
        } else {
            self.removal_tid
        };
        writeln!(out, "removal_tid: {}", tid)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let _ = self.write(&mut buf);
        buf
    }

    /// Parse a version file; later records override earlier ones.
    pub fn read<R: Read>(input: &mut R) -> PartStorageResult<Self> {
        let mut text = String::new();
        input
            .read_to_string(&mut text)
            .map_err(|e| PartStorageError::corrupted(TXN_VERSION_FILE, e.to_string()))?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> PartStorageResult<Self> {
        let bad = |reason: String| PartStorageError::corrupted(TXN_VERSION_FILE, reason);
        let mut lines = text.lines();

        if lines.next() != Some(FORMAT_HEADER) {
            return Err(bad("unexpected header".to_string()));
        }

        let mut version = VersionMetadata::default();
        let mut has_creation_tid = false;

        for line in lines.filter(|l| !l.is_empty()) {
            let (key, value) = line
                .split_once(": ")
                .ok_or_else(|| bad(format!("malformed record {:?}", line)))?;
            match key {
                "creation_tid" => {
                    version.creation_tid = value.parse().map_err(bad)?;
                    has_creation_tid = true;
                }
                "creation_csn" => version.creation_csn = parse_csn(value).map_err(bad)?,
                "removal_tid" => version.removal_tid = value.parse().map_err(bad)?,
                "removal_csn" => version.removal_csn = parse_csn(value).map_err(bad)?,
                other => return Err(bad(format!("unknown record {:?}", other))),
            }
        }

        if !has_creation_tid {
            return Err(bad("missing creation_tid".to_string()));
        }
        Ok(version)
    }
}

fn parse_csn(value: &str) -> Result<Csn, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("bad csn {:?}", value))
}
