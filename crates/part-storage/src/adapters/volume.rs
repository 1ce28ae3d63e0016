//! # Volume and Reservations
//!
//! `SingleDiskVolume` wraps one disk and leases space with byte accounting.
//! A `Reservation` returns its bytes to the volume when dropped, whether or
//! not the writes it covered succeeded.

use crate::ports::outbound::{DiskPtr, Volume};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Bytes currently leased from a volume.
#[derive(Debug, Default)]
struct SpaceLedger {
    reserved: AtomicU64,
}

impl SpaceLedger {
    /// Lease `bytes` if the total stays within `limit`.
    fn try_lease(&self, bytes: u64, limit: u64) -> bool {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(bytes).filter(|total| *total <= limit)
            })
            .is_ok()
    }

    fn release(&self, bytes: u64) {
        self.reserved.fetch_sub(bytes, Ordering::AcqRel);
    }

    fn reserved(&self) -> u64 {
        self.reserved.load(Ordering::Acquire)
    }
}

/// Disk-space lease. Released on drop.
pub struct Reservation {
    size: u64,
    disk: DiskPtr,
    ledger: Arc<SpaceLedger>,
}

impl Reservation {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn disk(&self) -> &DiskPtr {
        &self.disk
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("size", &self.size)
            .field("disk", &self.disk.name())
            .finish()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.ledger.release(self.size);
    }
}

/// Volume consisting of exactly one disk.
pub struct SingleDiskVolume {
    name: String,
    disk: DiskPtr,
    capacity: Option<u64>,
    ledger: Arc<SpaceLedger>,
}

impl SingleDiskVolume {
    /// Volume whose capacity is the disk's free space.
    pub fn new(name: impl Into<String>, disk: DiskPtr) -> Self {
        Self {
            name: name.into(),
            disk,
            capacity: None,
            ledger: Arc::new(SpaceLedger::default()),
        }
    }

    /// Volume named after its disk, as created for frozen and cloned parts.
    pub fn for_disk(disk: DiskPtr) -> Self {
        let name = format!("volume_{}", disk.name());
        Self::new(name, disk)
    }

    /// Cap reservations at `bytes` regardless of free space.
    pub fn with_capacity(mut self, bytes: u64) -> Self {
        self.capacity = Some(bytes);
        self
    }

    /// Bytes currently leased.
    pub fn reserved_bytes(&self) -> u64 {
        self.ledger.reserved()
    }
}

impl fmt::Debug for SingleDiskVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleDiskVolume")
            .field("name", &self.name)
            .field("disk", &self.disk.name())
            .field("capacity", &self.capacity)
            .field("reserved", &self.ledger.reserved())
            .finish()
    }
}

impl Volume for SingleDiskVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn disk(&self) -> DiskPtr {
        Arc::clone(&self.disk)
    }

    fn reserve(&self, bytes: u64) -> Option<Reservation> {
        let limit = match self.capacity {
            Some(capacity) => capacity,
            None => self.disk.available_space().ok()?,
        };
        if !self.ledger.try_lease(bytes, limit) {
            return None;
        }
        Some(Reservation {
            size: bytes,
            disk: Arc::clone(&self.disk),
            ledger: Arc::clone(&self.ledger),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDisk;

    fn volume(capacity: u64) -> SingleDiskVolume {
        SingleDiskVolume::new("default", Arc::new(InMemoryDisk::new("memory")))
            .with_capacity(capacity)
    }

    #[test]
    fn test_reserve_within_capacity() {
        let volume = volume(100);

        let first = volume.reserve(60).unwrap();
        assert_eq!(first.size(), 60);
        assert_eq!(volume.reserved_bytes(), 60);

        assert!(volume.reserve(41).is_none());
        let second = volume.reserve(40).unwrap();
        assert_eq!(volume.reserved_bytes(), 100);

        drop(first);
        drop(second);
        assert_eq!(volume.reserved_bytes(), 0);
    }

    #[test]
    fn test_reserve_overflow_rejected() {
        let volume = volume(u64::MAX);
        let _held = volume.reserve(u64::MAX).unwrap();
        assert!(volume.reserve(1).is_none());
    }

    #[test]
    fn test_for_disk_naming() {
        let volume = SingleDiskVolume::for_disk(Arc::new(InMemoryDisk::new("backup")));
        assert_eq!(volume.name(), "volume_backup");
        assert_eq!(volume.disk().name(), "backup");
    }
}
