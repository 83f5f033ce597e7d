//! Superblock manager
//!
//! Loads, formats and persists the superblock in sector 0 of the region.
//!
//! ## Write Path
//! ```text
//! next state ──► erase sector 0 ──► program image ──► update mirror
//!                     └──── retried once on device error ────┘
//! ```
//! The in-memory mirror only moves forward once the new image is on flash.
//! Sector 0 is not updated atomically: if the erase succeeds and both
//! program attempts fail, flash holds an erased superblock and the next
//! mount formats the region.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::codec::{Superblock, FORMAT_VERSION, SUPERBLOCK_SIZE};
use crate::device::BlockDevice;
use crate::error::{FlashBlobError, Result};

use super::{with_retry, Addressing};

/// Outcome of mounting a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootInfo {
    /// Boot counter after this mount
    pub boot_count: u32,
    /// Whether the region was (re)formatted
    pub formatted: bool,
    /// Records counted by the superblock
    pub total_records: u32,
}

/// Owner of the superblock mirror
#[derive(Debug)]
pub struct SuperblockManager {
    addressing: Addressing,
    retry_delay: Duration,
    current: Superblock,
}

impl SuperblockManager {
    /// Mount the region: load the existing superblock or format a new one
    ///
    /// A valid superblock gets its boot counter incremented and is written
    /// back. A missing one (or `force_format`) produces a fresh store with
    /// `boot_count = 1`.
    pub fn load_or_format<D: BlockDevice + ?Sized>(
        device: &mut D,
        addressing: Addressing,
        retry_delay: Duration,
        force_format: bool,
    ) -> Result<(Self, BootInfo)> {
        let offset = addressing.superblock_offset();
        let mut raw = [0u8; SUPERBLOCK_SIZE];
        with_retry(retry_delay, "read superblock", || device.read(offset, &mut raw))?;

        let loaded = Superblock::decode(&raw).filter(Superblock::is_valid);

        let mut manager = Self {
            addressing,
            retry_delay,
            current: Superblock::formatted(1),
        };

        let formatted = match loaded {
            Some(existing) if !force_format => {
                manager.check_mountable(&existing)?;
                let mut next = existing;
                if next.used_sectors == 0 {
                    warn!("Superblock counts no used sectors, assuming the superblock itself");
                    next.used_sectors = 1;
                }
                next.boot_count = existing.boot_count.wrapping_add(1);
                manager.commit(device, next)?;
                info!(
                    boot_count = next.boot_count,
                    total_records = next.total_records,
                    used_sectors = next.used_sectors,
                    "Mounted existing store"
                );
                false
            }
            existing => {
                if existing.is_some() {
                    warn!("Force format requested, discarding existing store");
                }
                manager.commit(device, Superblock::formatted(1))?;
                info!(
                    sectors = addressing.capacity(),
                    sector_size = addressing.sector_size(),
                    "Formatted new store"
                );
                true
            }
        };

        let boot = BootInfo {
            boot_count: manager.current.boot_count,
            formatted,
            total_records: manager.current.total_records,
        };
        Ok((manager, boot))
    }

    /// Reject superblocks this build cannot interpret
    fn check_mountable(&self, sb: &Superblock) -> Result<()> {
        if sb.format_version != FORMAT_VERSION {
            return Err(FlashBlobError::CorruptSuperblock(format!(
                "unsupported format version {} (expected {})",
                sb.format_version, FORMAT_VERSION
            )));
        }
        if sb.used_sectors > self.addressing.capacity() {
            return Err(FlashBlobError::CorruptSuperblock(format!(
                "used sectors {} exceed region capacity {}",
                sb.used_sectors,
                self.addressing.capacity()
            )));
        }
        Ok(())
    }

    /// Current (persisted) superblock
    pub fn superblock(&self) -> &Superblock {
        &self.current
    }

    /// Persist `next` and adopt it as the mirror
    pub fn commit<D: BlockDevice + ?Sized>(&mut self, device: &mut D, next: Superblock) -> Result<()> {
        let offset = self.addressing.superblock_offset();
        let image = next.encode(self.addressing.sector_size() as usize);

        with_retry(self.retry_delay, "write superblock", || {
            device.erase_sector(offset)?;
            device.program_sector(offset, &image)
        })?;

        self.current = next;
        debug!(
            total_records = next.total_records,
            used_sectors = next.used_sectors,
            "Superblock persisted"
        );
        Ok(())
    }

    /// Rewrite the current superblock unchanged
    pub fn rewrite<D: BlockDevice + ?Sized>(&mut self, device: &mut D) -> Result<()> {
        let current = self.current;
        self.commit(device, current)
    }

    /// Reset counters to a fresh store, keeping the boot counter
    pub fn reformat<D: BlockDevice + ?Sized>(&mut self, device: &mut D) -> Result<()> {
        let fresh = Superblock::formatted(self.current.boot_count);
        self.commit(device, fresh)
    }
}
