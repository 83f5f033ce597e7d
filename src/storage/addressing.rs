//! Allocation / addressing
//!
//! Logical record index → physical sector offset.

use crate::config::Config;

/// Circular mapping of logical indices onto the data sectors of a region
///
/// There is no check against the reader's position: once more than
/// `data_sectors()` records have been written, index `i` and index
/// `i + data_sectors()` share a sector and the newer write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    base: u64,
    sector_size: u32,
    capacity: u32,
}

impl Addressing {
    /// Region of `capacity` sectors (superblock included) starting at `base`
    pub fn new(base: u64, sector_size: u32, capacity: u32) -> Self {
        Self {
            base,
            sector_size,
            capacity,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.base_offset, config.sector_size, config.sector_count)
    }

    /// Offset of the superblock sector
    pub fn superblock_offset(&self) -> u64 {
        self.base
    }

    /// Sectors available to records
    pub fn data_sectors(&self) -> u32 {
        self.capacity - 1
    }

    /// Sectors in the region, superblock included
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Data sector slot that `logical_index` lands in
    pub fn physical_slot(&self, logical_index: u32) -> u32 {
        logical_index % self.data_sectors()
    }

    /// Byte offset of the sector holding `logical_index`
    pub fn sector_for(&self, logical_index: u32) -> u64 {
        let physical = self.physical_slot(logical_index) as u64;
        self.base + self.sector_size as u64 + physical * self.sector_size as u64
    }
}
