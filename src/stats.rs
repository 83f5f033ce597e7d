//! Usage and content statistics

use std::collections::BTreeMap;

/// Sector usage of the region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageInfo {
    /// Sectors in the region, superblock included
    pub total_sectors: u32,
    /// Sectors in use, superblock included
    pub used_sectors: u32,
    pub free_sectors: u32,
}

/// Write buffer occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferInfo {
    pub items_buffered: usize,
    pub capacity: usize,
}

/// Per-type breakdown of live records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSummary {
    pub count: u32,
    /// Oldest timestamp of this type
    pub earliest: u32,
    /// Newest timestamp of this type
    pub latest: u32,
}

impl TypeSummary {
    pub(crate) fn first(timestamp: u32) -> Self {
        Self {
            count: 1,
            earliest: timestamp,
            latest: timestamp,
        }
    }

    pub(crate) fn add(&mut self, timestamp: u32) {
        self.count += 1;
        self.earliest = self.earliest.min(timestamp);
        self.latest = self.latest.max(timestamp);
    }
}

/// Overview of everything in the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSummary {
    /// Records ever written since the last format
    pub total_records: u32,
    /// Records still readable (not tombstoned, erased or corrupt)
    pub live_records: u32,
    pub storage: StorageInfo,
    pub buffered: usize,
    pub boot_count: u32,
    /// Live records grouped by type id
    pub by_type: BTreeMap<u32, TypeSummary>,
}

impl StoreSummary {
    /// Overall `(earliest, latest)` timestamps across all types
    pub fn time_range(&self) -> Option<(u32, u32)> {
        self.by_type.values().fold(None, |acc, t| match acc {
            None => Some((t.earliest, t.latest)),
            Some((lo, hi)) => Some((lo.min(t.earliest), hi.max(t.latest))),
        })
    }
}
