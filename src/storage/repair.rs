//! Integrity scan
//!
//! Classifies every record in `[0, total_records)`. The repair operation
//! itself lives on the engine, which combines this scan with compaction
//! and a read-back sample.

use tracing::debug;

use crate::codec::crc32;
use crate::device::BlockDevice;
use crate::error::Result;

use super::{CompactionReport, RecordLog, SectorRead};

/// Per-state record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: u32,
    /// Live records (CRC mismatches included)
    pub valid: u32,
    /// Live records whose payload no longer matches its CRC
    pub crc_mismatches: u32,
    pub tombstoned: u32,
    pub erased: u32,
    pub corrupt: u32,
}

impl ScanReport {
    /// Records that compaction would drop
    pub fn invalid(&self) -> u32 {
        self.tombstoned + self.erased + self.corrupt
    }
}

/// Outcome of a successful repair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    /// Scan taken before anything was changed
    pub before: ScanReport,
    /// Present when invalid records triggered a compaction
    pub compaction: Option<CompactionReport>,
    /// Records read back after the repair
    pub sampled: u32,
    /// Sampled records that decoded
    pub verified: u32,
}

/// Classify every record of `log`
pub(crate) fn scan<D: BlockDevice + ?Sized>(log: &RecordLog, device: &D) -> Result<ScanReport> {
    let mut report = ScanReport::default();

    for index in 0..log.total_records() {
        report.scanned += 1;
        match log.read(device, index)? {
            SectorRead::Live { header, payload } => {
                report.valid += 1;
                if crc32(&payload) != header.crc32 {
                    report.crc_mismatches += 1;
                }
            }
            SectorRead::Tombstoned => report.tombstoned += 1,
            SectorRead::Erased => report.erased += 1,
            SectorRead::Corrupt => report.corrupt += 1,
        }
    }

    debug!(?report, "Integrity scan finished");
    Ok(report)
}
