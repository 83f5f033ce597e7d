//! Compaction
//!
//! Rebuilds the store from its live records, reclaiming tombstoned and
//! invalid sectors.
//!
//! ## Passes
//! ```text
//! 1. Count    read headers, sum live payload bytes        (cancellable)
//!             └─ over the memory limit? → AllocationFailure, nothing touched
//! 2. Capture  copy live records into memory               (cancellable)
//! 3. Reformat superblock counters reset, boot count kept
//! 4. Rewrite  append retained records, original timestamps and CRCs
//! ```
//! Logical indices are reassigned densely from 0 in the order records were
//! found. Once the reformat has happened there is no way back, so progress
//! observers cannot stop passes 3 and 4.

use std::ops::ControlFlow;

use tracing::{error, info, warn};

use crate::codec::{crc32, RecordState};
use crate::device::BlockDevice;
use crate::error::{FlashBlobError, Result};

use super::{Phase, Progress, RecordLog, SectorRead};

/// A live record held in memory during compaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedRecord {
    /// Index before compaction
    pub original_index: u32,
    pub type_id: u32,
    pub timestamp: u32,
    /// CRC as stored, not recomputed
    pub crc32: u32,
    pub payload: Vec<u8>,
}

/// Summary of a finished compaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Indices examined
    pub scanned: u32,
    /// Live records carried over
    pub retained: u32,
    /// Tombstoned or invalid records dropped
    pub discarded: u32,
    /// Payload bytes held in memory at the peak
    pub bytes_retained: usize,
}

/// Compact `log` in place
pub(crate) fn compact<D, F>(
    log: &mut RecordLog,
    device: &mut D,
    memory_limit: usize,
    observer: &mut F,
) -> Result<CompactionReport>
where
    D: BlockDevice + ?Sized,
    F: FnMut(Progress) -> ControlFlow<()>,
{
    let total = log.total_records();
    info!(total, "Starting compaction");

    // Pass 1: size the live set from headers alone
    let mut live = 0u32;
    let mut live_bytes = 0usize;
    for index in 0..total {
        report(observer, Phase::Counting, index, total)?;
        if let (RecordState::Live, Some(header)) = log.read_header(device, index)? {
            live += 1;
            live_bytes += header.payload_size as usize;
        }
    }

    if live_bytes > memory_limit {
        warn!(live_bytes, memory_limit, "Live set exceeds compaction memory limit");
        return Err(FlashBlobError::AllocationFailure(format!(
            "{} bytes of live records exceed the {} byte limit",
            live_bytes, memory_limit
        )));
    }

    let mut retained: Vec<RetainedRecord> = Vec::new();
    retained
        .try_reserve_exact(live as usize)
        .map_err(|e| FlashBlobError::AllocationFailure(e.to_string()))?;

    // Pass 2: capture live records
    let mut bytes_retained = 0usize;
    for index in 0..total {
        report(observer, Phase::Capturing, index, total)?;
        if let SectorRead::Live { header, payload } = log.read(device, index)? {
            if crc32(&payload) != header.crc32 {
                warn!(index, "Retaining record with CRC mismatch");
            }
            bytes_retained += payload.len();
            retained.push(RetainedRecord {
                original_index: index,
                type_id: header.type_id,
                timestamp: header.timestamp,
                crc32: header.crc32,
                payload,
            });
        }
    }

    let retained_count = retained.len() as u32;
    let discarded = total - retained_count;

    // Pass 3: reset counters
    log.reformat(device)?;

    // Pass 4: rewrite
    let mut rewritten = 0u32;
    for (i, record) in retained.iter().enumerate() {
        let _ = observer(Progress {
            phase: Phase::Rewriting,
            done: i as u32,
            total: retained_count,
        });
        match log.append_preserving_crc(
            device,
            record.type_id,
            record.timestamp,
            &record.payload,
            record.crc32,
        ) {
            Ok(_) => rewritten += 1,
            Err(e) => error!(
                original_index = record.original_index,
                error = %e,
                "Failed to rewrite record during compaction"
            ),
        }
    }

    if rewritten < retained_count {
        return Err(FlashBlobError::CompactionIncomplete {
            retained: retained_count,
            rewritten,
        });
    }

    info!(retained = retained_count, discarded, "Compaction complete");
    Ok(CompactionReport {
        scanned: total,
        retained: retained_count,
        discarded,
        bytes_retained,
    })
}

/// Report progress and translate a stop request into `Cancelled`
fn report<F>(observer: &mut F, phase: Phase, done: u32, total: u32) -> Result<()>
where
    F: FnMut(Progress) -> ControlFlow<()>,
{
    match observer(Progress { phase, done, total }) {
        ControlFlow::Continue(()) => Ok(()),
        ControlFlow::Break(()) => {
            info!(?phase, done, total, "Operation cancelled");
            Err(FlashBlobError::Cancelled)
        }
    }
}
