//! Engine Module
//!
//! `BlobStore` ties the write buffer, the record log and the maintenance
//! passes to one block device.
//!
//! ## Responsibilities
//! - Mount (or format) the region and track the boot counter
//! - Stage writes and apply the flush policy
//! - Serve reads from flash, or from the buffer for records not yet flushed
//! - Delete, compact and repair on request
//!
//! ## Write Path
//! ```text
//! store(type, payload)
//!    │
//!    ▼
//! ┌─────────────┐  full / interval elapsed / flush()  ┌─────────────┐
//! │ WriteBuffer │ ──────────────────────────────────► │  RecordLog  │
//! └─────────────┘                                      └──────┬──────┘
//!                                                             │
//!                               erase + program + verify data sector
//!                                                             │
//!                                               rewrite superblock (sector 0)
//! ```
//!
//! ## Ownership
//! One `BlobStore` owns its device. Every mutating operation takes
//! `&mut self`, so there is never more than one writer.

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::buffer::{BufferedEntry, WriteBuffer};
use crate::clock::{Clock, MonotonicClock};
use crate::codec::{crc32, RecordState};
use crate::config::Config;
use crate::device::BlockDevice;
use crate::error::{FlashBlobError, Result};
use crate::reading::{SensorReading, SensorType};
use crate::record::{Integrity, Record};
use crate::stats::{BufferInfo, StorageInfo, StoreSummary, TypeSummary};
use crate::storage::{
    self, Addressing, BootInfo, CompactionReport, Phase, Progress, RecordLog, RepairReport,
    SectorRead,
};

/// Blob store over a sector-erasable device
///
/// ## State
/// - Before [`init`](Self::init): every operation except configuration
///   fails with `NotInitialized`
/// - After: `log` mirrors the persisted superblock, `buffer` holds records
///   not yet written
pub struct BlobStore<D: BlockDevice, C: Clock = MonotonicClock> {
    /// Store configuration (flush policy is adjustable at runtime)
    config: Config,

    /// The flash device
    device: D,

    /// Source of timestamps and flush-interval time
    clock: C,

    /// Mounted record log; `None` until initialized
    log: Option<RecordLog>,

    /// Records staged in memory
    buffer: WriteBuffer,
}

impl<D: BlockDevice> BlobStore<D> {
    /// Create an uninitialized store using the monotonic clock
    pub fn new(device: D, config: Config) -> Result<Self> {
        Self::with_clock(device, config, MonotonicClock::new())
    }

    /// Create a store and mount it without formatting
    pub fn open(device: D, config: Config) -> Result<Self> {
        let mut store = Self::new(device, config)?;
        store.init(false)?;
        Ok(store)
    }
}

impl<D: BlockDevice, C: Clock> BlobStore<D, C> {
    /// Create an uninitialized store with an explicit clock
    pub fn with_clock(device: D, config: Config, clock: C) -> Result<Self> {
        config.validate(&device)?;
        let buffer = WriteBuffer::new(config.buffer_capacity, clock.now_millis());

        Ok(Self {
            config,
            device,
            clock,
            log: None,
            buffer,
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Mount the region
    ///
    /// On a valid superblock the boot counter is incremented. Otherwise, or
    /// with `force_format`, the region is formatted. Calling this again on
    /// a mounted store without `force_format` changes nothing.
    pub fn init(&mut self, force_format: bool) -> Result<BootInfo> {
        if let (Some(log), false) = (&self.log, force_format) {
            debug!("Store already initialized");
            return Ok(BootInfo {
                boot_count: log.superblock().boot_count,
                formatted: false,
                total_records: log.total_records(),
            });
        }

        // Step 1: A format invalidates anything staged against the old state
        if force_format {
            self.buffer.clear();
            self.log = None;
        }

        // Step 2: Load or format the superblock
        let addressing = Addressing::from_config(&self.config);
        let (log, boot) = RecordLog::open(
            &mut self.device,
            addressing,
            self.config.retry_delay,
            force_format,
        )?;

        // Step 3: Ready
        self.log = Some(log);
        self.buffer.mark_flushed(self.clock.now_millis());

        info!(
            boot_count = boot.boot_count,
            formatted = boot.formatted,
            total_records = boot.total_records,
            max_blob_size = self.max_blob_size(),
            "Storage initialized"
        );
        Ok(boot)
    }

    /// Format the region, dropping staged records; the boot counter
    /// restarts at 1
    pub fn format(&mut self) -> Result<BootInfo> {
        self.buffer.clear();
        self.init(true)
    }

    /// Whether [`init`](Self::init) has succeeded
    pub fn is_initialized(&self) -> bool {
        self.log.is_some()
    }

    /// Flush staged records, sync the device and hand it back
    pub fn close(mut self) -> Result<D> {
        if self.log.is_some() && !self.buffer.is_empty() {
            self.flush()?;
        }
        self.device.sync()?;
        info!("Storage closed");
        Ok(self.device)
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Stage a record for writing
    ///
    /// A full buffer is flushed before staging. With auto-flush on, a flush
    /// also runs once the buffer fills or the flush interval has elapsed;
    /// its error is returned, but the record stays staged.
    pub fn store(&mut self, type_id: u32, payload: &[u8]) -> Result<()> {
        self.log()?;

        let max = self.max_blob_size();
        if payload.is_empty() || payload.len() > max {
            return Err(FlashBlobError::InvalidSize {
                size: payload.len(),
                max,
            });
        }

        let now = self.clock.now_millis();
        let entry = BufferedEntry {
            type_id,
            timestamp: now as u32,
            payload: Bytes::copy_from_slice(payload),
        };

        // Step 1: Stage, making room first if every slot is taken
        if let Err(entry) = self.buffer.stage(entry) {
            debug!("Write buffer full, flushing before staging");
            let flushed = self.flush();
            match (self.buffer.stage(entry), flushed) {
                (Ok(_), Ok(())) => {}
                (Ok(_), Err(e)) => {
                    warn!(error = %e, "Flush partially failed; record staged")
                }
                (Err(_), Err(e)) => return Err(e),
                (Err(_), Ok(())) => {
                    let sb = *self.log()?.superblock();
                    return Err(FlashBlobError::CapacityExceeded {
                        used: sb.used_sectors,
                        total: self.config.sector_count,
                    });
                }
            }
        }

        debug!(
            type_id,
            size = payload.len(),
            buffered = self.buffer.len(),
            "Record staged"
        );

        // Step 2: Flush policy
        if self.config.auto_flush && self.buffer.flush_due(now, self.config.flush_interval) {
            return self.flush();
        }
        Ok(())
    }

    /// Write every staged record to flash
    ///
    /// Each record is attempted independently (with one retry on device
    /// errors). Records that still fail stay staged for the next flush;
    /// the first error is returned.
    pub fn flush(&mut self) -> Result<()> {
        let log = self.log.as_mut().ok_or(FlashBlobError::NotInitialized)?;

        if self.buffer.is_empty() {
            self.buffer.mark_flushed(self.clock.now_millis());
            return Ok(());
        }

        let slots = self.buffer.occupied_slots();
        if slots.len() as u32 > log.free_sectors() {
            warn!(
                pending = slots.len(),
                free_sectors = log.free_sectors(),
                "Not enough free sectors for every staged record"
            );
        }
        info!(pending = slots.len(), "Flushing write buffer");

        let mut written = 0usize;
        let mut first_error = None;
        for slot in slots {
            let entry = match self.buffer.get(slot) {
                Some(entry) => entry.clone(),
                None => continue,
            };

            match log.append(&mut self.device, entry.type_id, entry.timestamp, &entry.payload) {
                Ok(_) => {
                    self.buffer.release(slot);
                    written += 1;
                }
                Err(e) => {
                    error!(slot, type_id = entry.type_id, error = %e, "Failed to flush record; keeping it staged");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        self.buffer.mark_flushed(self.clock.now_millis());
        info!(written, remaining = self.buffer.len(), "Flush finished");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Flush if the auto-flush policy says one is due
    ///
    /// Meant to be called periodically by the owner. Returns whether a
    /// flush ran.
    pub fn check_flush(&mut self) -> Result<bool> {
        self.log()?;

        let now = self.clock.now_millis();
        if !self.config.auto_flush || !self.buffer.flush_due(now, self.config.flush_interval) {
            return Ok(false);
        }
        self.flush().map(|()| true)
    }

    /// Change the auto-flush policy
    pub fn set_auto_flush(&mut self, enabled: bool, interval: Duration) {
        self.config.auto_flush = enabled;
        self.config.flush_interval = interval;
        debug!(enabled, interval_ms = interval.as_millis() as u64, "Auto-flush updated");
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Retrieve a record by logical index
    ///
    /// Indices in `[count(), count() + buffered)` address staged records in
    /// the order they will be flushed. A CRC mismatch is reported through
    /// [`Record::integrity`], not as an error.
    pub fn get(&self, index: u32) -> Result<Record> {
        let log = self.log()?;
        let total = log.total_records();
        if index >= total {
            return self.get_staged(index, total);
        }

        match log.read(&self.device, index)? {
            SectorRead::Live { header, payload } => {
                let computed = crc32(&payload);
                let integrity = if computed == header.crc32 {
                    Integrity::Verified
                } else {
                    warn!(index, stored = header.crc32, computed, "CRC mismatch");
                    Integrity::Mismatch {
                        stored: header.crc32,
                        computed,
                    }
                };

                Ok(Record {
                    index,
                    type_id: header.type_id,
                    timestamp: header.timestamp,
                    payload,
                    integrity,
                    staged: false,
                })
            }
            SectorRead::Tombstoned => Err(FlashBlobError::RecordDeleted { index }),
            SectorRead::Erased | SectorRead::Corrupt => Err(FlashBlobError::InvalidRecord { index }),
        }
    }

    fn get_staged(&self, index: u32, total: u32) -> Result<Record> {
        let position = (index - total) as usize;
        match self.buffer.nth_pending(position) {
            Some(entry) => Ok(Record {
                index,
                type_id: entry.type_id,
                timestamp: entry.timestamp,
                payload: entry.payload.to_vec(),
                integrity: Integrity::Verified,
                staged: true,
            }),
            None => Err(FlashBlobError::IndexOutOfRange {
                index,
                total: total + self.buffer.len() as u32,
            }),
        }
    }

    /// Like [`get`](Self::get), but a CRC mismatch is an error
    pub fn get_verified(&self, index: u32) -> Result<Record> {
        let record = self.get(index)?;
        match record.integrity {
            Integrity::Verified => Ok(record),
            Integrity::Mismatch { stored, computed } => Err(FlashBlobError::IntegrityMismatch {
                index,
                stored,
                computed,
            }),
        }
    }

    /// The newest `max` records on flash, oldest first, with per-record
    /// outcome
    pub fn recent(&self, max: u32) -> Result<Vec<(u32, Result<Record>)>> {
        let total = self.log()?.total_records();
        let start = total.saturating_sub(max);
        Ok((start..total).map(|index| (index, self.get(index))).collect())
    }

    /// Records ever written since the last format (deleted ones included)
    pub fn count(&self) -> u32 {
        self.log.as_ref().map_or(0, RecordLog::total_records)
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Tombstone one record
    ///
    /// Staged records are flushed first (a failed flush is logged and the
    /// delete goes ahead). Deleting an already deleted record succeeds.
    pub fn delete(&mut self, index: u32) -> Result<()> {
        let total = self.log()?.total_records();
        if index >= total {
            return Err(FlashBlobError::IndexOutOfRange { index, total });
        }

        if !self.buffer.is_empty() {
            if let Err(e) = self.flush() {
                warn!(error = %e, "Flush before delete failed; deleting anyway");
            }
        }

        let log = self.log.as_mut().ok_or(FlashBlobError::NotInitialized)?;
        if !log.tombstone(&mut self.device, index)? {
            debug!(index, "Record already deleted");
        }
        Ok(())
    }

    /// Tombstone `[start, end]`; `end` is clamped to the last record
    pub fn delete_range(&mut self, start: u32, end: u32) -> Result<()> {
        self.delete_range_with(start, end, |_| ControlFlow::Continue(()))
    }

    /// [`delete_range`](Self::delete_range) with progress reporting
    ///
    /// `observer` runs before each index; returning `Break` stops with
    /// `Cancelled`, leaving earlier deletions in place. Every index is
    /// attempted; the first failure is returned at the end.
    pub fn delete_range_with<F>(&mut self, start: u32, end: u32, mut observer: F) -> Result<()>
    where
        F: FnMut(Progress) -> ControlFlow<()>,
    {
        let total = self.log()?.total_records();
        if start >= total {
            return Err(FlashBlobError::IndexOutOfRange {
                index: start,
                total,
            });
        }

        let end = end.min(total - 1);
        if end < start {
            return Ok(());
        }
        let span = end - start + 1;

        let mut first_error = None;
        for (done, index) in (start..=end).enumerate() {
            let progress = Progress {
                phase: Phase::Deleting,
                done: done as u32,
                total: span,
            };
            if observer(progress).is_break() {
                info!(start, done, "Range delete cancelled");
                return Err(FlashBlobError::Cancelled);
            }

            if let Err(e) = self.delete(index) {
                warn!(index, error = %e, "Failed to delete record in range");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        info!(start, end, "Range delete finished");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Rebuild the store from its live records
    pub fn compact(&mut self) -> Result<CompactionReport> {
        self.compact_with(|_| ControlFlow::Continue(()))
    }

    /// [`compact`](Self::compact) with progress reporting
    ///
    /// `observer` may cancel during the counting and capture passes only;
    /// a cancelled compaction leaves flash untouched.
    pub fn compact_with<F>(&mut self, mut observer: F) -> Result<CompactionReport>
    where
        F: FnMut(Progress) -> ControlFlow<()>,
    {
        self.log()?;

        if !self.buffer.is_empty() {
            if let Err(e) = self.flush() {
                warn!(
                    error = %e,
                    staged = self.buffer.len(),
                    "Flush before compaction failed; staged records stay buffered"
                );
            }
        }

        let log = self.log.as_mut().ok_or(FlashBlobError::NotInitialized)?;
        storage::compact(
            log,
            &mut self.device,
            self.config.compaction_memory_limit,
            &mut observer,
        )
    }

    /// Scan for invalid records, compact if any, then verify a sample
    pub fn repair(&mut self) -> Result<RepairReport> {
        let before = storage::scan(self.log()?, &self.device)?;
        info!(
            valid = before.valid,
            invalid = before.invalid(),
            crc_mismatches = before.crc_mismatches,
            "Integrity scan"
        );

        let compaction = if before.invalid() > 0 {
            Some(self.compact()?)
        } else {
            None
        };

        let sampled = self.count().min(self.config.repair_sample_size);
        let verified = (0..sampled).filter(|&i| self.get(i).is_ok()).count() as u32;
        if verified < sampled {
            error!(verified, sampled, "Repair verification failed");
            return Err(FlashBlobError::RepairFailed { verified, sampled });
        }

        info!(sampled, "Repair complete");
        Ok(RepairReport {
            before,
            compaction,
            sampled,
            verified,
        })
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Sector usage (all zero before init)
    pub fn info(&self) -> StorageInfo {
        match &self.log {
            Some(log) => StorageInfo {
                total_sectors: log.addressing().capacity(),
                used_sectors: log.superblock().used_sectors,
                free_sectors: log.free_sectors(),
            },
            None => StorageInfo::default(),
        }
    }

    pub fn buffer_info(&self) -> BufferInfo {
        BufferInfo {
            items_buffered: self.buffer.len(),
            capacity: self.buffer.capacity(),
        }
    }

    /// Earliest and latest timestamps among live records on flash
    pub fn time_range(&self) -> Result<Option<(u32, u32)>> {
        let log = self.log()?;

        let mut range: Option<(u32, u32)> = None;
        for index in 0..log.total_records() {
            if let (RecordState::Live, Some(header)) = log.read_header(&self.device, index)? {
                let ts = header.timestamp;
                range = Some(match range {
                    None => (ts, ts),
                    Some((lo, hi)) => (lo.min(ts), hi.max(ts)),
                });
            }
        }
        Ok(range)
    }

    /// Per-type counts and time ranges of live records
    pub fn summary(&self) -> Result<StoreSummary> {
        let log = self.log()?;

        let mut live_records = 0u32;
        let mut by_type: BTreeMap<u32, TypeSummary> = BTreeMap::new();
        for index in 0..log.total_records() {
            if let (RecordState::Live, Some(header)) = log.read_header(&self.device, index)? {
                live_records += 1;
                by_type
                    .entry(header.type_id)
                    .and_modify(|t| t.add(header.timestamp))
                    .or_insert_with(|| TypeSummary::first(header.timestamp));
            }
        }

        Ok(StoreSummary {
            total_records: log.total_records(),
            live_records,
            storage: self.info(),
            buffered: self.buffer.len(),
            boot_count: log.superblock().boot_count,
            by_type,
        })
    }

    /// Boot counter (0 before init)
    pub fn boot_count(&self) -> u32 {
        self.log.as_ref().map_or(0, |log| log.superblock().boot_count)
    }

    /// Largest payload a single record can carry
    pub fn max_blob_size(&self) -> usize {
        self.config.max_blob_size()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    // =========================================================================
    // Sensor Readings
    // =========================================================================

    /// Store a reading with its sensor type as the record type
    pub fn store_reading(&mut self, reading: &SensorReading, sensor: SensorType) -> Result<()> {
        let payload = reading.to_bytes()?;
        self.store(sensor.type_id(), &payload)
    }

    /// Retrieve and decode a reading
    pub fn get_reading(&self, index: u32) -> Result<(SensorType, SensorReading)> {
        let record = self.get_verified(index)?;
        let sensor = SensorType::from_type_id(record.type_id).ok_or_else(|| {
            FlashBlobError::Serialization(format!(
                "record {} has type {} which is not a sensor type",
                index, record.type_id
            ))
        })?;
        let reading = SensorReading::from_bytes(&record.payload)?;
        Ok((sensor, reading))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn log(&self) -> Result<&RecordLog> {
        self.log.as_ref().ok_or(FlashBlobError::NotInitialized)
    }
}
