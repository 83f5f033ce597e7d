//! Record log
//!
//! Write, read and tombstone records in the data sectors, keeping the
//! superblock counters in step.

use std::time::Duration;

use tracing::{debug, warn};

use crate::codec::{
    classify, decode_header, decode_record, encode_record, RecordHeader, RecordState,
    Superblock, MAGIC_OFFSET, RECORD_HEADER_SIZE, TOMBSTONE_MAGIC,
};
use crate::device::BlockDevice;
use crate::error::{FlashBlobError, Result};

use super::{with_retry, Addressing, BootInfo, SuperblockManager};

/// Contents of one data sector, as read from flash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectorRead {
    /// Live record; the CRC has not been checked
    Live {
        header: RecordHeader,
        payload: Vec<u8>,
    },
    Tombstoned,
    Erased,
    Corrupt,
}

/// The persisted record sequence of a mounted region
#[derive(Debug)]
pub struct RecordLog {
    addressing: Addressing,
    retry_delay: Duration,
    superblock: SuperblockManager,
}

impl RecordLog {
    /// Mount the region described by `addressing`
    pub fn open<D: BlockDevice + ?Sized>(
        device: &mut D,
        addressing: Addressing,
        retry_delay: Duration,
        force_format: bool,
    ) -> Result<(Self, BootInfo)> {
        let (superblock, boot) =
            SuperblockManager::load_or_format(device, addressing, retry_delay, force_format)?;
        let log = Self {
            addressing,
            retry_delay,
            superblock,
        };
        Ok((log, boot))
    }

    pub fn superblock(&self) -> &Superblock {
        self.superblock.superblock()
    }

    pub fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    /// Records ever written since the last format
    pub fn total_records(&self) -> u32 {
        self.superblock().total_records
    }

    /// Sectors not yet in use (superblock counted as used)
    pub fn free_sectors(&self) -> u32 {
        self.addressing
            .capacity()
            .saturating_sub(self.superblock().used_sectors)
    }

    /// Largest payload a data sector can carry
    pub fn max_payload(&self) -> usize {
        self.addressing.sector_size() as usize - RECORD_HEADER_SIZE
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Append one record and return its logical index
    ///
    /// The sector is erased, programmed and read back before the superblock
    /// counts it. Device failures are retried once.
    pub fn append<D: BlockDevice + ?Sized>(
        &mut self,
        device: &mut D,
        type_id: u32,
        timestamp: u32,
        payload: &[u8],
    ) -> Result<u32> {
        self.write(device, type_id, timestamp, payload, None)
    }

    /// Append a record carrying a previously stored CRC
    ///
    /// Used when moving records: a payload whose checksum no longer matches
    /// keeps reporting the mismatch after the move.
    pub fn append_preserving_crc<D: BlockDevice + ?Sized>(
        &mut self,
        device: &mut D,
        type_id: u32,
        timestamp: u32,
        payload: &[u8],
        crc32: u32,
    ) -> Result<u32> {
        self.write(device, type_id, timestamp, payload, Some(crc32))
    }

    fn write<D: BlockDevice + ?Sized>(
        &mut self,
        device: &mut D,
        type_id: u32,
        timestamp: u32,
        payload: &[u8],
        stored_crc: Option<u32>,
    ) -> Result<u32> {
        let sb = *self.superblock();

        // Step 1: Capacity check
        if sb.used_sectors >= self.addressing.capacity() {
            return Err(FlashBlobError::CapacityExceeded {
                used: sb.used_sectors,
                total: self.addressing.capacity(),
            });
        }

        // Step 2: Encode the sector image
        let index = sb.next_write_index;
        let mut header = RecordHeader::new(type_id, timestamp, payload, index);
        if let Some(crc) = stored_crc {
            header.crc32 = crc;
        }
        let image = encode_record(&header, payload, self.addressing.sector_size() as usize)?;
        let offset = self.addressing.sector_for(index);

        // Step 3: Erase, program, verify
        with_retry(self.retry_delay, "write record", || {
            device.erase_sector(offset)?;
            device.program_sector(offset, &image)?;

            let mut check = [0u8; RECORD_HEADER_SIZE];
            device.read(offset, &mut check)?;
            match decode_header(&check) {
                Some(h) if h == header => Ok(()),
                _ => Err(FlashBlobError::Device(format!(
                    "read-back mismatch at 0x{:X}",
                    offset
                ))),
            }
        })?;

        // Step 4: Advance counters and persist
        let mut next = sb;
        next.total_records = sb.total_records.wrapping_add(1);
        next.used_sectors = sb.used_sectors + 1;
        next.next_write_index = sb.next_write_index.wrapping_add(1);
        self.superblock.commit(device, next)?;

        debug!(index, type_id, size = payload.len(), "Record written");
        Ok(index)
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Read and classify the full sector holding `index`
    pub fn read<D: BlockDevice + ?Sized>(&self, device: &D, index: u32) -> Result<SectorRead> {
        let offset = self.addressing.sector_for(index);
        let mut sector = vec![0u8; self.addressing.sector_size() as usize];
        with_retry(self.retry_delay, "read record", || device.read(offset, &mut sector))?;

        let read = match classify(&sector, self.max_payload()) {
            RecordState::Live => match decode_record(&sector) {
                Some((header, payload)) => {
                    if header.logical_index != index {
                        warn!(
                            index,
                            stored_index = header.logical_index,
                            "Sector holds a different logical index"
                        );
                    }
                    SectorRead::Live {
                        header,
                        payload: payload.to_vec(),
                    }
                }
                None => SectorRead::Corrupt,
            },
            RecordState::Tombstoned => SectorRead::Tombstoned,
            RecordState::Erased => SectorRead::Erased,
            RecordState::Corrupt => SectorRead::Corrupt,
        };
        Ok(read)
    }

    /// Read only the header of `index` and classify it
    ///
    /// Cheaper than [`read`](Self::read) for scans that never look at
    /// payloads.
    pub fn read_header<D: BlockDevice + ?Sized>(
        &self,
        device: &D,
        index: u32,
    ) -> Result<(RecordState, Option<RecordHeader>)> {
        let offset = self.addressing.sector_for(index);
        let mut raw = [0u8; RECORD_HEADER_SIZE];
        with_retry(self.retry_delay, "read header", || device.read(offset, &mut raw))?;

        let state = classify(&raw, self.max_payload());
        Ok((state, decode_header(&raw)))
    }

    // =========================================================================
    // Tombstones
    // =========================================================================

    /// Clear the magic word of `index` in place
    ///
    /// Returns `false` if the magic word was already gone.
    pub fn tombstone<D: BlockDevice + ?Sized>(&mut self, device: &mut D, index: u32) -> Result<bool> {
        let (_, header) = self.read_header(device, index)?;
        if !header.map_or(false, |h| h.is_live()) {
            return Ok(false);
        }

        let offset = self.addressing.sector_for(index) + MAGIC_OFFSET;
        with_retry(self.retry_delay, "tombstone record", || {
            device.program(offset, &TOMBSTONE_MAGIC.to_le_bytes())?;

            let mut check = [0u8; 4];
            device.read(offset, &mut check)?;
            let magic = u32::from_le_bytes(check);
            if magic != TOMBSTONE_MAGIC {
                return Err(FlashBlobError::Device(format!(
                    "tombstone did not stick at 0x{:X} (read {:08X})",
                    offset, magic
                )));
            }
            Ok(())
        })?;

        self.superblock.rewrite(device)?;
        debug!(index, "Record tombstoned");
        Ok(true)
    }

    // =========================================================================
    // Format
    // =========================================================================

    /// Reset to an empty store, keeping the boot counter
    ///
    /// Data sectors are left as they are; they are erased again when reused.
    pub fn reformat<D: BlockDevice + ?Sized>(&mut self, device: &mut D) -> Result<()> {
        self.superblock.reformat(device)
    }
}
