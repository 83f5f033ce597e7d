//! Record sector codec

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FlashBlobError, Result};

use super::{crc32, MAGIC, RECORD_HEADER_SIZE, TOMBSTONE_MAGIC};

/// Fixed-width header at the start of every data sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// MAGIC while live, TOMBSTONE_MAGIC once deleted
    pub magic: u32,
    /// Milliseconds timestamp taken when the record was staged
    pub timestamp: u32,
    /// Caller-defined record type
    pub type_id: u32,
    /// Payload length in bytes
    pub payload_size: u32,
    /// CRC-32 of the payload bytes
    pub crc32: u32,
    /// Logical index assigned at write time
    pub logical_index: u32,
}

impl RecordHeader {
    /// Build a live header for `payload`
    pub fn new(type_id: u32, timestamp: u32, payload: &[u8], logical_index: u32) -> Self {
        Self {
            magic: MAGIC,
            timestamp,
            type_id,
            payload_size: payload.len() as u32,
            crc32: crc32(payload),
            logical_index,
        }
    }

    /// Whether the magic word is intact
    pub fn is_live(&self) -> bool {
        self.magic == MAGIC
    }

    /// Append the 24 header bytes to `buf`
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.magic);
        buf.put_u32_le(self.timestamp);
        buf.put_u32_le(self.type_id);
        buf.put_u32_le(self.payload_size);
        buf.put_u32_le(self.crc32);
        buf.put_u32_le(self.logical_index);
    }
}

/// What a raw data sector currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Valid magic and a plausible payload size
    Live,
    /// Magic cleared in place by a delete
    Tombstoned,
    /// Never written since the last erase
    Erased,
    /// Anything else (torn write, bit rot, foreign data)
    Corrupt,
}

/// Encode a record into a zero-padded sector image
pub fn encode_record(header: &RecordHeader, payload: &[u8], sector_size: usize) -> Result<BytesMut> {
    let max = sector_size.saturating_sub(RECORD_HEADER_SIZE);
    if payload.is_empty() || payload.len() > max {
        return Err(FlashBlobError::InvalidSize {
            size: payload.len(),
            max,
        });
    }

    let mut sector = BytesMut::with_capacity(sector_size);
    header.encode(&mut sector);
    sector.put_slice(payload);
    sector.resize(sector_size, 0);
    Ok(sector)
}

/// Parse the 24 header bytes at the start of `bytes`, without judging them
pub fn decode_header(bytes: &[u8]) -> Option<RecordHeader> {
    if bytes.len() < RECORD_HEADER_SIZE {
        return None;
    }

    let mut buf = &bytes[..RECORD_HEADER_SIZE];
    Some(RecordHeader {
        magic: buf.get_u32_le(),
        timestamp: buf.get_u32_le(),
        type_id: buf.get_u32_le(),
        payload_size: buf.get_u32_le(),
        crc32: buf.get_u32_le(),
        logical_index: buf.get_u32_le(),
    })
}

/// Decode a live record from a full sector image
///
/// Returns `None` when the magic does not match or the declared payload
/// size does not fit the sector; otherwise exactly `payload_size` bytes.
pub fn decode_record(sector: &[u8]) -> Option<(RecordHeader, &[u8])> {
    let header = decode_header(sector)?;
    if !header.is_live() {
        return None;
    }

    let size = header.payload_size as usize;
    let max = sector.len() - RECORD_HEADER_SIZE;
    if size == 0 || size > max {
        return None;
    }

    Some((header, &sector[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + size]))
}

/// Classify a sector from its header bytes
pub fn classify(header_bytes: &[u8], max_payload: usize) -> RecordState {
    let header = match decode_header(header_bytes) {
        Some(h) => h,
        None => return RecordState::Corrupt,
    };

    match header.magic {
        MAGIC if header.payload_size > 0 && header.payload_size as usize <= max_payload => {
            RecordState::Live
        }
        MAGIC => RecordState::Corrupt,
        TOMBSTONE_MAGIC => RecordState::Tombstoned,
        _ if header_bytes[..RECORD_HEADER_SIZE].iter().all(|&b| b == 0xFF) => {
            RecordState::Erased
        }
        _ => RecordState::Corrupt,
    }
}
