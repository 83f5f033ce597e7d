//! Superblock codec

use bytes::{Buf, BufMut, BytesMut};

use super::{FORMAT_VERSION, MAGIC, SUPERBLOCK_SIZE};

/// Global store metadata persisted in the first sector of the region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub magic: u32,
    pub format_version: u32,
    /// Records ever successfully written (not decremented by delete)
    pub total_records: u32,
    /// Sectors in use, the superblock sector included
    pub used_sectors: u32,
    pub next_write_index: u32,
    pub next_read_index: u32,
    pub boot_count: u32,
    pub reserved: u32,
}

impl Superblock {
    /// Superblock of a freshly formatted store
    pub fn formatted(boot_count: u32) -> Self {
        Self {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            total_records: 0,
            used_sectors: 1, // the superblock sector itself
            next_write_index: 0,
            next_read_index: 0,
            boot_count,
            reserved: 0,
        }
    }

    /// Whether the magic marks an initialized store
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    /// Encode into a zero-padded sector image
    pub fn encode(&self, sector_size: usize) -> BytesMut {
        let mut sector = BytesMut::with_capacity(sector_size);
        sector.put_u32_le(self.magic);
        sector.put_u32_le(self.format_version);
        sector.put_u32_le(self.total_records);
        sector.put_u32_le(self.used_sectors);
        sector.put_u32_le(self.next_write_index);
        sector.put_u32_le(self.next_read_index);
        sector.put_u32_le(self.boot_count);
        sector.put_u32_le(self.reserved);
        sector.resize(sector_size.max(SUPERBLOCK_SIZE), 0);
        sector
    }

    /// Decode the first 32 bytes of `bytes`; `None` if too short
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SUPERBLOCK_SIZE {
            return None;
        }

        let mut buf = &bytes[..SUPERBLOCK_SIZE];
        Some(Self {
            magic: buf.get_u32_le(),
            format_version: buf.get_u32_le(),
            total_records: buf.get_u32_le(),
            used_sectors: buf.get_u32_le(),
            next_write_index: buf.get_u32_le(),
            next_read_index: buf.get_u32_le(),
            boot_count: buf.get_u32_le(),
            reserved: buf.get_u32_le(),
        })
    }
}
