//! Payload checksum
//!
//! Standard CRC-32 (IEEE 802.3): reflected polynomial 0xEDB88320, initial
//! value 0xFFFFFFFF, final complement. Matches the checksum firmware writes
//! into record headers, so images can be exchanged with other tools.

/// CRC-32 of `data`
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
