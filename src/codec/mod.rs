//! Codec Module
//!
//! Explicit fixed-width serialization of everything that lives on flash.
//!
//! ## Responsibilities
//! - Pack/unpack the superblock (sector 0 of the region)
//! - Pack/unpack record sectors (header + payload + zero padding)
//! - CRC-32 over record payloads
//! - Classify raw sectors (live / tombstoned / erased / corrupt)
//!
//! ## Sector Formats (little-endian)
//! ```text
//! Superblock (32 bytes, zero padded to sector size)
//! ┌───────┬─────────┬───────┬──────┬───────────┬──────────┬───────┬──────────┐
//! │Magic 4│Version 4│Total 4│Used 4│NextWrite 4│NextRead 4│Boots 4│Reserved 4│
//! └───────┴─────────┴───────┴──────┴───────────┴──────────┴───────┴──────────┘
//!
//! Record sector (24-byte header, payload, zero padded to sector size)
//! ┌───────┬──────┬──────┬──────┬──────┬───────┬───────────────────────────┐
//! │Magic 4│Time 4│Type 4│Size 4│CRC 4 │Index 4│ Payload (Size bytes) ...  │
//! └───────┴──────┴──────┴──────┴──────┴───────┴───────────────────────────┘
//! ```
//! A record whose magic word has been programmed to zero is a tombstone.

mod crc;
mod record;
mod superblock;

pub use crc::crc32;
pub use record::{
    classify, decode_header, decode_record, encode_record, RecordHeader, RecordState,
};
pub use superblock::Superblock;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic value marking an initialized superblock and a live record ("BSMG")
pub const MAGIC: u32 = 0x4253_4D47;

/// Magic value of a tombstoned record (all bits of MAGIC cleared)
pub const TOMBSTONE_MAGIC: u32 = 0;

/// Current on-flash format version
pub const FORMAT_VERSION: u32 = 1;

/// Superblock size: 8 fields x 4 bytes
pub const SUPERBLOCK_SIZE: usize = 32;

/// Record header size: 6 fields x 4 bytes
pub const RECORD_HEADER_SIZE: usize = 24;

/// Offset of the magic word inside a record sector
pub const MAGIC_OFFSET: u64 = 0;
