//! Write Buffer Module
//!
//! In-memory staging area for records waiting to be written to flash.
//!
//! ## Responsibilities
//! - Absorb bursts of small writes so each flush costs one erase per record
//!   instead of interleaving erases with the caller's work
//! - Keep failed writes staged until a later flush succeeds
//! - Decide when a flush is due (full buffer or elapsed interval)
//!
//! ## Data Structure Choice
//! A fixed array of slots (`Vec<Option<BufferedEntry>>`):
//! - Occupancy is the `Some`/`None` state of a slot
//! - Flush walks slots in index order; freed slots are reused lowest-first,
//!   so after a partial flush the order is slot order, not insertion order

mod staging;

pub use staging::WriteBuffer;

use bytes::Bytes;

/// A record staged in memory, not yet on flash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedEntry {
    /// Caller-defined record type
    pub type_id: u32,

    /// Timestamp (clock millis) taken when the record was staged
    pub timestamp: u32,

    /// Owned copy of the payload
    pub payload: Bytes,
}

impl BufferedEntry {
    /// Payload length in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
