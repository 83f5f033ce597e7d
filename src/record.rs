//! Records as handed back to callers

/// Outcome of the CRC check on a retrieved payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrity {
    /// Payload matches the stored CRC (always the case for staged records)
    Verified,
    /// Payload differs from what was written
    Mismatch { stored: u32, computed: u32 },
}

/// A retrieved record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Logical index
    pub index: u32,
    pub type_id: u32,
    /// Clock millis taken when the record was stored
    pub timestamp: u32,
    pub payload: Vec<u8>,
    pub integrity: Integrity,
    /// Still in the write buffer, not yet on flash
    pub staged: bool,
}

impl Record {
    /// Whether the payload passed its CRC check
    pub fn is_intact(&self) -> bool {
        self.integrity == Integrity::Verified
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
