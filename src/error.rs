//! Error types for flashblob
//!
//! Provides a unified error type for all storage operations.

use thiserror::Error;

/// Result type alias using FlashBlobError
pub type Result<T> = std::result::Result<T, FlashBlobError>;

/// Unified error type for flashblob operations
#[derive(Debug, Error)]
pub enum FlashBlobError {
    // -------------------------------------------------------------------------
    // Device Errors
    // -------------------------------------------------------------------------
    /// Erase/program/read failed at the block layer (retried once, then surfaced)
    #[error("Device error: {0}")]
    Device(String),

    /// Request outside the device region or not sector aligned
    #[error("Device access out of range: offset 0x{offset:X}, len {len}")]
    OutOfRange { offset: u64, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Invalid payload size: {size} bytes (allowed 1..={max})")]
    InvalidSize { size: usize, max: usize },

    #[error("Record index {index} out of range (total: {total})")]
    IndexOutOfRange { index: u32, total: u32 },

    #[error("CRC mismatch for record {index}: stored {stored:08X}, computed {computed:08X}")]
    IntegrityMismatch {
        index: u32,
        stored: u32,
        computed: u32,
    },

    #[error("Record {index} has been deleted")]
    RecordDeleted { index: u32 },

    #[error("Record {index} is not a valid record")]
    InvalidRecord { index: u32 },

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Storage full: {used}/{total} sectors used")]
    CapacityExceeded { used: u32, total: u32 },

    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    #[error("Corrupt superblock: {0}")]
    CorruptSuperblock(String),

    #[error("Storage not initialized")]
    NotInitialized,

    #[error("Compaction incomplete: rewrote {rewritten} of {retained} records")]
    CompactionIncomplete { retained: u32, rewritten: u32 },

    #[error("Repair verification failed: {verified}/{sampled} records readable")]
    RepairFailed { verified: u32, sampled: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlashBlobError {
    /// Whether a failed operation may be attempted once more
    ///
    /// Only device-level failures are transient; everything else is a
    /// caller or state problem that a retry cannot fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, FlashBlobError::Device(_) | FlashBlobError::Io(_))
    }
}

impl From<bincode::Error> for FlashBlobError {
    fn from(e: bincode::Error) -> Self {
        FlashBlobError::Serialization(e.to_string())
    }
}
