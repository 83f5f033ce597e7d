//! Storage Module
//!
//! The persisted half of the engine: superblock, addressing, the record
//! write/read/tombstone path, compaction and diagnostics.
//!
//! ## Responsibilities
//! - Own the superblock mirror; rewrite sector 0 after every mutation
//! - Map logical record indices onto data sectors (circular)
//! - Encode, write and verify record sectors
//! - Tombstone records in place
//! - Rebuild the store from its live records (compaction)
//! - Classify records and verify read-back (repair)
//!
//! ## Region Layout
//! ```text
//! ┌────────────┬────────────┬────────────┬─────┬──────────────┐
//! │ Superblock │ Data 0     │ Data 1     │ ... │ Data (N - 2) │
//! │ sector 0   │ sector 1   │ sector 2   │     │ sector N - 1 │
//! └────────────┴────────────┴────────────┴─────┴──────────────┘
//! logical index i  →  data sector (i mod (N - 1))
//! ```
//!
//! ## Failure Model
//! A data sector is written before the superblock that counts it. A crash
//! between the two loses that single record; earlier state is untouched.

mod addressing;
mod compaction;
mod log;
mod repair;
mod superblock;

pub use addressing::Addressing;
pub use compaction::{CompactionReport, RetainedRecord};
pub use log::{RecordLog, SectorRead};
pub use repair::{RepairReport, ScanReport};
pub use superblock::{BootInfo, SuperblockManager};

pub(crate) use compaction::compact;
pub(crate) use repair::scan;

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

// =============================================================================
// Progress Reporting
// =============================================================================

/// Which part of a long operation is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Compaction pass 1: counting live records and their bytes
    Counting,
    /// Compaction pass 2: copying live records into memory
    Capturing,
    /// Compaction pass 3: writing retained records back (not cancellable)
    Rewriting,
    /// Range deletion
    Deleting,
}

/// Progress of a long operation, reported between items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub phase: Phase,
    /// Items finished in this phase
    pub done: u32,
    /// Items in this phase
    pub total: u32,
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Run a device operation, retrying it once after `delay` if it failed
/// with a transient error
pub(crate) fn with_retry<T>(
    delay: Duration,
    operation: &str,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    match op() {
        Err(e) if e.is_transient() => {
            warn!(operation, error = %e, "Device operation failed, retrying once");
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            op()
        }
        other => other,
    }
}
