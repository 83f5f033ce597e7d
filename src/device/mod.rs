//! Block Device Module
//!
//! Sector-granular access to raw NOR-style flash.
//!
//! ## Responsibilities
//! - Erase one sector at a time (all bits back to 1)
//! - Program bytes over erased cells (bits may only go 1 → 0)
//! - Plain reads with no side effects
//! - Reject out-of-range or misaligned requests before they reach the medium
//!
//! ## Medium Semantics
//! ```text
//! erase_sector:   ???????? → 11111111
//! program 0x0F:   11111111 → 00001111
//! program 0xF0:   00001111 → 00000000   (AND with current contents)
//! ```
//! A tombstone is therefore representable by programming zeros over a
//! record's magic word without erasing its sector.

mod file;
mod mem;

pub use file::FileFlash;
pub use mem::MemFlash;

use crate::error::{FlashBlobError, Result};

/// Value of an erased flash byte
pub const ERASED_BYTE: u8 = 0xFF;

/// Sector-erasable storage device
///
/// All offsets are absolute byte offsets on the device. Higher layers only
/// ever issue whole-sector erases, whole-sector programs, and the single
/// in-place word program used for tombstones.
pub trait BlockDevice: Send {
    /// Erase granularity in bytes
    fn sector_size(&self) -> u32;

    /// Number of sectors on the device
    fn sector_count(&self) -> u32;

    /// Total length in bytes
    fn len_bytes(&self) -> u64 {
        self.sector_size() as u64 * self.sector_count() as u64
    }

    /// Read `buf.len()` bytes starting at `offset`
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Erase the sector starting at `offset` (must be sector aligned)
    fn erase_sector(&mut self, offset: u64) -> Result<()>;

    /// Program `data` at `offset`; the range must stay within one sector
    fn program(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Program a full sector image at a sector-aligned `offset`
    fn program_sector(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if data.len() != self.sector_size() as usize {
            return Err(FlashBlobError::OutOfRange {
                offset,
                len: data.len(),
            });
        }
        self.program(offset, data)
    }

    /// Push pending writes to stable storage
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Request Validation (shared by implementations)
// =============================================================================

/// Check that `[offset, offset + len)` lies inside a device of `device_len` bytes
pub(crate) fn check_range(device_len: u64, offset: u64, len: usize) -> Result<()> {
    let end = offset
        .checked_add(len as u64)
        .ok_or(FlashBlobError::OutOfRange { offset, len })?;

    if end > device_len {
        return Err(FlashBlobError::OutOfRange { offset, len });
    }
    Ok(())
}

/// Check an erase request: aligned and inside the device
pub(crate) fn check_erase(device_len: u64, sector_size: u32, offset: u64) -> Result<()> {
    if offset % sector_size as u64 != 0 {
        return Err(FlashBlobError::OutOfRange {
            offset,
            len: sector_size as usize,
        });
    }
    check_range(device_len, offset, sector_size as usize)
}

/// Check a program request: inside the device and not crossing a sector
pub(crate) fn check_program(
    device_len: u64,
    sector_size: u32,
    offset: u64,
    len: usize,
) -> Result<()> {
    check_range(device_len, offset, len)?;

    if len == 0 {
        return Ok(());
    }

    let first = offset / sector_size as u64;
    let last = (offset + len as u64 - 1) / sector_size as u64;
    if first != last {
        return Err(FlashBlobError::OutOfRange { offset, len });
    }
    Ok(())
}
