//! In-memory flash
//!
//! NOR flash emulation used by tests, benchmarks and host-side tools.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{FlashBlobError, Result};

use super::{check_erase, check_program, check_range, BlockDevice, ERASED_BYTE};

/// In-memory flash medium
///
/// Cloning a `MemFlash` yields another handle onto the *same* medium, so a
/// test can drop a store, keep a handle, and "reboot" by opening a new store
/// over the surviving bytes.
///
/// Supports:
/// - Bit-clearing program semantics (program ANDs into current contents)
/// - Per-sector erase counters
/// - Fault injection (fail the next N erases / programs / reads)
/// - Corruption injection and simulated power loss
#[derive(Debug, Clone)]
pub struct MemFlash {
    sector_size: u32,
    sector_count: u32,
    medium: Arc<Mutex<Medium>>,
}

#[derive(Debug)]
struct Medium {
    /// Raw contents (0xFF = erased)
    bytes: Vec<u8>,
    /// Erase count per sector
    erase_counts: Vec<u32>,
    /// Number of successful program calls
    program_count: u64,
    /// Pending injected failures
    fail_erases: u32,
    fail_programs: u32,
    fail_reads: u32,
    /// Next program only writes half its bytes
    power_loss: bool,
}

impl MemFlash {
    /// Create a fully erased medium
    pub fn new(sector_size: u32, sector_count: u32) -> Self {
        let len = sector_size as usize * sector_count as usize;
        Self {
            sector_size,
            sector_count,
            medium: Arc::new(Mutex::new(Medium {
                bytes: vec![ERASED_BYTE; len],
                erase_counts: vec![0; sector_count as usize],
                program_count: 0,
                fail_erases: 0,
                fail_programs: 0,
                fail_reads: 0,
                power_loss: false,
            })),
        }
    }

    /// Copy of the medium contents (for test verification)
    pub fn contents(&self, offset: u64, len: usize) -> Vec<u8> {
        let medium = self.medium.lock();
        let start = offset as usize;
        medium.bytes[start..start + len].to_vec()
    }

    /// Overwrite bytes directly, bypassing flash semantics
    pub fn write_raw(&self, offset: u64, data: &[u8]) {
        let mut medium = self.medium.lock();
        let start = offset as usize;
        medium.bytes[start..start + data.len()].copy_from_slice(data);
    }

    /// Scribble a corruption pattern over `len` bytes at `offset`
    pub fn inject_corruption(&self, offset: u64, len: usize) {
        self.write_raw(offset, &vec![0xAA; len]);
    }

    /// Number of times the sector containing `offset` was erased
    pub fn erase_count(&self, offset: u64) -> u32 {
        let sector = (offset / self.sector_size as u64) as usize;
        self.medium.lock().erase_counts[sector]
    }

    /// Erase count summed over all sectors
    pub fn total_erase_count(&self) -> u64 {
        self.medium
            .lock()
            .erase_counts
            .iter()
            .map(|&c| c as u64)
            .sum()
    }

    /// Number of program calls that reached the medium
    pub fn program_count(&self) -> u64 {
        self.medium.lock().program_count
    }

    /// Fail the next `n` erase calls with a device error
    pub fn fail_next_erases(&self, n: u32) {
        self.medium.lock().fail_erases = n;
    }

    /// Fail the next `n` program calls with a device error
    pub fn fail_next_programs(&self, n: u32) {
        self.medium.lock().fail_programs = n;
    }

    /// Fail the next `n` read calls with a device error
    pub fn fail_next_reads(&self, n: u32) {
        self.medium.lock().fail_reads = n;
    }

    /// The next program call only writes half of its bytes
    pub fn simulate_power_loss(&self) {
        self.medium.lock().power_loss = true;
    }
}

impl BlockDevice for MemFlash {
    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn sector_count(&self) -> u32 {
        self.sector_count
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(self.len_bytes(), offset, buf.len())?;

        let mut medium = self.medium.lock();
        if medium.fail_reads > 0 {
            medium.fail_reads -= 1;
            return Err(FlashBlobError::Device(format!(
                "injected read failure at 0x{:X}",
                offset
            )));
        }

        let start = offset as usize;
        buf.copy_from_slice(&medium.bytes[start..start + buf.len()]);
        Ok(())
    }

    fn erase_sector(&mut self, offset: u64) -> Result<()> {
        check_erase(self.len_bytes(), self.sector_size, offset)?;

        let mut medium = self.medium.lock();
        if medium.fail_erases > 0 {
            medium.fail_erases -= 1;
            return Err(FlashBlobError::Device(format!(
                "injected erase failure at 0x{:X}",
                offset
            )));
        }

        let start = offset as usize;
        let end = start + self.sector_size as usize;
        medium.bytes[start..end].fill(ERASED_BYTE);

        let sector = (offset / self.sector_size as u64) as usize;
        medium.erase_counts[sector] += 1;
        Ok(())
    }

    fn program(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        check_program(self.len_bytes(), self.sector_size, offset, data.len())?;

        let mut medium = self.medium.lock();
        if medium.fail_programs > 0 {
            medium.fail_programs -= 1;
            return Err(FlashBlobError::Device(format!(
                "injected program failure at 0x{:X}",
                offset
            )));
        }

        let write_len = if medium.power_loss {
            medium.power_loss = false;
            data.len() / 2
        } else {
            data.len()
        };

        // Flash can only clear bits
        let start = offset as usize;
        for (cell, &byte) in medium.bytes[start..start + write_len]
            .iter_mut()
            .zip(data)
        {
            *cell &= byte;
        }

        medium.program_count += 1;
        Ok(())
    }
}
