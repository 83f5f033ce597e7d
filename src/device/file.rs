//! File-backed flash
//!
//! A flash image stored in a regular file, with the same bit-clearing
//! program semantics as the real medium.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{FlashBlobError, Result};

use super::{check_erase, check_program, check_range, BlockDevice, ERASED_BYTE};

/// Flash image backed by a file
///
/// The file handle sits behind a mutex because `read` takes `&self` but
/// still has to move the file cursor.
#[derive(Debug)]
pub struct FileFlash {
    /// Image file handle
    file: Mutex<File>,
    /// Image path (for logging)
    path: PathBuf,
    sector_size: u32,
    sector_count: u32,
}

impl FileFlash {
    /// Open or create an image of `sector_count` sectors
    ///
    /// A new (empty) file is filled with erased bytes. An existing file must
    /// already have exactly the requested size.
    pub fn open(path: &Path, sector_size: u32, sector_count: u32) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let expected = sector_size as u64 * sector_count as u64;
        let actual = file.metadata()?.len();

        if actual == 0 {
            // Fresh image: every sector starts erased
            let sector = vec![ERASED_BYTE; sector_size as usize];
            for _ in 0..sector_count {
                file.write_all(&sector)?;
            }
            file.sync_all()?;
            info!(path = %path.display(), sectors = sector_count, "Created flash image");
        } else if actual != expected {
            return Err(FlashBlobError::Config(format!(
                "flash image {} is {} bytes, expected {} ({} x {})",
                path.display(),
                actual,
                expected,
                sector_count,
                sector_size
            )));
        }

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            sector_size,
            sector_count,
        })
    }

    /// Path of the backing image
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for FileFlash {
    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn sector_count(&self) -> u32 {
        self.sector_count
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(self.len_bytes(), offset, buf.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn erase_sector(&mut self, offset: u64) -> Result<()> {
        check_erase(self.len_bytes(), self.sector_size, offset)?;

        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&vec![ERASED_BYTE; self.sector_size as usize])?;

        debug!(offset, "Erased sector");
        Ok(())
    }

    fn program(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        check_program(self.len_bytes(), self.sector_size, offset, data.len())?;

        let file = self.file.get_mut();

        // Read-modify-write: only 1 → 0 transitions take effect
        let mut current = vec![0u8; data.len()];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut current)?;

        for (cell, &byte) in current.iter_mut().zip(data) {
            *cell &= byte;
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&current)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.get_mut().sync_data()?;
        Ok(())
    }
}
