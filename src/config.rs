//! Configuration for flashblob
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::codec::RECORD_HEADER_SIZE;
use crate::device::BlockDevice;
use crate::error::{FlashBlobError, Result};

/// Main configuration for a flashblob store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Region Configuration
    // -------------------------------------------------------------------------
    /// Sector size in bytes; must equal the device's erase granularity
    pub sector_size: u32,

    /// Number of sectors in the storage region (superblock included)
    pub sector_count: u32,

    /// Byte offset of the region on the device (sector aligned)
    /// Layout:
    ///   base_offset                     superblock
    ///   base_offset + sector_size * n   data sector n - 1
    pub base_offset: u64,

    // -------------------------------------------------------------------------
    // Write Buffer Configuration
    // -------------------------------------------------------------------------
    /// Number of records staged in memory before a forced flush
    pub buffer_capacity: usize,

    /// Flush staged records when this much time passed since the last flush
    pub flush_interval: Duration,

    /// Apply the flush policy automatically on `store` and `check_flush`
    pub auto_flush: bool,

    // -------------------------------------------------------------------------
    // Recovery Configuration
    // -------------------------------------------------------------------------
    /// Backoff before the single retry of a failed device operation
    pub retry_delay: Duration,

    /// How many records `repair` reads back after compaction
    pub repair_sample_size: u32,

    /// Upper bound on payload bytes compaction may hold in memory
    pub compaction_memory_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sector_size: 4096,
            sector_count: 1024,
            base_offset: 0,
            buffer_capacity: 20,
            flush_interval: Duration::from_secs(60),
            auto_flush: true,
            retry_delay: Duration::from_millis(100),
            repair_sample_size: 10,
            compaction_memory_limit: 4 * 1024 * 1024, // 4 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Largest payload a single record can carry
    pub fn max_blob_size(&self) -> usize {
        (self.sector_size as usize).saturating_sub(RECORD_HEADER_SIZE)
    }

    /// Byte length of the whole region
    pub fn region_len(&self) -> u64 {
        self.sector_size as u64 * self.sector_count as u64
    }

    /// Check the configuration against the device geometry
    pub fn validate<D: BlockDevice + ?Sized>(&self, device: &D) -> Result<()> {
        if self.sector_size != device.sector_size() {
            return Err(FlashBlobError::Config(format!(
                "sector size {} does not match device sector size {}",
                self.sector_size,
                device.sector_size()
            )));
        }

        if self.sector_size as usize <= RECORD_HEADER_SIZE {
            return Err(FlashBlobError::Config(format!(
                "sector size {} leaves no room for payload",
                self.sector_size
            )));
        }

        if self.sector_count < 2 {
            return Err(FlashBlobError::Config(
                "region needs a superblock and at least one data sector".to_string(),
            ));
        }

        if self.base_offset % self.sector_size as u64 != 0 {
            return Err(FlashBlobError::Config(format!(
                "base offset 0x{:X} is not sector aligned",
                self.base_offset
            )));
        }

        let end = self.base_offset + self.region_len();
        if end > device.len_bytes() {
            return Err(FlashBlobError::Config(format!(
                "region ends at 0x{:X} but device holds only 0x{:X} bytes",
                end,
                device.len_bytes()
            )));
        }

        if self.buffer_capacity == 0 {
            return Err(FlashBlobError::Config(
                "write buffer capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the sector size (in bytes)
    pub fn sector_size(mut self, size: u32) -> Self {
        self.config.sector_size = size;
        self
    }

    /// Set the number of sectors in the region
    pub fn sector_count(mut self, count: u32) -> Self {
        self.config.sector_count = count;
        self
    }

    /// Set the region base offset on the device
    pub fn base_offset(mut self, offset: u64) -> Self {
        self.config.base_offset = offset;
        self
    }

    /// Set the write buffer capacity (in records)
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Set the time-based flush interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// Enable or disable the automatic flush policy
    pub fn auto_flush(mut self, enabled: bool) -> Self {
        self.config.auto_flush = enabled;
        self
    }

    /// Set the backoff before retrying a device operation
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Set how many records repair verifies
    pub fn repair_sample_size(mut self, count: u32) -> Self {
        self.config.repair_sample_size = count;
        self
    }

    /// Set the compaction memory limit (in bytes)
    pub fn compaction_memory_limit(mut self, bytes: usize) -> Self {
        self.config.compaction_memory_limit = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
