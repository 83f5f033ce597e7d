//! # flashblob
//!
//! A blob store for raw sector-erasable (NOR-style) flash:
//! - Numbered, typed records, one per sector
//! - CRC-32 integrity check on every payload
//! - Tombstone deletion without erasing
//! - Buffered writes with size- and time-based flushing
//! - Compaction and repair of damaged or deleted records
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        BlobStore                             │
//! │          (store / get / delete / compact / repair)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ WriteBuffer │ ──flush─►│  RecordLog  │
//!   │   (slots)   │          │ + Superblock│
//!   └─────────────┘          └──────┬──────┘
//!                                   │ codec (header, CRC)
//!                                   ▼
//!                           ┌─────────────┐
//!                           │ BlockDevice │
//!                           │ (MemFlash / │
//!                           │  FileFlash) │
//!                           └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use flashblob::{BlobStore, Config, MemFlash};
//!
//! let device = MemFlash::new(4096, 64);
//! let config = Config::builder().sector_count(64).build();
//! let mut store = BlobStore::open(device, config)?;
//!
//! store.store(1, b"hello")?;
//! store.flush()?;
//! assert_eq!(store.get(0)?.payload, b"hello");
//! # Ok::<(), flashblob::FlashBlobError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod device;
pub mod codec;
pub mod clock;
pub mod buffer;
pub mod storage;
pub mod record;
pub mod stats;
pub mod reading;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FlashBlobError, Result};
pub use config::{Config, ConfigBuilder};
pub use device::{BlockDevice, FileFlash, MemFlash};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use engine::BlobStore;
pub use record::{Integrity, Record};
pub use stats::{BufferInfo, StorageInfo, StoreSummary, TypeSummary};
pub use storage::{BootInfo, CompactionReport, Phase, Progress, RepairReport, ScanReport};
pub use reading::{SensorReading, SensorType};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of flashblob
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
