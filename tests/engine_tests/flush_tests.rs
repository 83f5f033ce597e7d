//! Tests for the write buffer flush policy
//!
//! These tests verify:
//! - A full buffer is flushed before the next record is staged
//! - Auto-flush on a full buffer and after the flush interval
//! - check_flush / set_auto_flush
//! - Partial flush failures keep failed records staged
//! - Buffered records survive a reboot only once flushed

use std::time::Duration;

use flashblob::{BlobStore, Config, FlashBlobError, ManualClock, MemFlash};

// =============================================================================
// Helper Functions
// =============================================================================

const SECTOR: u32 = 4096;
const SECTORS: u32 = 64;

fn config(auto_flush: bool) -> Config {
    Config::builder()
        .sector_size(SECTOR)
        .sector_count(SECTORS)
        .buffer_capacity(20)
        .auto_flush(auto_flush)
        .flush_interval(Duration::from_secs(60))
        .retry_delay(Duration::ZERO)
        .build()
}

fn setup_store(auto_flush: bool) -> (MemFlash, ManualClock, BlobStore<MemFlash, ManualClock>) {
    let flash = MemFlash::new(SECTOR, SECTORS);
    let clock = ManualClock::starting_at(0);
    let mut store = BlobStore::with_clock(flash.clone(), config(auto_flush), clock.clone()).unwrap();
    store.init(false).unwrap();
    (flash, clock, store)
}

// =============================================================================
// Buffer Full Tests
// =============================================================================

#[test]
fn test_twenty_first_store_flushes_buffer() {
    let (flash, _clock, mut store) = setup_store(false);

    for i in 0..20u8 {
        store.store(1, &[i]).unwrap();
    }
    assert_eq!(store.buffer_info().items_buffered, 20);
    assert_eq!(store.count(), 0);

    store.store(1, &[20]).unwrap();

    assert_eq!(store.count(), 20);
    assert_eq!(store.buffer_info().items_buffered, 1);

    // After a reboot without format the flushed records are still there
    drop(store);
    let mut rebooted = BlobStore::with_clock(flash, config(false), ManualClock::default()).unwrap();
    let boot = rebooted.init(false).unwrap();
    assert_eq!(boot.boot_count, 2);
    assert_eq!(rebooted.count(), 20);
    for i in 0..20u32 {
        assert_eq!(rebooted.get(i).unwrap().payload, vec![i as u8]);
    }
}

#[test]
fn test_auto_flush_when_full() {
    let (_flash, _clock, mut store) = setup_store(true);

    for i in 0..19u8 {
        store.store(1, &[i]).unwrap();
    }
    assert_eq!(store.count(), 0);

    store.store(1, &[19]).unwrap();

    assert_eq!(store.count(), 20);
    assert_eq!(store.buffer_info().items_buffered, 0);
}

// =============================================================================
// Time-Based Tests
// =============================================================================

#[test]
fn test_auto_flush_after_interval() {
    let (_flash, clock, mut store) = setup_store(true);
    store.store(1, b"early").unwrap();
    assert_eq!(store.count(), 0);

    clock.advance(Duration::from_secs(61));
    store.store(1, b"late").unwrap();

    assert_eq!(store.count(), 2);
    assert_eq!(store.buffer_info().items_buffered, 0);
}

#[test]
fn test_check_flush_respects_interval() {
    let (_flash, clock, mut store) = setup_store(true);
    store.store(1, b"waiting").unwrap();

    clock.advance(Duration::from_secs(30));
    assert!(!store.check_flush().unwrap());
    assert_eq!(store.count(), 0);

    clock.advance(Duration::from_secs(31));
    assert!(store.check_flush().unwrap());
    assert_eq!(store.count(), 1);

    // Nothing staged, nothing to do
    clock.advance(Duration::from_secs(120));
    assert!(!store.check_flush().unwrap());
}

#[test]
fn test_check_flush_disabled() {
    let (_flash, clock, mut store) = setup_store(false);
    store.store(1, b"manual").unwrap();

    clock.advance(Duration::from_secs(3600));

    assert!(!store.check_flush().unwrap());
    assert_eq!(store.buffer_info().items_buffered, 1);
}

#[test]
fn test_set_auto_flush_changes_policy() {
    let (_flash, clock, mut store) = setup_store(false);
    store.store(1, b"a").unwrap();

    store.set_auto_flush(true, Duration::from_secs(5));
    clock.advance(Duration::from_secs(6));

    assert!(store.check_flush().unwrap());
    assert_eq!(store.count(), 1);
    assert!(store.config().auto_flush);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_partial_flush_keeps_failed_record() {
    let (flash, _clock, mut store) = setup_store(false);
    store.store(1, b"first").unwrap();
    store.store(2, b"second").unwrap();

    // Both attempts for the first record fail, the second record succeeds
    flash.fail_next_programs(2);
    let result = store.flush();

    assert!(matches!(result, Err(FlashBlobError::Device(_))));
    assert_eq!(store.count(), 1);
    assert_eq!(store.get(0).unwrap().payload, b"second");
    assert_eq!(store.buffer_info().items_buffered, 1);

    // The staged record is addressed after the flushed one
    let staged = store.get(1).unwrap();
    assert!(staged.staged);
    assert_eq!(staged.payload, b"first");

    store.flush().unwrap();
    assert_eq!(store.count(), 2);
    assert_eq!(store.get(1).unwrap().payload, b"first");
}

#[test]
fn test_flush_empty_buffer_is_ok() {
    let (flash, _clock, mut store) = setup_store(false);
    let programs = flash.program_count();

    store.flush().unwrap();

    assert_eq!(flash.program_count(), programs);
}

#[test]
fn test_close_flushes_staged_records() {
    let (flash, _clock, mut store) = setup_store(false);
    store.store(1, b"pending").unwrap();

    store.close().unwrap();

    let rebooted = BlobStore::open(flash, config(false)).unwrap();
    assert_eq!(rebooted.count(), 1);
    assert_eq!(rebooted.get(0).unwrap().payload, b"pending");
}

#[test]
fn test_unflushed_records_lost_on_reboot() {
    let (flash, _clock, mut store) = setup_store(false);
    store.store(1, b"volatile").unwrap();
    drop(store);

    let rebooted = BlobStore::open(flash, config(false)).unwrap();

    assert_eq!(rebooted.count(), 0);
}
