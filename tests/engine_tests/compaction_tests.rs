//! Tests for compaction
//!
//! These tests verify:
//! - Live records are kept, renumbered densely, with original metadata
//! - Tombstoned and corrupt records are dropped
//! - Boot counter survives, counters are reset
//! - Memory limit aborts before anything is touched
//! - Cancellation during the scan passes
//! - Rewrite failures are reported as incomplete

use std::ops::ControlFlow;
use std::time::Duration;

use flashblob::storage::Addressing;
use flashblob::{BlobStore, Config, FlashBlobError, ManualClock, MemFlash, Phase, Progress};

// =============================================================================
// Helper Functions
// =============================================================================

const SECTOR: u32 = 4096;
const SECTORS: u32 = 32;

fn config() -> Config {
    Config::builder()
        .sector_size(SECTOR)
        .sector_count(SECTORS)
        .auto_flush(false)
        .retry_delay(Duration::ZERO)
        .build()
}

fn setup_store() -> (MemFlash, ManualClock, BlobStore<MemFlash, ManualClock>) {
    let flash = MemFlash::new(SECTOR, SECTORS);
    let clock = ManualClock::starting_at(500);
    let mut store = BlobStore::with_clock(flash.clone(), config(), clock.clone()).unwrap();
    store.init(false).unwrap();
    (flash, clock, store)
}

/// Store `payloads` with increasing timestamps and flush
fn fill(store: &mut BlobStore<MemFlash, ManualClock>, clock: &ManualClock, payloads: &[&[u8]]) {
    for (i, payload) in payloads.iter().enumerate() {
        clock.advance(Duration::from_millis(100));
        store.store(i as u32 + 1, payload).unwrap();
    }
    store.flush().unwrap();
}

fn record_offset(index: u32) -> u64 {
    Addressing::new(0, SECTOR, SECTORS).sector_for(index)
}

// =============================================================================
// Conservation Tests
// =============================================================================

#[test]
fn test_deleted_record_is_reclaimed() {
    let (_flash, clock, mut store) = setup_store();
    fill(&mut store, &clock, &[b"Data1", b"Data2", b"Data3"]);

    store.delete(1).unwrap();
    let report = store.compact().unwrap();

    assert_eq!(report.scanned, 3);
    assert_eq!(report.retained, 2);
    assert_eq!(report.discarded, 1);
    assert_eq!(report.bytes_retained, 10);
    assert_eq!(store.count(), 2);
    assert_eq!(store.get(0).unwrap().payload, b"Data1");
    assert_eq!(store.get(1).unwrap().payload, b"Data3");
    assert_eq!(store.info().used_sectors, 3);
}

#[test]
fn test_metadata_preserved() {
    let (_flash, clock, mut store) = setup_store();
    fill(&mut store, &clock, &[b"a", b"b", b"c", b"d"]);
    let before: Vec<_> = [1u32, 3]
        .iter()
        .map(|&i| store.get(i).unwrap())
        .collect();

    store.delete(0).unwrap();
    store.delete(2).unwrap();
    clock.advance(Duration::from_secs(10));
    store.compact().unwrap();

    for (new_index, old) in before.iter().enumerate() {
        let record = store.get_verified(new_index as u32).unwrap();
        assert_eq!(record.payload, old.payload);
        assert_eq!(record.type_id, old.type_id);
        assert_eq!(record.timestamp, old.timestamp);
    }
}

#[test]
fn test_corrupt_records_dropped() {
    let (flash, clock, mut store) = setup_store();
    fill(&mut store, &clock, &[b"keep", b"break", b"keep too"]);
    flash.inject_corruption(record_offset(1), 4);

    let report = store.compact().unwrap();

    assert_eq!(report.retained, 2);
    assert_eq!(store.get(1).unwrap().payload, b"keep too");
}

#[test]
fn test_boot_count_preserved() {
    let (flash, clock, mut store) = setup_store();
    fill(&mut store, &clock, &[b"x"]);
    drop(store);

    let mut store = BlobStore::with_clock(flash, config(), clock.clone()).unwrap();
    store.init(false).unwrap();
    assert_eq!(store.boot_count(), 2);

    store.compact().unwrap();

    assert_eq!(store.boot_count(), 2);
    assert_eq!(store.count(), 1);
}

#[test]
fn test_compact_empty_store() {
    let (_flash, _clock, mut store) = setup_store();

    let report = store.compact().unwrap();

    assert_eq!(report.retained, 0);
    assert_eq!(store.count(), 0);
    assert_eq!(store.info().used_sectors, 1);
}

#[test]
fn test_staged_records_flushed_first() {
    let (_flash, _clock, mut store) = setup_store();
    store.store(1, b"staged").unwrap();

    let report = store.compact().unwrap();

    assert_eq!(report.retained, 1);
    assert_eq!(store.buffer_info().items_buffered, 0);
    assert_eq!(store.get(0).unwrap().payload, b"staged");
}

// =============================================================================
// Memory Limit Tests
// =============================================================================

#[test]
fn test_memory_limit_aborts_without_mutation() {
    let flash = MemFlash::new(SECTOR, SECTORS);
    let config = Config::builder()
        .sector_size(SECTOR)
        .sector_count(SECTORS)
        .auto_flush(false)
        .compaction_memory_limit(100)
        .build();
    let mut store = BlobStore::new(flash.clone(), config).unwrap();
    store.init(false).unwrap();
    for _ in 0..3 {
        store.store(1, &[7u8; 60]).unwrap();
    }
    store.flush().unwrap();
    store.delete(0).unwrap();
    let snapshot = flash.contents(0, (SECTOR * 5) as usize);

    let result = store.compact();

    assert!(matches!(result, Err(FlashBlobError::AllocationFailure(_))));
    assert_eq!(flash.contents(0, (SECTOR * 5) as usize), snapshot);
    assert_eq!(store.count(), 3);
    assert!(matches!(store.get(0), Err(FlashBlobError::RecordDeleted { .. })));
}

// =============================================================================
// Progress Tests
// =============================================================================

#[test]
fn test_progress_phases_in_order() {
    let (_flash, clock, mut store) = setup_store();
    fill(&mut store, &clock, &[b"a", b"b", b"c"]);
    store.delete(0).unwrap();

    let mut seen: Vec<Progress> = Vec::new();
    store
        .compact_with(|p| {
            seen.push(p);
            ControlFlow::Continue(())
        })
        .unwrap();

    let phases: Vec<Phase> = seen.iter().map(|p| p.phase).collect();
    assert_eq!(
        phases,
        vec![
            Phase::Counting,
            Phase::Counting,
            Phase::Counting,
            Phase::Capturing,
            Phase::Capturing,
            Phase::Capturing,
            Phase::Rewriting,
            Phase::Rewriting,
        ]
    );
    assert_eq!(seen[6].total, 2);
}

#[test]
fn test_cancel_during_scan_leaves_store_untouched() {
    let (flash, clock, mut store) = setup_store();
    fill(&mut store, &clock, &[b"a", b"b", b"c"]);
    store.delete(1).unwrap();
    let superblock = flash.contents(0, 32);

    let result = store.compact_with(|p| {
        if p.phase == Phase::Capturing && p.done == 1 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    assert!(matches!(result, Err(FlashBlobError::Cancelled)));
    assert_eq!(flash.contents(0, 32), superblock);
    assert_eq!(store.count(), 3);
    assert!(store.get(1).is_err());
}

#[test]
fn test_cancel_ignored_while_rewriting() {
    let (_flash, clock, mut store) = setup_store();
    fill(&mut store, &clock, &[b"a", b"b"]);

    let report = store
        .compact_with(|p| {
            if p.phase == Phase::Rewriting {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();

    assert_eq!(report.retained, 2);
    assert_eq!(store.count(), 2);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_rewrite_failure_reports_incomplete() {
    let (flash, clock, mut store) = setup_store();
    fill(&mut store, &clock, &[b"lost", b"kept"]);
    let injector = flash.clone();

    let result = store.compact_with(|p| {
        // Both attempts of the first rewrite fail
        if p.phase == Phase::Rewriting && p.done == 0 {
            injector.fail_next_programs(2);
        }
        ControlFlow::Continue(())
    });

    assert!(matches!(
        result,
        Err(FlashBlobError::CompactionIncomplete {
            retained: 2,
            rewritten: 1
        })
    ));
    assert_eq!(store.count(), 1);
    assert_eq!(store.get(0).unwrap().payload, b"kept");
}
