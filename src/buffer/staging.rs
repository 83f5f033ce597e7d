//! Write buffer implementation
//!
//! Fixed-capacity slot array with flush-policy bookkeeping.

use std::time::Duration;

use super::BufferedEntry;

/// Bounded staging cache for pending records
#[derive(Debug)]
pub struct WriteBuffer {
    /// Fixed slots; `None` = free
    slots: Vec<Option<BufferedEntry>>,
    /// Number of occupied slots
    len: usize,
    /// Clock millis at the end of the last flush attempt
    last_flush_ms: u64,
}

impl WriteBuffer {
    /// Create an empty buffer with `capacity` slots
    pub fn new(capacity: usize, now_ms: u64) -> Self {
        Self {
            slots: vec![None; capacity],
            len: 0,
            last_flush_ms: now_ms,
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of staged records
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.slots.len()
    }

    /// Stage an entry in the lowest free slot
    ///
    /// Hands the entry back when every slot is taken.
    pub fn stage(&mut self, entry: BufferedEntry) -> Result<usize, BufferedEntry> {
        match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                self.len += 1;
                Ok(slot)
            }
            None => Err(entry),
        }
    }

    /// Indices of occupied slots, in flush order
    pub fn occupied_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .collect()
    }

    /// Entry in `slot`, if occupied
    pub fn get(&self, slot: usize) -> Option<&BufferedEntry> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Free `slot` after its entry reached flash
    pub fn release(&mut self, slot: usize) -> Option<BufferedEntry> {
        let entry = self.slots.get_mut(slot).and_then(Option::take);
        if entry.is_some() {
            self.len -= 1;
        }
        entry
    }

    /// The `n`-th pending entry in flush order
    pub fn nth_pending(&self, n: usize) -> Option<&BufferedEntry> {
        self.iter().nth(n)
    }

    /// Iterate staged entries in flush order
    pub fn iter(&self) -> impl Iterator<Item = &BufferedEntry> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Drop every staged entry
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.len = 0;
    }

    /// Whether the flush policy asks for a flush now
    ///
    /// Due when something is staged and either the buffer is full or more
    /// than `interval` elapsed since the last flush.
    pub fn flush_due(&self, now_ms: u64, interval: Duration) -> bool {
        if self.is_empty() {
            return false;
        }
        self.is_full() || now_ms.saturating_sub(self.last_flush_ms) > interval.as_millis() as u64
    }

    /// Record the end of a flush attempt
    pub fn mark_flushed(&mut self, now_ms: u64) {
        self.last_flush_ms = now_ms;
    }

    /// Clock millis of the last flush attempt
    pub fn last_flush_millis(&self) -> u64 {
        self.last_flush_ms
    }
}
