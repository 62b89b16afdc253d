//! # Ring Buffer
//!
//! Fixed-capacity circular buffer of [`LogEntry`] that overwrites its oldest
//! element once full. Plain data: locking is the job of [`super::LogStore`].

use super::entry::LogEntry;
use crate::error::{LoggerError, Result};

/// Default ring capacity (number of samples kept in memory)
pub const RING_CAPACITY: usize = 2048;

/// Circular sample buffer
///
/// `head` is the slot the next write lands in; the `count` most recent
/// entries start at `(head - count) mod capacity`.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer {
    slots: Vec<LogEntry>,
    head: usize,
    count: usize,
}

impl RingBuffer {
    /// Create an empty ring. A zero capacity is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![LogEntry::default(); capacity.max(1)],
            head: 0,
            count: 0,
        }
    }

    /// Rebuild a ring from persisted parts
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::CorruptState`] if:
    /// - `slots` is empty
    /// - `head >= capacity` or `count > capacity`
    /// - the ring is not full but `head != count` (unreachable by appends)
    pub fn from_parts(head: usize, count: usize, slots: Vec<LogEntry>) -> Result<Self> {
        let capacity = slots.len();
        if capacity == 0 {
            return Err(LoggerError::CorruptState("zero-capacity ring".to_string()));
        }
        if head >= capacity {
            return Err(LoggerError::CorruptState(format!(
                "head {} out of range for capacity {}",
                head, capacity
            )));
        }
        if count > capacity {
            return Err(LoggerError::CorruptState(format!(
                "count {} exceeds capacity {}",
                count, capacity
            )));
        }
        if count < capacity && head != count {
            return Err(LoggerError::CorruptState(format!(
                "head {} inconsistent with count {}",
                head, count
            )));
        }

        Ok(Self { slots, head, count })
    }

    /// Write `entry` at `head`, overwriting the oldest entry when full
    pub fn push(&mut self, entry: LogEntry) {
        let capacity = self.capacity();
        self.slots[self.head] = entry;
        self.head = (self.head + 1) % capacity;
        if self.count < capacity {
            self.count += 1;
        }
    }

    /// Forget every entry. Slots are not zeroed.
    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }

    /// Entries oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        let capacity = self.capacity();
        let start = (self.head + capacity - self.count) % capacity;
        (0..self.count).map(move |i| &self.slots[(start + i) % capacity])
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.iter().copied().collect()
    }

    /// Slot index of the most recent write, if any
    pub fn last_index(&self) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        Some((self.head + self.capacity() - 1) % self.capacity())
    }

    /// Most recent entry, if any
    pub fn latest(&self) -> Option<&LogEntry> {
        self.last_index().map(|idx| &self.slots[idx])
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Raw slot array in index order (not logical order)
    pub fn slots(&self) -> &[LogEntry] {
        &self.slots
    }
}
