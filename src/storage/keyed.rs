//! # Keyed Record Backend
//!
//! Stores the ring as small independent records in a directory: one
//! `meta` record holding `head`/`count` and one `slot-<index>` record per
//! ring slot. Each sample rewrites exactly two records, the slot first.
//!
//! Slot records carry a write sequence number. A slot written just before a
//! power cut, whose `meta` update never landed, is recognised at boot by
//! its sequence number and committed then.

use super::backend::{remove_if_exists, BackendKind, PersistenceBackend};
use super::entry::LogEntry;
use super::ring::RingBuffer;
use crate::error::{LoggerError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Key of the metadata record
pub const META_KEY: &str = "meta";

/// Key prefix of the per-slot records
pub const SLOT_KEY_PREFIX: &str = "slot-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct MetaRecord {
    head: usize,
    count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct SlotRecord {
    seq: u64,
    entry: LogEntry,
}

fn slot_key(index: usize) -> String {
    format!("{}{}", SLOT_KEY_PREFIX, index)
}

/// Directory-of-records backend
#[derive(Debug)]
pub struct KeyedBackend {
    dir: PathBuf,
    next_seq: u64,
}

impl KeyedBackend {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            next_seq: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn write_record<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        fs::write(self.record_path(key), bytes)?;
        Ok(())
    }

    fn read_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match fs::read(self.record_path(key)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl PersistenceBackend for KeyedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Keyed
    }

    fn restore(&mut self, capacity: usize) -> Result<RingBuffer> {
        fs::create_dir_all(&self.dir)?;
        let capacity = capacity.max(1);
        self.next_seq = 0;

        let Some(meta) = self.read_record::<MetaRecord>(META_KEY)? else {
            info!("No records in {}, starting empty", self.dir.display());
            return Ok(RingBuffer::new(capacity));
        };

        if meta.head >= capacity || meta.count > capacity {
            return Err(LoggerError::CorruptState(format!(
                "metadata head={} count={} invalid for capacity {}",
                meta.head, meta.count, capacity
            )));
        }

        let mut slots = vec![LogEntry::default(); capacity];
        let mut newest: Option<u64> = None;
        let start = (meta.head + capacity - meta.count) % capacity;
        for i in 0..meta.count {
            let index = (start + i) % capacity;
            let key = slot_key(index);
            let record: SlotRecord = self
                .read_record(&key)?
                .ok_or_else(|| LoggerError::CorruptState(format!("missing record {}", key)))?;
            slots[index] = record.entry;
            newest = newest.max(Some(record.seq));
        }

        let (mut head, mut count) = (meta.head, meta.count);
        let pending = self.read_record::<SlotRecord>(&slot_key(head))?;
        if let Some(record) = pending.filter(|r| newest.map_or(true, |seq| r.seq > seq)) {
            warn!("Committing record {} written after the last metadata update", head);
            slots[head] = record.entry;
            newest = Some(record.seq);
            head = (head + 1) % capacity;
            count = (count + 1).min(capacity);
        }

        let ring = RingBuffer::from_parts(head, count, slots)?;
        self.next_seq = newest.map_or(0, |seq| seq + 1);
        info!(
            "Restored {} entries from records in {}",
            ring.len(),
            self.dir.display()
        );
        Ok(ring)
    }

    fn write_through(&mut self, ring: &RingBuffer) -> Result<()> {
        let (Some(index), Some(entry)) = (ring.last_index(), ring.latest()) else {
            return Ok(());
        };

        fs::create_dir_all(&self.dir)?;
        let record = SlotRecord {
            seq: self.next_seq,
            entry: *entry,
        };
        self.write_record(&slot_key(index), &record)?;
        self.next_seq += 1;
        self.write_record(
            META_KEY,
            &MetaRecord {
                head: ring.head(),
                count: ring.len(),
            },
        )?;

        debug!("Wrote record {} (head={}, count={})", index, ring.head(), ring.len());
        Ok(())
    }

    fn erase(&mut self) -> Result<()> {
        remove_if_exists(&self.record_path(META_KEY))?;

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(SLOT_KEY_PREFIX) {
                remove_if_exists(&entry.path())?;
            }
        }
        Ok(())
    }
}
