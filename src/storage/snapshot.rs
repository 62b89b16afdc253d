//! # Snapshot Blob Backend
//!
//! Rewrites the whole ring (header plus every slot) to one binary file on
//! each accepted sample. Encoded with `bincode` using fixed-width integers,
//! so the file size only depends on the ring capacity.

use super::backend::{ensure_parent_dir, remove_if_exists, BackendKind, PersistenceBackend};
use super::entry::LogEntry;
use super::ring::RingBuffer;
use crate::error::{LoggerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Serialize)]
struct SnapshotRef<'a> {
    head: u32,
    count: u32,
    entries: &'a [LogEntry],
}

#[derive(Deserialize)]
struct SnapshotBlob {
    head: u32,
    count: u32,
    entries: Vec<LogEntry>,
}

/// Flat snapshot file backend
#[derive(Debug)]
pub struct SnapshotBackend {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl SnapshotBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| LoggerError::CorruptState(format!("ring index {} exceeds u32", value)))
}

impl PersistenceBackend for SnapshotBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Snapshot
    }

    fn restore(&mut self, capacity: usize) -> Result<RingBuffer> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No snapshot at {}, starting empty", self.path.display());
                return Ok(RingBuffer::new(capacity));
            }
            Err(e) => return Err(e.into()),
        };

        let blob: SnapshotBlob = bincode::deserialize(&bytes)?;
        if blob.entries.len() != capacity.max(1) {
            return Err(LoggerError::CorruptState(format!(
                "snapshot holds {} slots, expected {}",
                blob.entries.len(),
                capacity
            )));
        }

        let ring = RingBuffer::from_parts(blob.head as usize, blob.count as usize, blob.entries)?;
        info!(
            "Restored {} entries from snapshot {}",
            ring.len(),
            self.path.display()
        );
        Ok(ring)
    }

    fn write_through(&mut self, ring: &RingBuffer) -> Result<()> {
        let snapshot = SnapshotRef {
            head: to_u32(ring.head())?,
            count: to_u32(ring.len())?,
            entries: ring.slots(),
        };
        let bytes = bincode::serialize(&snapshot)?;

        ensure_parent_dir(&self.path)?;
        fs::write(&self.tmp_path, &bytes)?;
        fs::rename(&self.tmp_path, &self.path)?;

        debug!("Wrote {} byte snapshot", bytes.len());
        Ok(())
    }

    fn erase(&mut self) -> Result<()> {
        remove_if_exists(&self.tmp_path)?;
        remove_if_exists(&self.path)?;
        Ok(())
    }
}
