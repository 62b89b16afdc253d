//! # Persistence Backend Contract
//!
//! One interface over the interchangeable durable mirrors of the ring.

use super::ring::RingBuffer;
use crate::error::Result;
use serde::Deserialize;
use std::fmt;
use std::io;
use std::path::Path;

/// Storage variant selected in the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Append-only CSV file with rotation
    Csv,
    /// Full ring dumped to one binary file on every sample
    Snapshot,
    /// One record per slot plus a metadata record
    Keyed,
    /// No durable storage; the ring lives in RAM only
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Csv => "csv",
            BackendKind::Snapshot => "snapshot",
            BackendKind::Keyed => "keyed",
            BackendKind::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Durable mirror of the ring log
///
/// Every call is made with the store lock held, so implementations see a
/// consistent ring and are never called concurrently.
#[cfg_attr(test, mockall::automock)]
pub trait PersistenceBackend: Send {
    /// Which variant this is
    fn kind(&self) -> BackendKind;

    /// Reconstruct the ring at boot
    ///
    /// Absent data (first boot) is an empty ring, not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the persisted data is unreadable or corrupt; the
    /// caller then starts from an empty ring.
    fn restore(&mut self, capacity: usize) -> Result<RingBuffer>;

    /// Mirror the ring after its latest append
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure. The in-memory ring is unaffected.
    fn write_through(&mut self, ring: &RingBuffer) -> Result<()>;

    /// Drop the durable representation after the ring was cleared
    ///
    /// # Errors
    ///
    /// Returns error if the durable data could not be removed or reset.
    fn erase(&mut self) -> Result<()>;

    /// Rows held on the durable medium, for backends that count independently
    /// of the ring
    fn durable_rows(&self) -> Option<u64> {
        None
    }

    /// Ceiling at which the durable log rotates, if any
    fn max_durable_rows(&self) -> Option<u64> {
        None
    }

    /// CSV export served straight from the durable medium
    ///
    /// `None` means the ring is the export source. An `Err` is logged by the
    /// caller, which then falls back to the ring.
    fn export(&self) -> Option<Result<String>> {
        None
    }
}

/// RAM-only backend, used when no storage is configured or available
#[derive(Debug, Default)]
pub struct MemoryBackend;

impl PersistenceBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn restore(&mut self, capacity: usize) -> Result<RingBuffer> {
        Ok(RingBuffer::new(capacity))
    }

    fn write_through(&mut self, _ring: &RingBuffer) -> Result<()> {
        Ok(())
    }

    fn erase(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Remove a file, treating absence as success
pub(crate) fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Create the parent directory of `path` if it has one
pub(crate) fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
