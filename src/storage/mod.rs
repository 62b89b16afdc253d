//! # Storage Module
//!
//! Bounded in-memory sample history mirrored to non-volatile storage.
//!
//! This module handles:
//! - The fixed-capacity ring of timestamped samples
//! - CSV formatting of samples
//! - Write-through persistence (append CSV, snapshot blob, keyed records)
//! - Restoring the ring at boot

pub mod backend;
pub mod csv;
pub mod entry;
pub mod keyed;
pub mod ring;
pub mod snapshot;
pub mod store;

pub use backend::{BackendKind, MemoryBackend, PersistenceBackend};
pub use entry::{ChannelKind, ChannelLayout, LogEntry, MAX_CHANNELS};
pub use ring::{RingBuffer, RING_CAPACITY};
pub use store::LogStore;

use crate::config::StorageConfig;

/// Build the backend selected by the storage configuration
pub fn build_backend(config: &StorageConfig, layout: &ChannelLayout) -> Box<dyn PersistenceBackend> {
    match config.backend {
        BackendKind::Csv => Box::new(csv::CsvBackend::new(
            &config.path,
            layout.clone(),
            config.max_rows,
        )),
        BackendKind::Snapshot => Box::new(snapshot::SnapshotBackend::new(&config.path)),
        BackendKind::Keyed => Box::new(keyed::KeyedBackend::new(&config.path)),
        BackendKind::Memory => Box::new(MemoryBackend),
    }
}
