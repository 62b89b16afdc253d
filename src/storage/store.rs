//! # Log Store
//!
//! The ring buffer and its persistence backend behind one lock. This is the
//! single source of truth for logged data during a power cycle.

use super::backend::{BackendKind, PersistenceBackend};
use super::entry::LogEntry;
use super::ring::RingBuffer;
use crate::error::Result;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

struct Inner {
    ring: RingBuffer,
    backend: Box<dyn PersistenceBackend>,
}

/// Thread-safe ring log with write-through persistence
///
/// Every operation holds the lock for its full duration, including the
/// nested backend call, so persistence writes are serialized with sampling,
/// export and clear.
pub struct LogStore {
    inner: Mutex<Inner>,
    capacity: usize,
    kind: BackendKind,
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("capacity", &self.capacity)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl LogStore {
    /// Create the store, restoring its contents from `backend`
    ///
    /// Corrupted or unreadable persisted state is logged and replaced by an
    /// empty ring; this never fails.
    pub fn open(mut backend: Box<dyn PersistenceBackend>, capacity: usize) -> Self {
        let kind = backend.kind();
        let ring = match backend.restore(capacity) {
            Ok(ring) => {
                info!("Restored {} log entries from {} storage", ring.len(), kind);
                ring
            }
            Err(e) => {
                warn!("Discarding persisted {} state: {}", kind, e);
                RingBuffer::new(capacity)
            }
        };

        Self {
            capacity: ring.capacity(),
            inner: Mutex::new(Inner { ring, backend }),
            kind,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a sample, overwriting the oldest entry when full
    ///
    /// Persistence failures are logged and do not affect the in-memory log.
    pub fn append(&self, entry: LogEntry) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.ring.push(entry);

        if let Err(e) = inner.backend.write_through(&inner.ring) {
            warn!("{} write-through failed: {}", self.kind, e);
        }
    }

    /// Consistent copy of every entry, oldest first
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().ring.to_vec()
    }

    /// Empty the log and erase its durable mirror
    ///
    /// The in-memory log is always cleared.
    ///
    /// # Errors
    ///
    /// Returns error if the backend could not erase its durable state.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.lock();
        guard.ring.clear();

        guard.backend.erase().map_err(|e| {
            warn!("{} erase failed: {}", self.kind, e);
            e
        })?;

        info!("Log data cleared");
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.lock().ring.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    /// The backend's own CSV export, when it keeps more history than the ring
    ///
    /// Read failures are logged and reported as `None` so the caller can
    /// serve the ring instead.
    pub fn export_durable(&self) -> Option<String> {
        match self.lock().backend.export()? {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("{} export failed, serving memory log: {}", self.kind, e);
                None
            }
        }
    }

    /// Row count kept on the durable medium, when the backend tracks one
    pub fn durable_rows(&self) -> Option<u64> {
        self.lock().backend.durable_rows()
    }

    /// Rotation ceiling of the durable medium, when the backend has one
    pub fn max_durable_rows(&self) -> Option<u64> {
        self.lock().backend.max_durable_rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoggerError;
    use crate::storage::backend::{MemoryBackend, MockPersistenceBackend};
    use crate::storage::csv::CsvBackend;
    use crate::storage::entry::ChannelLayout;
    use crate::storage::keyed::KeyedBackend;
    use crate::storage::snapshot::SnapshotBackend;
    use std::io;
    use std::sync::Arc;
    use std::thread;

    fn entry(ts: i64) -> LogEntry {
        LogEntry::new(ts, &[ts as f32, -(ts as f32)])
    }

    fn memory_store(capacity: usize) -> LogStore {
        LogStore::open(Box::new(MemoryBackend), capacity)
    }

    #[test]
    fn test_entry_count_saturates_at_capacity() {
        let store = memory_store(16);
        for n in 0..40 {
            assert_eq!(store.entry_count(), (n as usize).min(16));
            store.append(entry(n));
        }
    }

    #[test]
    fn test_snapshot_returns_last_capacity_entries() {
        let store = memory_store(10);
        for ts in 0..25 {
            store.append(entry(ts));
        }
        let expected: Vec<LogEntry> = (15..25).map(entry).collect();
        assert_eq!(store.snapshot(), expected);
    }

    #[test]
    fn test_clear_empties_store() {
        let store = memory_store(10);
        for ts in 0..5 {
            store.append(entry(ts));
        }
        store.clear().unwrap();
        assert!(store.snapshot().is_empty());
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn test_write_through_failure_keeps_memory_authoritative() {
        let mut backend = MockPersistenceBackend::new();
        backend.expect_kind().return_const(BackendKind::Csv);
        backend
            .expect_restore()
            .returning(|capacity| Ok(RingBuffer::new(capacity)));
        backend.expect_write_through().times(3).returning(|_| {
            Err(LoggerError::Io(io::Error::new(io::ErrorKind::Other, "disk full")))
        });

        let store = LogStore::open(Box::new(backend), 4);
        for ts in 0..3 {
            store.append(entry(ts));
        }
        assert_eq!(store.entry_count(), 3);
    }

    #[test]
    fn test_write_through_sees_latest_entry() {
        let mut backend = MockPersistenceBackend::new();
        backend.expect_kind().return_const(BackendKind::Snapshot);
        backend
            .expect_restore()
            .returning(|capacity| Ok(RingBuffer::new(capacity)));
        backend
            .expect_write_through()
            .withf(|ring| ring.latest().map(|e| e.timestamp) == Some(42))
            .times(1)
            .returning(|_| Ok(()));

        let store = LogStore::open(Box::new(backend), 4);
        store.append(entry(42));
    }

    #[test]
    fn test_corrupt_restore_starts_empty() {
        let mut backend = MockPersistenceBackend::new();
        backend.expect_kind().return_const(BackendKind::Keyed);
        backend
            .expect_restore()
            .returning(|_| Err(LoggerError::CorruptState("bad meta".to_string())));

        let store = LogStore::open(Box::new(backend), 4);
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.capacity(), 4);
    }

    #[test]
    fn test_clear_reports_erase_failure_but_resets_memory() {
        let mut backend = MockPersistenceBackend::new();
        backend.expect_kind().return_const(BackendKind::Csv);
        backend
            .expect_restore()
            .returning(|capacity| Ok(RingBuffer::new(capacity)));
        backend.expect_write_through().returning(|_| Ok(()));
        backend.expect_erase().times(1).returning(|| {
            Err(LoggerError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "ro")))
        });

        let store = LogStore::open(Box::new(backend), 4);
        store.append(entry(1));
        assert!(store.clear().is_err());
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn test_export_durable_absent_for_memory_backend() {
        let store = memory_store(4);
        store.append(entry(1));
        assert_eq!(store.export_durable(), None);
    }

    #[test]
    fn test_export_durable_failure_falls_back() {
        let mut backend = MockPersistenceBackend::new();
        backend.expect_kind().return_const(BackendKind::Csv);
        backend
            .expect_restore()
            .returning(|capacity| Ok(RingBuffer::new(capacity)));
        backend.expect_export().times(1).returning(|| {
            Some(Err(LoggerError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"))))
        });

        let store = LogStore::open(Box::new(backend), 4);
        assert_eq!(store.export_durable(), None);
    }

    #[test]
    fn test_export_durable_passes_backend_text() {
        let mut backend = MockPersistenceBackend::new();
        backend.expect_kind().return_const(BackendKind::Csv);
        backend
            .expect_restore()
            .returning(|capacity| Ok(RingBuffer::new(capacity)));
        backend
            .expect_export()
            .returning(|| Some(Ok("Timestamp,Temperature_C\n1,20.00\n".to_string())));

        let store = LogStore::open(Box::new(backend), 4);
        assert_eq!(
            store.export_durable().as_deref(),
            Some("Timestamp,Temperature_C\n1,20.00\n")
        );
    }

    fn assert_reboot_round_trip(make: impl Fn() -> Box<dyn PersistenceBackend>) {
        let store = LogStore::open(make(), 6);
        for ts in 0..9 {
            store.append(LogEntry::new(ts * 60, &[20.25 + ts as f32]));
        }
        let before = store.snapshot();
        drop(store);

        let rebooted = LogStore::open(make(), 6);
        assert_eq!(rebooted.snapshot(), before);
    }

    #[test]
    fn test_reboot_round_trip_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp_log.csv");
        assert_reboot_round_trip(|| -> Box<dyn PersistenceBackend> {
            Box::new(CsvBackend::new(&path, ChannelLayout::temperature_only(), 1000))
        });
    }

    #[test]
    fn test_reboot_round_trip_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.bin");
        assert_reboot_round_trip(|| -> Box<dyn PersistenceBackend> {
            Box::new(SnapshotBackend::new(&path))
        });
    }

    #[test]
    fn test_reboot_round_trip_keyed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records");
        assert_reboot_round_trip(|| -> Box<dyn PersistenceBackend> {
            Box::new(KeyedBackend::new(&path))
        });
    }

    #[test]
    fn test_concurrent_append_and_snapshot_never_tear() {
        let store = Arc::new(memory_store(64));

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for ts in 0..5000 {
                    store.append(entry(ts));
                }
            })
        };

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..500 {
                    let snapshot = store.snapshot();
                    for pair in snapshot.windows(2) {
                        assert_eq!(pair[1].timestamp, pair[0].timestamp + 1);
                    }
                    for e in &snapshot {
                        assert_eq!(e.values[0], e.timestamp as f32);
                        assert_eq!(e.values[1], -(e.timestamp as f32));
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(store.entry_count(), 64);
    }
}
