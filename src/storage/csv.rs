//! # Append-only CSV Backend
//!
//! Writes one CSV row per accepted sample to a file that grows until it
//! reaches a row ceiling, then rotates it to a `.old` backup.
//!
//! This module handles:
//! - Creating the log file with its header row on first boot
//! - Counting well-formed rows at boot (and reloading the newest into RAM)
//! - Dropping a row torn by a power cut, and setting aside a log written
//!   with a different channel layout
//! - Open-append-write-close of one row per sample
//! - Rotation to `<file>.old` once `max_rows` rows are stored
//! - Serving the whole durable log for export

use super::backend::{ensure_parent_dir, remove_if_exists, BackendKind, PersistenceBackend};
use super::entry::{ChannelLayout, LogEntry, TIMESTAMP_COLUMN};
use super::ring::RingBuffer;
use crate::error::Result;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default rotation ceiling for the durable log
pub const DEFAULT_MAX_ROWS: u64 = 100_000;

/// Suffix appended to the log path for the rotated backup
pub const BACKUP_SUFFIX: &str = ".old";

/// CSV file backend
#[derive(Debug)]
pub struct CsvBackend {
    path: PathBuf,
    backup_path: PathBuf,
    layout: ChannelLayout,
    max_rows: u64,
    rows: u64,
}

impl CsvBackend {
    /// Create a backend writing to `path`
    ///
    /// Nothing touches the disk until [`PersistenceBackend::restore`].
    /// A `max_rows` of zero is raised to 1.
    pub fn new<P: AsRef<Path>>(path: P, layout: ChannelLayout, max_rows: u64) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut backup = path.clone().into_os_string();
        backup.push(BACKUP_SUFFIX);

        Self {
            path,
            backup_path: PathBuf::from(backup),
            layout,
            max_rows: max_rows.max(1),
            rows: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Replace the log with a header-only file
    fn write_header_file(&self) -> io::Result<()> {
        ensure_parent_dir(&self.path)?;
        let mut file = File::create(&self.path)?;
        file.write_all(format!("{}\n", self.layout.csv_header()).as_bytes())
    }

    /// Move the current log to the backup and start a fresh one
    fn move_to_backup(&mut self) -> io::Result<()> {
        remove_if_exists(&self.backup_path)?;
        match fs::rename(&self.path, &self.backup_path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
        self.write_header_file()?;
        self.rows = 0;
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        warn!(
            "Maximum log rows reached ({}), rotating {}",
            self.max_rows,
            self.path.display()
        );

        self.move_to_backup()?;
        info!("Log file rotated to {}", self.backup_path.display());
        Ok(())
    }

    /// Cut an unterminated final line left by an interrupted write
    fn truncate_torn_tail(&self, bytes: &mut Vec<u8>) -> io::Result<()> {
        if bytes.last().map_or(true, |b| *b == b'\n') {
            return Ok(());
        }

        let keep = bytes
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |pos| pos + 1);
        warn!(
            "Dropping {} bytes of an incomplete row at the end of {}",
            bytes.len() - keep,
            self.path.display()
        );

        OpenOptions::new()
            .write(true)
            .open(&self.path)?
            .set_len(keep as u64)?;
        bytes.truncate(keep);
        Ok(())
    }

    fn append_row(&mut self, entry: &LogEntry) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let len = file.metadata()?.len();

        let mut text = String::new();
        if len == 0 {
            text.push_str(&self.layout.csv_header());
            text.push('\n');
        }
        text.push_str(&self.layout.format_row(entry));
        text.push('\n');

        if let Err(e) = file.write_all(text.as_bytes()) {
            // A partial row would fuse with the next one
            if let Err(cut) = file.set_len(len) {
                warn!("Could not drop partial row in {}: {}", self.path.display(), cut);
            }
            return Err(e);
        }
        self.rows += 1;
        Ok(())
    }
}

impl PersistenceBackend for CsvBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Csv
    }

    fn restore(&mut self, capacity: usize) -> Result<RingBuffer> {
        let mut ring = RingBuffer::new(capacity);
        self.rows = 0;

        let mut bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.write_header_file()?;
                info!("Created log file {}", self.path.display());
                return Ok(ring);
            }
            Err(e) => return Err(e.into()),
        };

        self.truncate_torn_tail(&mut bytes)?;
        if bytes.is_empty() {
            self.write_header_file()?;
            return Ok(ring);
        }

        let expected = self.layout.csv_header();
        let first = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
        let first = String::from_utf8_lossy(first);
        let first = first.trim_end_matches('\r');
        if first.starts_with(TIMESTAMP_COLUMN) && first != expected {
            warn!(
                "{} has columns {:?}, expected {:?}; moving it to {}",
                self.path.display(),
                first,
                expected,
                self.backup_path.display()
            );
            self.move_to_backup()?;
            return Ok(ring);
        }

        let mut tail: VecDeque<LogEntry> = VecDeque::with_capacity(ring.capacity());
        let mut skipped = 0u64;

        for line in bytes.split(|b| *b == b'\n') {
            let parsed = std::str::from_utf8(line)
                .ok()
                .and_then(|text| self.layout.parse_row(text));

            match parsed {
                Some(entry) => {
                    self.rows += 1;
                    if tail.len() == ring.capacity() {
                        tail.pop_front();
                    }
                    tail.push_back(entry);
                }
                None if line.is_empty() => {}
                None => skipped += 1,
            }
        }

        // The header accounts for one non-data line
        if skipped > 1 {
            warn!(
                "Ignored {} malformed lines in {}",
                skipped - 1,
                self.path.display()
            );
        }

        for entry in tail {
            ring.push(entry);
        }

        info!(
            "Found existing log file {} with {} entries",
            self.path.display(),
            self.rows
        );
        Ok(ring)
    }

    fn write_through(&mut self, ring: &RingBuffer) -> Result<()> {
        let Some(entry) = ring.latest() else {
            return Ok(());
        };

        if self.rows >= self.max_rows {
            self.rotate()?;
        }

        self.append_row(entry)?;
        debug!("Appended row {} to {}", self.rows, self.path.display());
        Ok(())
    }

    fn erase(&mut self) -> Result<()> {
        warn!("Clearing all log data in {}", self.path.display());

        remove_if_exists(&self.backup_path)?;
        remove_if_exists(&self.path)?;
        self.write_header_file()?;
        self.rows = 0;
        Ok(())
    }

    fn durable_rows(&self) -> Option<u64> {
        Some(self.rows)
    }

    fn max_durable_rows(&self) -> Option<u64> {
        Some(self.max_rows)
    }

    /// The current log file as stored, which may hold more rows than the ring
    fn export(&self) -> Option<Result<String>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => return Some(Err(e.into())),
        };

        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if text.is_empty() {
            text = self.layout.csv_header();
        }
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Some(Ok(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::entry::ChannelKind;
    use tempfile::TempDir;

    fn setup(max_rows: u64) -> (TempDir, CsvBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = CsvBackend::new(
            dir.path().join("temp_log.csv"),
            ChannelLayout::temperature_only(),
            max_rows,
        );
        (dir, backend)
    }

    fn push(backend: &mut CsvBackend, ring: &mut RingBuffer, ts: i64, value: f32) {
        ring.push(LogEntry::new(ts, &[value]));
        backend.write_through(ring).unwrap();
    }

    #[test]
    fn test_first_boot_creates_header_file() {
        let (_dir, mut backend) = setup(10);
        let ring = backend.restore(8).unwrap();

        assert!(ring.is_empty());
        assert_eq!(backend.durable_rows(), Some(0));
        assert_eq!(
            fs::read_to_string(backend.path()).unwrap(),
            "Timestamp,Temperature_C\n"
        );
    }

    #[test]
    fn test_backup_path_appends_old_suffix() {
        let (_dir, backend) = setup(10);
        assert!(backend
            .backup_path()
            .to_string_lossy()
            .ends_with("temp_log.csv.old"));
    }

    #[test]
    fn test_write_through_appends_formatted_rows() {
        let (_dir, mut backend) = setup(10);
        let mut ring = backend.restore(8).unwrap();
        push(&mut backend, &mut ring, 60, 22.5);
        push(&mut backend, &mut ring, 120, 23.456);

        assert_eq!(
            fs::read_to_string(backend.path()).unwrap(),
            "Timestamp,Temperature_C\n60,22.50\n120,23.46\n"
        );
        assert_eq!(backend.durable_rows(), Some(2));
    }

    #[test]
    fn test_restore_counts_rows_and_reloads_tail() {
        let (dir, mut backend) = setup(100);
        let mut ring = backend.restore(3).unwrap();
        for ts in 0..5 {
            push(&mut backend, &mut ring, ts, 20.25);
        }

        let mut rebooted = CsvBackend::new(
            dir.path().join("temp_log.csv"),
            ChannelLayout::temperature_only(),
            100,
        );
        let restored = rebooted.restore(3).unwrap();

        assert_eq!(rebooted.durable_rows(), Some(5));
        assert_eq!(restored.to_vec(), ring.to_vec());
    }

    #[test]
    fn test_restore_skips_malformed_rows() {
        let (_dir, mut backend) = setup(100);
        fs::write(
            backend.path(),
            "Timestamp,Temperature_C\n10,21.00\ngarbage\n20,\n30,22.00\n",
        )
        .unwrap();

        let ring = backend.restore(8).unwrap();
        assert_eq!(backend.durable_rows(), Some(2));
        let timestamps: Vec<i64> = ring.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![10, 30]);
    }

    #[test]
    fn test_restore_without_header_counts_every_row() {
        let (_dir, mut backend) = setup(100);
        fs::write(backend.path(), "10,21.00\n20,21.50\n").unwrap();

        backend.restore(8).unwrap();
        assert_eq!(backend.durable_rows(), Some(2));
    }

    #[test]
    fn test_rotation_at_ceiling() {
        let (_dir, mut backend) = setup(3);
        let mut ring = backend.restore(8).unwrap();
        for ts in 1..=3 {
            push(&mut backend, &mut ring, ts, 21.0);
        }
        let before = fs::read_to_string(backend.path()).unwrap();

        push(&mut backend, &mut ring, 4, 22.0);

        assert_eq!(fs::read_to_string(backend.backup_path()).unwrap(), before);
        assert_eq!(
            fs::read_to_string(backend.path()).unwrap(),
            "Timestamp,Temperature_C\n4,22.00\n"
        );
        assert_eq!(backend.durable_rows(), Some(1));
        // The ring is not bounded by the durable ceiling
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn test_rotation_replaces_previous_backup() {
        let (_dir, mut backend) = setup(1);
        let mut ring = backend.restore(8).unwrap();
        push(&mut backend, &mut ring, 1, 21.0);
        push(&mut backend, &mut ring, 2, 22.0);
        push(&mut backend, &mut ring, 3, 23.0);

        assert_eq!(
            fs::read_to_string(backend.backup_path()).unwrap(),
            "Timestamp,Temperature_C\n2,22.00\n"
        );
    }

    #[test]
    fn test_erase_resets_file_and_removes_backup() {
        let (_dir, mut backend) = setup(1);
        let mut ring = backend.restore(8).unwrap();
        push(&mut backend, &mut ring, 1, 21.0);
        push(&mut backend, &mut ring, 2, 22.0);
        assert!(backend.backup_path().exists());

        backend.erase().unwrap();

        assert!(!backend.backup_path().exists());
        assert_eq!(
            fs::read_to_string(backend.path()).unwrap(),
            "Timestamp,Temperature_C\n"
        );
        assert_eq!(backend.durable_rows(), Some(0));
    }

    #[test]
    fn test_missing_file_gets_header_on_append() {
        let (_dir, mut backend) = setup(10);
        let mut ring = backend.restore(8).unwrap();
        fs::remove_file(backend.path()).unwrap();

        push(&mut backend, &mut ring, 7, 19.5);
        assert_eq!(
            fs::read_to_string(backend.path()).unwrap(),
            "Timestamp,Temperature_C\n7,19.50\n"
        );
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every open fail
        let path = dir.path().join("blocked");
        fs::create_dir(&path).unwrap();
        let mut backend = CsvBackend::new(&path, ChannelLayout::temperature_only(), 10);

        let mut ring = RingBuffer::new(4);
        ring.push(LogEntry::new(1, &[20.0]));
        assert!(backend.write_through(&ring).is_err());
        assert_eq!(backend.durable_rows(), Some(0));
    }

    #[test]
    fn test_multi_channel_rows() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ChannelLayout::new(vec![ChannelKind::Temperature, ChannelKind::Humidity]).unwrap();
        let mut backend = CsvBackend::new(dir.path().join("log.csv"), layout, 10);
        let mut ring = backend.restore(4).unwrap();

        ring.push(LogEntry::new(30, &[21.0, 40.3]));
        backend.write_through(&ring).unwrap();

        assert_eq!(
            fs::read_to_string(backend.path()).unwrap(),
            "Timestamp,Temperature_C,Humidity_RH\n30,21.00,40.3\n"
        );
    }

    fn temp_humidity() -> ChannelLayout {
        ChannelLayout::new(vec![ChannelKind::Temperature, ChannelKind::Humidity]).unwrap()
    }

    #[test]
    fn test_layout_change_sets_old_log_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp_log.csv");
        fs::write(&path, "Timestamp,Temperature_C\n10,21.00\n").unwrap();

        let mut backend = CsvBackend::new(&path, temp_humidity(), 10);
        let mut ring = backend.restore(4).unwrap();
        assert!(ring.is_empty());
        assert_eq!(backend.durable_rows(), Some(0));

        ring.push(LogEntry::new(20, &[22.0, 45.0]));
        backend.write_through(&ring).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Timestamp,Temperature_C,Humidity_RH\n20,22.00,45.0\n"
        );
        assert_eq!(
            fs::read_to_string(backend.backup_path()).unwrap(),
            "Timestamp,Temperature_C\n10,21.00\n"
        );
    }

    #[test]
    fn test_matching_header_with_crlf_is_kept() {
        let (_dir, mut backend) = setup(10);
        fs::write(backend.path(), "Timestamp,Temperature_C\r\n10,21.00\r\n").unwrap();

        let ring = backend.restore(4).unwrap();
        assert_eq!(ring.len(), 1);
        assert!(!backend.backup_path().exists());
    }

    #[test]
    fn test_torn_row_is_dropped_before_next_append() {
        let (dir, mut backend) = setup(10);
        fs::write(backend.path(), "Timestamp,Temperature_C\n10,21.00\n20,2").unwrap();

        let mut ring = backend.restore(8).unwrap();
        assert_eq!(backend.durable_rows(), Some(1));
        assert_eq!(
            fs::read_to_string(backend.path()).unwrap(),
            "Timestamp,Temperature_C\n10,21.00\n"
        );

        push(&mut backend, &mut ring, 30, 23.0);

        let mut rebooted = CsvBackend::new(
            dir.path().join("temp_log.csv"),
            ChannelLayout::temperature_only(),
            10,
        );
        let restored = rebooted.restore(8).unwrap();
        let timestamps: Vec<i64> = restored.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![10, 30]);
    }

    #[test]
    fn test_torn_header_is_rewritten() {
        let (_dir, mut backend) = setup(10);
        fs::write(backend.path(), "Timest").unwrap();

        assert!(backend.restore(8).unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(backend.path()).unwrap(),
            "Timestamp,Temperature_C\n"
        );
    }

    #[test]
    fn test_export_serves_every_stored_row() {
        let (_dir, mut backend) = setup(100);
        let mut ring = backend.restore(2).unwrap();
        for ts in 1..=5 {
            push(&mut backend, &mut ring, ts, 20.0);
        }

        let text = backend.export().unwrap().unwrap();
        assert_eq!(
            text,
            "Timestamp,Temperature_C\n1,20.00\n2,20.00\n3,20.00\n4,20.00\n5,20.00\n"
        );
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_export_of_missing_file_is_an_error() {
        let (_dir, mut backend) = setup(10);
        backend.restore(4).unwrap();
        fs::remove_file(backend.path()).unwrap();

        assert!(matches!(backend.export(), Some(Err(_))));
    }
}
