//! # Log Entries and Channel Layout
//!
//! Timestamped samples and the CSV text format they are exported in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of channels a single entry can carry
pub const MAX_CHANNELS: usize = 4;

/// Name of the timestamp column in every CSV header
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// One reading channel
///
/// Temperature-like channels are formatted with 2 decimals, humidity-like
/// channels with 1 decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Primary temperature (°C)
    Temperature,
    /// Primary relative humidity (%)
    Humidity,
    /// Second sensor temperature (°C)
    Temperature2,
    /// Second sensor relative humidity (%)
    Humidity2,
}

impl ChannelKind {
    /// CSV column header for this channel
    pub fn column(&self) -> &'static str {
        match self {
            ChannelKind::Temperature => "Temperature_C",
            ChannelKind::Humidity => "Humidity_RH",
            ChannelKind::Temperature2 => "Temperature2_C",
            ChannelKind::Humidity2 => "Humidity2_RH",
        }
    }

    /// Fixed number of decimals used when formatting a value
    pub fn decimals(&self) -> usize {
        match self {
            ChannelKind::Temperature | ChannelKind::Temperature2 => 2,
            ChannelKind::Humidity | ChannelKind::Humidity2 => 1,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A single timestamped sample
///
/// Fixed-size so that a full ring can be dumped as one flat array. Channels
/// not present in the active [`ChannelLayout`] are zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LogEntry {
    /// Seconds since the Unix epoch, or since boot while the clock is unset
    pub timestamp: i64,
    /// Channel readings in layout order
    pub values: [f32; MAX_CHANNELS],
}

impl LogEntry {
    /// Build an entry from up to [`MAX_CHANNELS`] readings
    ///
    /// Extra readings are ignored, missing ones are zero.
    pub fn new(timestamp: i64, readings: &[f32]) -> Self {
        let mut values = [0.0; MAX_CHANNELS];
        for (slot, value) in values.iter_mut().zip(readings) {
            *slot = *value;
        }
        Self { timestamp, values }
    }
}

/// Ordered list of the channels recorded by this logger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    kinds: Vec<ChannelKind>,
}

impl ChannelLayout {
    /// Create a layout from 1 to [`MAX_CHANNELS`] distinct channels
    ///
    /// Returns `None` for an empty, oversized or duplicated list.
    pub fn new(kinds: Vec<ChannelKind>) -> Option<Self> {
        if kinds.is_empty() || kinds.len() > MAX_CHANNELS {
            return None;
        }
        for (i, kind) in kinds.iter().enumerate() {
            if kinds[..i].contains(kind) {
                return None;
            }
        }
        Some(Self { kinds })
    }

    /// The historical single-channel layout (`Timestamp,Temperature_C`)
    pub fn temperature_only() -> Self {
        Self {
            kinds: vec![ChannelKind::Temperature],
        }
    }

    pub fn kinds(&self) -> &[ChannelKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// CSV header line, without the trailing newline
    pub fn csv_header(&self) -> String {
        let mut header = String::from(TIMESTAMP_COLUMN);
        for kind in &self.kinds {
            header.push(',');
            header.push_str(kind.column());
        }
        header
    }

    /// Format readings as comma-separated fixed-precision values
    ///
    /// Only the first `self.len()` readings are used.
    pub fn format_values(&self, values: &[f32]) -> String {
        self.kinds
            .iter()
            .zip(values)
            .map(|(kind, value)| format!("{:.*}", kind.decimals(), value))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Format one CSV data row, without the trailing newline
    pub fn format_row(&self, entry: &LogEntry) -> String {
        format!("{},{}", entry.timestamp, self.format_values(&entry.values))
    }

    /// Parse one CSV data row
    ///
    /// Returns `None` unless the row has exactly one integer timestamp and
    /// one numeric value per channel. Header rows never parse.
    pub fn parse_row(&self, line: &str) -> Option<LogEntry> {
        let mut fields = line.trim_end_matches(['\r', '\n']).split(',');
        let timestamp = fields.next()?.trim().parse::<i64>().ok()?;

        let mut values = [0.0; MAX_CHANNELS];
        for slot in values.iter_mut().take(self.kinds.len()) {
            *slot = fields.next()?.trim().parse::<f32>().ok()?;
        }

        if fields.next().is_some() {
            return None;
        }

        Some(LogEntry { timestamp, values })
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::temperature_only()
    }
}
