//! # Error Types
//!
//! Custom error types for Temp Logger using `thiserror`.

use thiserror::Error;

/// Main error type for Temp Logger
#[derive(Debug, Error)]
pub enum LoggerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Snapshot blob encoding/decoding errors
    #[error("Snapshot encoding error: {0}")]
    Encode(#[from] bincode::Error),

    /// Keyed record encoding/decoding errors
    #[error("Record encoding error: {0}")]
    Record(#[from] serde_json::Error),

    /// Persisted state that decodes but violates the ring invariants
    #[error("Corrupted persisted state: {0}")]
    CorruptState(String),
}

/// Result type alias for Temp Logger
pub type Result<T> = std::result::Result<T, LoggerError>;

/// Failures answered on the command channel
///
/// The `Display` text is the exact reply line sent to the host (without the
/// trailing newline).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Line did not match any known command
    #[error("ERROR: Unknown command")]
    UnknownCommand,

    /// Line exceeded the framing budget and was discarded
    #[error("ERROR: Command too long")]
    LineTooLong,

    /// `SET_TIME` argument missing, negative, non-numeric or out of range
    #[error("ERROR: Invalid time argument")]
    InvalidTimeArgument,

    /// `SET_TIME` on a platform without a settable clock
    #[error("ERROR: No real-time clock")]
    NoRealTimeClock,

    /// Backend erase failed during `CLEAR_DATA`
    #[error("ERROR: Failed to clear log")]
    ClearFailed,
}
