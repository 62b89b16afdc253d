//! # Command Protocol Constants
//!
//! Keywords and reply literals of the serial command channel. These are a
//! wire contract with existing host tools and must not change.

/// Maximum command line length in bytes (excluding the terminator)
pub const MAX_LINE_LEN: usize = 255;

/// Export the ring log as CSV
pub const CMD_GET_DATA: &str = "GET_DATA";

/// Take and return a fresh reading
pub const CMD_GET_CURRENT: &str = "GET_CURRENT";

/// Human-readable status summary
pub const CMD_INFO: &str = "INFO";

/// Erase the ring and its durable mirror
pub const CMD_CLEAR_DATA: &str = "CLEAR_DATA";

/// Set the wall clock from epoch seconds
pub const CMD_SET_TIME: &str = "SET_TIME";

/// Report the wall clock
pub const CMD_GET_TIME: &str = "GET_TIME";

/// Success reply
pub const REPLY_OK: &str = "OK";

/// `GET_TIME` reply while the clock is unset
pub const REPLY_TIME_NOT_SET: &str = "TIME NOT SET";

/// First line of the `INFO` reply
pub const DEVICE_NAME: &str = "Temp Logger";
