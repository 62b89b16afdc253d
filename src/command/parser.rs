//! # Command Parser
//!
//! Maps one framed line to a [`Command`]. Keywords are matched as
//! case-sensitive literal prefixes, in a fixed order.

use super::protocol::*;
use crate::error::CommandError;

/// A recognised command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetData,
    GetCurrent,
    Info,
    ClearData,
    /// Validated epoch seconds
    SetTime(i64),
    GetTime,
}

impl Command {
    /// Parse a command line (without terminator)
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No keyword prefixes the line ([`CommandError::UnknownCommand`])
    /// - `SET_TIME` has no non-negative base-10 integer argument
    ///   ([`CommandError::InvalidTimeArgument`])
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        if line.starts_with(CMD_GET_DATA) {
            Ok(Command::GetData)
        } else if line.starts_with(CMD_GET_CURRENT) {
            Ok(Command::GetCurrent)
        } else if line.starts_with(CMD_INFO) {
            Ok(Command::Info)
        } else if line.starts_with(CMD_CLEAR_DATA) {
            Ok(Command::ClearData)
        } else if let Some(arg) = line.strip_prefix(CMD_SET_TIME) {
            parse_epoch(arg).map(Command::SetTime)
        } else if line.starts_with(CMD_GET_TIME) {
            Ok(Command::GetTime)
        } else {
            Err(CommandError::UnknownCommand)
        }
    }
}

/// Parse a `SET_TIME` argument: whitespace-separated digits only, fitting
/// in an `i64`
fn parse_epoch(arg: &str) -> Result<i64, CommandError> {
    if !arg.is_empty() && !arg.starts_with(char::is_whitespace) {
        return Err(CommandError::InvalidTimeArgument);
    }
    let arg = arg.trim();
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::InvalidTimeArgument);
    }
    arg.parse::<i64>().map_err(|_| CommandError::InvalidTimeArgument)
}
