//! # Command Module
//!
//! Newline-delimited ASCII request/response protocol served over the serial
//! transport.
//!
//! This module handles:
//! - Framing received bytes into bounded command lines
//! - Parsing keywords and the `SET_TIME` argument
//! - Dispatching to the log store, clock and sensor
//! - Formatting replies byte-for-byte compatible with existing host tools

pub mod framing;
pub mod interpreter;
pub mod parser;
pub mod protocol;

pub use framing::{Frame, LineFramer};
pub use interpreter::CommandInterpreter;
pub use parser::Command;
