//! # Temp Logger Library
//!
//! Temperature/humidity datalogger with a persistent circular log and a
//! serial ASCII command channel.
//!
//! This library provides the log store and its persistence backends, the
//! command interpreter served to the host, the clock source and the
//! sampling loop that feeds the log.

pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod sampling;
pub mod sensor;
pub mod serial;
pub mod storage;
