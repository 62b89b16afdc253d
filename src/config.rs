//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{LoggerError, Result};
use crate::sampling::DEFAULT_INTERVAL_S;
use crate::sensor::SensorKind;
use crate::serial::DEFAULT_BAUD_RATE;
use crate::storage::{BackendKind, ChannelKind, ChannelLayout, MAX_CHANNELS};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial command channel configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Sampling loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    #[serde(default = "default_interval_s")]
    pub interval_s: u64,

    /// Hold off logging until `SET_TIME`; follows `clock.rtc` when unset
    #[serde(default)]
    pub wait_for_clock: Option<bool>,
}

/// Clock configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ClockConfig {
    /// Whether a settable wall clock is present
    #[serde(default = "default_rtc")]
    pub rtc: bool,
}

/// Persistence configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Log file (csv), snapshot file (snapshot) or record directory (keyed)
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// Rotation ceiling of the CSV log
    #[serde(default = "default_max_rows")]
    pub max_rows: u64,
}

/// Sensor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_kind")]
    pub kind: SensorKind,

    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelKind>,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { DEFAULT_BAUD_RATE }
fn default_poll_interval_ms() -> u64 { 10 }
fn default_read_timeout_ms() -> u64 { 20 }

fn default_interval_s() -> u64 { DEFAULT_INTERVAL_S }

fn default_rtc() -> bool { true }

fn default_backend() -> BackendKind { BackendKind::Csv }
fn default_storage_path() -> String { "./data/temp_log.csv".to_string() }
fn default_max_rows() -> u64 { 100_000 }

fn default_sensor_kind() -> SensorKind { SensorKind::Simulated }
fn default_channels() -> Vec<ChannelKind> { vec![ChannelKind::Temperature] }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            poll_interval_ms: default_poll_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_s: default_interval_s(),
            wait_for_clock: None,
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { rtc: default_rtc() }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_storage_path(),
            max_rows: default_max_rows(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: default_sensor_kind(),
            channels: default_channels(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> LoggerError {
    LoggerError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use temp_logger::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Effective clock-gating switch
    pub fn wait_for_clock(&self) -> bool {
        self.sampling.wait_for_clock.unwrap_or(self.clock.rtc)
    }

    /// Channel layout recorded by the sensor
    pub fn channel_layout(&self) -> Result<ChannelLayout> {
        ChannelLayout::new(self.sensor.channels.clone())
            .ok_or_else(|| invalid("sensor channels must be 1-4 distinct channels"))
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600]
            .contains(&self.serial.baud_rate)
        {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        if self.serial.poll_interval_ms == 0 || self.serial.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 1000 {
            return Err(invalid("read_timeout_ms must be between 1 and 1000"));
        }

        if self.sampling.interval_s == 0 || self.sampling.interval_s > 86_400 {
            return Err(invalid("interval_s must be between 1 and 86400"));
        }

        if self.sampling.wait_for_clock == Some(true) && !self.clock.rtc {
            return Err(invalid("wait_for_clock requires clock.rtc = true"));
        }

        if self.storage.backend != BackendKind::Memory && self.storage.path.is_empty() {
            return Err(invalid("storage path cannot be empty"));
        }

        if self.storage.max_rows == 0 {
            return Err(invalid("max_rows must be greater than 0"));
        }

        if self.sensor.channels.is_empty() || self.sensor.channels.len() > MAX_CHANNELS {
            return Err(invalid(format!(
                "sensor channels must list between 1 and {} channels",
                MAX_CHANNELS
            )));
        }
        self.channel_layout()?;

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(invalid(
                "logging level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}
