//! # Serial Communication Module
//!
//! Handles the serial command channel to the host.
//!
//! This module handles:
//! - Opening the serial/USB CDC device (8N1 at the configured baud rate)
//! - Falling back to common device paths when the configured one is missing
//! - Non-blocking reads with a timeout, writes that are dropped when detached

pub mod port_trait;

pub use port_trait::{StreamTransport, Transport};

use crate::error::{LoggerError, Result};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

/// Default baud rate of the command channel
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Fallback device paths to try (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Transport over an opened serial device
pub type SerialTransport = StreamTransport<SerialStream>;

/// Open the command channel
///
/// Tries `preferred` first, then the default device paths.
///
/// # Errors
///
/// Returns [`LoggerError::SerialPortNotFound`] if no candidate could be opened
///
/// # Examples
///
/// ```no_run
/// use temp_logger::serial::open_serial;
///
/// let (transport, path) = open_serial("/dev/ttyACM0", 115_200)?;
/// println!("Connected to: {}", path);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn open_serial(preferred: &str, baud_rate: u32) -> Result<(SerialTransport, String)> {
    let mut paths = vec![preferred];
    paths.extend(DEFAULT_DEVICE_PATHS.iter().filter(|p| **p != preferred));
    open_with_paths(&paths, baud_rate)
}

/// Open the first device in `paths` that succeeds
///
/// # Returns
///
/// * `Result<(SerialTransport, String)>` - Transport and the path it was opened at
pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<(SerialTransport, String)> {
    for path in paths {
        debug!("Trying to open serial port: {}", path);

        match open_port(path, baud_rate) {
            Ok(port) => {
                info!("Successfully opened serial device at {}", path);
                return Ok((StreamTransport::new(port), path.to_string()));
            }
            Err(e) => {
                warn!("Failed to open {}: {}", path, e);
                continue;
            }
        }
    }

    Err(LoggerError::SerialPortNotFound(paths.join(", ")))
}

/// Open a specific serial port with 8N1 settings
fn open_port(path: &str, baud_rate: u32) -> Result<SerialStream> {
    tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| LoggerError::Serial(format!("Failed to open {}: {}", path, e)))
}
