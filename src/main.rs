//! # Temp Logger
//!
//! Periodically samples temperature/humidity into a persistent circular log
//! and serves it to a host over a serial command channel.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration and set up logging
//!    - Restore the log from the configured storage backend
//!
//! 2. **Tasks**
//!    - Sampling loop appends one reading per interval (after `SET_TIME`
//!      when clock gating is enabled)
//!    - Command interpreter answers host commands, reopening the serial
//!      device whenever it disappears
//!
//! 3. **Shutdown** on Ctrl+C
//!
//! Expected output:
//! ```text
//! INFO temp_logger: Temp Logger v0.1.0 starting...
//! INFO temp_logger::storage::store: Restored 12 entries from csv storage
//! INFO temp_logger::serial: Successfully opened serial device at /dev/ttyACM0
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use temp_logger::clock::Clock;
use temp_logger::command::CommandInterpreter;
use temp_logger::config::{Config, LoggingConfig};
use temp_logger::sampling::SamplingLoop;
use temp_logger::sensor::{Sensor, SensorKind, SimulatedSensor};
use temp_logger::serial::open_serial;
use temp_logger::storage::{build_backend, LogStore, RING_CAPACITY};

/// Delay before retrying to open the serial device
const RECONNECT_DELAY_MS: u64 = 2000;

/// File name prefix of the rolling log files
const LOG_FILE_PREFIX: &str = "temp-logger.log";

#[derive(Parser, Debug)]
#[command(name = "temp-logger")]
#[command(about = "Temperature/humidity datalogger with a serial command channel", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file (TOML); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device, overrides the configuration file
    #[arg(short, long)]
    port: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.serial.port = port;
    }
    config.validate().context("Invalid configuration")?;

    let _guard = init_tracing(&config.logging);

    info!("Temp Logger v{} starting...", env!("CARGO_PKG_VERSION"));

    let layout = config.channel_layout()?;
    let sensor: Arc<dyn Sensor> = match config.sensor.kind {
        SensorKind::Simulated => Arc::new(SimulatedSensor::new(layout.clone())),
    };

    let backend = build_backend(&config.storage, &layout);
    let store = Arc::new(LogStore::open(backend, RING_CAPACITY));
    let clock = Arc::new(Clock::new(config.clock.rtc));

    let sampler = SamplingLoop::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        Arc::clone(&sensor),
        Duration::from_secs(config.sampling.interval_s),
        config.wait_for_clock(),
    );
    let interpreter = CommandInterpreter::new(store, clock, sensor);

    let sampling_task = tokio::spawn(async move { sampler.run().await });
    let serial_config = config.serial.clone();
    let command_task = tokio::spawn(async move {
        let poll_interval = Duration::from_millis(serial_config.poll_interval_ms);
        let read_timeout = Duration::from_millis(serial_config.read_timeout_ms);

        loop {
            match open_serial(&serial_config.port, serial_config.baud_rate) {
                Ok((mut transport, path)) => {
                    info!("Serving commands on {}", path);
                    interpreter
                        .run(&mut transport, poll_interval, read_timeout)
                        .await;
                }
                Err(e) => warn!("Command channel unavailable: {}", e),
            }
            tokio::time::sleep(Duration::from_millis(RECONNECT_DELAY_MS)).await;
        }
    });

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");

    sampling_task.abort();
    command_task.abort();
    Ok(())
}

/// Install the stdout subscriber, plus a daily rolling file when configured
///
/// The returned guard flushes the file writer and must outlive the runtime.
fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let (file_layer, guard) = match &logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}
