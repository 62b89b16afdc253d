//! # Command Interpreter
//!
//! Answers framed command lines from the host with ASCII/CSV replies, and
//! runs the transport polling loop that feeds it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::framing::{Frame, LineFramer};
use super::parser::Command;
use super::protocol::*;
use crate::clock::Clock;
use crate::error::CommandError;
use crate::sensor::Sensor;
use crate::serial::Transport;
use crate::storage::{ChannelLayout, LogStore};

/// Dispatches commands against the log store, clock and sensor
pub struct CommandInterpreter {
    store: Arc<LogStore>,
    clock: Arc<Clock>,
    sensor: Arc<dyn Sensor>,
    layout: ChannelLayout,
}

impl CommandInterpreter {
    pub fn new(store: Arc<LogStore>, clock: Arc<Clock>, sensor: Arc<dyn Sensor>) -> Self {
        let layout = sensor.layout();
        Self {
            store,
            clock,
            sensor,
            layout,
        }
    }

    /// Reply to one framed unit of input
    pub fn handle_frame(&self, frame: Frame) -> String {
        match frame {
            Frame::Line(line) => self.handle_line(&line),
            Frame::Overflow => {
                warn!("Discarded over-long command line");
                error_reply(CommandError::LineTooLong)
            }
        }
    }

    /// Reply to one command line (without terminator)
    ///
    /// Every reply ends with `\n`.
    pub fn handle_line(&self, line: &str) -> String {
        info!("Received command: {}", line);

        let reply = Command::parse(line).and_then(|command| self.dispatch(command));
        match reply {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Command {:?} failed: {}", line, e);
                error_reply(e)
            }
        }
    }

    fn dispatch(&self, command: Command) -> Result<String, CommandError> {
        debug!("Processing {:?}", command);
        match command {
            Command::GetData => Ok(self.export_csv()),
            Command::GetCurrent => Ok(self.current_reading()),
            Command::Info => Ok(self.info()),
            Command::ClearData => {
                self.store.clear().map_err(|_| CommandError::ClearFailed)?;
                Ok(format!("{}\n", REPLY_OK))
            }
            Command::SetTime(epoch) => {
                let iso = self.clock.set(epoch)?;
                Ok(format!("{} {}\n", REPLY_OK, iso))
            }
            Command::GetTime => Ok(match self.clock.iso_now() {
                Some(iso) => format!("{}\n", iso),
                None => format!("{}\n", REPLY_TIME_NOT_SET),
            }),
        }
    }

    /// The durable CSV log when the backend serves one, otherwise the header
    /// plus one row per ring entry, oldest first
    fn export_csv(&self) -> String {
        if let Some(text) = self.store.export_durable() {
            info!("Exporting durable log ({} bytes)", text.len());
            return text;
        }

        let entries = self.store.snapshot();

        let mut out = self.layout.csv_header();
        out.push('\n');
        for entry in &entries {
            out.push_str(&self.layout.format_row(entry));
            out.push('\n');
        }

        info!("Exporting {} log entries", entries.len());
        out
    }

    fn current_reading(&self) -> String {
        let values = self.sensor.read();
        format!("{}\n", self.layout.format_values(&values))
    }

    fn info(&self) -> String {
        let mut out = format!(
            "{}\nSensor: {}\nLog entries: {}\nMax entries: {}\nStorage: {}\n",
            DEVICE_NAME,
            self.sensor.name(),
            self.store.entry_count(),
            self.store.capacity(),
            self.store.backend_kind(),
        );
        if let Some(rows) = self.store.durable_rows() {
            out.push_str(&format!("Stored rows: {}\n", rows));
        }
        if let Some(max_rows) = self.store.max_durable_rows() {
            out.push_str(&format!("Max stored rows: {}\n", max_rows));
        }
        let clock = if self.clock.is_set() { "set" } else { "unset" };
        out.push_str(&format!("Clock: {}\n", clock));
        out
    }

    /// Poll the transport once and answer every completed line
    ///
    /// # Returns
    ///
    /// * `usize` - Number of replies sent
    pub async fn poll_once<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        framer: &mut LineFramer,
        read_timeout: Duration,
    ) -> usize {
        if !transport.is_connected() {
            return 0;
        }

        let data = match transport.recv_bytes(read_timeout).await {
            Ok(Some(data)) => data,
            Ok(None) => return 0,
            Err(e) => {
                warn!("Transport read failed: {}", e);
                return 0;
            }
        };

        let mut replies = 0;
        for frame in framer.push(&data) {
            let reply = self.handle_frame(frame);
            if let Err(e) = transport.send_bytes(reply.as_bytes()).await {
                warn!("Failed to send reply: {}", e);
            }
            replies += 1;
        }
        replies
    }

    /// Serve commands until the transport disconnects
    pub async fn run<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        poll_interval: Duration,
        read_timeout: Duration,
    ) {
        info!("Command interpreter started");
        let mut framer = LineFramer::new();

        while transport.is_connected() {
            self.poll_once(transport, &mut framer, read_timeout).await;
            tokio::time::sleep(poll_interval).await;
        }
        info!("Command channel disconnected");
    }
}

fn error_reply(error: CommandError) -> String {
    format!("{}\n", error)
}
