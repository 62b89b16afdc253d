//! # Sampling Loop
//!
//! Periodic producer that reads the sensor and appends to the log store.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::clock::Clock;
use crate::sensor::Sensor;
use crate::storage::{LogEntry, LogStore};

/// Default sampling period in seconds
pub const DEFAULT_INTERVAL_S: u64 = 60;

/// Timer-driven sensor sampler
pub struct SamplingLoop {
    store: Arc<LogStore>,
    clock: Arc<Clock>,
    sensor: Arc<dyn Sensor>,
    period: Duration,
    wait_for_clock: bool,
}

impl SamplingLoop {
    /// # Arguments
    ///
    /// * `period` - Time between samples
    /// * `wait_for_clock` - Hold off sampling until the clock has been set
    pub fn new(
        store: Arc<LogStore>,
        clock: Arc<Clock>,
        sensor: Arc<dyn Sensor>,
        period: Duration,
        wait_for_clock: bool,
    ) -> Self {
        Self {
            store,
            clock,
            sensor,
            period,
            wait_for_clock,
        }
    }

    /// Take one reading and record it with the current timestamp
    pub fn sample_once(&self) -> LogEntry {
        let values = self.sensor.read();
        let entry = LogEntry::new(self.clock.now(), &values);
        self.store.append(entry);

        info!(
            "Logged {} (entries: {})",
            self.sensor.layout().format_row(&entry),
            self.store.entry_count()
        );
        entry
    }

    /// Sample for the process lifetime
    ///
    /// With clock gating enabled nothing is recorded before the first
    /// successful `SET_TIME`.
    pub async fn run(&self) {
        if self.wait_for_clock && !self.clock.is_set() {
            info!("Waiting for SET_TIME before logging");
            self.clock.wait_until_set().await;
        }

        info!("Logging every {} seconds", self.period.as_secs());
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.sample_once();
        }
    }
}
