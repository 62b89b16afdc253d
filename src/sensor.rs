//! # Sensor Module
//!
//! The reading source consumed by the sampling loop and `GET_CURRENT`.
//! Hardware drivers live outside this crate; the simulated sensor stands in
//! whenever no driver is available.

use crate::storage::{ChannelKind, ChannelLayout};
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Sensor kind selected in the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Simulated,
}

/// A source of channel readings
#[cfg_attr(test, mockall::automock)]
pub trait Sensor: Send + Sync {
    /// Identity shown by `INFO`
    fn name(&self) -> String;

    /// Channels returned by [`Sensor::read`], in order
    fn layout(&self) -> ChannelLayout;

    /// Take one reading, one value per layout channel
    fn read(&self) -> Vec<f32>;
}

/// Base temperature of the simulated sensor (°C)
const SIM_BASE_TEMP_C: f32 = 22.0;

/// Base relative humidity of the simulated sensor (%)
const SIM_BASE_HUMIDITY: f32 = 45.0;

/// Phase advance per reading (radians)
const SIM_CYCLE_STEP: f32 = 0.01;

/// Simulated sensor with a slow sinusoidal drift
#[derive(Debug)]
pub struct SimulatedSensor {
    layout: ChannelLayout,
    cycle: AtomicU32,
}

impl SimulatedSensor {
    pub fn new(layout: ChannelLayout) -> Self {
        Self {
            layout,
            cycle: AtomicU32::new(0),
        }
    }

    fn value(kind: ChannelKind, phase: f32) -> f32 {
        match kind {
            ChannelKind::Temperature => SIM_BASE_TEMP_C + phase.sin() * 3.0,
            ChannelKind::Humidity => SIM_BASE_HUMIDITY + phase.cos() * 10.0,
            ChannelKind::Temperature2 => SIM_BASE_TEMP_C + 0.5 + phase.sin() * 3.0,
            ChannelKind::Humidity2 => SIM_BASE_HUMIDITY - 2.0 + phase.cos() * 10.0,
        }
    }
}

impl Sensor for SimulatedSensor {
    fn name(&self) -> String {
        "Simulated".to_string()
    }

    fn layout(&self) -> ChannelLayout {
        self.layout.clone()
    }

    fn read(&self) -> Vec<f32> {
        let cycle = self.cycle.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let phase = cycle as f32 * SIM_CYCLE_STEP;

        let values: Vec<f32> = self
            .layout
            .kinds()
            .iter()
            .map(|kind| Self::value(*kind, phase))
            .collect();
        debug!("Simulated reading: {:?}", values);
        values
    }
}
