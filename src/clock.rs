//! # Clock Source
//!
//! Sample timestamps, either seconds since boot or, once `SET_TIME` has been
//! received, wall-clock seconds since the Unix epoch.
//!
//! The clock moves `Unset → Set` exactly once per set request and never
//! back. Time keeps advancing from the reference using a monotonic
//! [`Instant`], so host wall-clock jumps do not affect sample timestamps.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tracing::info;

use crate::error::CommandError;

/// ISO-8601 UTC format used on the wire
pub const ISO_8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Current state of the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// Timestamps are seconds since boot
    Unset,
    /// Timestamps are wall-clock epoch seconds
    Set,
}

#[derive(Debug, Clone, Copy)]
struct WallReference {
    epoch: i64,
    at: Instant,
}

/// Shared timestamp source
#[derive(Debug)]
pub struct Clock {
    boot: Instant,
    rtc_present: bool,
    reference: Mutex<Option<WallReference>>,
    set_tx: watch::Sender<bool>,
}

impl Clock {
    /// Create an unset clock
    ///
    /// # Arguments
    ///
    /// * `rtc_present` - Whether this platform has a settable wall clock
    pub fn new(rtc_present: bool) -> Self {
        let (set_tx, _) = watch::channel(false);
        Self {
            boot: Instant::now(),
            rtc_present,
            reference: Mutex::new(None),
            set_tx,
        }
    }

    fn reference(&self) -> Option<WallReference> {
        *self.reference.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn rtc_present(&self) -> bool {
        self.rtc_present
    }

    pub fn state(&self) -> ClockState {
        if self.reference().is_some() {
            ClockState::Set
        } else {
            ClockState::Unset
        }
    }

    pub fn is_set(&self) -> bool {
        self.state() == ClockState::Set
    }

    /// Seconds since boot
    pub fn uptime(&self) -> i64 {
        self.boot.elapsed().as_secs() as i64
    }

    /// Current timestamp: epoch seconds when set, uptime seconds otherwise
    pub fn now(&self) -> i64 {
        match self.reference() {
            Some(reference) => reference.epoch + reference.at.elapsed().as_secs() as i64,
            None => self.uptime(),
        }
    }

    /// Set the wall-clock reference
    ///
    /// # Returns
    ///
    /// * `Result<String, CommandError>` - The new time as ISO-8601
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No settable clock is present
    /// - `epoch` cannot be represented as a calendar date
    pub fn set(&self, epoch: i64) -> Result<String, CommandError> {
        if !self.rtc_present {
            return Err(CommandError::NoRealTimeClock);
        }
        let iso = format_iso8601(epoch).ok_or(CommandError::InvalidTimeArgument)?;

        *self.reference.lock().unwrap_or_else(PoisonError::into_inner) = Some(WallReference {
            epoch,
            at: Instant::now(),
        });
        self.set_tx.send_replace(true);

        info!("Clock set to {}", iso);
        Ok(iso)
    }

    /// Current wall-clock time as ISO-8601, or `None` while unset
    pub fn iso_now(&self) -> Option<String> {
        if !self.is_set() {
            return None;
        }
        format_iso8601(self.now())
    }

    /// Resolve once the clock has been set
    pub async fn wait_until_set(&self) {
        let mut rx = self.set_tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|set| *set).await;
    }
}

/// Format epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`
pub fn format_iso8601(epoch: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(epoch, 0).map(|dt| dt.format(ISO_8601_FORMAT).to_string())
}
