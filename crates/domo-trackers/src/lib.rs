//! Signal trackers for domo
//!
//! Each tracker normalizes one raw signal into a typed state struct plus
//! edge-triggered events on the bus. Trackers are pure signal sources: they
//! never debounce or combine signals, that is the orchestrator's job.
//!
//! Hardware and network drivers sit behind trait seams (`ProximityProbe`,
//! `IndoorSensor`, `ForecastSource`, `SunTimes`) or push through tracker
//! handles, so the trackers themselves stay testable without devices.

mod env;
mod forecast;
mod motion;
mod presence;
mod solar;

pub use env::{EnvTracker, IndoorReading, IndoorSensor, OutdoorReading};
pub use forecast::{ForecastSource, HttpForecastSource};
pub use motion::MotionTracker;
pub use presence::{PresenceTracker, ProximityProbe};
pub use solar::{SolarCalculator, SolarTracker, SunTimes};

use thiserror::Error;

/// Transient tracker failures
///
/// These are never fatal: the previous state is retained and the read is
/// retried on the next poll.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("sensor read failed: {0}")]
    Read(String),

    #[error("forecast request failed: {0}")]
    Forecast(String),
}
