//! State structs owned by the trackers
//!
//! Each tracker is the single writer of its own state; consumers read a
//! snapshot through the tracker's accessor and never mutate it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the owner's personal device is within proximity range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceState {
    pub in_range: bool,
}

impl Default for PresenceState {
    /// The tracker starts optimistic: unknown is treated as present, so no
    /// away-rules fire before the first real probe result.
    fn default() -> Self {
        Self { in_range: true }
    }
}

/// Motion sensor state
///
/// While `active` is true, `last_motion` is refreshed on a fixed cadence so
/// "recently true" can stand in for "still true" between edge events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub active: bool,
    pub last_motion: Option<DateTime<Utc>>,
}

/// Day/night state derived from solar position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolarState {
    pub is_night: bool,
}

/// Which refresh cycle of the environment tracker produced a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvScope {
    Indoor,
    Outdoor,
}

/// Last-known indoor and outdoor climate readings
///
/// All fields are `None` until the first successful read of the cycle that
/// owns them. The indoor and outdoor sources fail independently; a failed
/// read never blanks the other side's values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvState {
    pub indoor_temp_c: Option<f64>,
    pub indoor_humidity_pct: Option<f64>,
    pub outdoor_temp_c: Option<f64>,
    pub outdoor_humidity_pct: Option<f64>,
    pub outdoor_precip_prob_pct: Option<f64>,
    /// Forecast condition icon for the current temperature (dashboard use)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdoor_temp_icon: Option<String>,
    /// Precipitation-type icon, e.g. "rain" or "snow"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdoor_precip_icon: Option<String>,
}
