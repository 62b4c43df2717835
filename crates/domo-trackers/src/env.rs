//! Environment monitor
//!
//! Two independent refresh cycles update disjoint subsets of one
//! [`EnvState`]: a fast local sensor sample and a slow remote forecast.
//! Each cycle emits `EnvChanged` scoped to its own subset, and a failure in
//! one cycle never blanks the other's last-known values.
//!
//! Local readings pass an anti-spike filter: a sample that jumps more than
//! the configured threshold from the last accepted one is held back, and
//! accepted only if the follow-up reading agrees with it.

use async_trait::async_trait;
use domo_core::events::EnvChanged;
use domo_core::{Context, EnvScope, EnvState};
use domo_event_bus::SharedEventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::{ForecastSource, TrackerError};

/// One sample from the local climate sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndoorReading {
    pub temp_c: f64,
    pub humidity_pct: f64,
}

/// One sample from the remote forecast service
#[derive(Debug, Clone, PartialEq)]
pub struct OutdoorReading {
    pub temp_c: f64,
    pub humidity_pct: Option<f64>,
    pub precip_prob_pct: Option<f64>,
    pub temp_icon: Option<String>,
    pub precip_icon: Option<String>,
}

/// Driver seam: the local climate sensor
#[async_trait]
pub trait IndoorSensor: Send + Sync {
    async fn read(&self) -> Result<IndoorReading, TrackerError>;
}

/// Tracks last-known indoor and outdoor climate
pub struct EnvTracker {
    state: RwLock<EnvState>,
    /// Held-back indoor sample awaiting a consistent follow-up
    pending_indoor: Mutex<Option<IndoorReading>>,
    max_jump_c: f64,
    bus: SharedEventBus,
}

impl EnvTracker {
    pub fn new(bus: SharedEventBus, max_jump_c: f64) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(EnvState::default()),
            pending_indoor: Mutex::new(None),
            max_jump_c,
            bus,
        })
    }

    /// Current state snapshot
    pub async fn state(&self) -> EnvState {
        self.state.read().await.clone()
    }

    /// Feed one indoor sample through the anti-spike filter
    ///
    /// Returns whether the sample was accepted. Also the ingest seam for
    /// externally-hosted sensors.
    pub async fn submit_indoor(&self, reading: IndoorReading) -> bool {
        let mut pending = self.pending_indoor.lock().await;

        let last_accepted = self.state.read().await.indoor_temp_c;
        if let Some(last) = last_accepted {
            if (reading.temp_c - last).abs() > self.max_jump_c {
                match pending.take() {
                    // Follow-up agrees with the held-back sample: the jump
                    // was real.
                    Some(held) if (reading.temp_c - held.temp_c).abs() <= self.max_jump_c => {}
                    _ => {
                        debug!(
                            temp = reading.temp_c,
                            last, "Rejecting temperature spike, awaiting confirmation"
                        );
                        *pending = Some(reading);
                        return false;
                    }
                }
            } else {
                *pending = None;
            }
        }
        drop(pending);

        let state = {
            let mut state = self.state.write().await;
            state.indoor_temp_c = Some(reading.temp_c);
            state.indoor_humidity_pct = Some(reading.humidity_pct);
            state.clone()
        };

        self.bus.fire_typed(
            EnvChanged {
                scope: EnvScope::Indoor,
                state,
            },
            Context::new(),
        );
        true
    }

    /// Apply one outdoor forecast sample
    pub async fn apply_outdoor(&self, reading: OutdoorReading) {
        let state = {
            let mut state = self.state.write().await;
            state.outdoor_temp_c = Some(reading.temp_c);
            state.outdoor_humidity_pct = reading.humidity_pct;
            state.outdoor_precip_prob_pct = reading.precip_prob_pct;
            state.outdoor_temp_icon = reading.temp_icon;
            state.outdoor_precip_icon = reading.precip_icon;
            state.clone()
        };

        self.bus.fire_typed(
            EnvChanged {
                scope: EnvScope::Outdoor,
                state,
            },
            Context::new(),
        );
    }

    /// Poll the local sensor forever on the fast cadence
    pub async fn run_indoor<S: IndoorSensor>(self: Arc<Self>, sensor: S, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match sensor.read().await {
                Ok(reading) => {
                    self.submit_indoor(reading).await;
                }
                Err(err) => debug!(error = %err, "Indoor sensor read failed, keeping values"),
            }
        }
    }

    /// Poll the forecast service forever on the slow cadence
    pub async fn run_outdoor<F: ForecastSource>(self: Arc<Self>, source: F, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match source.fetch().await {
                Ok(reading) => self.apply_outdoor(reading).await,
                Err(err) => warn!(error = %err, "Forecast fetch failed, keeping values"),
            }
        }
    }
}
