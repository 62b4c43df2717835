//! Presence tracker
//!
//! Maintains the "owner is near" boolean from a continuous proximity watch.
//! No debouncing happens here; the tracker is a pure signal source and the
//! orchestrator decides what a flip means.

use async_trait::async_trait;
use domo_core::events::PresenceChanged;
use domo_core::{Context, PresenceState};
use domo_event_bus::SharedEventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::TrackerError;

/// Driver seam: one link-layer probe of the watched personal device
#[async_trait]
pub trait ProximityProbe: Send + Sync {
    /// Returns whether the device answered the probe
    async fn probe(&self) -> Result<bool, TrackerError>;
}

/// Tracks whether the owner's personal device is within range
pub struct PresenceTracker {
    state: watch::Sender<PresenceState>,
    bus: SharedEventBus,
}

impl PresenceTracker {
    /// Create a tracker starting in the default (in range) state
    pub fn new(bus: SharedEventBus) -> Arc<Self> {
        let (state, _) = watch::channel(PresenceState::default());
        Arc::new(Self { state, bus })
    }

    /// Current state snapshot
    pub fn state(&self) -> PresenceState {
        *self.state.borrow()
    }

    /// Feed a probe result into the tracker
    ///
    /// Emits `PresenceChanged` only when `in_range` actually flips. This is
    /// also the ingest seam for externally-hosted proximity watchers.
    pub fn report(&self, in_range: bool) {
        let previous = self.state.borrow().in_range;
        if previous == in_range {
            return;
        }

        let new_state = PresenceState { in_range };
        self.state.send_replace(new_state);
        info!(in_range, "Presence changed");
        self.bus
            .fire_typed(PresenceChanged { state: new_state }, Context::new());
    }

    /// Poll the given probe forever on a fixed cadence
    ///
    /// Probe failures keep the previous state and are retried next tick.
    pub async fn run_probe<P: ProximityProbe>(self: Arc<Self>, probe: P, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match probe.probe().await {
                Ok(in_range) => self.report(in_range),
                Err(err) => debug!(error = %err, "Proximity probe failed, keeping state"),
            }
        }
    }
}
