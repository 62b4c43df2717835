//! Motion tracker
//!
//! Edge-triggered: the driver (an ISR or an ingest endpoint) reports rising
//! and falling edges. While motion is active, `last_motion` is re-stamped on
//! a fixed cadence so "recently true" can be read as "still true" between
//! discrete edges. The timestamp survives restarts through the settings
//! store.

use chrono::Utc;
use domo_core::events::{MotionEnded, MotionStarted};
use domo_core::{Context, MotionState};
use domo_event_bus::SharedEventBus;
use domo_storage::Settings;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

/// Tracks motion sensor state
pub struct MotionTracker {
    state: RwLock<MotionState>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    refresh_period: Duration,
    settings: Settings,
    bus: SharedEventBus,
}

impl MotionTracker {
    /// Create a tracker, restoring `last_motion` from settings
    pub async fn new(
        bus: SharedEventBus,
        settings: Settings,
        refresh_period: Duration,
    ) -> Arc<Self> {
        let state = MotionState {
            active: false,
            last_motion: settings.last_motion().await,
        };

        Arc::new(Self {
            state: RwLock::new(state),
            refresh_task: Mutex::new(None),
            refresh_period,
            settings,
            bus,
        })
    }

    /// Current state snapshot
    pub async fn state(&self) -> MotionState {
        *self.state.read().await
    }

    /// Rising edge: motion began
    ///
    /// Idempotent: a rising edge while already active is ignored, so a noisy
    /// driver cannot double-start the refresh loop.
    pub async fn rising(self: &Arc<Self>) {
        let now = Utc::now();
        {
            let mut state = self.state.write().await;
            if state.active {
                return;
            }
            state.active = true;
            state.last_motion = Some(now);
        }

        self.settings.set_last_motion(now).await;
        debug!("Motion started");
        self.bus.fire_typed(MotionStarted { at: now }, Context::new());

        let tracker = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tracker.refresh_period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it, the edge
            // already stamped the timestamp.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let mut state = tracker.state.write().await;
                if !state.active {
                    break;
                }
                state.last_motion = Some(Utc::now());
            }
        });

        let mut task = self.refresh_task.lock().await;
        if let Some(old) = task.replace(handle) {
            old.abort();
        }
    }

    /// Falling edge: motion ended
    pub async fn falling(&self) {
        let now = Utc::now();
        let last = {
            let mut state = self.state.write().await;
            if !state.active {
                return;
            }
            state.active = false;
            state.last_motion = Some(now);
            now
        };

        if let Some(handle) = self.refresh_task.lock().await.take() {
            handle.abort();
        }

        self.settings.set_last_motion(last).await;
        debug!("Motion ended");
        self.bus.fire_typed(MotionEnded { at: now }, Context::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domo_event_bus::EventBus;
    use domo_storage::Storage;

    async fn tracker_with(dir: &tempfile::TempDir) -> (Arc<MotionTracker>, SharedEventBus) {
        let bus = Arc::new(EventBus::new());
        let settings = Settings::load(Storage::new(dir.path())).await;
        let tracker = MotionTracker::new(bus.clone(), settings, Duration::from_millis(10)).await;
        (tracker, bus)
    }

    #[tokio::test]
    async fn test_edges_emit_events_once() {
        let dir = tempfile::tempdir().unwrap();
        let (tracker, bus) = tracker_with(&dir).await;
        let mut started = bus.subscribe_typed::<MotionStarted>();
        let mut ended = bus.subscribe_typed::<MotionEnded>();

        tracker.rising().await;
        tracker.rising().await; // ignored, already active
        assert!(tracker.state().await.active);
        started.recv().await.unwrap();

        tracker.falling().await;
        tracker.falling().await; // ignored, already inactive
        assert!(!tracker.state().await.active);
        ended.recv().await.unwrap();

        assert!(
            tokio::time::timeout(Duration::from_millis(20), started.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_last_motion_refreshes_while_active() {
        let dir = tempfile::tempdir().unwrap();
        let (tracker, _bus) = tracker_with(&dir).await;

        tracker.rising().await;
        let first = tracker.state().await.last_motion.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let refreshed = tracker.state().await.last_motion.unwrap();
        assert!(refreshed > first);

        tracker.falling().await;
        let after_end = tracker.state().await.last_motion.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.state().await.last_motion.unwrap(), after_end);
    }

    #[tokio::test]
    async fn test_last_motion_restored_after_restart() {
        let dir = tempfile::tempdir().unwrap();

        let (tracker, _bus) = tracker_with(&dir).await;
        tracker.rising().await;
        tracker.falling().await;
        let persisted = tracker.state().await.last_motion.unwrap();

        let (restarted, _bus) = tracker_with(&dir).await;
        let restored = restarted.state().await;
        assert!(!restored.active);
        assert_eq!(restored.last_motion, Some(persisted));
    }
}
