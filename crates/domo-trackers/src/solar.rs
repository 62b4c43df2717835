//! Solar clock
//!
//! Derives day/night from geographic position and time, recomputed on a
//! fixed cadence. The transition events are edge-triggered: exactly one
//! `SunsetReached` per false→true crossing and one `SunriseReached` per
//! true→false crossing, never one per poll tick.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc};
use domo_core::events::{SunriseReached, SunsetReached};
use domo_core::{Context, SolarState};
use domo_event_bus::SharedEventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Boundary seam: whether a given instant counts as night
///
/// The production implementation computes solar times; tests script
/// crossings directly.
pub trait SunTimes: Send + Sync {
    fn is_night(&self, at: DateTime<Utc>) -> bool;
}

/// Day/night boundary from computed sunrise/sunset times
///
/// A positive twilight offset shrinks the day window on both ends, giving a
/// golden-hour-like boundary; a negative one extends it into twilight.
pub struct SolarCalculator {
    latitude: f64,
    longitude: f64,
    twilight_offset: ChronoDuration,
}

impl SolarCalculator {
    pub fn new(latitude: f64, longitude: f64, twilight_offset_mins: i64) -> Self {
        Self {
            latitude,
            longitude,
            twilight_offset: ChronoDuration::minutes(twilight_offset_mins),
        }
    }
}

impl SunTimes for SolarCalculator {
    fn is_night(&self, at: DateTime<Utc>) -> bool {
        let date = at.date_naive();
        let (sunrise_ts, sunset_ts) = sunrise::sunrise_sunset(
            self.latitude,
            self.longitude,
            date.year(),
            date.month(),
            date.day(),
        );

        let day_start = sunrise_ts + self.twilight_offset.num_seconds();
        let day_end = sunset_ts - self.twilight_offset.num_seconds();
        let ts = at.timestamp();

        ts < day_start || ts > day_end
    }
}

/// Tracks the day/night state and fires transition events
pub struct SolarTracker {
    state: watch::Sender<SolarState>,
    bus: SharedEventBus,
}

impl SolarTracker {
    /// Create a tracker seeded with the current boundary state
    ///
    /// Seeding avoids a spurious transition event on the first poll.
    pub fn new(bus: SharedEventBus, times: &dyn SunTimes) -> Arc<Self> {
        let initial = SolarState {
            is_night: times.is_night(Utc::now()),
        };
        let (state, _) = watch::channel(initial);
        Arc::new(Self { state, bus })
    }

    /// Current state snapshot
    pub fn state(&self) -> SolarState {
        *self.state.borrow()
    }

    /// Apply one boundary observation, emitting on a crossing
    pub fn observe(&self, is_night: bool) {
        let previous = self.state.borrow().is_night;
        if previous == is_night {
            return;
        }

        let new_state = SolarState { is_night };
        self.state.send_replace(new_state);

        if is_night {
            info!("Sunset crossed");
            self.bus
                .fire_typed(SunsetReached { state: new_state }, Context::new());
        } else {
            info!("Sunrise crossed");
            self.bus
                .fire_typed(SunriseReached { state: new_state }, Context::new());
        }
    }

    /// Recompute the boundary forever on a fixed cadence
    pub async fn run(self: Arc<Self>, times: Arc<dyn SunTimes>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.observe(times.is_night(Utc::now()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domo_event_bus::EventBus;

    #[tokio::test]
    async fn test_single_event_per_crossing() {
        let bus = Arc::new(EventBus::new());
        let mut sunsets = bus.subscribe_typed::<SunsetReached>();
        let mut sunrises = bus.subscribe_typed::<SunriseReached>();

        struct AlwaysDay;
        impl SunTimes for AlwaysDay {
            fn is_night(&self, _at: DateTime<Utc>) -> bool {
                false
            }
        }

        let tracker = SolarTracker::new(bus, &AlwaysDay);
        assert!(!tracker.state().is_night);

        // Several polls on the same side of the boundary: nothing fires.
        tracker.observe(false);
        tracker.observe(false);

        // One crossing, then more polls on the night side.
        tracker.observe(true);
        tracker.observe(true);
        tracker.observe(true);

        let event = sunsets.recv().await.unwrap();
        assert!(event.data.state.is_night);
        assert!(
            tokio::time::timeout(Duration::from_millis(20), sunsets.recv())
                .await
                .is_err()
        );

        // Crossing back fires exactly one sunrise.
        tracker.observe(false);
        let event = sunrises.recv().await.unwrap();
        assert!(!event.data.state.is_night);
    }

    #[test]
    fn test_calculator_midday_is_day_midnight_is_night() {
        use chrono::TimeZone;

        // Prague, a July day: midday is day, midnight is night.
        let calc = SolarCalculator::new(50.08, 14.43, 0);
        let midday = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        let midnight = Utc.with_ymd_and_hms(2025, 7, 1, 0, 30, 0).unwrap();

        assert!(!calc.is_night(midday));
        assert!(calc.is_night(midnight));
    }

    #[test]
    fn test_twilight_offset_shrinks_day() {
        use chrono::TimeZone;

        // A moment shortly after computed sunrise counts as day with no
        // offset but as night with a large positive offset.
        let plain = SolarCalculator::new(50.08, 14.43, 0);
        let shifted = SolarCalculator::new(50.08, 14.43, 90);

        let date = chrono::NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let (sunrise_ts, _) = sunrise::sunrise_sunset(50.08, 14.43, 2025, 7, 1);
        let just_after = Utc
            .timestamp_opt(sunrise_ts + 10 * 60, 0)
            .single()
            .unwrap();
        assert_eq!(just_after.date_naive(), date);

        assert!(!plain.is_night(just_after));
        assert!(shifted.is_night(just_after));
    }
}
