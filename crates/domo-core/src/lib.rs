//! Core types for domo
//!
//! This crate provides the fundamental types shared across the domo
//! workspace: tracker state structs, the bulb state/command model, the
//! typed event envelope carried on the event bus, and the interfaces of
//! external collaborators (notifier, dashboard widgets, weather history).

mod bulb;
mod collab;
mod context;
mod event;
mod switch;
mod tracker;

pub use bulb::{BulbCommand, BulbState, ColorMode, RgbColor};
pub use collab::{CollabError, Notifier, WeatherHistory, WeatherSample, WidgetBoard};
pub use context::Context;
pub use event::{Event, EventData, EventType};
pub use switch::{SwitchBankState, SwitchChannel};
pub use tracker::{EnvScope, EnvState, MotionState, PresenceState, SolarState};

/// Typed event payloads fired by the trackers and actuators
pub mod events {
    use super::*;
    use chrono::{DateTime, Utc};

    /// Fired by the presence tracker when `in_range` flips
    pub const PRESENCE_CHANGED: &str = "presence_changed";
    /// Fired by the motion tracker on a rising edge
    pub const MOTION_STARTED: &str = "motion_started";
    /// Fired by the motion tracker on a falling edge
    pub const MOTION_ENDED: &str = "motion_ended";
    /// Fired by the solar tracker on the day-to-night crossing
    pub const SUNSET_REACHED: &str = "sunset_reached";
    /// Fired by the solar tracker on the night-to-day crossing
    pub const SUNRISE_REACHED: &str = "sunrise_reached";
    /// Fired by the environment tracker when a field subset changes
    pub const ENV_CHANGED: &str = "env_changed";
    /// Fired by the bulb channel after a reconcile found a real difference
    pub const BULB_CHANGED: &str = "bulb_changed";
    /// Fired by the switch bank after a frame was sent
    pub const SWITCH_CHANGED: &str = "switch_changed";

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct PresenceChanged {
        pub state: PresenceState,
    }

    impl EventData for PresenceChanged {
        fn event_type() -> &'static str {
            PRESENCE_CHANGED
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct MotionStarted {
        pub at: DateTime<Utc>,
    }

    impl EventData for MotionStarted {
        fn event_type() -> &'static str {
            MOTION_STARTED
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct MotionEnded {
        pub at: DateTime<Utc>,
    }

    impl EventData for MotionEnded {
        fn event_type() -> &'static str {
            MOTION_ENDED
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct SunsetReached {
        pub state: SolarState,
    }

    impl EventData for SunsetReached {
        fn event_type() -> &'static str {
            SUNSET_REACHED
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct SunriseReached {
        pub state: SolarState,
    }

    impl EventData for SunriseReached {
        fn event_type() -> &'static str {
            SUNRISE_REACHED
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct EnvChanged {
        /// Which refresh cycle produced the change
        pub scope: EnvScope,
        pub state: EnvState,
    }

    impl EventData for EnvChanged {
        fn event_type() -> &'static str {
            ENV_CHANGED
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct BulbChanged {
        pub state: BulbState,
    }

    impl EventData for BulbChanged {
        fn event_type() -> &'static str {
            BULB_CHANGED
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct SwitchChanged {
        pub state: SwitchBankState,
    }

    impl EventData for SwitchChanged {
        fn event_type() -> &'static str {
            SWITCH_CHANGED
        }
    }
}
