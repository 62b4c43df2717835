//! Read seams over the trackers
//!
//! Rules consult other trackers' state synchronously at the moment of each
//! event, never a cached copy. These traits keep that read path injectable:
//! production wires the real trackers, tests wire scripted fakes.

use async_trait::async_trait;
use domo_core::{EnvState, MotionState, PresenceState, SolarState};
use domo_trackers::{EnvTracker, MotionTracker, PresenceTracker, SolarTracker};

/// Presence state at read-time
pub trait PresenceReader: Send + Sync {
    fn presence(&self) -> PresenceState;
}

/// Day/night state at read-time
pub trait SolarReader: Send + Sync {
    fn solar(&self) -> SolarState;
}

/// Motion state at read-time
#[async_trait]
pub trait MotionReader: Send + Sync {
    async fn motion(&self) -> MotionState;
}

/// Climate state at read-time
#[async_trait]
pub trait EnvReader: Send + Sync {
    async fn env(&self) -> EnvState;
}

impl PresenceReader for PresenceTracker {
    fn presence(&self) -> PresenceState {
        self.state()
    }
}

impl SolarReader for SolarTracker {
    fn solar(&self) -> SolarState {
        self.state()
    }
}

#[async_trait]
impl MotionReader for MotionTracker {
    async fn motion(&self) -> MotionState {
        self.state().await
    }
}

#[async_trait]
impl EnvReader for EnvTracker {
    async fn env(&self) -> EnvState {
        self.state().await
    }
}
