//! Interfaces of external collaborators
//!
//! The push-notification transport, the dashboard widget API, and the
//! historical weather store are external systems. They are specified here
//! only at their interface; thin HTTP implementations live in the server
//! crate and tests inject recording fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::EnvState;

/// Failure calling out to a collaborator
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected by remote: {0}")]
    Rejected(String),
}

/// Push-notification sink ("alarm", temperature alerts)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), CollabError>;
}

/// Dashboard widget collaborator
///
/// Covers both directions the dashboard device supports: pushing frames to
/// its widgets and triggering actions on its built-in apps (e.g. the radio).
#[async_trait]
pub trait WidgetBoard: Send + Sync {
    async fn update_light_widget(&self, power: bool) -> Result<(), CollabError>;

    async fn update_weather_widget(&self, env: &EnvState) -> Result<(), CollabError>;

    /// Trigger an app action, e.g. "radio.play" or "radio.stop"
    async fn send_action(&self, action_id: &str) -> Result<(), CollabError>;
}

/// One flat climate record handed to the historical store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub timestamp: DateTime<Utc>,
    pub indoor_temp_c: Option<f64>,
    pub indoor_humidity_pct: Option<f64>,
    pub outdoor_temp_c: Option<f64>,
    pub outdoor_humidity_pct: Option<f64>,
}

impl WeatherSample {
    /// Snapshot the recordable subset of an environment state
    pub fn from_env(env: &EnvState, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            indoor_temp_c: env.indoor_temp_c,
            indoor_humidity_pct: env.indoor_humidity_pct,
            outdoor_temp_c: env.outdoor_temp_c,
            outdoor_humidity_pct: env.outdoor_humidity_pct,
        }
    }
}

/// Historical weather persistence collaborator
#[async_trait]
pub trait WeatherHistory: Send + Sync {
    async fn record(&self, sample: &WeatherSample) -> Result<(), CollabError>;
}
