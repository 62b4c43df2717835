//! Configuration for the domo controller
//!
//! One YAML file describes the installation: location, polling cadences,
//! alert thresholds, device endpoints and the HTTP control surface.

mod error;

pub use error::{ConfigError, ConfigResult};

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Geographic position used by the solar tracker
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

/// Solar tracker settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolarConfig {
    /// Recompute cadence in seconds
    #[serde(default = "default_solar_poll_secs")]
    pub poll_secs: u64,

    /// Signed shift of the day/night boundary relative to plain
    /// sunrise/sunset, in minutes. Positive values shrink the day window on
    /// both ends (a golden-hour-like boundary), negative values extend it
    /// into twilight.
    #[serde(default)]
    pub twilight_offset_mins: i64,
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self {
            poll_secs: default_solar_poll_secs(),
            twilight_offset_mins: 0,
        }
    }
}

/// Presence tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Probe cadence in seconds
    #[serde(default = "default_presence_poll_secs")]
    pub poll_secs: u64,

    /// Identifier of the watched personal device (probe-specific, e.g. a
    /// MAC address or hostname)
    #[serde(default)]
    pub device: Option<String>,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            poll_secs: default_presence_poll_secs(),
            device: None,
        }
    }
}

/// Motion tracker settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Cadence for refreshing `last_motion` while motion is active, seconds
    #[serde(default = "default_motion_refresh_secs")]
    pub refresh_secs: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            refresh_secs: default_motion_refresh_secs(),
        }
    }
}

/// Environment tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Indoor sensor sample cadence in seconds
    #[serde(default = "default_indoor_poll_secs")]
    pub indoor_poll_secs: u64,

    /// Outdoor forecast sample cadence in seconds
    #[serde(default = "default_outdoor_poll_secs")]
    pub outdoor_poll_secs: u64,

    /// Largest accepted single-sample temperature jump in °C; bigger jumps
    /// need one consistent follow-up reading
    #[serde(default = "default_max_jump_c")]
    pub max_jump_c: f64,

    /// Forecast service endpoint
    #[serde(default)]
    pub forecast_url: Option<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            indoor_poll_secs: default_indoor_poll_secs(),
            outdoor_poll_secs: default_outdoor_poll_secs(),
            max_jump_c: default_max_jump_c(),
            forecast_url: None,
        }
    }
}

/// Alerting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Indoor temperature above which alerts fire while away, °C
    #[serde(default = "default_temp_alert_c")]
    pub temp_alert_c: f64,

    /// Webhook endpoint for push notifications
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            temp_alert_c: default_temp_alert_c(),
            webhook_url: None,
        }
    }
}

/// Smart bulb settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulbConfig {
    /// Device address, host:port
    pub addr: String,

    /// Background reconcile cadence in seconds
    #[serde(default = "default_bulb_refresh_secs")]
    pub refresh_secs: u64,

    /// Smooth transition duration for commands, milliseconds
    #[serde(default = "default_bulb_transition_ms")]
    pub transition_ms: u64,
}

/// Hardware driver daemon settings
///
/// The GPIO-attached peripherals (RF transmitter, door relay, proximity
/// probe, climate sensor) are served by a small daemon next to the hardware;
/// this is its HTTP endpoint. Without it the actuator drivers only log and
/// sensor readings arrive through the ingest endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    pub base_url: String,
}

/// Dashboard widget board settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Weather history collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub url: String,
}

/// HTTP control surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind")]
    pub bind: String,

    /// Shared access token; requests must present it as `?token=` or a
    /// bearer header
    pub access_token: String,
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: String,

    /// Disable to run fully in-memory
    #[serde(default = "default_true")]
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            persist: true,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomoConfig {
    pub location: LocationConfig,

    #[serde(default)]
    pub solar: SolarConfig,

    #[serde(default)]
    pub presence: PresenceConfig,

    #[serde(default)]
    pub motion: MotionConfig,

    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub alerts: AlertConfig,

    pub bulb: BulbConfig,

    #[serde(default)]
    pub drivers: Option<DriverConfig>,

    #[serde(default)]
    pub widgets: Option<WidgetConfig>,

    #[serde(default)]
    pub history: Option<HistoryConfig>,

    pub http: HttpConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// 5-bit address code of the RF switch bank, e.g. "01011"
    pub switch_code: String,
}

impl DomoConfig {
    /// Load and parse the configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!("Loading configuration: {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseYaml {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if !(-90.0..=90.0).contains(&self.location.latitude) {
            return Err(ConfigError::InvalidValue {
                key: "location.latitude".to_string(),
                reason: "must be within -90..=90".to_string(),
            });
        }
        if !(-180.0..=180.0).contains(&self.location.longitude) {
            return Err(ConfigError::InvalidValue {
                key: "location.longitude".to_string(),
                reason: "must be within -180..=180".to_string(),
            });
        }
        if self.switch_code.len() != 5 || !self.switch_code.chars().all(|c| c == '0' || c == '1') {
            return Err(ConfigError::InvalidValue {
                key: "switch_code".to_string(),
                reason: "must be 5 binary digits".to_string(),
            });
        }
        if self.http.access_token.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "http.access_token".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn default_solar_poll_secs() -> u64 {
    60
}

fn default_presence_poll_secs() -> u64 {
    10
}

fn default_motion_refresh_secs() -> u64 {
    1
}

fn default_indoor_poll_secs() -> u64 {
    5
}

fn default_outdoor_poll_secs() -> u64 {
    300
}

fn default_max_jump_c() -> f64 {
    5.0
}

fn default_temp_alert_c() -> f64 {
    30.0
}

fn default_bulb_refresh_secs() -> u64 {
    10
}

fn default_bulb_transition_ms() -> u64 {
    1000
}

fn default_http_bind() -> String {
    "0.0.0.0:8123".to_string()
}

fn default_storage_dir() -> String {
    "/var/lib/domo".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_yaml() -> &'static str {
        "\
location:
  latitude: 50.08
  longitude: 14.43
bulb:
  addr: \"192.168.1.40:55443\"
http:
  access_token: \"secret\"
switch_code: \"01011\"
"
    }

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: DomoConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.solar.poll_secs, 60);
        assert_eq!(config.environment.indoor_poll_secs, 5);
        assert_eq!(config.environment.outdoor_poll_secs, 300);
        assert_eq!(config.bulb.refresh_secs, 10);
        assert_eq!(config.motion.refresh_secs, 1);
        assert!(config.storage.persist);
    }

    #[test]
    fn test_invalid_switch_code_rejected() {
        let mut config: DomoConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.switch_code = "012".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(minimal_yaml().as_bytes()).unwrap();

        let config = DomoConfig::load(file.path()).unwrap();
        assert_eq!(config.location.latitude, 50.08);
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(matches!(
            DomoConfig::load("/nonexistent/domo.yaml"),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
