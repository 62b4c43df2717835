//! HTTP implementations of the collaborator interfaces
//!
//! Each collaborator is optional in the configuration; an unconfigured one
//! resolves to a no-op implementation so the rules never special-case
//! "collaborator missing".

use async_trait::async_trait;
use domo_config::{AlertConfig, HistoryConfig, WidgetConfig};
use domo_core::{CollabError, EnvState, Notifier, WeatherHistory, WeatherSample, WidgetBoard};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_default()
}

fn check_status(response: reqwest::Response) -> Result<(), CollabError> {
    response
        .error_for_status()
        .map(|_| ())
        .map_err(|e| CollabError::Rejected(e.to_string()))
}

/// Build the notifier from the alert configuration
pub fn notifier(config: &AlertConfig) -> Arc<dyn Notifier> {
    match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(Disabled),
    }
}

/// Build the widget board collaborator
pub fn widget_board(config: Option<&WidgetConfig>) -> Arc<dyn WidgetBoard> {
    match config {
        Some(config) => Arc::new(HttpWidgetBoard::new(config.clone())),
        None => Arc::new(Disabled),
    }
}

/// Build the weather history collaborator
pub fn weather_history(config: Option<&HistoryConfig>) -> Arc<dyn WeatherHistory> {
    match config {
        Some(config) => Arc::new(HttpWeatherHistory::new(config.url.clone())),
        None => Arc::new(Disabled),
    }
}

/// Push notifications over a plain webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: http_client(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str) -> Result<(), CollabError> {
        trace!(message, "Sending notification");
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await
            .map_err(|e| CollabError::Transport(e.to_string()))?;
        check_status(response)
    }
}

/// Widget board client
///
/// The board renders short icon-and-text frames and exposes its built-in
/// apps behind action ids.
pub struct HttpWidgetBoard {
    client: reqwest::Client,
    config: WidgetConfig,
}

const ICON_LIGHT_ON: &str = "i616";
const ICON_LIGHT_OFF: &str = "i617";
const ICON_INDOOR: &str = "i2056";
const ICON_OUTDOOR: &str = "i2057";

impl HttpWidgetBoard {
    pub fn new(config: WidgetConfig) -> Self {
        Self {
            client: http_client(),
            config,
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), CollabError> {
        let mut request = self
            .client
            .post(format!("{}{}", self.config.base_url, path))
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CollabError::Transport(e.to_string()))?;
        check_status(response)
    }
}

#[async_trait]
impl WidgetBoard for HttpWidgetBoard {
    async fn update_light_widget(&self, power: bool) -> Result<(), CollabError> {
        self.post("/widgets/light", light_frames(power)).await
    }

    async fn update_weather_widget(&self, env: &EnvState) -> Result<(), CollabError> {
        self.post("/widgets/weather", weather_frames(env)).await
    }

    async fn send_action(&self, action_id: &str) -> Result<(), CollabError> {
        debug!(action_id, "Triggering widget board action");
        self.post("/actions", serde_json::json!({ "id": action_id }))
            .await
    }
}

fn light_frames(power: bool) -> serde_json::Value {
    serde_json::json!({
        "frames": [{
            "icon": if power { ICON_LIGHT_ON } else { ICON_LIGHT_OFF },
            "text": if power { "on" } else { "off" },
        }]
    })
}

/// One frame per known temperature, icons from the forecast when it
/// provided them
fn weather_frames(env: &EnvState) -> serde_json::Value {
    let mut frames = Vec::new();
    if let Some(temp) = env.indoor_temp_c {
        frames.push(serde_json::json!({
            "icon": ICON_INDOOR,
            "text": format!("{temp:.1}°"),
        }));
    }
    if let Some(temp) = env.outdoor_temp_c {
        frames.push(serde_json::json!({
            "icon": env.outdoor_temp_icon.as_deref().unwrap_or(ICON_OUTDOOR),
            "text": format!("{temp:.1}°"),
        }));
    }
    if let Some(prob) = env.outdoor_precip_prob_pct {
        if let Some(icon) = &env.outdoor_precip_icon {
            frames.push(serde_json::json!({
                "icon": icon,
                "text": format!("{prob:.0}%"),
            }));
        }
    }
    serde_json::json!({ "frames": frames })
}

/// Weather history over a plain record endpoint
pub struct HttpWeatherHistory {
    client: reqwest::Client,
    url: String,
}

impl HttpWeatherHistory {
    pub fn new(url: String) -> Self {
        Self {
            client: http_client(),
            url,
        }
    }
}

#[async_trait]
impl WeatherHistory for HttpWeatherHistory {
    async fn record(&self, sample: &WeatherSample) -> Result<(), CollabError> {
        let response = self
            .client
            .post(&self.url)
            .json(sample)
            .send()
            .await
            .map_err(|e| CollabError::Transport(e.to_string()))?;
        check_status(response)
    }
}

/// No-op stand-in for every unconfigured collaborator
struct Disabled;

#[async_trait]
impl Notifier for Disabled {
    async fn send(&self, message: &str) -> Result<(), CollabError> {
        debug!(message, "Notifier disabled, dropping message");
        Ok(())
    }
}

#[async_trait]
impl WidgetBoard for Disabled {
    async fn update_light_widget(&self, _power: bool) -> Result<(), CollabError> {
        Ok(())
    }
    async fn update_weather_widget(&self, _env: &EnvState) -> Result<(), CollabError> {
        Ok(())
    }
    async fn send_action(&self, action_id: &str) -> Result<(), CollabError> {
        debug!(action_id, "Widget board disabled, dropping action");
        Ok(())
    }
}

#[async_trait]
impl WeatherHistory for Disabled {
    async fn record(&self, _sample: &WeatherSample) -> Result<(), CollabError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_weather_frames_skip_unknown_values() {
        let empty = weather_frames(&EnvState::default());
        assert_eq!(empty["frames"].as_array().unwrap().len(), 0);

        let env = EnvState {
            indoor_temp_c: Some(21.52),
            outdoor_temp_c: Some(-3.0),
            outdoor_precip_prob_pct: Some(65.0),
            outdoor_precip_icon: Some("snow".to_string()),
            ..EnvState::default()
        };
        let frames = weather_frames(&env);
        let frames = frames["frames"].as_array().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["text"], "21.5°");
        assert_eq!(frames[1]["text"], "-3.0°");
        assert_eq!(frames[2]["icon"], "snow");
    }

    #[test]
    fn test_light_frames() {
        assert_eq!(light_frames(true)["frames"][0]["text"], "on");
        assert_eq!(light_frames(false)["frames"][0]["text"], "off");
    }

    #[tokio::test]
    async fn test_disabled_collaborators_accept_everything() {
        let disabled = Disabled;
        Notifier::send(&disabled, "alarm").await.unwrap();
        disabled.update_light_widget(true).await.unwrap();
        disabled
            .record(&WeatherSample::from_env(&EnvState::default(), Utc::now()))
            .await
            .unwrap();
    }
}
