//! Remote forecast source
//!
//! Thin HTTP client for a darksky-style "currently" endpoint. The service's
//! wire format stays here; the tracker only sees [`OutdoorReading`].

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::trace;

use crate::env::OutdoorReading;
use crate::TrackerError;

/// Driver seam: one forecast fetch
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self) -> Result<OutdoorReading, TrackerError>;
}

#[derive(Debug, Deserialize)]
struct ForecastBody {
    currently: ForecastCurrently,
}

#[derive(Debug, Deserialize)]
struct ForecastCurrently {
    temperature: f64,
    /// Fraction in [0, 1]
    humidity: Option<f64>,
    /// Fraction in [0, 1]
    #[serde(rename = "precipProbability")]
    precip_probability: Option<f64>,
    icon: Option<String>,
    #[serde(rename = "precipType")]
    precip_type: Option<String>,
}

/// Forecast client over HTTP
pub struct HttpForecastSource {
    client: reqwest::Client,
    url: String,
}

impl HttpForecastSource {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ForecastSource for HttpForecastSource {
    async fn fetch(&self) -> Result<OutdoorReading, TrackerError> {
        trace!(url = %self.url, "Fetching forecast");

        let body: ForecastBody = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| TrackerError::Forecast(e.to_string()))?
            .error_for_status()
            .map_err(|e| TrackerError::Forecast(e.to_string()))?
            .json()
            .await
            .map_err(|e| TrackerError::Forecast(e.to_string()))?;

        Ok(OutdoorReading {
            temp_c: body.currently.temperature,
            humidity_pct: body.currently.humidity.map(|h| (h * 100.0).round()),
            precip_prob_pct: body.currently.precip_probability.map(|p| (p * 100.0).round()),
            temp_icon: body.currently.icon,
            precip_icon: body.currently.precip_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_parses_and_scales_fractions() {
        let json = r#"{
            "currently": {
                "temperature": 4.2,
                "humidity": 0.87,
                "precipProbability": 0.35,
                "icon": "rain",
                "precipType": "rain"
            }
        }"#;

        let body: ForecastBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.currently.temperature, 4.2);
        assert_eq!(body.currently.humidity, Some(0.87));

        let reading = OutdoorReading {
            temp_c: body.currently.temperature,
            humidity_pct: body.currently.humidity.map(|h| (h * 100.0).round()),
            precip_prob_pct: body.currently.precip_probability.map(|p| (p * 100.0).round()),
            temp_icon: body.currently.icon,
            precip_icon: body.currently.precip_type,
        };
        assert_eq!(reading.humidity_pct, Some(87.0));
        assert_eq!(reading.precip_prob_pct, Some(35.0));
    }

    #[test]
    fn test_body_tolerates_missing_optionals() {
        let json = r#"{"currently": {"temperature": -1.0}}"#;
        let body: ForecastBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.currently.humidity, None);
        assert_eq!(body.currently.precip_type, None);
    }
}
