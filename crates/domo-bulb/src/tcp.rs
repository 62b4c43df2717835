//! TCP transport for the bulb
//!
//! Thin client for the bulb's JSON-line control protocol (one request
//! object per line, matched to its response by id). Protocol internals stay
//! in this module; the channel only sees [`BulbConnection`].

use async_trait::async_trait;
use domo_core::{BulbState, ColorMode, RgbColor};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::trace;

use crate::{BulbConnection, BulbError};

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

type SplitStream = (BufReader<OwnedReadHalf>, OwnedWriteHalf);

/// Bulb connection over TCP
pub struct TcpBulbConnection {
    addr: String,
    transition_ms: u64,
    op_timeout: Duration,
    stream: Mutex<Option<SplitStream>>,
    next_id: AtomicU64,
}

impl TcpBulbConnection {
    pub fn new(addr: impl Into<String>, transition_ms: u64) -> Self {
        Self {
            addr: addr.into(),
            transition_ms,
            op_timeout: DEFAULT_OP_TIMEOUT,
            stream: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Bound one protocol operation; a hung device must not hold the
    /// channel's execution lock forever.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, BulbError>>,
    ) -> Result<T, BulbError> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| BulbError::Timeout)?
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, BulbError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({ "id": id, "method": method, "params": params });
        trace!(method, "Bulb request");

        let mut guard = self.stream.lock().await;
        let (reader, writer) = guard
            .as_mut()
            .ok_or_else(|| BulbError::Device("not connected".to_string()))?;

        let mut line = serde_json::to_string(&payload)
            .map_err(|e| BulbError::Device(e.to_string()))?;
        line.push_str("\r\n");
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| BulbError::Device(e.to_string()))?;

        // The device also pushes unsolicited notifications; skip until the
        // line answering our id arrives.
        loop {
            let mut response = String::new();
            let n = reader
                .read_line(&mut response)
                .await
                .map_err(|e| BulbError::Device(e.to_string()))?;
            if n == 0 {
                return Err(BulbError::Device("connection closed".to_string()));
            }

            let value: Value = match serde_json::from_str(response.trim()) {
                Ok(value) => value,
                Err(_) => continue,
            };

            if value.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }

            if let Some(error) = value.get("error") {
                return Err(BulbError::Device(error.to_string()));
            }
            return Ok(value.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    fn smooth(&self) -> Value {
        json!("smooth")
    }
}

#[async_trait]
impl BulbConnection for TcpBulbConnection {
    async fn connect(&self) -> Result<(), BulbError> {
        let stream = self
            .bounded(async {
                TcpStream::connect(&self.addr)
                    .await
                    .map_err(|e| BulbError::Device(e.to_string()))
            })
            .await?;

        let (read, write) = stream.into_split();
        *self.stream.lock().await = Some((BufReader::new(read), write));
        Ok(())
    }

    async fn set_power(&self, on: bool) -> Result<(), BulbError> {
        let state = if on { "on" } else { "off" };
        self.bounded(self.request(
            "set_power",
            json!([state, self.smooth(), self.transition_ms]),
        ))
        .await?;
        Ok(())
    }

    async fn set_color(
        &self,
        color: RgbColor,
        brightness_pct: Option<u8>,
    ) -> Result<(), BulbError> {
        self.bounded(self.request(
            "set_rgb",
            json!([color.to_u32(), self.smooth(), self.transition_ms]),
        ))
        .await?;
        if let Some(brightness) = brightness_pct {
            self.bounded(self.request(
                "set_bright",
                json!([brightness, self.smooth(), self.transition_ms]),
            ))
            .await?;
        }
        self.set_power(true).await
    }

    async fn set_color_temp(
        &self,
        kelvin: u16,
        brightness_pct: Option<u8>,
    ) -> Result<(), BulbError> {
        self.bounded(self.request(
            "set_ct_abx",
            json!([kelvin, self.smooth(), self.transition_ms]),
        ))
        .await?;
        if let Some(brightness) = brightness_pct {
            self.bounded(self.request(
                "set_bright",
                json!([brightness, self.smooth(), self.transition_ms]),
            ))
            .await?;
        }
        self.set_power(true).await
    }

    async fn query(&self) -> Result<BulbState, BulbError> {
        let result = self
            .bounded(self.request(
                "get_prop",
                json!(["power", "color_mode", "rgb", "ct", "bright"]),
            ))
            .await?;

        let props: Vec<String> = result
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .map(|v| v.as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default();

        state_from_props(&props)
    }

    async fn disconnect(&self) {
        self.stream.lock().await.take();
    }
}

/// Decode a `get_prop` answer: power, color_mode, rgb, ct, bright
fn state_from_props(props: &[String]) -> Result<BulbState, BulbError> {
    if props.len() != 5 {
        return Err(BulbError::Device(format!(
            "unexpected get_prop answer of {} fields",
            props.len()
        )));
    }

    let power = props[0] == "on";
    let mode = match props[1].as_str() {
        "1" => ColorMode::Color,
        _ => ColorMode::Temperature,
    };
    let brightness_pct = props[4].parse::<u8>().unwrap_or(100);

    let (color, color_temp_k) = match mode {
        ColorMode::Color => {
            let rgb = props[2].parse::<u32>().unwrap_or(0);
            (Some(RgbColor::from_u32(rgb)), None)
        }
        ColorMode::Temperature => {
            let ct = props[3].parse::<u16>().unwrap_or(4000);
            (None, Some(ct))
        }
    };

    Ok(BulbState {
        power,
        mode,
        color,
        color_temp_k,
        brightness_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(values: [&str; 5]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decode_color_mode() {
        let state = state_from_props(&props(["on", "1", "16711680", "", "50"])).unwrap();
        assert!(state.power);
        assert_eq!(state.mode, ColorMode::Color);
        assert_eq!(state.color, Some(RgbColor(255, 0, 0)));
        assert_eq!(state.color_temp_k, None);
        assert_eq!(state.brightness_pct, 50);
    }

    #[test]
    fn test_decode_temperature_mode() {
        let state = state_from_props(&props(["off", "2", "", "2700", "80"])).unwrap();
        assert!(!state.power);
        assert_eq!(state.mode, ColorMode::Temperature);
        assert_eq!(state.color, None);
        assert_eq!(state.color_temp_k, Some(2700));
    }

    #[test]
    fn test_decode_rejects_short_answer() {
        assert!(state_from_props(&["on".to_string()]).is_err());
    }
}
