//! Smart bulb state and command model

use serde::{Deserialize, Serialize};

/// An RGB color, serialized as a 6-hex-digit string ("ff8800")
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor(pub u8, pub u8, pub u8);

impl RgbColor {
    /// Pack into the 24-bit integer the wire protocol uses
    pub fn to_u32(self) -> u32 {
        ((self.0 as u32) << 16) | ((self.1 as u32) << 8) | self.2 as u32
    }

    /// Unpack from a 24-bit integer
    pub fn from_u32(rgb: u32) -> Self {
        Self((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    /// Format as lowercase hex without a leading '#'
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl std::fmt::Display for RgbColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for RgbColor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RgbColor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.len() != 6 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(serde::de::Error::custom("expected 6 hex digits"));
        }
        let rgb = u32::from_str_radix(&s, 16).map_err(serde::de::Error::custom)?;
        Ok(Self::from_u32(rgb))
    }
}

/// Which color channel the bulb is currently driven by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Color,
    Temperature,
}

/// Cached mirror of the bulb's authoritative state
///
/// Exactly one of `color` / `color_temp_k` is populated, consistent with
/// `mode`. Owned exclusively by the bulb command channel; every writer goes
/// through its serialized command path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulbState {
    pub power: bool,
    pub mode: ColorMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<RgbColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temp_k: Option<u16>,
    pub brightness_pct: u8,
}

impl Default for BulbState {
    fn default() -> Self {
        Self {
            power: false,
            mode: ColorMode::Temperature,
            color: None,
            color_temp_k: Some(4000),
            brightness_pct: 100,
        }
    }
}

/// A command accepted by the bulb channel
///
/// All variants are idempotent target states, not toggles, so repeated
/// delivery under retry is safe. `Toggle` is the one exception and resolves
/// its target inside the serialized section from a fresh device query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BulbCommand {
    SetColor {
        color: RgbColor,
        #[serde(skip_serializing_if = "Option::is_none")]
        brightness_pct: Option<u8>,
    },
    SetColorTemp {
        kelvin: u16,
        #[serde(skip_serializing_if = "Option::is_none")]
        brightness_pct: Option<u8>,
    },
    SetPower {
        on: bool,
    },
    Toggle {
        #[serde(skip_serializing_if = "Option::is_none")]
        explicit: Option<bool>,
    },
}
