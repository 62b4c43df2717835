//! Command validation
//!
//! Runs before the execution lock is acquired; a rejected command never
//! touches the device.

use domo_core::{BulbCommand, RgbColor};
use regex::Regex;
use std::ops::RangeInclusive;
use std::sync::OnceLock;

use crate::BulbError;

/// Accepted brightness percentage
pub const BRIGHTNESS_RANGE: RangeInclusive<u8> = 1..=100;

/// Color temperature range the device supports, Kelvin
pub const COLOR_TEMP_RANGE: RangeInclusive<u16> = 1700..=6500;

fn hex_color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{6}$").expect("valid regex"))
}

/// Parse a 6-hex-digit RGB string
pub fn parse_color(hex: &str) -> Result<RgbColor, BulbError> {
    if !hex_color_re().is_match(hex) {
        return Err(BulbError::InvalidColor(hex.to_string()));
    }
    let rgb = u32::from_str_radix(hex, 16).map_err(|_| BulbError::InvalidColor(hex.to_string()))?;
    Ok(RgbColor::from_u32(rgb))
}

/// Validate a command's parameters
pub fn validate(command: &BulbCommand) -> Result<(), BulbError> {
    match command {
        BulbCommand::SetColor { brightness_pct, .. } => check_brightness(*brightness_pct),
        BulbCommand::SetColorTemp {
            kelvin,
            brightness_pct,
        } => {
            if !COLOR_TEMP_RANGE.contains(kelvin) {
                return Err(BulbError::InvalidColorTemp(*kelvin));
            }
            check_brightness(*brightness_pct)
        }
        BulbCommand::SetPower { .. } | BulbCommand::Toggle { .. } => Ok(()),
    }
}

fn check_brightness(brightness_pct: Option<u8>) -> Result<(), BulbError> {
    match brightness_pct {
        Some(b) if !BRIGHTNESS_RANGE.contains(&b) => Err(BulbError::InvalidBrightness(b)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color_accepts_hex() {
        assert_eq!(parse_color("FF0000").unwrap(), RgbColor(255, 0, 0));
        assert_eq!(parse_color("00ff80").unwrap(), RgbColor(0, 255, 128));
    }

    #[test]
    fn test_parse_color_rejects_garbage() {
        for bad in ["fff", "ff00001", "gg0000", "#ff0000", ""] {
            assert!(matches!(
                parse_color(bad),
                Err(BulbError::InvalidColor(_))
            ));
        }
    }

    #[test]
    fn test_brightness_bounds() {
        let ok = BulbCommand::SetColor {
            color: RgbColor(1, 2, 3),
            brightness_pct: Some(100),
        };
        assert!(validate(&ok).is_ok());

        let zero = BulbCommand::SetColor {
            color: RgbColor(1, 2, 3),
            brightness_pct: Some(0),
        };
        assert!(matches!(
            validate(&zero),
            Err(BulbError::InvalidBrightness(0))
        ));
    }

    #[test]
    fn test_color_temp_bounds() {
        let low = BulbCommand::SetColorTemp {
            kelvin: 1000,
            brightness_pct: None,
        };
        assert!(matches!(
            validate(&low),
            Err(BulbError::InvalidColorTemp(1000))
        ));

        let ok = BulbCommand::SetColorTemp {
            kelvin: 2700,
            brightness_pct: Some(50),
        };
        assert!(validate(&ok).is_ok());
    }
}
