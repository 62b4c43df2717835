//! Actuator command channel for the smart bulb
//!
//! The bulb is a stateful network device shared by HTTP handlers, the
//! orchestrator's rules and a periodic reconcile. This crate serializes all
//! of that onto one connection: at most one command is in flight, commands
//! queue FIFO, and after every command the device's authoritative state is
//! re-queried, diffed against the local cache, and a change event fires only
//! on a real difference.
//!
//! Command parameters are validated before the execution lock is ever
//! taken; invalid input never reaches the device.

mod channel;
mod connection;
mod tcp;
mod validate;

pub use channel::BulbChannel;
pub use connection::BulbConnection;
pub use tcp::TcpBulbConnection;
pub use validate::{parse_color, validate, BRIGHTNESS_RANGE, COLOR_TEMP_RANGE};

use thiserror::Error;

/// Bulb channel errors
#[derive(Debug, Error)]
pub enum BulbError {
    #[error("invalid color '{0}', expected 6 hex digits RRGGBB")]
    InvalidColor(String),

    #[error("invalid brightness {0}, expected 1..=100")]
    InvalidBrightness(u8),

    #[error("invalid color temperature {0}K, expected 1700..=6500")]
    InvalidColorTemp(u16),

    #[error("device communication failed: {0}")]
    Device(String),

    #[error("device operation timed out")]
    Timeout,
}

impl BulbError {
    /// Whether this error was rejected before any I/O
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BulbError::InvalidColor(_)
                | BulbError::InvalidBrightness(_)
                | BulbError::InvalidColorTemp(_)
        )
    }
}
