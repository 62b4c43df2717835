//! Simple actuators
//!
//! The RF switch bank and the door relay are stateless wire pushes compared
//! to the bulb: no readback, no reconciliation. Their hardware lines sit
//! behind driver traits so the control logic tests without GPIO.

mod relay;
mod switch;

pub use relay::{DoorRelay, RelayLine, DEFAULT_PULSE};
pub use switch::{RfTransmitter, SwitchBank};

use thiserror::Error;

/// Actuator errors
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("invalid switch address code '{0}', expected 5 binary digits")]
    InvalidCode(String),

    #[error("transmit failed: {0}")]
    Transmit(String),

    #[error("relay line failed: {0}")]
    Relay(String),
}
