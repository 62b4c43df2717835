//! Device connection seam
//!
//! The channel drives the bulb through this trait; the production
//! implementation is [`crate::TcpBulbConnection`], tests use mocks that
//! count overlapping sessions.

use async_trait::async_trait;
use domo_core::{BulbState, RgbColor};

use crate::BulbError;

/// One connection to the bulb
///
/// Methods take `&self`; implementations use interior mutability. The
/// channel guarantees calls never overlap, so implementations do not need
/// their own locking for correctness.
#[async_trait]
pub trait BulbConnection: Send + Sync {
    /// Open the device connection
    async fn connect(&self) -> Result<(), BulbError>;

    /// Set power, smooth transition
    async fn set_power(&self, on: bool) -> Result<(), BulbError>;

    /// Set RGB color and optionally brightness; powers the bulb on
    async fn set_color(
        &self,
        color: RgbColor,
        brightness_pct: Option<u8>,
    ) -> Result<(), BulbError>;

    /// Set white color temperature and optionally brightness; powers on
    async fn set_color_temp(
        &self,
        kelvin: u16,
        brightness_pct: Option<u8>,
    ) -> Result<(), BulbError>;

    /// Query the device's authoritative state
    async fn query(&self) -> Result<BulbState, BulbError>;

    /// Close the device connection; must not fail
    async fn disconnect(&self);
}
