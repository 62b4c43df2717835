//! The serialized command channel

use domo_core::events::BulbChanged;
use domo_core::{BulbCommand, BulbState, Context, RgbColor};
use domo_event_bus::SharedEventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::{validate, BulbConnection, BulbError};

/// Serialized command channel over one bulb connection
///
/// Owns the cached [`BulbState`] exclusively. Every writer — HTTP handler,
/// orchestrator rule, background refresh — goes through [`submit`] or the
/// forced-refresh path, both of which hold the single execution lock for
/// the full connect/apply/re-query/diff/disconnect sequence. Waiters queue
/// in FIFO order, so the device observes strictly sequential sessions and
/// each command's diff-and-emit happens before the next command starts.
///
/// [`submit`]: BulbChannel::submit
pub struct BulbChannel {
    connection: Arc<dyn BulbConnection>,
    /// Single-flight execution lock (tokio mutexes queue waiters FIFO)
    exec_lock: Mutex<()>,
    cache: RwLock<BulbState>,
    bus: SharedEventBus,
}

impl BulbChannel {
    pub fn new(connection: Arc<dyn BulbConnection>, bus: SharedEventBus) -> Arc<Self> {
        Arc::new(Self {
            connection,
            exec_lock: Mutex::new(()),
            cache: RwLock::new(BulbState::default()),
            bus,
        })
    }

    /// Execute one command through the serialized path
    ///
    /// Validation happens before the lock is taken; the lock is released on
    /// every exit path because the guard drops with the call frame.
    pub async fn submit(&self, command: BulbCommand) -> Result<BulbState, BulbError> {
        validate(&command)?;

        let _guard = self.exec_lock.lock().await;
        self.session(Some(command)).await
    }

    /// Cached state, optionally reconciled with the device first
    pub async fn state(&self, force_refresh: bool) -> Result<BulbState, BulbError> {
        if force_refresh {
            let _guard = self.exec_lock.lock().await;
            self.session(None).await?;
        }
        Ok(self.cache.read().await.clone())
    }

    /// Invert power, or set it explicitly
    ///
    /// With no explicit value the target is resolved from a fresh device
    /// query inside the locked section, so concurrent toggles never race
    /// against a stale read.
    pub async fn toggle(&self, explicit: Option<bool>) -> Result<BulbState, BulbError> {
        self.submit(BulbCommand::Toggle { explicit }).await
    }

    /// Idempotent power on
    pub async fn turn_on(&self) -> Result<BulbState, BulbError> {
        self.submit(BulbCommand::SetPower { on: true }).await
    }

    /// Idempotent power off
    pub async fn turn_off(&self) -> Result<BulbState, BulbError> {
        self.submit(BulbCommand::SetPower { on: false }).await
    }

    /// Set an RGB color (powers the bulb on)
    pub async fn set_color(
        &self,
        color: RgbColor,
        brightness_pct: Option<u8>,
    ) -> Result<BulbState, BulbError> {
        self.submit(BulbCommand::SetColor {
            color,
            brightness_pct,
        })
        .await
    }

    /// Set a white color temperature (powers the bulb on)
    pub async fn set_color_temp(
        &self,
        kelvin: u16,
        brightness_pct: Option<u8>,
    ) -> Result<BulbState, BulbError> {
        self.submit(BulbCommand::SetColorTemp {
            kelvin,
            brightness_pct,
        })
        .await
    }

    /// Reconcile with the device forever on a fixed cadence
    ///
    /// Runs through the same serialized path, so change events fire even
    /// when the state was changed outside this process.
    pub async fn run_refresh(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(err) = self.state(true).await {
                debug!(error = %err, "Background bulb refresh failed");
            }
        }
    }

    /// One connect/apply/re-query/disconnect session; caller holds the lock
    async fn session(&self, command: Option<BulbCommand>) -> Result<BulbState, BulbError> {
        self.connection.connect().await?;
        let result = self.apply_and_reconcile(command).await;
        // Disconnect on success and failure alike.
        self.connection.disconnect().await;
        result
    }

    async fn apply_and_reconcile(
        &self,
        command: Option<BulbCommand>,
    ) -> Result<BulbState, BulbError> {
        if let Some(command) = command {
            match command {
                BulbCommand::SetColor {
                    color,
                    brightness_pct,
                } => self.connection.set_color(color, brightness_pct).await?,
                BulbCommand::SetColorTemp {
                    kelvin,
                    brightness_pct,
                } => {
                    self.connection
                        .set_color_temp(kelvin, brightness_pct)
                        .await?
                }
                BulbCommand::SetPower { on } => self.connection.set_power(on).await?,
                BulbCommand::Toggle { explicit } => {
                    let target = match explicit {
                        Some(on) => on,
                        None => !self.connection.query().await?.power,
                    };
                    self.connection.set_power(target).await?;
                }
            }
        }

        let fresh = self.connection.query().await?;

        let changed = {
            let mut cache = self.cache.write().await;
            if *cache != fresh {
                *cache = fresh.clone();
                true
            } else {
                false
            }
        };

        if changed {
            debug!(power = fresh.power, "Bulb state changed");
            self.bus.fire_typed(
                BulbChanged {
                    state: fresh.clone(),
                },
                Context::new(),
            );
        }

        Ok(fresh)
    }
}
