//! Door relay
//!
//! A timed pulse: `open` energizes the relay line and a background task
//! releases it after the pulse duration. Re-triggering while open restarts
//! the timer instead of stacking pulses.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::ActuatorError;

/// Default pulse length before the relay reverts
pub const DEFAULT_PULSE: Duration = Duration::from_secs(2);

/// Driver seam: energize or release the relay line
#[async_trait]
pub trait RelayLine: Send + Sync {
    async fn set_active(&self, active: bool) -> Result<(), ActuatorError>;
}

/// The door relay actuator
pub struct DoorRelay {
    line: Arc<dyn RelayLine>,
    pulse: Duration,
    revert_task: Mutex<Option<JoinHandle<()>>>,
}

impl DoorRelay {
    pub fn new(line: Arc<dyn RelayLine>, pulse: Duration) -> Arc<Self> {
        Arc::new(Self {
            line,
            pulse,
            revert_task: Mutex::new(None),
        })
    }

    /// Pulse the relay; auto-reverts after the pulse duration
    pub async fn open(self: &Arc<Self>) -> Result<(), ActuatorError> {
        // Restart the timer if a pulse is already running.
        if let Some(previous) = self.revert_task.lock().await.take() {
            previous.abort();
        }

        self.line.set_active(true).await?;
        info!("Door relay opened");

        let relay = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(relay.pulse).await;
            if let Err(err) = relay.line.set_active(false).await {
                warn!(error = %err, "Door relay failed to revert");
            }
        });
        *self.revert_task.lock().await = Some(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingLine {
        active: AtomicBool,
        activations: AtomicU32,
    }

    #[async_trait]
    impl RelayLine for RecordingLine {
        async fn set_active(&self, active: bool) -> Result<(), ActuatorError> {
            self.active.store(active, Ordering::SeqCst);
            if active {
                self.activations.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pulse_reverts_automatically() {
        let line = Arc::new(RecordingLine::default());
        let relay = DoorRelay::new(line.clone(), Duration::from_millis(20));

        relay.open().await.unwrap();
        assert!(line.active.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!line.active.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_retrigger_restarts_timer() {
        let line = Arc::new(RecordingLine::default());
        let relay = DoorRelay::new(line.clone(), Duration::from_millis(40));

        relay.open().await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        relay.open().await.unwrap();

        // The first pulse would have reverted by now; the second keeps the
        // line active.
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(line.active.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!line.active.load(Ordering::SeqCst));
        assert_eq!(line.activations.load(Ordering::SeqCst), 2);
    }
}
