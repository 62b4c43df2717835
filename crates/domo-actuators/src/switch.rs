//! RF-controlled switch bank
//!
//! Five channels addressed by a 5-bit house code, driven over a one-way
//! 433 MHz link. Frames are tristate-encoded and sent twice because the
//! link has no acknowledgement. The assumed channel state mirrors the last
//! frame sent and is persisted so a restart keeps the mirror.

use async_trait::async_trait;
use domo_core::events::SwitchChanged;
use domo_core::{Context, SwitchBankState, SwitchChannel};
use domo_event_bus::SharedEventBus;
use domo_storage::Settings;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::ActuatorError;

/// Driver seam: push one encoded frame out the radio
#[async_trait]
pub trait RfTransmitter: Send + Sync {
    async fn transmit(&self, frame: &str) -> Result<(), ActuatorError>;
}

/// The switch bank actuator
pub struct SwitchBank {
    code: String,
    state: RwLock<SwitchBankState>,
    transmitter: Arc<dyn RfTransmitter>,
    settings: Settings,
    bus: SharedEventBus,
}

impl SwitchBank {
    /// Create a bank for the given 5-bit address code, restoring the
    /// assumed channel states from settings
    pub async fn new(
        code: impl Into<String>,
        transmitter: Arc<dyn RfTransmitter>,
        settings: Settings,
        bus: SharedEventBus,
    ) -> Result<Arc<Self>, ActuatorError> {
        let code = code.into();
        if code.len() != 5 || !code.chars().all(|c| c == '0' || c == '1') {
            return Err(ActuatorError::InvalidCode(code));
        }

        let state = settings.switches().await;
        Ok(Arc::new(Self {
            code,
            state: RwLock::new(state),
            transmitter,
            settings,
            bus,
        }))
    }

    /// Assumed state snapshot
    pub async fn state(&self) -> SwitchBankState {
        *self.state.read().await
    }

    /// Command one channel to an explicit state (idempotent)
    pub async fn send(&self, channel: SwitchChannel, on: bool) -> Result<(), ActuatorError> {
        let frame = encode_frame(&self.code, channel, on);

        // No acknowledgement on the link: repeat the frame once.
        self.transmitter.transmit(&frame).await?;
        self.transmitter.transmit(&frame).await?;

        let state = {
            let mut state = self.state.write().await;
            state.set(channel, on);
            *state
        };

        self.settings.set_switches(state).await;
        debug!(channel = %channel, on, "Switch frame sent");
        self.bus.fire_typed(SwitchChanged { state }, Context::new());
        Ok(())
    }

    /// Invert one channel's assumed state, returning the new value
    pub async fn toggle(&self, channel: SwitchChannel) -> Result<bool, ActuatorError> {
        let target = !self.state.read().await.get(channel);
        self.send(channel, target).await?;
        Ok(target)
    }
}

/// Tristate frame layout: 5 address symbols, 5 channel symbols, 2 power
/// symbols. '0' address bits float ('F'), the selected channel position is
/// pulled to '0'.
fn encode_frame(code: &str, channel: SwitchChannel, on: bool) -> String {
    let mut frame: Vec<char> = code
        .chars()
        .map(|c| if c == '0' { 'F' } else { c })
        .collect();
    frame.extend(['F'; 5]);
    frame.extend(if on { ['F', '0'] } else { ['0', 'F'] });

    frame[5 + channel.index()] = '0';
    frame.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use domo_event_bus::EventBus;
    use domo_storage::Storage;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransmitter {
        frames: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RfTransmitter for RecordingTransmitter {
        async fn transmit(&self, frame: &str) -> Result<(), ActuatorError> {
            self.frames.lock().unwrap().push(frame.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_frame_encoding() {
        assert_eq!(encode_frame("01011", SwitchChannel::A, true), "F1F110FFFFF0");
        assert_eq!(encode_frame("01011", SwitchChannel::B, true), "F1F11F0FFFF0");
        assert_eq!(encode_frame("01011", SwitchChannel::B, false), "F1F11F0FFF0F");
        assert_eq!(encode_frame("01011", SwitchChannel::E, false), "F1F11FFFF00F");
    }

    #[tokio::test]
    async fn test_send_repeats_frame_and_updates_state() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe_typed::<SwitchChanged>();
        let settings = Settings::load(Storage::new(dir.path())).await;
        let tx = Arc::new(RecordingTransmitter::default());

        let bank = SwitchBank::new("01011", tx.clone(), settings, bus)
            .await
            .unwrap();
        bank.send(SwitchChannel::B, true).await.unwrap();

        let frames = tx.frames.lock().unwrap().clone();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], frames[1]);

        assert!(bank.state().await.b);
        assert!(rx.recv().await.unwrap().data.state.b);
    }

    #[tokio::test]
    async fn test_state_restored_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::new());
        let tx = Arc::new(RecordingTransmitter::default());

        {
            let settings = Settings::load(Storage::new(dir.path())).await;
            let bank = SwitchBank::new("01011", tx.clone(), settings, bus.clone())
                .await
                .unwrap();
            bank.send(SwitchChannel::C, true).await.unwrap();
        }

        let settings = Settings::load(Storage::new(dir.path())).await;
        let bank = SwitchBank::new("01011", tx, settings, bus).await.unwrap();
        assert!(bank.state().await.c);
    }

    #[tokio::test]
    async fn test_invalid_code_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::new());
        let settings = Settings::load(Storage::new(dir.path())).await;
        let tx = Arc::new(RecordingTransmitter::default());

        assert!(matches!(
            SwitchBank::new("10a11", tx, settings, bus).await,
            Err(ActuatorError::InvalidCode(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_inverts() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::new());
        let settings = Settings::load(Storage::new(dir.path())).await;
        let tx = Arc::new(RecordingTransmitter::default());

        let bank = SwitchBank::new("01011", tx, settings, bus).await.unwrap();
        assert!(bank.toggle(SwitchChannel::B).await.unwrap());
        assert!(!bank.toggle(SwitchChannel::B).await.unwrap());
    }
}
