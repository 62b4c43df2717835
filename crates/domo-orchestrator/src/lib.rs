//! Automation orchestrator
//!
//! The rule core of domo. It holds no sensor I/O of its own: it subscribes
//! to tracker events on the bus, reads the other trackers' state at the
//! moment each event arrives, and issues idempotent commands to the
//! actuators and collaborator calls.
//!
//! Rule-triggered actuator commands are best-effort side effects: failures
//! are logged at the handler boundary and never propagate, so a dead bulb
//! cannot stop the away-posture rule from running on the next event.

mod readers;

pub use readers::{EnvReader, MotionReader, PresenceReader, SolarReader};

use domo_actuators::SwitchBank;
use domo_bulb::BulbChannel;
use domo_core::events::{
    BulbChanged, EnvChanged, MotionStarted, PresenceChanged, SunriseReached, SunsetReached,
};
use domo_core::{
    EnvScope, Notifier, PresenceState, SwitchChannel, WeatherHistory, WeatherSample, WidgetBoard,
};
use domo_event_bus::SharedEventBus;
use domo_storage::Settings;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Temperature alert hysteresis state
///
/// The simple zero/nonzero variant: `last_alert_temp_c == 0` means no alert
/// cycle is in progress. A new alert fires only when the reading moved at
/// least one degree from the last alerted value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TempAlertState {
    pub last_alert_temp_c: f64,
    pub alert_count: u32,
}

/// Everything the orchestrator is wired to
pub struct OrchestratorDeps {
    pub bus: SharedEventBus,
    pub settings: Settings,
    pub presence: Arc<dyn PresenceReader>,
    pub solar: Arc<dyn SolarReader>,
    pub env: Arc<dyn EnvReader>,
    pub bulb: Arc<BulbChannel>,
    pub switches: Arc<SwitchBank>,
    pub notifier: Arc<dyn Notifier>,
    pub widgets: Arc<dyn WidgetBoard>,
    pub history: Arc<dyn WeatherHistory>,
}

/// The rule engine
pub struct Orchestrator {
    bus: SharedEventBus,
    settings: Settings,
    presence: Arc<dyn PresenceReader>,
    solar: Arc<dyn SolarReader>,
    env: Arc<dyn EnvReader>,
    bulb: Arc<BulbChannel>,
    switches: Arc<SwitchBank>,
    notifier: Arc<dyn Notifier>,
    widgets: Arc<dyn WidgetBoard>,
    history: Arc<dyn WeatherHistory>,
    temp_alert_c: f64,
    alert: Mutex<TempAlertState>,
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps, temp_alert_c: f64) -> Arc<Self> {
        Arc::new(Self {
            bus: deps.bus,
            settings: deps.settings,
            presence: deps.presence,
            solar: deps.solar,
            env: deps.env,
            bulb: deps.bulb,
            switches: deps.switches,
            notifier: deps.notifier,
            widgets: deps.widgets,
            history: deps.history,
            temp_alert_c,
            alert: Mutex::new(TempAlertState::default()),
        })
    }

    /// Current hysteresis state, for the status snapshot
    pub async fn temp_alert(&self) -> TempAlertState {
        *self.alert.lock().await
    }

    /// Flip the automation flag, returning the new value
    pub async fn toggle_automation(&self) -> bool {
        let enabled = !self.settings.automation().await;
        self.settings.set_automation(enabled).await;
        info!(enabled, "Automation toggled");
        enabled
    }

    /// Subscribe to all tracker events and react until the bus closes
    pub async fn run(self: Arc<Self>) {
        let mut presence_rx = self.bus.subscribe_typed::<PresenceChanged>();
        let mut motion_rx = self.bus.subscribe_typed::<MotionStarted>();
        let mut sunset_rx = self.bus.subscribe_typed::<SunsetReached>();
        let mut sunrise_rx = self.bus.subscribe_typed::<SunriseReached>();
        let mut env_rx = self.bus.subscribe_typed::<EnvChanged>();
        let mut bulb_rx = self.bus.subscribe_typed::<BulbChanged>();

        info!("Orchestrator running");

        loop {
            tokio::select! {
                event = presence_rx.recv() => match event {
                    Ok(event) => self.on_presence_changed(event.data.state).await,
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Presence events lagged"),
                    Err(RecvError::Closed) => break,
                },
                event = motion_rx.recv() => match event {
                    Ok(_) => self.on_motion_started().await,
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Motion events lagged"),
                    Err(RecvError::Closed) => break,
                },
                event = sunset_rx.recv() => match event {
                    Ok(_) => self.on_sunset().await,
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Sunset events lagged"),
                    Err(RecvError::Closed) => break,
                },
                event = sunrise_rx.recv() => match event {
                    Ok(_) => self.on_sunrise().await,
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Sunrise events lagged"),
                    Err(RecvError::Closed) => break,
                },
                event = env_rx.recv() => match event {
                    Ok(event) => self.on_env_changed(event.data).await,
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Env events lagged"),
                    Err(RecvError::Closed) => break,
                },
                event = bulb_rx.recv() => match event {
                    Ok(event) => self.push_light_widget(event.data.state.power).await,
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Bulb events lagged"),
                    Err(RecvError::Closed) => break,
                },
            }
        }

        info!("Orchestrator stopped");
    }

    /// Temperature alert rule, fed by indoor climate changes
    ///
    /// No alert while the owner is in range, and at most one alert per
    /// one-degree step while hot. Dropping back below the threshold zeroes
    /// the cycle through one final notification.
    pub async fn on_env_changed(&self, event: EnvChanged) {
        if event.scope != EnvScope::Indoor {
            return;
        }
        let Some(temp) = event.state.indoor_temp_c else {
            return;
        };

        if self.presence.presence().in_range {
            self.reset_temp_alert().await;
            return;
        }

        let mut alert = self.alert.lock().await;
        let diff = (temp - alert.last_alert_temp_c).abs();
        let is_big = temp >= self.temp_alert_c;

        if (is_big || alert.last_alert_temp_c != 0.0) && diff >= 1.0 {
            let message = format!("temperature {temp:.1} °C");
            if let Err(err) = self.notifier.send(&message).await {
                warn!(error = %err, "Temperature notification failed");
            }
            alert.last_alert_temp_c = if is_big { temp } else { 0.0 };
            alert.alert_count += 1;
        }
    }

    /// Presence rule: away/home posture plus latch re-arm
    pub async fn on_presence_changed(&self, state: PresenceState) {
        if !state.in_range {
            // Leaving re-arms the first-motion latch.
            self.settings.set_first_move(false).await;

            if self.settings.automation().await {
                debug!("Applying away posture");
                if let Err(err) = self.switches.send(SwitchChannel::B, true).await {
                    warn!(error = %err, "Away posture: switch command failed");
                }
                if let Err(err) = self.widgets.send_action("radio.stop").await {
                    warn!(error = %err, "Away posture: radio stop failed");
                }
                if let Err(err) = self.bulb.turn_off().await {
                    warn!(error = %err, "Away posture: light off failed");
                }
            }
        } else {
            self.reset_temp_alert().await;

            if self.settings.automation().await {
                debug!("Applying home posture");
                if let Err(err) = self.switches.send(SwitchChannel::B, false).await {
                    warn!(error = %err, "Home posture: switch command failed");
                }
            }
        }
    }

    /// First-motion rule: one-shot per away/home cycle
    pub async fn on_motion_started(&self) {
        if self.settings.first_move().await {
            return;
        }
        self.settings.set_first_move(true).await;

        let presence = self.presence.presence();
        if presence.in_range {
            if self.solar.solar().is_night && self.settings.automation().await {
                if let Err(err) = self.bulb.turn_on().await {
                    warn!(error = %err, "First-motion light on failed");
                }
            }
        } else {
            info!("Motion while away, raising alarm");
            if let Err(err) = self.notifier.send("alarm").await {
                warn!(error = %err, "Alarm notification failed");
            }
        }
    }

    /// Sunset rule: light on when home
    pub async fn on_sunset(&self) {
        if self.presence.presence().in_range && self.settings.automation().await {
            if let Err(err) = self.bulb.turn_on().await {
                warn!(error = %err, "Sunset light on failed");
            }
        }
    }

    /// Sunrise rule: light off
    pub async fn on_sunrise(&self) {
        if self.settings.automation().await {
            if let Err(err) = self.bulb.turn_off().await {
                warn!(error = %err, "Sunrise light off failed");
            }
        }
    }

    /// Refresh the dashboard light widget on a fixed cadence
    pub async fn run_widget_job(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.bulb.state(false).await {
                Ok(state) => self.push_light_widget(state.power).await,
                Err(err) => debug!(error = %err, "Widget refresh skipped"),
            }
        }
    }

    /// Hand climate snapshots to the history collaborator on a fixed cadence
    pub async fn run_history_job(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let env = self.env.env().await;

            let sample = WeatherSample::from_env(&env, chrono::Utc::now());
            if let Err(err) = self.history.record(&sample).await {
                warn!(error = %err, "Weather history record failed");
            }
            if let Err(err) = self.widgets.update_weather_widget(&env).await {
                debug!(error = %err, "Weather widget update failed");
            }
        }
    }

    async fn push_light_widget(&self, power: bool) {
        if let Err(err) = self.widgets.update_light_widget(power).await {
            debug!(error = %err, "Light widget update failed");
        }
    }

    async fn reset_temp_alert(&self) {
        let mut alert = self.alert.lock().await;
        if *alert != TempAlertState::default() {
            debug!("Temperature alert hysteresis reset");
        }
        *alert = TempAlertState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domo_actuators::{ActuatorError, RfTransmitter};
    use domo_bulb::{BulbConnection, BulbError};
    use domo_core::{BulbState, CollabError, EnvState, RgbColor, SolarState};
    use domo_event_bus::EventBus;
    use domo_storage::{Settings, Storage};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FakePresence(AtomicBool);

    impl PresenceReader for FakePresence {
        fn presence(&self) -> PresenceState {
            PresenceState {
                in_range: self.0.load(Ordering::SeqCst),
            }
        }
    }

    struct FakeSolar(AtomicBool);

    impl SolarReader for FakeSolar {
        fn solar(&self) -> SolarState {
            SolarState {
                is_night: self.0.load(Ordering::SeqCst),
            }
        }
    }

    struct FakeEnv;

    #[async_trait]
    impl EnvReader for FakeEnv {
        async fn env(&self) -> EnvState {
            EnvState::default()
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: &str) -> Result<(), CollabError> {
            self.messages.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingWidgets {
        actions: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl WidgetBoard for RecordingWidgets {
        async fn update_light_widget(&self, _power: bool) -> Result<(), CollabError> {
            Ok(())
        }
        async fn update_weather_widget(&self, _env: &EnvState) -> Result<(), CollabError> {
            Ok(())
        }
        async fn send_action(&self, action_id: &str) -> Result<(), CollabError> {
            self.actions.lock().unwrap().push(action_id.to_string());
            Ok(())
        }
    }

    struct NullHistory;

    #[async_trait]
    impl WeatherHistory for NullHistory {
        async fn record(&self, _sample: &WeatherSample) -> Result<(), CollabError> {
            Ok(())
        }
    }

    /// Bulb connection that counts power commands and can fail
    #[derive(Default)]
    struct CountingBulb {
        state: StdMutex<BulbState>,
        on_commands: AtomicU32,
        off_commands: AtomicU32,
        fail: AtomicBool,
    }

    #[async_trait]
    impl BulbConnection for CountingBulb {
        async fn connect(&self) -> Result<(), BulbError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BulbError::Device("unreachable".into()));
            }
            Ok(())
        }
        async fn set_power(&self, on: bool) -> Result<(), BulbError> {
            if on {
                self.on_commands.fetch_add(1, Ordering::SeqCst);
            } else {
                self.off_commands.fetch_add(1, Ordering::SeqCst);
            }
            self.state.lock().unwrap().power = on;
            Ok(())
        }
        async fn set_color(
            &self,
            _color: RgbColor,
            _brightness_pct: Option<u8>,
        ) -> Result<(), BulbError> {
            Ok(())
        }
        async fn set_color_temp(
            &self,
            _kelvin: u16,
            _brightness_pct: Option<u8>,
        ) -> Result<(), BulbError> {
            Ok(())
        }
        async fn query(&self) -> Result<BulbState, BulbError> {
            Ok(self.state.lock().unwrap().clone())
        }
        async fn disconnect(&self) {}
    }

    struct NullTransmitter;

    #[async_trait]
    impl RfTransmitter for NullTransmitter {
        async fn transmit(&self, _frame: &str) -> Result<(), ActuatorError> {
            Ok(())
        }
    }

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        settings: Settings,
        presence: Arc<FakePresence>,
        solar: Arc<FakeSolar>,
        notifier: Arc<RecordingNotifier>,
        widgets: Arc<RecordingWidgets>,
        bulb_device: Arc<CountingBulb>,
        switches: Arc<SwitchBank>,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::new());
        let settings = Settings::load(Storage::new(dir.path())).await;

        let presence = Arc::new(FakePresence(AtomicBool::new(true)));
        let solar = Arc::new(FakeSolar(AtomicBool::new(false)));
        let notifier = Arc::new(RecordingNotifier::default());
        let widgets = Arc::new(RecordingWidgets::default());
        let bulb_device = Arc::new(CountingBulb::default());
        let bulb = BulbChannel::new(bulb_device.clone(), bus.clone());
        let switches = SwitchBank::new(
            "01011",
            Arc::new(NullTransmitter),
            settings.clone(),
            bus.clone(),
        )
        .await
        .unwrap();

        let orchestrator = Orchestrator::new(
            OrchestratorDeps {
                bus,
                settings: settings.clone(),
                presence: presence.clone(),
                solar: solar.clone(),
                env: Arc::new(FakeEnv),
                bulb,
                switches: switches.clone(),
                notifier: notifier.clone(),
                widgets: widgets.clone(),
                history: Arc::new(NullHistory),
            },
            30.0,
        );

        Harness {
            orchestrator,
            settings,
            presence,
            solar,
            notifier,
            widgets,
            bulb_device,
            switches,
            _dir: dir,
        }
    }

    fn indoor(temp: f64) -> EnvChanged {
        EnvChanged {
            scope: EnvScope::Indoor,
            state: EnvState {
                indoor_temp_c: Some(temp),
                indoor_humidity_pct: Some(40.0),
                ..EnvState::default()
            },
        }
    }

    #[tokio::test]
    async fn test_motion_while_away_raises_one_alarm_and_no_light() {
        let h = harness().await;
        h.settings.set_automation(true).await;
        h.presence.0.store(false, Ordering::SeqCst);

        h.orchestrator.on_motion_started().await;

        assert_eq!(h.notifier.messages.lock().unwrap().as_slice(), ["alarm"]);
        assert!(h.settings.first_move().await, "latch must be tripped");
        assert_eq!(h.bulb_device.on_commands.load(Ordering::SeqCst), 0);

        // Second motion in the same away cycle: latch already tripped.
        h.orchestrator.on_motion_started().await;
        assert_eq!(h.notifier.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_latch_rearms_on_leaving() {
        let h = harness().await;

        h.presence.0.store(false, Ordering::SeqCst);
        h.orchestrator.on_motion_started().await;
        assert!(h.settings.first_move().await);

        // Coming home and leaving again re-arms the latch.
        h.presence.0.store(true, Ordering::SeqCst);
        h.orchestrator
            .on_presence_changed(PresenceState { in_range: true })
            .await;
        assert!(h.settings.first_move().await, "return alone does not clear");

        h.presence.0.store(false, Ordering::SeqCst);
        h.orchestrator
            .on_presence_changed(PresenceState { in_range: false })
            .await;
        assert!(!h.settings.first_move().await);

        h.orchestrator.on_motion_started().await;
        assert_eq!(h.notifier.messages.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_first_motion_at_night_turns_light_on() {
        let h = harness().await;
        h.settings.set_automation(true).await;
        h.solar.0.store(true, Ordering::SeqCst);

        h.orchestrator.on_motion_started().await;

        assert_eq!(h.bulb_device.on_commands.load(Ordering::SeqCst), 1);
        assert!(h.notifier.messages.lock().unwrap().is_empty());

        // Latch tripped: repeated motion does not re-trigger.
        h.orchestrator.on_motion_started().await;
        assert_eq!(h.bulb_device.on_commands.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sunset_turns_light_on_once_when_home() {
        let h = harness().await;
        h.settings.set_automation(true).await;

        h.orchestrator.on_sunset().await;
        assert_eq!(h.bulb_device.on_commands.load(Ordering::SeqCst), 1);

        // Away or automation off: no command.
        h.presence.0.store(false, Ordering::SeqCst);
        h.orchestrator.on_sunset().await;
        assert_eq!(h.bulb_device.on_commands.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sunrise_turns_light_off_only_with_automation() {
        let h = harness().await;

        h.orchestrator.on_sunrise().await;
        assert_eq!(h.bulb_device.off_commands.load(Ordering::SeqCst), 0);

        h.settings.set_automation(true).await;
        h.orchestrator.on_sunrise().await;
        assert_eq!(h.bulb_device.off_commands.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_away_posture_runs_despite_bulb_failure() {
        let h = harness().await;
        h.settings.set_automation(true).await;
        h.bulb_device.fail.store(true, Ordering::SeqCst);

        h.presence.0.store(false, Ordering::SeqCst);
        h.orchestrator
            .on_presence_changed(PresenceState { in_range: false })
            .await;

        // Switch and radio still commanded, failure swallowed.
        assert!(h.switches.state().await.b);
        assert_eq!(
            h.widgets.actions.lock().unwrap().as_slice(),
            ["radio.stop"]
        );

        // Home posture switches B back off.
        h.presence.0.store(true, Ordering::SeqCst);
        h.orchestrator
            .on_presence_changed(PresenceState { in_range: true })
            .await;
        assert!(!h.switches.state().await.b);
    }

    #[tokio::test]
    async fn test_no_temperature_alert_while_home() {
        let h = harness().await;

        h.orchestrator.on_env_changed(indoor(45.0)).await;
        h.orchestrator.on_env_changed(indoor(50.0)).await;

        assert!(h.notifier.messages.lock().unwrap().is_empty());
        assert_eq!(h.orchestrator.temp_alert().await, TempAlertState::default());
    }

    #[tokio::test]
    async fn test_temperature_hysteresis_one_alert_per_degree_step() {
        let h = harness().await;
        h.presence.0.store(false, Ordering::SeqCst);

        // Below threshold, no cycle in progress: nothing.
        h.orchestrator.on_env_changed(indoor(25.0)).await;
        assert!(h.notifier.messages.lock().unwrap().is_empty());

        // Crosses the 30° threshold: first alert.
        h.orchestrator.on_env_changed(indoor(31.0)).await;
        assert_eq!(h.notifier.messages.lock().unwrap().len(), 1);

        // Less than one degree of movement: suppressed.
        h.orchestrator.on_env_changed(indoor(31.5)).await;
        assert_eq!(h.notifier.messages.lock().unwrap().len(), 1);

        // Full degree step: next alert.
        h.orchestrator.on_env_changed(indoor(32.5)).await;
        assert_eq!(h.notifier.messages.lock().unwrap().len(), 2);

        // Dropping below threshold: one final clearing notification,
        // cycle zeroed.
        h.orchestrator.on_env_changed(indoor(24.0)).await;
        assert_eq!(h.notifier.messages.lock().unwrap().len(), 3);
        assert_eq!(h.orchestrator.temp_alert().await.last_alert_temp_c, 0.0);

        // Still cool: no further alerts.
        h.orchestrator.on_env_changed(indoor(23.0)).await;
        assert_eq!(h.notifier.messages.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_alert_cycle_resets_when_owner_returns() {
        let h = harness().await;
        h.presence.0.store(false, Ordering::SeqCst);

        h.orchestrator.on_env_changed(indoor(35.0)).await;
        assert_eq!(h.orchestrator.temp_alert().await.last_alert_temp_c, 35.0);

        h.presence.0.store(true, Ordering::SeqCst);
        h.orchestrator
            .on_presence_changed(PresenceState { in_range: true })
            .await;
        assert_eq!(h.orchestrator.temp_alert().await, TempAlertState::default());
    }

    #[tokio::test]
    async fn test_outdoor_changes_never_alert() {
        let h = harness().await;
        h.presence.0.store(false, Ordering::SeqCst);

        h.orchestrator
            .on_env_changed(EnvChanged {
                scope: EnvScope::Outdoor,
                state: EnvState {
                    outdoor_temp_c: Some(45.0),
                    indoor_temp_c: Some(45.0),
                    ..EnvState::default()
                },
            })
            .await;

        assert!(h.notifier.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_loop_reacts_to_bus_events() {
        let h = harness().await;
        h.settings.set_automation(true).await;
        h.presence.0.store(false, Ordering::SeqCst);

        let bus = h.orchestrator.bus.clone();
        let runner = tokio::spawn(h.orchestrator.clone().run());

        // Give the loop a moment to subscribe before firing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.fire_typed(
            MotionStarted {
                at: chrono::Utc::now(),
            },
            domo_core::Context::new(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        runner.abort();

        assert_eq!(h.notifier.messages.lock().unwrap().as_slice(), ["alarm"]);
    }

    #[tokio::test]
    async fn test_toggle_automation_round_trip() {
        let h = harness().await;

        assert!(h.orchestrator.toggle_automation().await);
        assert!(h.settings.automation().await);
        assert!(!h.orchestrator.toggle_automation().await);
        assert!(!h.settings.automation().await);
    }
}
