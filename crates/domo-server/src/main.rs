//! domo home controller
//!
//! Main entry point: loads configuration, wires trackers, actuators,
//! collaborators and the orchestrator onto one event bus, then serves the
//! HTTP control surface until interrupted.

mod collab;
mod drivers;

use anyhow::{Context as _, Result};
use chrono::Utc;
use domo_actuators::{DoorRelay, RelayLine, RfTransmitter, SwitchBank, DEFAULT_PULSE};
use domo_api::AppState;
use domo_bulb::{BulbChannel, TcpBulbConnection};
use domo_config::DomoConfig;
use domo_event_bus::{EventBus, SharedEventBus};
use domo_orchestrator::{Orchestrator, OrchestratorDeps};
use domo_storage::{Settings, Storage};
use domo_trackers::{
    EnvTracker, HttpForecastSource, MotionTracker, PresenceTracker, SolarCalculator, SolarTracker,
    SunTimes,
};
use drivers::{
    BridgeClimateSensor, BridgeProbe, BridgeRelay, BridgeTransmitter, DriverBridge, LogRelay,
    LogTransmitter,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const WIDGET_REFRESH: Duration = Duration::from_secs(60);
const HISTORY_CADENCE: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DOMO_CONFIG").ok())
        .unwrap_or_else(|| "/etc/domo/config.yaml".to_string());
    let config = DomoConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    info!(config = %config_path, "Starting domo");

    let bus: SharedEventBus = Arc::new(EventBus::new());

    let settings = if config.storage.persist {
        Settings::load(Storage::new(&config.storage.dir)).await
    } else {
        info!("Persistence disabled, settings are in-memory only");
        Settings::ephemeral()
    };

    // Trackers
    let presence = PresenceTracker::new(bus.clone());
    let motion = MotionTracker::new(
        bus.clone(),
        settings.clone(),
        Duration::from_secs(config.motion.refresh_secs),
    )
    .await;
    let sun_times: Arc<dyn SunTimes> = Arc::new(SolarCalculator::new(
        config.location.latitude,
        config.location.longitude,
        config.solar.twilight_offset_mins,
    ));
    let solar = SolarTracker::new(bus.clone(), sun_times.as_ref());
    let env = EnvTracker::new(bus.clone(), config.environment.max_jump_c);

    // Bulb command channel over its TCP connection
    let connection = Arc::new(TcpBulbConnection::new(
        config.bulb.addr.clone(),
        config.bulb.transition_ms,
    ));
    let bulb = BulbChannel::new(connection, bus.clone());

    // Actuators, driven through the driver daemon when one is configured
    let bridge = config
        .drivers
        .as_ref()
        .map(|d| DriverBridge::new(d.base_url.clone()));
    let transmitter: Arc<dyn RfTransmitter> = match &bridge {
        Some(bridge) => Arc::new(BridgeTransmitter(bridge.clone())),
        None => Arc::new(LogTransmitter),
    };
    let relay_line: Arc<dyn RelayLine> = match &bridge {
        Some(bridge) => Arc::new(BridgeRelay(bridge.clone())),
        None => Arc::new(LogRelay),
    };
    let switches = SwitchBank::new(
        config.switch_code.clone(),
        transmitter,
        settings.clone(),
        bus.clone(),
    )
    .await
    .context("creating switch bank")?;
    let relay = DoorRelay::new(relay_line, DEFAULT_PULSE);

    // Collaborators
    let notifier = collab::notifier(&config.alerts);
    let widgets = collab::widget_board(config.widgets.as_ref());
    let history = collab::weather_history(config.history.as_ref());

    let orchestrator = Orchestrator::new(
        OrchestratorDeps {
            bus: bus.clone(),
            settings: settings.clone(),
            presence: presence.clone(),
            solar: solar.clone(),
            env: env.clone(),
            bulb: bulb.clone(),
            switches: switches.clone(),
            notifier,
            widgets: widgets.clone(),
            history,
        },
        config.alerts.temp_alert_c,
    );

    // Background loops
    tokio::spawn(
        solar
            .clone()
            .run(sun_times, Duration::from_secs(config.solar.poll_secs)),
    );
    tokio::spawn(
        bulb.clone()
            .run_refresh(Duration::from_secs(config.bulb.refresh_secs)),
    );
    tokio::spawn(orchestrator.clone().run());
    tokio::spawn(orchestrator.clone().run_widget_job(WIDGET_REFRESH));
    tokio::spawn(orchestrator.run_history_job(HISTORY_CADENCE));

    if let Some(bridge) = &bridge {
        tokio::spawn(presence.clone().run_probe(
            BridgeProbe {
                bridge: bridge.clone(),
                device: config.presence.device.clone(),
            },
            Duration::from_secs(config.presence.poll_secs),
        ));
        tokio::spawn(env.clone().run_indoor(
            BridgeClimateSensor(bridge.clone()),
            Duration::from_secs(config.environment.indoor_poll_secs),
        ));
    }
    if let Some(url) = &config.environment.forecast_url {
        tokio::spawn(env.clone().run_outdoor(
            HttpForecastSource::new(url.clone()),
            Duration::from_secs(config.environment.outdoor_poll_secs),
        ));
    }

    // HTTP control surface
    let state = AppState {
        settings,
        presence,
        motion,
        solar,
        env,
        bulb,
        switches,
        relay,
        widgets,
        access_token: Arc::new(config.http.access_token.clone()),
        started_at: Utc::now(),
    };
    let bind = config.http.bind.clone();
    tokio::spawn(async move {
        if let Err(err) = domo_api::start_server(state, &bind).await {
            error!(error = %err, "API server exited");
        }
    });

    info!("domo is running");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
