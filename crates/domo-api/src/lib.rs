//! HTTP control surface
//!
//! Every route is a thin adapter over a tracker, the bulb channel or an
//! actuator. Handlers never hold domain state of their own; a command goes
//! through the same serialized paths the automation rules use, so a curl
//! and a rule can never race each other at the device.
//!
//! All routes except the health check require the configured access token,
//! supplied either as a `token` query parameter or an `Authorization:
//! Bearer` header.

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use domo_actuators::{ActuatorError, DoorRelay, SwitchBank};
use domo_bulb::{parse_color, BulbChannel, BulbError};
use domo_core::{
    BulbState, CollabError, EnvState, MotionState, PresenceState, SolarState, SwitchBankState,
    SwitchChannel, WidgetBoard,
};
use domo_storage::Settings;
use domo_trackers::{EnvTracker, IndoorReading, MotionTracker, PresenceTracker, SolarTracker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub presence: Arc<PresenceTracker>,
    pub motion: Arc<MotionTracker>,
    pub solar: Arc<SolarTracker>,
    pub env: Arc<EnvTracker>,
    pub bulb: Arc<BulbChannel>,
    pub switches: Arc<SwitchBank>,
    pub relay: Arc<DoorRelay>,
    pub widgets: Arc<dyn WidgetBoard>,
    pub access_token: Arc<String>,
    pub started_at: DateTime<Utc>,
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Handler-level error with its HTTP mapping
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<BulbError> for ApiError {
    /// Validation failures are the caller's fault; everything else means
    /// the device did not cooperate.
    fn from(err: BulbError) -> Self {
        let status = if err.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<ActuatorError> for ApiError {
    fn from(err: ActuatorError) -> Self {
        let status = match err {
            ActuatorError::InvalidCode(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<CollabError> for ApiError {
    fn from(err: CollabError) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: err.to_string(),
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let guarded = Router::new()
        .route("/api/", get(api_status))
        .route("/api/info", get(get_info))
        .route("/api/light-toggle", get(light_toggle))
        .route("/api/light-on", get(light_on))
        .route("/api/light-off", get(light_off))
        .route("/api/cam-toggle", get(cam_toggle))
        .route("/api/switch/:channel/:action", get(switch_set))
        .route("/api/automation-toggle", get(automation_toggle))
        .route("/api/radio-play", get(radio_play))
        .route("/api/radio-stop", get(radio_stop))
        .route("/api/open", get(open_door))
        .route("/api/ingest/motion", post(ingest_motion))
        .route("/api/ingest/presence", post(ingest_presence))
        .route("/api/ingest/climate", post(ingest_climate))
        .layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/api/health", get(health_check))
        .merge(guarded)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server
pub async fn start_server(state: AppState, addr: &str) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);
    axum::serve(listener, router).await
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Token guard applied to every route except the health check
async fn require_token(
    State(state): State<AppState>,
    Query(params): Query<TokenQuery>,
    request: Request,
    next: Next,
) -> Response {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let supplied = params.token.as_deref().or(bearer);
    if supplied != Some(state.access_token.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                message: "invalid access token".to_string(),
            }),
        )
            .into_response();
    }

    next.run(request).await
}

// ==================== Handlers ====================

#[derive(Serialize)]
struct ApiStatus {
    message: &'static str,
}

/// GET /api/ - Returns API status
async fn api_status() -> Json<ApiStatus> {
    Json(ApiStatus {
        message: "API running.",
    })
}

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Consolidated controller snapshot
#[derive(Serialize)]
struct InfoResponse {
    version: &'static str,
    uptime_secs: i64,
    automation: bool,
    first_move: bool,
    presence: PresenceState,
    motion: MotionState,
    solar: SolarState,
    env: EnvState,
    bulb: BulbState,
    switches: SwitchBankState,
}

/// GET /api/info - Everything a dashboard needs in one response
async fn get_info(State(state): State<AppState>) -> Result<Json<InfoResponse>, ApiError> {
    let bulb = state.bulb.state(false).await?;

    Ok(Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        automation: state.settings.automation().await,
        first_move: state.settings.first_move().await,
        presence: state.presence.state(),
        motion: state.motion.state().await,
        solar: state.solar.state(),
        env: state.env.state().await,
        bulb,
        switches: state.switches.state().await,
    }))
}

/// GET /api/light-toggle - Invert bulb power
async fn light_toggle(State(state): State<AppState>) -> Result<Json<BulbState>, ApiError> {
    Ok(Json(state.bulb.toggle(None).await?))
}

#[derive(Deserialize)]
struct LightOnParams {
    color: Option<String>,
    temperature: Option<u16>,
    brightness: Option<u8>,
}

/// GET /api/light-on - Power on, optionally with a color or a white point
async fn light_on(
    State(state): State<AppState>,
    Query(params): Query<LightOnParams>,
) -> Result<Json<BulbState>, ApiError> {
    let state = match (params.color, params.temperature) {
        (Some(_), Some(_)) => {
            return Err(ApiError::bad_request(
                "color and temperature are mutually exclusive",
            ));
        }
        (Some(hex), None) => {
            let color = parse_color(&hex)?;
            state.bulb.set_color(color, params.brightness).await?
        }
        (None, Some(kelvin)) => {
            state
                .bulb
                .set_color_temp(kelvin, params.brightness)
                .await?
        }
        (None, None) => state.bulb.turn_on().await?,
    };
    Ok(Json(state))
}

/// GET /api/light-off - Power off
async fn light_off(State(state): State<AppState>) -> Result<Json<BulbState>, ApiError> {
    Ok(Json(state.bulb.turn_off().await?))
}

#[derive(Serialize)]
struct SwitchResponse {
    channel: SwitchChannel,
    on: bool,
    switches: SwitchBankState,
}

/// GET /api/cam-toggle - Toggle the camera's power plug
async fn cam_toggle(State(state): State<AppState>) -> Result<Json<SwitchResponse>, ApiError> {
    let on = state.switches.toggle(SwitchChannel::B).await?;
    Ok(Json(SwitchResponse {
        channel: SwitchChannel::B,
        on,
        switches: state.switches.state().await,
    }))
}

/// GET /api/switch/{channel}/{action} - Drive one switch bank channel
async fn switch_set(
    State(state): State<AppState>,
    Path((channel, action)): Path<(String, String)>,
) -> Result<Json<SwitchResponse>, ApiError> {
    let channel: SwitchChannel = channel
        .parse()
        .map_err(|_| ApiError::bad_request(format!("unknown switch channel: {channel}")))?;

    let on = match action.as_str() {
        "on" => {
            state.switches.send(channel, true).await?;
            true
        }
        "off" => {
            state.switches.send(channel, false).await?;
            false
        }
        "toggle" => state.switches.toggle(channel).await?,
        other => {
            return Err(ApiError::bad_request(format!(
                "unknown switch action: {other}, expected on, off or toggle"
            )));
        }
    };

    Ok(Json(SwitchResponse {
        channel,
        on,
        switches: state.switches.state().await,
    }))
}

#[derive(Serialize)]
struct AutomationResponse {
    automation: bool,
}

/// GET /api/automation-toggle - Flip the automation flag
async fn automation_toggle(State(state): State<AppState>) -> Json<AutomationResponse> {
    let enabled = !state.settings.automation().await;
    state.settings.set_automation(enabled).await;
    info!(enabled, "Automation toggled via API");
    Json(AutomationResponse {
        automation: enabled,
    })
}

#[derive(Serialize)]
struct ActionResponse {
    message: &'static str,
}

/// GET /api/radio-play - Ask the widget board to start the radio
async fn radio_play(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    state.widgets.send_action("radio.play").await?;
    Ok(Json(ActionResponse {
        message: "radio started",
    }))
}

/// GET /api/radio-stop - Ask the widget board to stop the radio
async fn radio_stop(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    state.widgets.send_action("radio.stop").await?;
    Ok(Json(ActionResponse {
        message: "radio stopped",
    }))
}

/// GET /api/open - Pulse the door relay
async fn open_door(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    state.relay.open().await?;
    Ok(Json(ActionResponse {
        message: "door opened",
    }))
}

// ==================== Ingest ====================
//
// Drivers that cannot run in this process (a proximity watcher on another
// host, a PIR sensor behind a microcontroller) push their readings here.

#[derive(Deserialize)]
struct MotionIngest {
    active: bool,
}

/// POST /api/ingest/motion - Report a motion edge
async fn ingest_motion(
    State(state): State<AppState>,
    Json(body): Json<MotionIngest>,
) -> Json<MotionState> {
    if body.active {
        state.motion.rising().await;
    } else {
        state.motion.falling().await;
    }
    Json(state.motion.state().await)
}

#[derive(Deserialize)]
struct PresenceIngest {
    in_range: bool,
}

/// POST /api/ingest/presence - Report a proximity probe result
async fn ingest_presence(
    State(state): State<AppState>,
    Json(body): Json<PresenceIngest>,
) -> Json<PresenceState> {
    state.presence.report(body.in_range);
    Json(state.presence.state())
}

#[derive(Deserialize)]
struct ClimateIngest {
    temp_c: f64,
    humidity_pct: f64,
}

#[derive(Serialize)]
struct ClimateIngestResponse {
    accepted: bool,
}

/// POST /api/ingest/climate - Submit one indoor climate sample
///
/// The sample runs through the same anti-spike filter as an in-process
/// sensor; a rejected spike reports `accepted: false`.
async fn ingest_climate(
    State(state): State<AppState>,
    Json(body): Json<ClimateIngest>,
) -> Json<ClimateIngestResponse> {
    let accepted = state
        .env
        .submit_indoor(IndoorReading {
            temp_c: body.temp_c,
            humidity_pct: body.humidity_pct,
        })
        .await;
    Json(ClimateIngestResponse { accepted })
}
