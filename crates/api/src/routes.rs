use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json,
    Router,
};
use runtime::{
    SimLogEvent, SimulationStatus, StatsSnapshot, DEFAULT_BULK_ORDER_COUNT, DEFAULT_BURST_COUNT,
    DEFAULT_BURST_SPACING,
};
use serde::{Deserialize, Serialize};
use traffic_core::SimulationConfig;

use crate::{state::AppState, ws};

/// Upper bound for one bulk or burst request.
pub const MAX_BATCH_COUNT: usize = 1_000;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/simulation/start", post(start_simulation))
        .route("/simulation/stop", post(stop_simulation))
        .route("/simulation/stats", get(simulation_stats))
        .route("/simulation/logs", get(simulation_logs))
        .route("/simulation/bulk-orders", post(bulk_orders))
        .route("/simulation/burst", post(load_burst))
        .route("/target/health", get(target_health))
        .route("/ws/events", get(ws::events_socket))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct StartSimulationRequest {
    mode: String,
    duration_seconds: u64,
    #[serde(default)]
    include_server_error: bool,
    #[serde(default)]
    include_not_found_error: bool,
    #[serde(default)]
    include_timeout_error: bool,
}

#[derive(Debug, Serialize)]
struct StartSimulationResponse {
    started: bool,
    status: SimulationStatus,
    tick_interval_ms: u64,
}

#[derive(Debug, Serialize)]
struct StopSimulationResponse {
    stopped: bool,
    status: SimulationStatus,
}

#[derive(Debug, Default, Deserialize)]
struct BulkOrdersRequest {
    count: Option<usize>,
}

#[derive(Debug, Serialize)]
struct BulkOrdersResponse {
    dispatched: usize,
}

#[derive(Debug, Default, Deserialize)]
struct LoadBurstRequest {
    count: Option<usize>,
    spacing_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct LoadBurstResponse {
    scheduled: usize,
    spacing_ms: u64,
}

#[derive(Debug, Serialize)]
struct TargetHealthResponse {
    healthy: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn bad_request(error: impl ToString) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn validate_count(count: usize) -> Result<usize, (StatusCode, Json<ErrorResponse>)> {
    if count == 0 || count > MAX_BATCH_COUNT {
        return Err(bad_request(format!(
            "count must be between 1 and {MAX_BATCH_COUNT}"
        )));
    }
    Ok(count)
}

async fn start_simulation(
    State(state): State<AppState>,
    Json(request): Json<StartSimulationRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let mode = state.mode_policy().resolve(&request.mode).map_err(bad_request)?;
    let config = SimulationConfig::new(mode, request.duration_seconds)
        .map_err(bad_request)?
        .with_server_error(request.include_server_error)
        .with_not_found_error(request.include_not_found_error)
        .with_timeout_error(request.include_timeout_error);

    let controller = state.controller();
    let started = controller.start(config);
    let active = controller.active_config().unwrap_or(config);

    Ok(Json(StartSimulationResponse {
        started,
        status: controller.status(),
        tick_interval_ms: u64::try_from(active.tick_interval().as_millis()).unwrap_or(u64::MAX),
    }))
}

async fn stop_simulation(State(state): State<AppState>) -> Json<StopSimulationResponse> {
    let controller = state.controller();
    let stopped = controller.stop();

    Json(StopSimulationResponse {
        stopped,
        status: controller.status(),
    })
}

async fn simulation_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.controller().snapshot())
}

async fn simulation_logs(State(state): State<AppState>) -> Json<Vec<SimLogEvent>> {
    Json(state.events().recent())
}

async fn bulk_orders(
    State(state): State<AppState>,
    request: Option<Json<BulkOrdersRequest>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let count = validate_count(request.count.unwrap_or(DEFAULT_BULK_ORDER_COUNT))?;
    let dispatched = state.controller().dispatch_bulk_orders(count);

    Ok((StatusCode::ACCEPTED, Json(BulkOrdersResponse { dispatched })))
}

async fn load_burst(
    State(state): State<AppState>,
    request: Option<Json<LoadBurstRequest>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let count = validate_count(request.count.unwrap_or(DEFAULT_BURST_COUNT))?;
    let spacing = request
        .spacing_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_BURST_SPACING);
    let scheduled = state.controller().schedule_load_burst(count, spacing);

    Ok((
        StatusCode::ACCEPTED,
        Json(LoadBurstResponse {
            scheduled,
            spacing_ms: u64::try_from(spacing.as_millis()).unwrap_or(u64::MAX),
        }),
    ))
}

async fn target_health(State(state): State<AppState>) -> Json<TargetHealthResponse> {
    Json(TargetHealthResponse {
        healthy: state.controller().probe_health().await,
    })
}
