//! HTTP route handlers

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use super::shared::SharedStateHandle;
use super::types::{AckResponse, ApiInfo, LevelsResponse, SignalRequest, StatusResponse};
use super::websocket::ws_handler;

/// Build the router with all endpoints
pub fn create_router(state: SharedStateHandle) -> Router {
    Router::new()
        .route("/", get(get_info))
        .route("/api/status", get(get_status))
        .route("/api/levels", get(get_levels))
        .route("/api/signal", post(post_signal))
        .route("/data_plugins", get(ws_handler))
        .with_state(state)
}

async fn get_info() -> Json<ApiInfo> {
    Json(ApiInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_status(State(state): State<SharedStateHandle>) -> Json<StatusResponse> {
    let status = state.status();
    Json(StatusResponse {
        source: status.source,
        sample_rate: status.sample_rate,
        capture_active: status.capture_active,
        frames_processed: state.frames_processed(),
    })
}

async fn get_levels(State(state): State<SharedStateHandle>) -> Json<LevelsResponse> {
    let levels = state.levels();
    Json(LevelsResponse {
        signal: levels.signal,
        pilot: levels.pilot,
        rds: levels.rds,
        rds_locked: levels.rds_locked,
        mpx_total: levels.mpx_total,
        peak_left: levels.peak_left,
        peak_right: levels.peak_right,
    })
}

async fn post_signal(
    State(state): State<SharedStateHandle>,
    Json(req): Json<SignalRequest>,
) -> Json<AckResponse> {
    state.set_signal_percent(req.percent);
    Json(AckResponse { ok: true })
}
