use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::error::AppError;
use crate::state::ScanStore;
use crate::types::{ScanResult, ScanView, SmaWindow};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<ScanStore>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/scan", get(get_scan))
        .route("/scan/full", get(get_scan_full))
        .route("/health", get(get_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ScanQuery {
    pub window: Option<u32>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub universe_size: u64,
    pub scans_completed: u64,
    pub last_scan_at_secs: u64,
    pub last_symbols_ok: u64,
    pub last_symbols_short_history: u64,
    pub last_symbols_failed: u64,
    pub last_batches_failed: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// One window's ranked below-SMA list. An unsupported window is a 400, not
/// an empty result; a supported window before any scan data exists is a 503.
async fn get_scan(
    State(state): State<ApiState>,
    Query(params): Query<ScanQuery>,
) -> Result<Json<ScanView>, AppError> {
    let requested = params.window.unwrap_or(0);
    let window = SmaWindow::from_value(requested)
        .ok_or(AppError::UnsupportedWindow(requested))?;

    let view = state.store.view(window).ok_or(AppError::ScanNotReady)?;
    Ok(Json(view))
}

async fn get_scan_full(
    State(state): State<ApiState>,
) -> Result<Json<ScanResult>, AppError> {
    let latest = state.store.latest().ok_or(AppError::ScanNotReady)?;
    Ok(Json(latest.as_ref().clone()))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let h = &state.health;
    Json(HealthResponse {
        status: "ok",
        universe_size: h.universe_size.load(Ordering::Relaxed),
        scans_completed: h.scans_completed(),
        last_scan_at_secs: h.last_scan_at_secs(),
        last_symbols_ok: h.last_symbols_ok.load(Ordering::Relaxed),
        last_symbols_short_history: h.last_symbols_short_history.load(Ordering::Relaxed),
        last_symbols_failed: h.last_symbols_failed.load(Ordering::Relaxed),
        last_batches_failed: h.last_batches_failed.load(Ordering::Relaxed),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
