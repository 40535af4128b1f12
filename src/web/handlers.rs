//! HTTP request handlers.

use super::AppState;
use crate::config::RuntimeConfig;
use crate::record::ProbeRecord;
use crate::summary::window;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

// Template rendered by simple string replacement, no template engine.
const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");

// ============================================================================
// Dashboard
// ============================================================================

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let runtime = RuntimeConfig::load(&state.config);

    let page = DASHBOARD_TEMPLATE
        .replace("{{targets}}", &runtime.targets)
        .replace("{{interval}}", &runtime.interval_seconds)
        .replace("{{max_records}}", &state.config.max_records.to_string());

    Html(page)
}

// ============================================================================
// API: raw records
// ============================================================================

pub async fn handle_data(State(state): State<AppState>) -> impl IntoResponse {
    let records = window::tail_records(&state.config.log_path, state.config.max_records);
    Json(records)
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    #[serde(default)]
    pub date: String,
}

pub async fn handle_day(
    State(state): State<AppState>,
    Query(query): Query<DayQuery>,
) -> Json<Vec<ProbeRecord>> {
    Json(window::records_for_day(&state.config.log_path, &query.date))
}

// ============================================================================
// API: daily summary
// ============================================================================

pub async fn handle_daily(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.cache.get_snapshot();
    Json((*snapshot).clone())
}

pub async fn handle_rebuild(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(built_at) = state.cache.built_at() {
        tracing::info!("Clearing summary cache built at {}", built_at);
    }
    state.cache.invalidate();
    Json(json!({"ok": true, "message": "Summary cache cleared."}))
}

// ============================================================================
// API: runtime configuration
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateConfigRequest {
    #[serde(default)]
    pub targets: String,
    #[serde(default)]
    pub interval_seconds: String,
}

pub async fn handle_update_config(
    State(state): State<AppState>,
    Json(req): Json<UpdateConfigRequest>,
) -> impl IntoResponse {
    let targets = req.targets.trim();
    let mut interval = req.interval_seconds.trim();
    if !interval.is_empty() && !interval.bytes().all(|b| b.is_ascii_digit()) {
        interval = "";
    }

    if let Err(e) = RuntimeConfig::save(&state.config.config_path, targets, interval) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"ok": false, "error": e.to_string()})),
        )
            .into_response();
    }

    let runtime = RuntimeConfig::load(&state.config);
    Json(json!({
        "ok": true,
        "targets_display": runtime.targets,
        "interval_seconds": runtime.interval_seconds,
    }))
    .into_response()
}
