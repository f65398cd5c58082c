use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::position::{PositionPolicy, PositionResponse, QuotaState};

use super::state::AppState;

// ─── POST /api/position ──────────────────────────────────────────

/// Resolve one request. Always 200: an unresolvable or unparsable request
/// is answered with `{}`.
pub async fn position(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let start = Instant::now();

    let raw: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let resolver = state.resolver.clone();

    // providers are blocking HTTP clients
    let resolved = tokio::task::spawn_blocking(move || resolver.resolve(&raw)).await;
    let response = match resolved {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("resolution task failed: {}", e);
            PositionResponse::empty()
        }
    };

    tracing::debug!(
        "POST /api/position -> {} ({:.1}ms)",
        if response.is_empty() { "empty" } else { "resolved" },
        start.elapsed().as_secs_f64() * 1000.0,
    );

    (StatusCode::OK, Json(response)).into_response()
}

// ─── Quota ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct QuotaBody {
    pub count: u64,
    pub day: NaiveDate,
    pub limit: u64,
    pub reached: bool,
}

fn quota_body(state: &AppState) -> QuotaBody {
    let QuotaState { count, day } = state.resolver.quota().snapshot();
    let limit = state.resolver.policy().daily_limit();
    QuotaBody {
        count,
        day,
        limit,
        reached: count >= limit,
    }
}

pub async fn quota(State(state): State<Arc<AppState>>) -> Json<QuotaBody> {
    Json(quota_body(&state))
}

pub async fn quota_reset(State(state): State<Arc<AppState>>) -> Json<QuotaBody> {
    state.resolver.quota().reset();
    Json(quota_body(&state))
}

// ─── Health ──────────────────────────────────────────────────────

pub async fn health() -> Json<Value> {
    Json(serde_json::json!({"status": "ok"}))
}
