//! Request handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::defaults;
use crate::controller::OperationController;
use crate::types::{HealthLevel, OperationStatus};

use super::envelope::{self, ApiError, ApiResult};

/// Samples returned by `/history` when no limit is given (30 min at 30 s).
const DEFAULT_HISTORY_LIMIT: usize = 60;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<OperationController>,
}

impl ApiState {
    pub fn new(controller: Arc<OperationController>) -> Self {
        Self { controller }
    }
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub operation_status: OperationStatus,
    pub health_level: HealthLevel,
    pub uptime_seconds: u64,
}

/// GET /health
///
/// 200 while the supervisor is operating; 503 once it is in `Error` or
/// shutting down.
pub async fn liveness(State(state): State<ApiState>) -> Response {
    let snapshot = state.controller.status();
    let alive = !snapshot.status.is_shutting_down() && snapshot.status != OperationStatus::Error;

    let body = LivenessResponse {
        status: if alive { "ok" } else { "unavailable" },
        operation_status: snapshot.status,
        health_level: snapshot.health_level,
        uptime_seconds: snapshot.uptime_seconds,
    };
    let code = if alive {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body)).into_response()
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> Response {
    envelope::data(state.controller.status())
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// GET /api/v1/history?limit=N
pub async fn get_history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 {
        return Err(ApiError::bad_request("limit must be at least 1"));
    }
    let limit = limit.min(defaults::HISTORY_QUERY_MAX);
    Ok(envelope::data(state.controller.history(Some(limit))))
}

/// GET /api/v1/components
pub async fn list_components(State(state): State<ApiState>) -> Response {
    envelope::data(state.controller.registry().snapshot())
}

/// GET /api/v1/components/:name
pub async fn get_component(State(state): State<ApiState>, Path(name): Path<String>) -> ApiResult {
    state
        .controller
        .registry()
        .get(&name)
        .map(envelope::data)
        .ok_or_else(|| ApiError::not_found(format!("no component named '{name}'")))
}
