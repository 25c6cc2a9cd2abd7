//! Route table

use axum::routing::get;
use axum::Router;

use super::handlers::{self, ApiState};

/// Data routes, nested under `/api/v1`.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/history", get(handlers::get_history))
        .route("/components", get(handlers::list_components))
        .route("/components/:name", get(handlers::get_component))
        .with_state(state)
}

/// Liveness probe at the root.
pub fn liveness_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::liveness))
        .with_state(state)
}
