//! Read-only HTTP status surface
//!
//! - `GET /health` - liveness for load balancers and process managers
//! - `GET /api/v1/status` - full operation snapshot
//! - `GET /api/v1/history?limit=N` - most recent metrics samples
//! - `GET /api/v1/components[/:name]` - component bookkeeping
//!
//! Data routes answer with the `{ data, meta }` envelope from [`envelope`].

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::ApiState;

use axum::http::{header, Method};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Requests in flight at once on the status API.
const MAX_CONCURRENT_REQUESTS: usize = 64;

/// Same-origin by default; `OPWATCH_CORS_ORIGINS` allows a comma-separated list.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var("OPWATCH_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Build the application router.
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(routes::liveness_routes(state))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
