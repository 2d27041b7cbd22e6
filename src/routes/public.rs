use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints answered locally by the edge. They classify as public paths, so the gate
/// allows them for anonymous and authenticated callers alike.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Monitoring and load balancer check. Returns "ok" without touching the origin.
        .route("/health", get(handlers::health))
}
