use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::Response,
};

use crate::origin::PageOrigin;

/// health
///
/// [Public Route] Liveness probe for load balancers. Served by the edge itself, never
/// forwarded.
pub async fn health() -> &'static str {
    "ok"
}

/// forward_page
///
/// [Gated Fallback] Every path without a local route lands here after the gate
/// middleware allowed it, and is relayed to the page origin.
pub async fn forward_page(
    State(origin): State<PageOrigin>,
    request: Request,
) -> Result<Response, StatusCode> {
    origin.forward(request).await
}
