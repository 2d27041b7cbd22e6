use std::borrow::Cow;

use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Edge services: session gating and forwarding to the page origin.
pub mod config;
pub mod gatekeeper;
pub mod handlers;
pub mod origin;
pub mod session;
pub mod telemetry;

// Authenticated realtime channel (Socket.IO client side).
pub mod realtime;

// Module for routing segregation (local endpoints vs. forwarded pages).
pub mod routes;
use gatekeeper::GateDecision;
use routes::{pages, public};
use session::{RoleTag, Session};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use origin::PageOrigin;
pub use realtime::{ChannelManager, ChannelStatus};

/// AppState
///
/// The single, immutable container of the edge's services, shared across all requests.
#[derive(Clone)]
pub struct AppState {
    /// Upstream that renders pages for allowed requests.
    pub origin: PageOrigin,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for PageOrigin {
    fn from_ref(app_state: &AppState) -> PageOrigin {
        app_state.origin.clone()
    }
}

/// gate_middleware
///
/// Runs the gatekeeper on every request before any route or the page fallback.
///
/// *Mechanism*: a path that is not in canonical form (dot segments, repeated or
/// backslash separators) is answered with `308 Permanent Redirect` to its canonical
/// form first, so the path that is gated is always the path the origin serves.
/// `Session` is extracted from the `token`/`role` cookies (never rejects), then
/// `gatekeeper::gate` decides. `Allow` passes the request on; a redirect answers
/// `307 Temporary Redirect` immediately.
async fn gate_middleware(session: Session, request: Request, next: Next) -> Response {
    if let Some(location) = canonical_location(request.uri()) {
        tracing::debug!(path = %request.uri().path(), %location, "non-canonical path");
        return Redirect::permanent(&location).into_response();
    }

    if let Some(RoleTag::Unrecognized(raw)) = session.role() {
        tracing::warn!(role = %raw, "unrecognized role cookie; routing falls back to root");
    }

    match gatekeeper::gate(request.uri().path(), &session) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::RedirectTo(target) => {
            tracing::debug!(path = %request.uri().path(), location = target, "gate redirect");
            Redirect::temporary(target).into_response()
        }
    }
}

/// The canonical path plus the original query, or `None` when `uri` is canonical.
fn canonical_location(uri: &Uri) -> Option<String> {
    let canonical = match gatekeeper::canonical_path(uri.path()) {
        Cow::Borrowed(_) => return None,
        Cow::Owned(canonical) => canonical,
    };
    Some(match uri.query() {
        Some(query) => format!("{canonical}?{query}"),
        None => canonical,
    })
}

/// create_router
///
/// Assembles the edge: local routes and the page fallback, all behind the gate, with
/// request correlation and tracing applied outermost.
pub fn create_router(state: AppState) -> Router {
    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(public::public_routes())
        .merge(pages::page_routes())
        // The gate wraps every route and the fallback.
        .layer(middleware::from_fn(gate_middleware))
        .with_state(state);

    base_router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Builds the per-request span with method, URI and the `x-request-id` set above, so
/// every log line of one request (including gate redirects) is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
