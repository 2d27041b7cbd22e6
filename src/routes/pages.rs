use crate::{AppState, handlers};
use axum::Router;

/// Pages Router Module
///
/// Everything not claimed by a local route is a page of the web client. Requests reach
/// this fallback only after the gate allowed them and are relayed to the page origin.
pub fn page_routes() -> Router<AppState> {
    Router::new().fallback(handlers::forward_page)
}
