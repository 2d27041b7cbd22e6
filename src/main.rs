use dispatch_edge::{AppState, PageOrigin, config::AppConfig, create_router, telemetry};
use tokio::net::TcpListener;

/// main
///
/// Entry point of the edge: configuration, logging, the page origin client and the
/// gated HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging (pretty locally, JSON in production)
    telemetry::init_tracing(&config.env);
    tracing::info!("Edge starting in {:?} mode", config.env);

    // 3. Page Origin
    let origin = PageOrigin::new(&config.page_origin_url)
        .expect("FATAL: PAGE_ORIGIN_URL is not a valid URL.");
    tracing::info!(origin = %origin.base(), "forwarding allowed requests to page origin");

    // 4. Router and Server Startup
    let app = create_router(AppState { origin });

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("FATAL: Failed to bind EDGE_BIND_ADDR.");

    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("FATAL: edge server stopped unexpectedly.");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
