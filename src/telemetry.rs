use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Env;

const DEFAULT_FILTER: &str = "dispatch_edge=debug,realtime_probe=debug,tower_http=info,axum=trace";

/// init_tracing
///
/// Installs the global subscriber. `RUST_LOG` wins over the built-in filter. Local runs
/// get pretty, human-readable output; production emits JSON lines for log aggregation.
pub fn init_tracing(env: &Env) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    match env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }
}
