use std::{env, time::Duration};

use crate::realtime::{DEFAULT_CONNECT_TIMEOUT, ReconnectPolicy};

/// AppConfig
///
/// Holds the edge's entire configuration state. Immutable once loaded and shared with
/// the router through `FromRef`, so the gate middleware, the page forwarder and the
/// realtime probe all read the same values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which variables are mandatory.
    pub env: Env,
    // Socket address the edge HTTP server binds to.
    pub bind_addr: String,
    // Base URL of the upstream server that renders pages for allowed requests.
    pub page_origin_url: String,
    // Base URL of the Socket.IO realtime server (http/https; converted to ws/wss).
    pub realtime_url: String,
    // Backoff applied when an authenticated realtime transport is lost.
    pub reconnect: ReconnectPolicy,
    // Upper bound for the WebSocket upgrade plus the engine open packet.
    pub realtime_connect_timeout: Duration,
}

/// Env
///
/// Defines the runtime context: developer defaults and pretty logs locally, mandatory
/// upstream URLs and JSON logs in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const LOCAL_PAGE_ORIGIN: &str = "http://localhost:3001";
const LOCAL_REALTIME_URL: &str = "http://localhost:5000";

impl Default for AppConfig {
    /// default
    ///
    /// A non-panicking configuration pointing at local upstreams, used for test setup
    /// without touching environment variables.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            page_origin_url: LOCAL_PAGE_ORIGIN.to_string(),
            realtime_url: LOCAL_REALTIME_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            realtime_connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables and applies the **fail-fast**
    /// principle for production.
    ///
    /// # Panics
    /// Panics in `Env::Production` when `PAGE_ORIGIN_URL` or `REALTIME_URL` is missing,
    /// so the edge never starts forwarding to a guessed upstream.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let bind_addr =
            env::var("EDGE_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let reconnect = reconnect_from_env();
        let realtime_connect_timeout =
            millis_from_env("REALTIME_CONNECT_TIMEOUT_MS").unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        match env {
            Env::Local => Self {
                env: Env::Local,
                bind_addr,
                page_origin_url: env::var("PAGE_ORIGIN_URL")
                    .unwrap_or_else(|_| LOCAL_PAGE_ORIGIN.to_string()),
                realtime_url: env::var("REALTIME_URL")
                    .unwrap_or_else(|_| LOCAL_REALTIME_URL.to_string()),
                reconnect,
                realtime_connect_timeout,
            },
            Env::Production => Self {
                env: Env::Production,
                bind_addr,
                page_origin_url: env::var("PAGE_ORIGIN_URL")
                    .expect("FATAL: PAGE_ORIGIN_URL required in prod"),
                realtime_url: env::var("REALTIME_URL")
                    .expect("FATAL: REALTIME_URL required in prod"),
                reconnect,
                realtime_connect_timeout,
            },
        }
    }
}

/// Unset or unparsable values fall back to the Socket.IO client defaults.
fn reconnect_from_env() -> ReconnectPolicy {
    let defaults = ReconnectPolicy::default();

    ReconnectPolicy {
        initial_delay: millis_from_env("REALTIME_RECONNECT_DELAY_MS")
            .unwrap_or(defaults.initial_delay),
        max_delay: millis_from_env("REALTIME_RECONNECT_DELAY_MAX_MS")
            .unwrap_or(defaults.max_delay),
        max_attempts: env::var("REALTIME_RECONNECT_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok()),
    }
}

fn millis_from_env(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}
