use dispatch_edge::{AppConfig, config::Env, realtime::ReconnectPolicy};
use serial_test::serial;
use std::{env, panic, time::Duration};

const ALL_VARS: [&str; 8] = [
    "APP_ENV",
    "EDGE_BIND_ADDR",
    "PAGE_ORIGIN_URL",
    "REALTIME_URL",
    "REALTIME_RECONNECT_ATTEMPTS",
    "REALTIME_RECONNECT_DELAY_MS",
    "REALTIME_RECONNECT_DELAY_MAX_MS",
    "REALTIME_CONNECT_TIMEOUT_MS",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with exactly the given variables set, then restores the environment.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = ALL_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in ALL_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_app_config_production_fail_fast() {
    let missing_both = panic::catch_unwind(|| {
        run_with_env(&[("APP_ENV", "production")], AppConfig::load)
    });
    assert!(
        missing_both.is_err(),
        "Production config loading should panic without upstream URLs"
    );

    let missing_realtime = panic::catch_unwind(|| {
        run_with_env(
            &[
                ("APP_ENV", "production"),
                ("PAGE_ORIGIN_URL", "https://pages.internal"),
            ],
            AppConfig::load,
        )
    });
    assert!(missing_realtime.is_err());
}

#[test]
#[serial]
fn test_app_config_production_with_upstreams() {
    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("PAGE_ORIGIN_URL", "https://pages.internal"),
            ("REALTIME_URL", "https://rt.example.com"),
            ("EDGE_BIND_ADDR", "127.0.0.1:8080"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.page_origin_url, "https://pages.internal");
    assert_eq!(config.realtime_url, "https://rt.example.com");
    assert_eq!(config.bind_addr, "127.0.0.1:8080");
}

#[test]
#[serial]
fn test_app_config_local_env_defaults() {
    // Local mode should not panic, and should use hardcoded defaults
    let config = run_with_env(&[("APP_ENV", "local")], AppConfig::load);

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert_eq!(config.page_origin_url, "http://localhost:3001");
    assert_eq!(config.realtime_url, "http://localhost:5000");
    assert_eq!(config.reconnect, ReconnectPolicy::default());
    assert_eq!(config.realtime_connect_timeout, Duration::from_secs(20));

    // An unknown APP_ENV is treated as local.
    let config = run_with_env(&[("APP_ENV", "staging")], AppConfig::load);
    assert_eq!(config.env, Env::Local);
}

#[test]
#[serial]
fn test_reconnect_policy_from_env() {
    let config = run_with_env(
        &[
            ("REALTIME_RECONNECT_ATTEMPTS", "4"),
            ("REALTIME_RECONNECT_DELAY_MS", "250"),
            ("REALTIME_RECONNECT_DELAY_MAX_MS", "2000"),
            ("REALTIME_CONNECT_TIMEOUT_MS", "1500"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.realtime_connect_timeout, Duration::from_millis(1500));

    assert_eq!(
        config.reconnect,
        ReconnectPolicy {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(2000),
            max_attempts: Some(4),
        }
    );
}

#[test]
#[serial]
fn test_unparsable_reconnect_values_fall_back() {
    let config = run_with_env(
        &[
            ("REALTIME_RECONNECT_ATTEMPTS", "forever"),
            ("REALTIME_RECONNECT_DELAY_MS", "-5"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.reconnect, ReconnectPolicy::default());
}
