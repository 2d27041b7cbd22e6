use std::env;

use dispatch_edge::{
    config::AppConfig,
    realtime::{ChannelEvent, ChannelManager},
    session::Session,
    telemetry,
};
use tokio::sync::broadcast::error::RecvError;

/// main
///
/// Holds one realtime channel open with the credentials in `REALTIME_TOKEN` and
/// `REALTIME_ROLE`, logging every state change and server event until Ctrl-C.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = AppConfig::load();
    telemetry::init_tracing(&config.env);

    let token = env::var("REALTIME_TOKEN").ok();
    let role = env::var("REALTIME_ROLE").ok();
    let session = Session::from_parts(token.as_deref(), role.as_deref());
    if !session.is_authenticated() {
        tracing::error!("REALTIME_TOKEN and REALTIME_ROLE must both be set");
        return;
    }

    let mut manager = ChannelManager::from_config(&config)
        .expect("FATAL: REALTIME_URL is not a usable realtime endpoint.");
    let mut states = manager.watch();
    let mut events = manager.subscribe();

    tracing::info!(url = %config.realtime_url, "Probe connecting");
    manager.apply_session(&session);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                tracing::info!(generation = state.generation, status = ?state.status, "channel state");
            }
            event = events.recv() => match event {
                Ok(ChannelEvent::Joined { generation, role }) => {
                    tracing::info!(generation, %role, "joined");
                }
                Ok(ChannelEvent::Message { name, args, .. }) => {
                    tracing::info!(event = %name, ?args, "server event");
                }
                Ok(ChannelEvent::Error { message, .. }) => {
                    tracing::warn!(error = %message, "channel error");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "probe lagged behind channel events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    manager.disconnect();
    tracing::info!("Probe disconnected");
}
