use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::{
    error::ChannelError,
    socketio::SocketIoConnector,
    transport::{Connector, Handshake, Link, LinkEvent},
};
use crate::{config::AppConfig, session::Session};

const EVENT_BUFFER: usize = 64;
const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Idle,
    Connecting,
    Connected,
    Error,
    Disconnected,
}

/// Observable manager state. `generation` names the connection instance `status`
/// belongs to; generation 0 is the idle manager before any connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    pub generation: u64,
    pub status: ChannelStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// `join` was sent on the live transport of this generation.
    Joined { generation: u64, role: String },
    Message {
        generation: u64,
        name: String,
        args: Vec<Value>,
    },
    Error { generation: u64, message: String },
}

/// ReconnectPolicy
///
/// Exponential backoff used inside one connection instance after its transport is
/// lost. Defaults match the Socket.IO client: 1s doubling up to 5s, unbounded attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever; `Some(0)` never retries.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: Some(0),
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` once exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || self.max_attempts.is_some_and(|max| attempt > max) {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }
}

struct Outbound {
    name: String,
    payload: Value,
}

/// Connection
///
/// Guard over one connection instance. Dropping it signals the driver task to close
/// its transport, so every exit path of the manager releases the handle.
struct Connection {
    generation: u64,
    shutdown: Option<oneshot::Sender<()>>,
    commands: mpsc::Sender<Outbound>,
}

impl Connection {
    /// Fire-and-forget: the driver closes the transport on its own task.
    fn teardown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// ChannelManager
///
/// Owns the single authenticated realtime connection of a browsing context.
///
/// * `apply_session` with a complete session starts a connection instance; any later
///   change of token or role tears it down and starts a new one. Credentials are never
///   edited on a live instance.
/// * Every instance gets a fresh generation. Drivers of superseded generations can
///   no longer change the observable state, emit events or send `join`.
/// * `disconnect` and `Drop` tear down synchronously from the caller's view and are
///   idempotent.
///
/// Must be used from within a tokio runtime: each instance runs on a spawned task.
pub struct ChannelManager {
    connector: Arc<dyn Connector>,
    reconnect: ReconnectPolicy,
    state: Arc<watch::Sender<ChannelState>>,
    events: broadcast::Sender<ChannelEvent>,
    session: Session,
    active: Option<Connection>,
    last_generation: u64,
}

impl ChannelManager {
    pub fn new(connector: Arc<dyn Connector>, reconnect: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ChannelState {
            generation: 0,
            status: ChannelStatus::Idle,
        });
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            connector,
            reconnect,
            state: Arc::new(state),
            events,
            session: Session::Anonymous,
            active: None,
            last_generation: 0,
        }
    }

    /// A manager speaking Socket.IO to the configured realtime server.
    pub fn from_config(config: &AppConfig) -> Result<Self, ChannelError> {
        let connector = SocketIoConnector::new(&config.realtime_url)?
            .with_connect_timeout(config.realtime_connect_timeout);
        Ok(Self::new(Arc::new(connector), config.reconnect))
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn status(&self) -> ChannelStatus {
        self.state().status
    }

    pub fn watch(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// apply_session
    ///
    /// Binds the manager to the given credentials. An unchanged session is a no-op.
    /// A changed one tears down the current instance first, then connects again if the
    /// new session is authenticated.
    pub fn apply_session(&mut self, session: &Session) {
        if *session == self.session {
            return;
        }
        self.teardown();
        self.session = session.clone();
        self.start();
    }

    /// Caller-driven retry: a fresh instance for the current session.
    pub fn reconnect(&mut self) {
        if !self.session.is_authenticated() {
            return;
        }
        self.teardown();
        self.start();
    }

    /// Explicit logout. Forgets the credentials and leaves a live instance
    /// `Disconnected`; a manager that never connected stays `Idle`.
    pub fn disconnect(&mut self) {
        self.teardown();
        self.session = Session::Anonymous;
    }

    /// Sends an application event over the live transport.
    pub async fn emit(&self, name: &str, payload: Value) -> Result<(), ChannelError> {
        let connection = self.active.as_ref().ok_or(ChannelError::NotConnected)?;
        if self.status() != ChannelStatus::Connected {
            return Err(ChannelError::NotConnected);
        }
        connection
            .commands
            .send(Outbound {
                name: name.to_string(),
                payload,
            })
            .await
            .map_err(|_| ChannelError::Closed)
    }

    fn start(&mut self) {
        let Session::Authenticated { token, role } = &self.session else {
            return;
        };
        let handshake = Handshake {
            token: token.clone(),
            role: role.clone(),
        };

        self.last_generation += 1;
        let generation = self.last_generation;
        self.state.send_replace(ChannelState {
            generation,
            status: ChannelStatus::Connecting,
        });
        info!(generation, role = %handshake.role.as_str(), "realtime channel connecting");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let driver = Driver {
            generation,
            handshake,
            connector: Arc::clone(&self.connector),
            reconnect: self.reconnect,
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        };
        tokio::spawn(driver.run(shutdown_rx, commands_rx));

        self.active = Some(Connection {
            generation,
            shutdown: Some(shutdown_tx),
            commands: commands_tx,
        });
    }

    /// No active connection means nothing to release: the state is either the
    /// initial `Idle` or already `Disconnected`, and stays as it is.
    fn teardown(&mut self) {
        let Some(mut connection) = self.active.take() else {
            return;
        };
        connection.teardown();
        let generation = connection.generation;
        self.state.send_if_modified(|state| {
            if state.generation != generation || state.status == ChannelStatus::Disconnected {
                return false;
            }
            state.status = ChannelStatus::Disconnected;
            true
        });
        debug!(generation, "realtime channel torn down");
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

enum PumpOutcome {
    Shutdown,
    Superseded,
    Rejected,
    Lost { was_connected: bool },
}

/// Task side of one connection instance.
struct Driver {
    generation: u64,
    handshake: Handshake,
    connector: Arc<dyn Connector>,
    reconnect: ReconnectPolicy,
    state: Arc<watch::Sender<ChannelState>>,
    events: broadcast::Sender<ChannelEvent>,
}

impl Driver {
    fn is_current(&self) -> bool {
        let state = self.state.borrow();
        state.generation == self.generation && state.status != ChannelStatus::Disconnected
    }

    /// Applies `status` if this driver's generation is still the live one. Returns
    /// false for a superseded or torn-down instance.
    fn transition(&self, status: ChannelStatus) -> bool {
        let mut current = false;
        self.state.send_if_modified(|state| {
            if state.generation != self.generation || state.status == ChannelStatus::Disconnected {
                return false;
            }
            current = true;
            if state.status == status {
                return false;
            }
            state.status = status;
            true
        });
        current
    }

    fn publish(&self, event: ChannelEvent) {
        if self.is_current() {
            let _ = self.events.send(event);
        }
    }

    fn fail(&self, message: String) -> bool {
        if !self.transition(ChannelStatus::Error) {
            return false;
        }
        warn!(generation = self.generation, error = %message, "realtime channel error");
        self.publish(ChannelEvent::Error {
            generation: self.generation,
            message,
        });
        true
    }

    async fn run(
        self,
        mut shutdown: oneshot::Receiver<()>,
        mut commands: mpsc::Receiver<Outbound>,
    ) {
        let mut attempt: u32 = 0;
        loop {
            let opened = tokio::select! {
                biased;
                _ = &mut shutdown => return,
                opened = self.connector.open(&self.handshake) => opened,
            };

            match opened {
                Ok(mut link) => {
                    let outcome = self.pump(link.as_mut(), &mut shutdown, &mut commands).await;
                    link.close().await;
                    match outcome {
                        PumpOutcome::Shutdown | PumpOutcome::Superseded | PumpOutcome::Rejected => {
                            return;
                        }
                        PumpOutcome::Lost { was_connected } => {
                            if was_connected {
                                attempt = 0;
                            }
                        }
                    }
                }
                Err(e) => {
                    if !self.fail(e.to_string()) {
                        return;
                    }
                }
            }

            attempt += 1;
            let Some(delay) = self.reconnect.delay_for(attempt) else {
                warn!(generation = self.generation, attempt, "realtime reconnection exhausted");
                return;
            };
            debug!(generation = self.generation, attempt, ?delay, "realtime reconnect scheduled");
            tokio::select! {
                biased;
                _ = &mut shutdown => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn pump(
        &self,
        link: &mut dyn Link,
        shutdown: &mut oneshot::Receiver<()>,
        commands: &mut mpsc::Receiver<Outbound>,
    ) -> PumpOutcome {
        let mut was_connected = false;
        loop {
            tokio::select! {
                biased;
                _ = &mut *shutdown => return PumpOutcome::Shutdown,
                Some(outbound) = commands.recv() => {
                    if let Err(e) = link.emit(&outbound.name, outbound.payload).await {
                        warn!(generation = self.generation, event = %outbound.name, error = %e, "realtime emit failed");
                    }
                }
                event = link.recv() => match event {
                    Some(LinkEvent::Connected) => {
                        // A late connect for a superseded instance must not join.
                        if !self.transition(ChannelStatus::Connected) {
                            return PumpOutcome::Superseded;
                        }
                        was_connected = true;
                        info!(generation = self.generation, "realtime channel connected");
                        if let Err(e) = link.emit("join", self.handshake.join_payload()).await {
                            self.fail(e.to_string());
                            return PumpOutcome::Lost { was_connected };
                        }
                        self.publish(ChannelEvent::Joined {
                            generation: self.generation,
                            role: self.handshake.role.as_str().to_string(),
                        });
                    }
                    Some(LinkEvent::Event { name, args }) => {
                        self.publish(ChannelEvent::Message {
                            generation: self.generation,
                            name,
                            args,
                        });
                    }
                    Some(LinkEvent::Error(message)) => {
                        if !self.fail(message) {
                            return PumpOutcome::Superseded;
                        }
                    }
                    Some(LinkEvent::Rejected(message)) => {
                        self.fail(message);
                        return PumpOutcome::Rejected;
                    }
                    Some(LinkEvent::Closed(reason)) => {
                        if !self.fail(reason) {
                            return PumpOutcome::Superseded;
                        }
                        return PumpOutcome::Lost { was_connected };
                    }
                    None => {
                        if !self.fail("transport closed".to_string()) {
                            return PumpOutcome::Superseded;
                        }
                        return PumpOutcome::Lost { was_connected };
                    }
                },
            }
        }
    }
}
