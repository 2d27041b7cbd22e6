use async_trait::async_trait;
use serde_json::{Value, json};

use super::error::ChannelError;
use crate::session::RoleTag;

/// Handshake
///
/// The credentials one connection instance was created with. Immutable for the
/// instance's lifetime: a credential change produces a new instance with a new
/// handshake instead of editing this one.
#[derive(Clone, PartialEq, Eq)]
pub struct Handshake {
    pub token: String,
    pub role: RoleTag,
}

impl Handshake {
    /// Auth object sent with the Socket.IO connect packet.
    pub fn auth_payload(&self) -> Value {
        json!({ "token": self.token })
    }

    /// Payload of the `join` event emitted right after connecting.
    pub fn join_payload(&self) -> Value {
        json!({ "role": self.role.as_str(), "token": self.token })
    }
}

impl std::fmt::Debug for Handshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshake")
            .field("token", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Connection-level events a [`Link`] reports to its driver.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The server accepted the auth handshake.
    Connected,
    /// An application event pushed by the server.
    Event { name: String, args: Vec<Value> },
    /// A recoverable transport error; the link may keep delivering frames.
    Error(String),
    /// The server refused the auth handshake. Not retried.
    Rejected(String),
    /// The transport is gone.
    Closed(String),
}

/// Connector
///
/// Opens one transport for a handshake. Implementations resolve once the transport
/// itself is up; the server's acceptance of the credentials arrives later as
/// [`LinkEvent::Connected`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, handshake: &Handshake) -> Result<Box<dyn Link>, ChannelError>;
}

/// An open transport exclusively owned by one connection driver.
///
/// `recv` must be cancel-safe: the driver races it against shutdown and outbound
/// commands.
#[async_trait]
pub trait Link: Send {
    /// Next connection-level event, or `None` once the link is exhausted.
    async fn recv(&mut self) -> Option<LinkEvent>;

    async fn emit(&mut self, name: &str, payload: Value) -> Result<(), ChannelError>;

    /// Best-effort close. Must tolerate being called on an already dead link.
    async fn close(&mut self);
}
