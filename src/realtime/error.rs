use thiserror::Error;

/// Failure to decode an Engine.IO / Socket.IO text frame.
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("empty frame")]
    Empty,
    #[error("unknown engine packet type {0:?}")]
    UnknownEngineType(char),
    #[error("unknown socket packet type {0:?}")]
    UnknownSocketType(char),
    #[error("binary packets are not supported")]
    Binary,
    #[error("event packet without a name")]
    MissingEventName,
    #[error("invalid packet payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid realtime endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected handshake frame: {0}")]
    Handshake(String),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("channel is not connected")]
    NotConnected,
    #[error("transport closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for ChannelError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChannelError::Transport(err.to_string())
    }
}

impl From<url::ParseError> for ChannelError {
    fn from(err: url::ParseError) -> Self {
        ChannelError::InvalidEndpoint(err.to_string())
    }
}
