//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Only the subset a single-transport WebSocket client needs: the engine open
//! handshake, heartbeats, and connect / disconnect / event packets on the default
//! namespace. Binary attachments are rejected.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::error::PacketError;

/// Engine.IO protocol revision sent as the `EIO` query parameter.
pub const ENGINE_PROTOCOL: &str = "4";

/// Payload of the engine `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: u64,
}

impl OpenInfo {
    /// How long the link may stay silent before the server is presumed gone.
    pub fn heartbeat_deadline(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, args: Vec<Value> },
    Ack(Vec<Value>),
    ConnectError(Value),
}

fn split_kind(frame: &str) -> Result<(char, &str), PacketError> {
    let kind = frame.chars().next().ok_or(PacketError::Empty)?;
    Ok((kind, &frame[kind.len_utf8()..]))
}

fn optional_json(body: &str) -> Result<Option<Value>, PacketError> {
    if body.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::from_str(body)?))
    }
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, PacketError> {
        let (kind, body) = split_kind(frame)?;
        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(body)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping),
            '3' => Ok(EnginePacket::Pong),
            '4' => Ok(EnginePacket::Message(SocketPacket::decode(body)?)),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(PacketError::UnknownEngineType(other)),
        }
    }

    /// Client-side encoding. `Open` is server-only and encodes as a bare `0`.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping => "2".to_string(),
            EnginePacket::Pong => "3".to_string(),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

impl SocketPacket {
    pub fn decode(body: &str) -> Result<Self, PacketError> {
        let (kind, rest) = split_kind(body)?;

        // `/namespace,` prefix; the client only ever joins the default namespace.
        let rest = match rest.strip_prefix('/') {
            Some(ns) => ns.split_once(',').map_or("", |(_, tail)| tail),
            None => rest,
        };
        // Ack id digits sit between the type and the JSON payload.
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

        match kind {
            '0' => Ok(SocketPacket::Connect(optional_json(rest)?)),
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                let mut items: Vec<Value> = serde_json::from_str(rest)?;
                if items.is_empty() {
                    return Err(PacketError::MissingEventName);
                }
                match items.remove(0) {
                    Value::String(name) => Ok(SocketPacket::Event { name, args: items }),
                    _ => Err(PacketError::MissingEventName),
                }
            }
            '3' => Ok(SocketPacket::Ack(serde_json::from_str(rest)?)),
            '4' => Ok(SocketPacket::ConnectError(
                optional_json(rest)?.unwrap_or(Value::Null),
            )),
            '5' | '6' => Err(PacketError::Binary),
            other => Err(PacketError::UnknownSocketType(other)),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(auth)) => format!("0{auth}"),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, args } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                format!("2{}", Value::Array(items))
            }
            SocketPacket::Ack(args) => format!("3{}", Value::Array(args.clone())),
            SocketPacket::ConnectError(err) => format!("4{err}"),
        }
    }

    /// Human-readable reason carried by a `CONNECT_ERROR` packet.
    pub fn error_message(payload: &Value) -> String {
        payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| payload.to_string())
    }
}
