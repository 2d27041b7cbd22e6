use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    net::TcpStream,
    time::{Instant, timeout, timeout_at},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::Message,
};
use tracing::{debug, trace, warn};
use url::Url;

use super::{
    error::ChannelError,
    packet::{ENGINE_PROTOCOL, EnginePacket, OpenInfo, SocketPacket},
    transport::{Connector, Handshake, Link, LinkEvent},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SOCKET_IO_PATH: &str = "/socket.io/";
/// Same default as the Socket.IO client's `timeout` option.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// SocketIoConnector
///
/// Opens Socket.IO sessions over the WebSocket transport only. There is no polling
/// fallback and no upgrade negotiation.
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    endpoint: Url,
    connect_timeout: Duration,
}

impl SocketIoConnector {
    /// Accepts `http`, `https`, `ws` or `wss` base URLs.
    pub fn new(endpoint: &str) -> Result<Self, ChannelError> {
        let endpoint = Url::parse(endpoint)?;
        match endpoint.scheme() {
            "http" | "https" | "ws" | "wss" => Ok(Self {
                endpoint,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            }),
            other => Err(ChannelError::InvalidEndpoint(format!(
                "unsupported scheme {other}"
            ))),
        }
    }

    /// Bounds the WebSocket upgrade plus the wait for the engine `open` packet.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// The WebSocket URL for one handshake. The token rides along as a query
    /// parameter for servers that authenticate before reading the connect packet.
    pub fn websocket_url(&self, token: &str) -> Result<Url, ChannelError> {
        let mut url = self.endpoint.clone();
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| ChannelError::InvalidEndpoint(self.endpoint.to_string()))?;
        if url.path() == "/" || url.path().is_empty() {
            url.set_path(SOCKET_IO_PATH);
        }
        url.query_pairs_mut()
            .append_pair("EIO", ENGINE_PROTOCOL)
            .append_pair("transport", "websocket")
            .append_pair("token", token);
        Ok(url)
    }
}

async fn engine_open(url: Url) -> Result<(WsStream, OpenInfo), ChannelError> {
    let (mut stream, _) = connect_async(url.as_str()).await?;

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match EnginePacket::decode(text.as_str())? {
                EnginePacket::Open(info) => return Ok((stream, info)),
                other => {
                    return Err(ChannelError::Handshake(format!("{other:?}")));
                }
            },
            Some(Ok(Message::Close(_))) | None => return Err(ChannelError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

#[async_trait]
impl Connector for SocketIoConnector {
    async fn open(&self, handshake: &Handshake) -> Result<Box<dyn Link>, ChannelError> {
        let url = self.websocket_url(&handshake.token)?;
        debug!(host = ?url.host_str(), "opening realtime websocket");

        let (mut stream, open) = timeout(self.connect_timeout, engine_open(url))
            .await
            .map_err(|_| {
                ChannelError::Transport(format!(
                    "no engine open within {}ms",
                    self.connect_timeout.as_millis()
                ))
            })??;
        trace!(sid = %open.sid, "engine session opened");

        let connect = EnginePacket::Message(SocketPacket::Connect(Some(handshake.auth_payload())));
        stream.send(Message::text(connect.encode())).await?;

        Ok(Box::new(SocketIoLink::new(stream, &open)))
    }
}

/// One live Socket.IO session on the default namespace.
pub struct SocketIoLink {
    stream: WsStream,
    heartbeat: Duration,
    // Only inbound frames move this; outbound traffic says nothing about the server.
    last_frame: Instant,
    closed: bool,
}

impl SocketIoLink {
    fn new(stream: WsStream, open: &OpenInfo) -> Self {
        Self {
            stream,
            heartbeat: open.heartbeat_deadline(),
            last_frame: Instant::now(),
            closed: false,
        }
    }

    async fn send_packet(&mut self, packet: EnginePacket) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        self.stream.send(Message::text(packet.encode())).await?;
        Ok(())
    }

    fn finish(&mut self, reason: impl Into<String>) -> Option<LinkEvent> {
        self.closed = true;
        Some(LinkEvent::Closed(reason.into()))
    }
}

#[async_trait]
impl Link for SocketIoLink {
    async fn recv(&mut self) -> Option<LinkEvent> {
        loop {
            if self.closed {
                return None;
            }

            let deadline = self.last_frame + self.heartbeat;
            let frame = match timeout_at(deadline, self.stream.next()).await {
                Err(_) => return self.finish("ping timeout"),
                Ok(None) => return self.finish("stream ended"),
                Ok(Some(Err(e))) => return self.finish(e.to_string()),
                Ok(Some(Ok(frame))) => frame,
            };
            self.last_frame = Instant::now();

            let text = match frame {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_string())
                        .unwrap_or_else(|| "closed by server".to_string());
                    return self.finish(reason);
                }
                // Control frames are answered by tungstenite itself.
                _ => continue,
            };

            let packet = match EnginePacket::decode(text.as_str()) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!(error = %e, "dropping undecodable realtime frame");
                    return Some(LinkEvent::Error(e.to_string()));
                }
            };

            match packet {
                EnginePacket::Ping => {
                    if let Err(e) = self.send_packet(EnginePacket::Pong).await {
                        return self.finish(e.to_string());
                    }
                }
                EnginePacket::Close => return self.finish("engine close"),
                EnginePacket::Message(SocketPacket::Connect(_)) => return Some(LinkEvent::Connected),
                EnginePacket::Message(SocketPacket::ConnectError(payload)) => {
                    return Some(LinkEvent::Rejected(SocketPacket::error_message(&payload)));
                }
                EnginePacket::Message(SocketPacket::Disconnect) => {
                    return self.finish("server disconnect");
                }
                EnginePacket::Message(SocketPacket::Event { name, args }) => {
                    return Some(LinkEvent::Event { name, args });
                }
                other => trace!(packet = ?other, "ignoring realtime packet"),
            }
        }
    }

    async fn emit(&mut self, name: &str, payload: Value) -> Result<(), ChannelError> {
        self.send_packet(EnginePacket::Message(SocketPacket::Event {
            name: name.to_string(),
            args: vec![payload],
        }))
        .await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        let _ = self
            .send_packet(EnginePacket::Message(SocketPacket::Disconnect))
            .await;
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "realtime websocket close failed");
        }
    }
}
