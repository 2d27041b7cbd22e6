//! Realtime channel: one authenticated Socket.IO connection per session.
//!
//! [`ChannelManager`] owns the lifecycle and state machine, [`transport`] defines the
//! seam it drives, and [`socketio`] is the production transport over WebSocket.

pub mod error;
pub mod manager;
pub mod packet;
pub mod socketio;
pub mod transport;

pub use error::{ChannelError, PacketError};
pub use manager::{ChannelEvent, ChannelManager, ChannelState, ChannelStatus, ReconnectPolicy};
pub use socketio::{DEFAULT_CONNECT_TIMEOUT, SocketIoConnector};
pub use transport::{Connector, Handshake, Link, LinkEvent};
