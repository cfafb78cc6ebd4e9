//! Transport adapters: how encoded messages reach the other peer.
//!
//! The engine only needs fire-and-forget sends and a poll for inbound
//! events. Delivery may be unordered or lossy; the protocol copes with both.

mod memory;
pub mod relay;

#[cfg(not(target_arch = "wasm32"))]
mod websocket;

pub use memory::MemoryTransport;

#[cfg(not(target_arch = "wasm32"))]
pub use websocket::RelayTransport;

use thiserror::Error;

/// Transport errors. The engine logs these and carries on locally.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("unknown peer: {0}")]
    UnknownPeer(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("connection failed: {0}")]
    Connect(String),
}

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events surfaced by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Link to the other side (or the relay) is up.
    Connected,
    /// Link is down; sends will fail until reconnected.
    Disconnected,
    /// The remote peer became reachable.
    PeerJoined { peer_id: String },
    /// The remote peer went away.
    PeerLeft { peer_id: String },
    /// One inbound packet on a named channel.
    Message {
        from: String,
        channel: String,
        data: String,
    },
    Error { message: String },
}

/// A byte-message link between exactly two named peers.
pub trait Transport {
    /// Whether sends can currently succeed.
    fn is_connected(&self) -> bool;

    /// Queue `data` for `peer_id` on `channel`. Never blocks on delivery.
    fn send(&mut self, peer_id: &str, channel: &str, data: &str) -> Result<(), TransportError>;

    /// Drain pending inbound events (non-blocking).
    fn poll(&mut self) -> Vec<TransportEvent>;
}
