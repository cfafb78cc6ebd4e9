//! Wire types for the two-peer WebSocket relay.
//!
//! Messages are JSON with a `type` tag:
//! ```json
//! { "type": "join", "room": "room-id", "peer_id": "alice" }
//! { "type": "send", "to": "bob", "channel": "whiteboard", "data": "<protocol message>" }
//! ```

use super::TransportEvent;
use serde::{Deserialize, Serialize};

/// Maximum number of peers in one relay room.
pub const ROOM_CAPACITY: usize = 2;

/// Messages sent to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayClientMessage {
    /// Join a room under a chosen peer id.
    Join { room: String, peer_id: String },
    /// Leave the current room.
    Leave,
    /// Forward `data` to `to` on a named channel.
    Send { to: String, channel: String, data: String },
}

/// Messages received from the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayServerMessage {
    /// Join confirmed; `peers` lists who else is already in the room.
    Joined { room: String, peers: Vec<String> },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    /// Forwarded packet from another peer.
    Message { from: String, channel: String, data: String },
    Error { message: String },
}

impl RelayServerMessage {
    /// Translate into transport events.
    pub fn into_events(self) -> Vec<TransportEvent> {
        match self {
            RelayServerMessage::Joined { peers, .. } => peers
                .into_iter()
                .map(|peer_id| TransportEvent::PeerJoined { peer_id })
                .collect(),
            RelayServerMessage::PeerJoined { peer_id } => vec![TransportEvent::PeerJoined { peer_id }],
            RelayServerMessage::PeerLeft { peer_id } => vec![TransportEvent::PeerLeft { peer_id }],
            RelayServerMessage::Message { from, channel, data } => {
                vec![TransportEvent::Message { from, channel, data }]
            }
            RelayServerMessage::Error { message } => vec![TransportEvent::Error { message }],
        }
    }
}
