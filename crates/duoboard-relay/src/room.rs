//! Room bookkeeping: who is in which room, and routing between them.

use dashmap::DashMap;
use duoboard_core::transport::relay::RelayServerMessage;
use thiserror::Error;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// A server message on its way through a room.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: String,
    /// `None` for room-wide notifications.
    pub to: Option<String>,
    pub message: RelayServerMessage,
}

impl Envelope {
    /// Should `peer_id` receive this? Senders never get their own messages back.
    pub fn is_for(&self, peer_id: &str) -> bool {
        self.from != peer_id && self.to.as_deref().is_none_or(|to| to == peer_id)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("room full")]
    RoomFull,
    #[error("peer id {0} already in room")]
    PeerIdTaken(String),
    #[error("peer {0} is not in this room")]
    UnknownPeer(String),
    #[error("not in a room")]
    NotJoined,
}

struct Room {
    tx: broadcast::Sender<Envelope>,
    /// Join order.
    peers: Vec<String>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx, peers: Vec::new() }
    }

    fn notify(&self, from: &str, message: RelayServerMessage) {
        let _ = self.tx.send(Envelope {
            from: from.to_string(),
            to: None,
            message,
        });
    }
}

/// What a successful join hands back to the connection.
pub struct Membership {
    pub rx: broadcast::Receiver<Envelope>,
    /// Peers that were already in the room.
    pub peers: Vec<String>,
}

/// Shared relay state.
pub struct Rooms {
    rooms: DashMap<String, Room>,
    capacity: usize,
}

impl Rooms {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    /// Add `peer_id` to `room_id`, creating the room if needed, and tell the
    /// others about it.
    pub fn join(&self, room_id: &str, peer_id: &str) -> Result<Membership, RoomError> {
        let mut room = self.rooms.entry(room_id.to_string()).or_insert_with(Room::new);
        if room.peers.iter().any(|p| p == peer_id) {
            return Err(RoomError::PeerIdTaken(peer_id.to_string()));
        }
        if room.peers.len() >= self.capacity {
            return Err(RoomError::RoomFull);
        }
        let peers = room.peers.clone();
        room.peers.push(peer_id.to_string());
        let rx = room.tx.subscribe();
        room.notify(
            peer_id,
            RelayServerMessage::PeerJoined {
                peer_id: peer_id.to_string(),
            },
        );
        Ok(Membership { rx, peers })
    }

    /// Remove `peer_id`; empty rooms are dropped.
    pub fn leave(&self, room_id: &str, peer_id: &str) {
        let Some(mut room) = self.rooms.get_mut(room_id) else {
            return;
        };
        let before = room.peers.len();
        room.peers.retain(|p| p != peer_id);
        if room.peers.len() == before {
            return;
        }
        room.notify(
            peer_id,
            RelayServerMessage::PeerLeft {
                peer_id: peer_id.to_string(),
            },
        );
        if room.peers.is_empty() {
            drop(room);
            self.rooms.remove(room_id);
        }
    }

    /// Forward a channel message from one member to another.
    pub fn forward(&self, room_id: &str, from: &str, to: &str, channel: String, data: String) -> Result<(), RoomError> {
        let room = self.rooms.get(room_id).ok_or(RoomError::NotJoined)?;
        if !room.peers.iter().any(|p| p == to) {
            return Err(RoomError::UnknownPeer(to.to_string()));
        }
        let _ = room.tx.send(Envelope {
            from: from.to_string(),
            to: Some(to.to_string()),
            message: RelayServerMessage::Message {
                from: from.to_string(),
                channel,
                data,
            },
        });
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
