//! Duoboard Core
//!
//! Drawing-state synchronization for two-peer whiteboard sessions: the
//! entity store, snapshot history, wire protocol, backdrop negotiation and
//! the engine that ties them to a peer transport.

pub mod backdrop;
pub mod config;
pub mod engine;
pub mod entity;
pub mod history;
pub mod pages;
pub mod presence;
pub mod protocol;
pub mod store;
pub mod throttle;
pub mod transport;

pub use backdrop::{Backdrop, BackdropError, BackdropKind, BackdropLayout, BackdropNegotiator, PageDimensions};
pub use config::EngineConfig;
pub use engine::{EngineEvent, SyncEngine, Tool, ToolSettings};
pub use entity::{Entity, EntityId, EntityRef, Geometry, Participant, Shape, ShapeKind, Stroke};
pub use history::{HistoryManager, HistoryMove, Snapshot};
pub use pages::{PageBook, PageDrawing};
pub use presence::{PresenceTracker, RemoteCursor};
pub use protocol::{Message, Payload, ProtocolError};
pub use store::EntityStore;
pub use transport::{ConnectionState, MemoryTransport, Transport, TransportError, TransportEvent};
#[cfg(not(target_arch = "wasm32"))]
pub use transport::RelayTransport;
