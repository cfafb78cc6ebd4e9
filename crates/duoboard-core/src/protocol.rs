//! Whiteboard sync protocol.
//!
//! Messages are JSON objects: an envelope identifying the author, with the
//! action-specific payload fields alongside it:
//! ```json
//! { "action": "draw", "authorId": "a", "authorName": "Ann", "color": "#e91e63",
//!   "backdropKind": "none", "entity": { "id": "a-1700000000000-1f2e3d4c", "tool": "pen", ... } }
//! { "action": "cursor", "authorId": "a", ..., "position": { "x": 10, "y": 20 } }
//! ```
//! The codec is stateless. Unknown actions are reported separately from
//! malformed messages so callers can log and drop them.

use crate::backdrop::{BackdropKind, BackdropLayout, PageDimensions};
use crate::entity::{Entity, EntityRef, Participant};
use crate::history::Snapshot;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codec errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message has no action")]
    MissingAction,
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// Every action tag this protocol understands.
pub const ACTIONS: [&str; 9] = [
    "draw",
    "update",
    "erase",
    "undo",
    "redo",
    "state",
    "cursor",
    "backdrop",
    "backdropTransition",
];

/// Action-specific part of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Payload {
    /// Entity created; receivers add it unless the id is known.
    Draw { entity: Entity },
    /// Entity replaced by id; unknown ids are ignored.
    Update { entity: Entity },
    /// Entity removed by id.
    Erase { entity: EntityRef },
    /// Adopt the snapshot at `history_step` as is.
    Undo { snapshot: Snapshot, history_step: usize },
    Redo { snapshot: Snapshot, history_step: usize },
    /// Full reconciliation of drawing and, optionally, history.
    State {
        #[serde(flatten)]
        snapshot: Snapshot,
        history_step: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        history: Option<Vec<Snapshot>>,
    },
    /// Sender's pointer position.
    Cursor { position: Point },
    /// Sender switched backdrop; receivers clear their drawing.
    Backdrop {
        kind: BackdropKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// Sender measured its backdrop; receivers relayout only.
    BackdropTransition {
        kind: BackdropKind,
        width: f64,
        height: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_dimensions: Option<Vec<PageDimensions>>,
    },
}

impl Payload {
    /// Wire tag of this payload.
    pub fn action(&self) -> &'static str {
        match self {
            Payload::Draw { .. } => "draw",
            Payload::Update { .. } => "update",
            Payload::Erase { .. } => "erase",
            Payload::Undo { .. } => "undo",
            Payload::Redo { .. } => "redo",
            Payload::State { .. } => "state",
            Payload::Cursor { .. } => "cursor",
            Payload::Backdrop { .. } => "backdrop",
            Payload::BackdropTransition { .. } => "backdropTransition",
        }
    }

    /// Is this a drawing edit (as opposed to presence or backdrop traffic)?
    pub fn is_drawing(&self) -> bool {
        matches!(
            self,
            Payload::Draw { .. }
                | Payload::Update { .. }
                | Payload::Erase { .. }
                | Payload::Undo { .. }
                | Payload::Redo { .. }
                | Payload::State { .. }
        )
    }

    pub fn from_layout(layout: &BackdropLayout) -> Self {
        Payload::BackdropTransition {
            kind: layout.kind,
            width: layout.width,
            height: layout.height,
            page_dimensions: (!layout.page_dimensions.is_empty()).then(|| layout.page_dimensions.clone()),
        }
    }
}

/// A complete protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub author_id: String,
    pub author_name: String,
    pub color: String,
    #[serde(default)]
    pub backdrop_kind: BackdropKind,
    /// Document page the payload refers to, when the sender is paging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Message {
    pub fn new(author: &Participant, backdrop_kind: BackdropKind, page: Option<u32>, payload: Payload) -> Self {
        Self {
            author_id: author.id.clone(),
            author_name: author.name.clone(),
            color: author.color.clone(),
            backdrop_kind,
            page,
            payload,
        }
    }

    pub fn action(&self) -> &'static str {
        self.payload.action()
    }
}

/// Serialize a message to JSON text.
pub fn encode(message: &Message) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Parse JSON text into a message.
pub fn decode(text: &str) -> Result<Message, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let action = value
        .get("action")
        .and_then(|a| a.as_str())
        .ok_or(ProtocolError::MissingAction)?;
    if !ACTIONS.contains(&action) {
        return Err(ProtocolError::UnknownAction(action.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}
