//! Drawing entities and participant identity.

mod shape;
mod stroke;

pub use shape::{Geometry, Shape, ShapeKind, ShapePatch};
pub use stroke::{LineCap, LineJoin, Stroke, StrokeKind, StrokeTool};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

/// Globally unique entity identifier.
pub type EntityId = String;

/// Generate an entity id of the form `{author}-{unix millis}-{suffix}`.
pub fn new_entity_id(author_id: &str) -> EntityId {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", author_id, millis, &suffix[..8])
}

/// Who is drawing: identity attached to every outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    /// Presence color, e.g. `"#e91e63"`.
    pub color: String,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Either kind of drawable entity, as carried by `draw`/`update` messages.
///
/// Decoding tries a stroke first; strokes require `"tool": "pen"` (or a bare
/// `"kind": "line"` with no origin), so shapes fall through to the second
/// variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entity {
    Stroke(Stroke),
    Shape(Shape),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Stroke(s) => &s.id,
            Entity::Shape(s) => &s.id,
        }
    }

    pub fn is_stroke(&self) -> bool {
        matches!(self, Entity::Stroke(_))
    }

    /// Reference to this entity for an `erase` message.
    pub fn to_ref(&self) -> EntityRef {
        EntityRef {
            id: self.id().to_string(),
        }
    }
}

impl From<Stroke> for Entity {
    fn from(stroke: Stroke) -> Self {
        Entity::Stroke(stroke)
    }
}

impl From<Shape> for Entity {
    fn from(shape: Shape) -> Self {
        Entity::Shape(shape)
    }
}

/// Identity-only reference to an entity. Extra fields on the wire are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
}
