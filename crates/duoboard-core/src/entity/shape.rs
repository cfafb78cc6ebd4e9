//! Parametric shapes: segments, circles, ellipses, rectangles and triangles.

use super::EntityId;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// The five parametric shape variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Line,
    Circle,
    Ellipse,
    Rectangle,
    Triangle,
}

/// Variant-specific geometry, relative to the shape's anchor.
///
/// Segments are the exception: their `points` are absolute coordinates
/// `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    Segment { points: [f64; 4] },
    Circle { radius: f64 },
    Ellipse { radius_x: f64, radius_y: f64 },
    Rectangle { width: f64, height: f64 },
    Triangle { width: f64, height: f64 },
}

impl Geometry {
    /// Zeroed geometry for a shape anchored at `anchor`.
    pub fn zeroed(kind: ShapeKind, anchor: Point) -> Self {
        match kind {
            ShapeKind::Line => Geometry::Segment {
                points: [anchor.x, anchor.y, anchor.x, anchor.y],
            },
            ShapeKind::Circle => Geometry::Circle { radius: 0.0 },
            ShapeKind::Ellipse => Geometry::Ellipse { radius_x: 0.0, radius_y: 0.0 },
            ShapeKind::Rectangle => Geometry::Rectangle { width: 0.0, height: 0.0 },
            ShapeKind::Triangle => Geometry::Triangle { width: 0.0, height: 0.0 },
        }
    }

    /// Geometry grown from `anchor` to `pointer`.
    ///
    /// Rectangles and triangles keep the signed extent so dragging up or left
    /// mirrors the shape around the anchor.
    pub fn spanning(kind: ShapeKind, anchor: Point, pointer: Point) -> Self {
        let dx = pointer.x - anchor.x;
        let dy = pointer.y - anchor.y;
        match kind {
            ShapeKind::Line => Geometry::Segment {
                points: [anchor.x, anchor.y, pointer.x, pointer.y],
            },
            ShapeKind::Circle => Geometry::Circle {
                radius: anchor.distance(pointer),
            },
            ShapeKind::Ellipse => Geometry::Ellipse {
                radius_x: dx.abs(),
                radius_y: dy.abs(),
            },
            ShapeKind::Rectangle => Geometry::Rectangle { width: dx, height: dy },
            ShapeKind::Triangle => Geometry::Triangle { width: dx, height: dy },
        }
    }

    /// True when the shape would draw nothing (e.g. a click without a drag).
    pub fn is_degenerate(&self) -> bool {
        match *self {
            Geometry::Segment { points: [x0, y0, x1, y1] } => x0 == x1 && y0 == y1,
            Geometry::Circle { radius } => radius == 0.0,
            Geometry::Ellipse { radius_x, radius_y } => radius_x == 0.0 && radius_y == 0.0,
            Geometry::Rectangle { width, height } | Geometry::Triangle { width, height } => {
                width == 0.0 && height == 0.0
            }
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Geometry::Segment { .. } => ShapeKind::Line,
            Geometry::Circle { .. } => ShapeKind::Circle,
            Geometry::Ellipse { .. } => ShapeKind::Ellipse,
            Geometry::Rectangle { .. } => ShapeKind::Rectangle,
            Geometry::Triangle { .. } => ShapeKind::Triangle,
        }
    }
}

/// A parametric primitive anchored at `(x, y)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ShapeWire", try_from = "ShapeWire")]
pub struct Shape {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
    pub geometry: Geometry,
    pub stroke: String,
    pub stroke_width: f64,
    pub fill: Option<String>,
}

impl Shape {
    /// Create a shape at `anchor` with zeroed geometry.
    pub fn begin(
        id: EntityId,
        kind: ShapeKind,
        anchor: Point,
        stroke: impl Into<String>,
        stroke_width: f64,
        fill: Option<String>,
    ) -> Self {
        Self {
            id,
            x: anchor.x,
            y: anchor.y,
            geometry: Geometry::zeroed(kind, anchor),
            stroke: stroke.into(),
            stroke_width,
            fill,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    pub fn anchor(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Regrow the geometry from the anchor to `pointer`.
    /// Returns true if the geometry changed.
    pub fn span_to(&mut self, pointer: Point) -> bool {
        let geometry = Geometry::spanning(self.kind(), self.anchor(), pointer);
        if geometry == self.geometry {
            return false;
        }
        self.geometry = geometry;
        true
    }

    /// Apply a partial update.
    pub fn apply(&mut self, patch: &ShapePatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        // A patch can never turn a circle into a rectangle.
        if let Some(geometry) = patch.geometry {
            if geometry.kind() == self.kind() {
                self.geometry = geometry;
            } else {
                log::warn!(
                    "ignoring {:?} geometry patch for {:?} shape {}",
                    geometry.kind(),
                    self.kind(),
                    self.id
                );
            }
        }
    }
}

/// Partial update for [`Shape`]. Style is fixed at creation and not patchable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShapePatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub geometry: Option<Geometry>,
}

impl ShapePatch {
    pub fn geometry(geometry: Geometry) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::default()
        }
    }
}

/// Flat wire representation of a shape.
///
/// `kind` and `tool` carry the same value; older peers only send one of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapeWire {
    id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<ShapeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool: Option<ShapeKind>,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    points: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<f64>,
    stroke: String,
    stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fill: Option<String>,
}

impl From<Shape> for ShapeWire {
    fn from(shape: Shape) -> Self {
        let kind = shape.kind();
        let mut wire = ShapeWire {
            id: shape.id,
            kind: Some(kind),
            tool: Some(kind),
            x: shape.x,
            y: shape.y,
            points: None,
            radius: None,
            radius_x: None,
            radius_y: None,
            width: None,
            height: None,
            stroke: shape.stroke,
            stroke_width: shape.stroke_width,
            fill: shape.fill,
        };
        match shape.geometry {
            Geometry::Segment { points } => wire.points = Some(points),
            Geometry::Circle { radius } => wire.radius = Some(radius),
            Geometry::Ellipse { radius_x, radius_y } => {
                wire.radius_x = Some(radius_x);
                wire.radius_y = Some(radius_y);
            }
            Geometry::Rectangle { width, height } | Geometry::Triangle { width, height } => {
                wire.width = Some(width);
                wire.height = Some(height);
            }
        }
        wire
    }
}

impl TryFrom<ShapeWire> for Shape {
    type Error = String;

    fn try_from(wire: ShapeWire) -> Result<Self, Self::Error> {
        let kind = wire
            .kind
            .or(wire.tool)
            .ok_or_else(|| format!("shape {} has neither kind nor tool", wire.id))?;
        let geometry = match kind {
            ShapeKind::Line => Geometry::Segment {
                points: wire.points.unwrap_or([wire.x, wire.y, wire.x, wire.y]),
            },
            ShapeKind::Circle => Geometry::Circle {
                radius: wire.radius.unwrap_or(0.0),
            },
            ShapeKind::Ellipse => Geometry::Ellipse {
                radius_x: wire.radius_x.unwrap_or(0.0),
                radius_y: wire.radius_y.unwrap_or(0.0),
            },
            ShapeKind::Rectangle => Geometry::Rectangle {
                width: wire.width.unwrap_or(0.0),
                height: wire.height.unwrap_or(0.0),
            },
            ShapeKind::Triangle => Geometry::Triangle {
                width: wire.width.unwrap_or(0.0),
                height: wire.height.unwrap_or(0.0),
            },
        };
        Ok(Shape {
            id: wire.id,
            x: wire.x,
            y: wire.y,
            geometry,
            stroke: wire.stroke,
            stroke_width: wire.stroke_width,
            fill: wire.fill,
        })
    }
}
