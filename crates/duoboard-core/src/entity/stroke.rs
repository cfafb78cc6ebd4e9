//! Freehand ink strokes.

use super::EntityId;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Tool tag carried by every stroke on the wire.
///
/// Strokes only ever come from the pen, so deserialization rejects anything
/// else. That keeps untagged [`super::Entity`] decoding from mistaking a
/// parametric shape for a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeTool {
    #[default]
    Pen,
}

/// Shape category carried next to [`StrokeTool`]. Every stroke is a
/// freeform line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeKind {
    #[default]
    Line,
}

/// End cap style for a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    Butt,
    #[default]
    Round,
    Square,
}

/// Corner join style for a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    Miter,
    #[default]
    Round,
    Bevel,
}

/// A freehand ink path.
///
/// `points` is the flattened coordinate list `x0, y0, x1, y1, ...`. It only
/// grows while the stroke is being drawn; style fields never change after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "StrokeWire", try_from = "StrokeWire")]
pub struct Stroke {
    pub id: EntityId,
    pub tool: StrokeTool,
    pub kind: StrokeKind,
    pub points: Vec<f64>,
    pub stroke: String,
    pub stroke_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
}

/// On-the-wire form of a [`Stroke`].
///
/// Outgoing strokes carry both `tool: "pen"` and `kind: "line"`. Incoming
/// ones need `tool: "pen"`, or `kind: "line"` alone on an object without a
/// shape origin. A line shape always carries `tool: "line"` and `x`, so it
/// never decodes as a stroke.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StrokeWire {
    id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool: Option<StrokeTool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<StrokeKind>,
    #[serde(default, skip_serializing)]
    x: Option<f64>,
    points: Vec<f64>,
    stroke: String,
    stroke_width: f64,
    #[serde(default)]
    line_cap: LineCap,
    #[serde(default)]
    line_join: LineJoin,
}

impl From<Stroke> for StrokeWire {
    fn from(s: Stroke) -> Self {
        Self {
            id: s.id,
            tool: Some(s.tool),
            kind: Some(s.kind),
            x: None,
            points: s.points,
            stroke: s.stroke,
            stroke_width: s.stroke_width,
            line_cap: s.line_cap,
            line_join: s.line_join,
        }
    }
}

impl TryFrom<StrokeWire> for Stroke {
    type Error = String;

    fn try_from(w: StrokeWire) -> Result<Self, Self::Error> {
        if w.tool.is_none() && (w.kind.is_none() || w.x.is_some()) {
            return Err(format!("{} is not a pen stroke", w.id));
        }
        Ok(Self {
            id: w.id,
            tool: StrokeTool::Pen,
            kind: StrokeKind::Line,
            points: w.points,
            stroke: w.stroke,
            stroke_width: w.stroke_width,
            line_cap: w.line_cap,
            line_join: w.line_join,
        })
    }
}

impl Stroke {
    /// Start a stroke at a single point.
    pub fn begin(id: EntityId, start: Point, stroke: impl Into<String>, stroke_width: f64) -> Self {
        Self {
            id,
            tool: StrokeTool::Pen,
            kind: StrokeKind::Line,
            points: vec![start.x, start.y],
            stroke: stroke.into(),
            stroke_width,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
        }
    }

    /// Append a point to the path.
    pub fn push_point(&mut self, point: Point) {
        self.points.push(point.x);
        self.points.push(point.y);
    }

    /// Number of coordinate pairs.
    pub fn len(&self) -> usize {
        self.points.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.points.len() < 2
    }

    /// Last recorded point, if any.
    pub fn last_point(&self) -> Option<Point> {
        match self.points.as_slice() {
            [.., x, y] => Some(Point::new(*x, *y)),
            _ => None,
        }
    }

    /// Iterate the path as points.
    pub fn iter_points(&self) -> impl Iterator<Item = Point> + '_ {
        self.points.chunks_exact(2).map(|c| Point::new(c[0], c[1]))
    }
}
