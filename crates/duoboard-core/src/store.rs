//! Entity store: the live strokes and shapes of the current drawing.

use crate::entity::{Entity, Shape, ShapePatch, Stroke};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// The two mutable entity collections, in paint order (back to front).
///
/// Every operation is keyed by id. Updating or removing an unknown id is a
/// no-op, so duplicated or reordered remote delivery is harmless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStore {
    #[serde(default)]
    pub strokes: Vec<Stroke>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from existing collections.
    pub fn from_parts(strokes: Vec<Stroke>, shapes: Vec<Shape>) -> Self {
        Self { strokes, shapes }
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Add a stroke. Returns false if the id is already present.
    pub fn add_stroke(&mut self, stroke: Stroke) -> bool {
        if self.contains(&stroke.id) {
            return false;
        }
        self.strokes.push(stroke);
        true
    }

    /// Append a point to a stroke. Returns false for unknown ids.
    pub fn append_point(&mut self, id: &str, x: f64, y: f64) -> bool {
        match self.stroke_mut(id) {
            Some(stroke) => {
                stroke.push_point(Point::new(x, y));
                true
            }
            None => false,
        }
    }

    /// Add a shape. Returns false if the id is already present.
    pub fn add_shape(&mut self, shape: Shape) -> bool {
        if self.contains(&shape.id) {
            return false;
        }
        self.shapes.push(shape);
        true
    }

    /// Patch a shape in place. Returns false for unknown ids.
    pub fn update_shape(&mut self, id: &str, patch: &ShapePatch) -> bool {
        match self.shape_mut(id) {
            Some(shape) => {
                shape.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Add an entity of either kind.
    pub fn insert(&mut self, entity: Entity) -> bool {
        match entity {
            Entity::Stroke(s) => self.add_stroke(s),
            Entity::Shape(s) => self.add_shape(s),
        }
    }

    /// Replace an existing entity wholesale, keeping its paint position.
    /// Returns false for unknown ids.
    pub fn replace(&mut self, entity: Entity) -> bool {
        match entity {
            Entity::Stroke(s) => match self.stroke_mut(&s.id) {
                Some(existing) => {
                    *existing = s;
                    true
                }
                None => false,
            },
            Entity::Shape(s) => match self.shape_mut(&s.id) {
                Some(existing) => {
                    *existing = s;
                    true
                }
                None => false,
            },
        }
    }

    /// Remove an entity from whichever collection holds it.
    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        if let Some(pos) = self.strokes.iter().position(|s| s.id == id) {
            return Some(Entity::Stroke(self.strokes.remove(pos)));
        }
        if let Some(pos) = self.shapes.iter().position(|s| s.id == id) {
            return Some(Entity::Shape(self.shapes.remove(pos)));
        }
        None
    }

    /// Swap in entirely new contents.
    pub fn replace_all(&mut self, strokes: Vec<Stroke>, shapes: Vec<Shape>) {
        self.strokes = strokes;
        self.shapes = shapes;
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.shapes.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.stroke(id).is_some() || self.shape(id).is_some()
    }

    pub fn stroke(&self, id: &str) -> Option<&Stroke> {
        self.strokes.iter().find(|s| s.id == id)
    }

    pub fn stroke_mut(&mut self, id: &str) -> Option<&mut Stroke> {
        self.strokes.iter_mut().find(|s| s.id == id)
    }

    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    pub fn shape_mut(&mut self, id: &str) -> Option<&mut Shape> {
        self.shapes.iter_mut().find(|s| s.id == id)
    }

    /// Look up an entity of either kind by id.
    pub fn get(&self, id: &str) -> Option<Entity> {
        self.stroke(id)
            .cloned()
            .map(Entity::Stroke)
            .or_else(|| self.shape(id).cloned().map(Entity::Shape))
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.shapes.is_empty()
    }

    /// Total number of entities.
    pub fn len(&self) -> usize {
        self.strokes.len() + self.shapes.len()
    }
}
