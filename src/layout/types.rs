use crate::ir::BoundingBox;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Name,
    Date,
    Coordinates,
}

/// Plate rectangle and text of one label. The text is drawn at the plate's
/// top-left offset by the configured inset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelPlacement {
    pub kind: LabelKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub text: String,
    pub text_ascent: f32,
}

impl LabelPlacement {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Strict overlap; plates that only share an edge do not intersect.
    pub fn intersects(&self, other: &LabelPlacement) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn is_within(&self, bounds: ImageBounds) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.right() <= bounds.width
            && self.bottom() <= bounds.height
    }

    pub(crate) fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

/// Normalized box outline plus its label placements.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxLayout {
    pub bbox: BoundingBox,
    pub placements: Vec<LabelPlacement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImageBounds {
    pub width: f32,
    pub height: f32,
}

impl ImageBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
        }
    }
}
