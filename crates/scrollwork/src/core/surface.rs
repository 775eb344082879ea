//! The mutation interface behind target handles.
//!
//! The animation core never touches a DOM directly. Everything it reads
//! (layout bounds) and writes (visual properties, text) goes through a
//! `Surface`, so the same core runs against the browser bridge and against
//! the in-memory `Stage` used in tests.

use glam::Vec2;

use crate::api::types::{Property, TargetId};
use crate::core::error::MotionError;

/// Axis-aligned rectangle in document coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(width, height),
        }
    }

    /// A full-width band covering `[top, bottom)` vertically.
    pub fn band(top: f32, bottom: f32) -> Self {
        Self::new(0.0, top, 0.0, (bottom - top).max(0.0))
    }

    pub fn top(&self) -> f32 {
        self.origin.y
    }

    pub fn bottom(&self) -> f32 {
        self.origin.y + self.size.y
    }

    pub fn height(&self) -> f32 {
        self.size.y
    }
}

/// Read layout, write visual state.
pub trait Surface {
    /// Current document-space bounds of a target, `None` if it is not mounted.
    fn bounds(&self, target: TargetId) -> Option<Rect>;

    /// Current value of a visual property, `None` if the target is not mounted.
    fn property(&self, target: TargetId, property: Property) -> Option<f32>;

    /// Write a visual property.
    fn set_property(&mut self, target: TargetId, property: Property, value: f32) -> Result<(), MotionError>;

    /// Replace the text content of a target.
    fn set_text(&mut self, target: TargetId, text: &str) -> Result<(), MotionError>;

    /// Whether the handle still resolves to a mounted element.
    fn contains(&self, target: TargetId) -> bool {
        self.bounds(target).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges() {
        let rect = Rect::band(1500.0, 1800.0);
        assert_eq!(rect.top(), 1500.0);
        assert_eq!(rect.bottom(), 1800.0);
        assert_eq!(rect.height(), 300.0);
    }

    #[test]
    fn inverted_band_collapses() {
        let rect = Rect::band(900.0, 400.0);
        assert_eq!(rect.height(), 0.0);
        assert_eq!(rect.bottom(), rect.top());
    }
}
