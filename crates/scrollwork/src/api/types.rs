use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Opaque handle to a visual element owned by the page shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub u32);

/// Visual properties the engine knows how to animate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    Opacity,
    TranslateX,
    TranslateY,
    Scale,
    StrokeOffset,
}

impl Property {
    pub const ALL: [Property; 5] = [
        Property::Opacity,
        Property::TranslateX,
        Property::TranslateY,
        Property::Scale,
        Property::StrokeOffset,
    ];

    /// Wire code used in `PropertyWrite::property`.
    pub fn code(self) -> f32 {
        match self {
            Property::Opacity => 0.0,
            Property::TranslateX => 1.0,
            Property::TranslateY => 2.0,
            Property::Scale => 3.0,
            Property::StrokeOffset => 4.0,
        }
    }
}

/// A single property mutation, shipped to TypeScript through the shared buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PropertyWrite {
    pub target: f32,
    pub property: f32,
    pub value: f32,
    pub _pad: f32,
}

impl PropertyWrite {
    pub const FLOATS: usize = 4;

    pub fn new(target: TargetId, property: Property, value: f32) -> Self {
        Self {
            target: target.0 as f32,
            property: property.code(),
            value,
            _pad: 0.0,
        }
    }
}

/// Event kinds carried in `MotionEvent::kind`.
pub mod event_kind {
    pub const TRIGGER_ENTER: f32 = 1.0;
    pub const TRIGGER_LEAVE: f32 = 2.0;
    pub const SECTION_CHANGED: f32 = 3.0;
    pub const TIMELINE_COMPLETE: f32 = 4.0;
    pub const CUE: f32 = 5.0;
    pub const SCRAMBLE_COMPLETE: f32 = 6.0;
    pub const SCROLL_RELEASED: f32 = 7.0;
}

/// An engine event communicated from Rust to TypeScript.
/// Generic container: `kind` identifies the event, `a/b/c` carry payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct MotionEvent {
    pub kind: f32,
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl MotionEvent {
    pub const FLOATS: usize = 4;

    pub fn new(kind: f32, a: f32, b: f32, c: f32) -> Self {
        Self { kind, a, b, c }
    }
}
