// extensions/mod.rs
//
// Animation building blocks layered over the Surface trait.
// Systems opt in by owning a TimelineOrchestrator; easing is pure math.

pub mod easing;
pub mod timeline;

pub use easing::{ease, lerp, Easing};
pub use timeline::{
    AnimateOptions, Direction, Position, Props, Sequence, TimelineEvent, TimelineHandle, TimelineOrchestrator,
};
