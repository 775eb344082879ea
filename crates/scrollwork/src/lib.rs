pub mod api;
pub mod core;
pub mod systems;
pub mod bridge;
pub mod input;
pub mod assets;
pub mod extensions;

// Re-export key types at crate root for convenience
pub use api::engine::{Attachment, MotionConfig, MotionEngine};
pub use api::types::{event_kind, MotionEvent, Property, PropertyWrite, TargetId};
pub use core::clock::{FrameClock, FrameTick, Subscription, TickPhase};
pub use core::error::MotionError;
pub use core::stage::{Node, Stage};
pub use core::surface::{Rect, Surface};
pub use core::time::{FrameDelta, IntervalTimer};
pub use input::queue::{InputEvent, InputQueue};
pub use assets::manifest::{CueSpec, HoverSpec, IntroSpec, LoadSpec, LoopSpec, MotionManifest, RevealSpec, ScrambleSpec, SectionSpec, StepSpec};
pub use bridge::protocol::{FrameHeader, ProtocolLayout};
pub use systems::scroll::{ScrollConfig, ScrollVirtualizer, VirtualScrollState};
pub use systems::triggers::{
    ScrollDirection, ToggleAction, ToggleActions, TriggerConfig, TriggerEvent, TriggerEventKind, TriggerId,
    TriggerPosition, TriggerRegistry, ZoneState,
};
pub use systems::sections::{Section, SectionMap, SectionTracker};
pub use systems::scramble::{ScrambleConfig, ScrambleEngine, ScrambleHandle, ScrambleId, ScrambleRequest};

// Extensions: animation building blocks over the Surface trait
pub use extensions::{
    Easing, lerp, ease,
    AnimateOptions, Direction, Position, Props, Sequence,
    TimelineEvent, TimelineHandle, TimelineOrchestrator,
};
