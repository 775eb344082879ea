use crate::api::types::TargetId;

/// Input event types the engine understands.
/// Page-shell agnostic: no knowledge of which section or card produced them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Mouse wheel delta in pixels (positive scrolls down).
    Wheel { delta_y: f32 },
    /// Touch drag delta in pixels (positive scrolls down).
    Touch { delta_y: f32 },
    /// Native scroll position reported by the browser.
    NativeScroll { offset: f32 },
    /// Viewport was resized.
    Resize { width: f32, height: f32 },
    /// Total document height changed (content mutation).
    ContentHeight { height: f32 },
    /// Pointer entered a hover-bound target.
    PointerEnter { target: TargetId },
    /// Pointer left a hover-bound target.
    PointerLeave { target: TargetId },
    /// Navigation click: scroll to a named section by index.
    NavigateTo { section: u32 },
}

/// A queue of input events.
/// JS writes events into the queue; Rust drains them at the start of each frame.
pub struct InputQueue {
    events: Vec<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(32),
        }
    }

    /// Push a new input event (called from JS via wasm-bindgen).
    pub fn push(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    /// Drain all pending events. Returns a Vec and clears the queue.
    pub fn drain(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.events)
    }

    /// Iterate over pending events without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &InputEvent> {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_drain() {
        let mut q = InputQueue::new();
        q.push(InputEvent::Wheel { delta_y: 120.0 });
        q.push(InputEvent::PointerEnter { target: TargetId(4) });
        assert_eq!(q.len(), 2);
        let events = q.drain();
        assert_eq!(events.len(), 2);
        assert!(q.is_empty());
    }

    #[test]
    fn drain_preserves_order() {
        let mut q = InputQueue::new();
        q.push(InputEvent::Resize { width: 1280.0, height: 720.0 });
        q.push(InputEvent::NativeScroll { offset: 300.0 });
        let events = q.drain();
        assert_eq!(events[0], InputEvent::Resize { width: 1280.0, height: 720.0 });
        assert_eq!(events[1], InputEvent::NativeScroll { offset: 300.0 });
    }
}
