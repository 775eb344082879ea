//! Virtualized smooth scroll.
//!
//! Native wheel/touch/scroll input only moves a raw target; the visual offset
//! chases it once per frame with frame-rate independent exponential decay:
//!
//! ```text
//! smoothed += (raw - smoothed) * (1 - 2^(-k * dt))
//! ```
//!
//! Two half-length frames land exactly where one full frame does, so scroll
//! feel does not depend on the display refresh rate.

use serde::{Deserialize, Serialize};

/// Tuning for the scroll virtualizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Decay rate `k`; higher converges faster.
    pub rate: f32,
    /// Changes smaller than this (pixels) are not republished, and the
    /// smoothed offset snaps to the target once within it.
    pub epsilon: f32,
    /// Multiplier applied to wheel deltas.
    pub wheel_multiplier: f32,
    /// Multiplier applied to touch deltas.
    pub touch_multiplier: f32,
    /// When false, wheel input jumps without easing.
    pub smooth_wheel: bool,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            rate: 10.0,
            epsilon: 0.1,
            wheel_multiplier: 1.0,
            touch_multiplier: 2.0,
            smooth_wheel: true,
        }
    }
}

/// Scroll state published every frame. Read-only outside the virtualizer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VirtualScrollState {
    /// Where input wants the page to be.
    pub raw_offset: f32,
    /// Eased visual offset used for every animation decision.
    pub smoothed_offset: f32,
    /// Pixels per second over the last frame.
    pub velocity: f32,
}

/// Handle returned by `on_scroll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u32);

type ScrollListener = Box<dyn FnMut(&VirtualScrollState)>;

pub struct ScrollVirtualizer {
    config: ScrollConfig,
    state: VirtualScrollState,
    /// Maximum scroll offset (document height minus viewport height).
    limit: f32,
    /// Whether wheel/touch input is captured instead of left to the browser.
    captures_native: bool,
    /// Forces a notification on the next tick (jumps, clamps).
    force_notify: bool,
    listeners: Vec<(ListenerId, ScrollListener)>,
    next_listener: u32,
    destroyed: bool,
}

impl ScrollVirtualizer {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            state: VirtualScrollState::default(),
            limit: 0.0,
            captures_native: true,
            force_notify: true,
            listeners: Vec::new(),
            next_listener: 0,
            destroyed: false,
        }
    }

    /// The eased offset.
    pub fn current_offset(&self) -> f32 {
        self.state.smoothed_offset
    }

    pub fn state(&self) -> VirtualScrollState {
        self.state
    }

    pub fn limit(&self) -> f32 {
        self.limit
    }

    pub fn captures_native(&self) -> bool {
        self.captures_native
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Choose whether wheel/touch are captured (true) or native scrolling is observed (false).
    pub fn set_capture(&mut self, capture: bool) {
        self.captures_native = capture && !self.destroyed;
    }

    /// Subscribe to scroll changes. Called at most once per tick.
    pub fn on_scroll<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&VirtualScrollState) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    /// Set the scrollable range from document and viewport heights.
    pub fn set_extent(&mut self, content_height: f32, viewport_height: f32) {
        self.set_limit(content_height - viewport_height);
    }

    /// Set the maximum scroll offset; clamps current state into the new range.
    pub fn set_limit(&mut self, limit: f32) {
        self.limit = limit.max(0.0);
        let raw = self.clamp(self.state.raw_offset);
        let smoothed = self.clamp(self.state.smoothed_offset);
        if raw != self.state.raw_offset || smoothed != self.state.smoothed_offset {
            self.force_notify = true;
        }
        self.state.raw_offset = raw;
        self.state.smoothed_offset = smoothed;
    }

    /// Accumulate a wheel delta into the raw target (captured mode only).
    pub fn wheel(&mut self, delta_y: f32) {
        if !self.captures_native || self.destroyed {
            return;
        }
        let target = self.state.raw_offset + delta_y * self.config.wheel_multiplier;
        if self.config.smooth_wheel {
            self.state.raw_offset = self.clamp(target);
        } else {
            self.scroll_to(target, true);
        }
    }

    /// Accumulate a touch drag delta into the raw target (captured mode only).
    pub fn touch(&mut self, delta_y: f32) {
        if !self.captures_native || self.destroyed {
            return;
        }
        let target = self.state.raw_offset + delta_y * self.config.touch_multiplier;
        self.state.raw_offset = self.clamp(target);
    }

    /// Observe the browser's scroll position (keyboard, scrollbar drag, anchors).
    pub fn native_scroll(&mut self, offset: f32) {
        if self.destroyed {
            return;
        }
        self.state.raw_offset = self.clamp(offset);
    }

    /// Programmatic scroll, e.g. a navigation click.
    pub fn scroll_to(&mut self, offset: f32, immediate: bool) {
        if self.destroyed {
            return;
        }
        self.state.raw_offset = self.clamp(offset);
        if immediate {
            self.state.smoothed_offset = self.state.raw_offset;
            self.state.velocity = 0.0;
            self.force_notify = true;
        }
    }

    /// Advance one frame. Returns the new smoothed offset if it changed enough
    /// to be republished; listeners are notified exactly once in that case.
    pub fn tick(&mut self, dt: f32) -> Option<f32> {
        if self.destroyed {
            return None;
        }

        let prev = self.state.smoothed_offset;
        let target = self.state.raw_offset;
        let alpha = 1.0 - 2.0_f32.powf(-self.config.rate * dt.max(0.0));
        let mut next = prev + (target - prev) * alpha;
        if (target - next).abs() < self.config.epsilon {
            next = target;
        }
        next = self.clamp(next);

        let delta = next - prev;
        self.state.smoothed_offset = next;
        self.state.velocity = if dt > 0.0 { delta / dt } else { 0.0 };

        // The final snap onto the target is published even when it is tiny
        let settled = delta != 0.0 && next == target;
        let changed = delta.abs() > self.config.epsilon || settled || self.force_notify;
        self.force_notify = false;
        if !changed {
            return None;
        }

        let state = self.state;
        for (_, listener) in self.listeners.iter_mut() {
            listener(&state);
        }
        Some(next)
    }

    /// Whether the smoothed offset has reached the raw target.
    pub fn is_settled(&self) -> bool {
        self.state.smoothed_offset == self.state.raw_offset
    }

    /// Teardown: drop listeners, release native scroll capture, stop ticking.
    /// Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.listeners.clear();
        self.captures_native = false;
        self.destroyed = true;
        log::debug!("scroll virtualizer destroyed at offset {}", self.state.smoothed_offset);
    }

    fn clamp(&self, offset: f32) -> f32 {
        offset.clamp(0.0, self.limit)
    }
}

impl Default for ScrollVirtualizer {
    fn default() -> Self {
        Self::new(ScrollConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn virtualizer() -> ScrollVirtualizer {
        let mut v = ScrollVirtualizer::default();
        v.set_limit(10_000.0);
        v.tick(0.0);
        v
    }

    #[test]
    fn converges_monotonically_without_overshoot() {
        let mut v = virtualizer();
        v.wheel(1000.0);
        let mut last = 0.0;
        for _ in 0..240 {
            v.tick(1.0 / 60.0);
            let now = v.current_offset();
            assert!(now >= last, "went backwards: {} < {}", now, last);
            assert!(now <= 1000.0, "overshot: {}", now);
            last = now;
        }
        assert_eq!(v.current_offset(), 1000.0);
        assert!(v.is_settled());
    }

    #[test]
    fn frame_rate_independent() {
        let mut a = virtualizer();
        let mut b = virtualizer();
        a.wheel(800.0);
        b.wheel(800.0);

        a.tick(1.0 / 30.0);
        b.tick(1.0 / 60.0);
        b.tick(1.0 / 60.0);

        assert!((a.current_offset() - b.current_offset()).abs() < 0.01);
    }

    #[test]
    fn notifies_once_per_tick() {
        let mut v = virtualizer();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        v.on_scroll(move |_| c.set(c.get() + 1));

        // Several inputs within one frame coalesce
        v.wheel(100.0);
        v.wheel(100.0);
        v.touch(50.0);
        v.tick(1.0 / 60.0);
        assert_eq!(calls.get(), 1);

        // Idle frames after settling do not notify
        for _ in 0..300 {
            v.tick(1.0 / 60.0);
        }
        let settled = calls.get();
        v.tick(1.0 / 60.0);
        assert_eq!(calls.get(), settled);
    }

    #[test]
    fn raw_target_is_clamped_to_bounds() {
        let mut v = ScrollVirtualizer::default();
        v.set_extent(3000.0, 1000.0);
        v.wheel(-500.0);
        assert_eq!(v.state().raw_offset, 0.0);
        v.wheel(5000.0);
        assert_eq!(v.state().raw_offset, 2000.0);
    }

    #[test]
    fn touch_uses_multiplier() {
        let mut v = virtualizer();
        v.touch(100.0);
        assert_eq!(v.state().raw_offset, 200.0);
    }

    #[test]
    fn native_mode_ignores_wheel() {
        let mut v = virtualizer();
        v.set_capture(false);
        v.wheel(300.0);
        assert_eq!(v.state().raw_offset, 0.0);
        v.native_scroll(450.0);
        assert_eq!(v.state().raw_offset, 450.0);
    }

    #[test]
    fn immediate_scroll_to_notifies() {
        let mut v = virtualizer();
        assert_eq!(v.scroll_to_and_tick(1500.0), Some(1500.0));
    }

    #[test]
    fn destroy_stops_everything() {
        let mut v = virtualizer();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        v.on_scroll(move |_| c.set(c.get() + 1));
        v.destroy();
        v.destroy();

        v.wheel(500.0);
        assert_eq!(v.tick(1.0 / 60.0), None);
        assert_eq!(calls.get(), 0);
        assert!(!v.captures_native());
    }

    impl ScrollVirtualizer {
        fn scroll_to_and_tick(&mut self, offset: f32) -> Option<f32> {
            self.scroll_to(offset, true);
            self.tick(1.0 / 60.0)
        }
    }
}
