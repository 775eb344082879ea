use std::cell::RefCell;
use std::rc::Rc;

use scrollwork::{
    Attachment, FrameClock, FrameHeader, InputEvent, MotionConfig, MotionEngine, MotionError, Node,
    ProtocolLayout, Rect, Stage, Subscription, TargetId, TickPhase,
};

/// Packed results of the last presented frame.
struct FrameOutput {
    layout: ProtocolLayout,
    buffer: Vec<f32>,
    text_writes: Vec<(TargetId, String)>,
    write_count: usize,
    event_count: usize,
}

impl FrameOutput {
    /// Ship everything the engine wrote since the previous present, then
    /// clear the engine's write log and events.
    fn present(&mut self, frame: u64, engine: &mut MotionEngine<Stage>) {
        let scroll = engine.scroll();
        let active_section = engine
            .sections()
            .active_section()
            .and_then(|name| engine.sections().index_of(name))
            .map_or(-1.0, |i| i as f32);
        let header = FrameHeader {
            frame,
            scroll_offset: scroll.current_offset(),
            scroll_velocity: scroll.state().velocity,
            active_section,
            captures_native: scroll.captures_native(),
        };
        let (writes, events) = self
            .layout
            .pack(&mut self.buffer, &header, engine.surface().writes(), engine.events());
        self.write_count = writes;
        self.event_count = events;
        self.text_writes.clear();
        self.text_writes.extend_from_slice(engine.surface().text_writes());

        engine.surface_mut().clear_writes();
        engine.clear_events();
    }
}

/// Drives a `MotionEngine` over an in-memory `Stage` from the page's loops.
///
/// The engine is attached to a `FrameClock` ticked from requestAnimationFrame;
/// a present-phase subscriber packs the shared buffer at the end of every
/// frame. Scramble jobs run on their own interval through `scramble_tick`,
/// which the page schedules with `setInterval(.., scramble_interval_ms())`
/// so text reveals keep wall-clock time even when rAF is throttled.
pub struct MotionRunner {
    engine: Rc<RefCell<MotionEngine<Stage>>>,
    clock: FrameClock,
    output: Rc<RefCell<FrameOutput>>,
    attachment: Attachment,
    present: Subscription,
}

impl MotionRunner {
    pub fn new(config: MotionConfig) -> Self {
        let layout = ProtocolLayout::from_config(&config);
        let clock = FrameClock::new(config.max_frame_dt);
        let engine = Rc::new(RefCell::new(MotionEngine::new(config, Stage::new())));
        let attachment = MotionEngine::attach(&engine, &clock);

        let output = Rc::new(RefCell::new(FrameOutput {
            buffer: vec![0.0; layout.buffer_total_floats],
            layout,
            text_writes: Vec::new(),
            write_count: 0,
            event_count: 0,
        }));
        let present = {
            let engine = Rc::downgrade(&engine);
            let output = Rc::downgrade(&output);
            clock.subscribe(TickPhase::Present, move |tick| {
                let (Some(engine), Some(output)) = (engine.upgrade(), output.upgrade()) else {
                    return Err(MotionError::Disposed);
                };
                let Ok(mut engine) = engine.try_borrow_mut() else {
                    log::warn!("motion engine busy at present, frame {} not packed", tick.frame);
                    return Ok(());
                };
                output.borrow_mut().present(tick.frame, &mut engine);
                Ok(())
            })
        };

        Self {
            engine,
            clock,
            output,
            attachment,
            present,
        }
    }

    /// Run `f` against the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut MotionEngine<Stage>) -> R) -> R {
        f(&mut self.engine.borrow_mut())
    }

    pub fn load_manifest(&mut self, json: &str) -> Result<(), MotionError> {
        self.engine.borrow_mut().load_manifest_json(json)
    }

    /// Push an input event into the engine's queue.
    pub fn push_input(&mut self, event: InputEvent) {
        self.engine.borrow_mut().push_input(event);
    }

    /// Mount (or remount) a target with its document-space bounds.
    pub fn mount(&mut self, target: TargetId, tag: &str, bounds: Rect, text: &str) {
        let mut engine = self.engine.borrow_mut();
        let node = Node::new(target).with_tag(tag).with_bounds(bounds).with_text(text);
        engine.surface_mut().mount(node);
        engine.target_moved(target);
    }

    pub fn set_bounds(&mut self, target: TargetId, bounds: Rect) {
        let mut engine = self.engine.borrow_mut();
        if engine.surface_mut().set_bounds(target, bounds) {
            engine.target_moved(target);
        }
    }

    /// The element left the DOM: release everything bound to it.
    pub fn detach(&mut self, target: TargetId) {
        let mut engine = self.engine.borrow_mut();
        engine.surface_mut().detach(target);
        engine.release_target(target);
    }

    /// Run one frame from a rAF timestamp (ms).
    pub fn tick(&mut self, timestamp_ms: f64) {
        self.clock.tick(timestamp_ms);
    }

    /// Run one frame with an explicit delta (seconds).
    pub fn tick_dt(&mut self, timestamp_ms: f64, dt: f32) {
        self.clock.tick_with_dt(timestamp_ms, dt);
    }

    /// Advance scramble jobs by real elapsed time. Their text writes ship
    /// with the next presented frame.
    pub fn scramble_tick(&mut self, elapsed_ms: f64) {
        self.engine.borrow_mut().scramble_tick(elapsed_ms.max(0.0) / 1000.0);
    }

    /// Interval the page should schedule `scramble_tick` at.
    pub fn scramble_interval_ms(&self) -> f64 {
        self.engine.borrow().scrambles().interval() * 1000.0
    }

    /// Stop everything and release scroll capture. The release event is
    /// packed right away since the clock no longer runs the pipeline.
    pub fn destroy(&mut self) {
        let frame = self.clock.frame();
        let mut engine = self.engine.borrow_mut();
        engine.destroy();
        self.attachment.cancel();
        self.present.cancel();
        self.output.borrow_mut().present(frame, &mut engine);
    }

    // ---- Pointer accessors for SharedArrayBuffer reads ----

    pub fn buffer_ptr(&self) -> *const f32 {
        self.output.borrow().buffer.as_ptr()
    }

    pub fn write_count(&self) -> u32 {
        self.output.borrow().write_count as u32
    }

    pub fn event_count(&self) -> u32 {
        self.output.borrow().event_count as u32
    }

    /// Text writes from the last presented frame, in write order.
    pub fn text_writes(&self) -> Vec<(TargetId, String)> {
        self.output.borrow().text_writes.clone()
    }

    pub fn scroll_offset(&self) -> f32 {
        self.engine.borrow().scroll().current_offset()
    }

    // ---- Capacity accessors (read by TypeScript via wasm_bindgen exports) ----

    pub fn max_writes(&self) -> u32 {
        self.output.borrow().layout.max_writes as u32
    }

    pub fn max_events(&self) -> u32 {
        self.output.borrow().layout.max_events as u32
    }

    pub fn write_data_offset(&self) -> u32 {
        self.output.borrow().layout.write_data_offset as u32
    }

    pub fn event_data_offset(&self) -> u32 {
        self.output.borrow().layout.event_data_offset as u32
    }

    pub fn buffer_total_floats(&self) -> u32 {
        self.output.borrow().layout.buffer_total_floats as u32
    }
}
