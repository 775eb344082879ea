use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::api::types::{event_kind, MotionEvent, TargetId};
use crate::assets::manifest::{HoverSpec, IntroSpec, LoadSpec, LoopSpec, MotionManifest, RevealSpec, ScrambleSpec};
use crate::core::clock::{FrameClock, Subscription, TickPhase};
use crate::core::error::MotionError;
use crate::core::surface::Surface;
use crate::extensions::timeline::{
    AnimateOptions, Props, Sequence, TimelineEvent, TimelineHandle, TimelineOrchestrator,
};
use crate::input::queue::{InputEvent, InputQueue};
use crate::systems::scramble::{ScrambleConfig, ScrambleEngine, ScrambleHandle};
use crate::systems::scroll::{ScrollConfig, ScrollVirtualizer};
use crate::systems::sections::SectionTracker;
use crate::systems::triggers::{
    ScrollDirection, ToggleAction, ToggleActions, TriggerConfig, TriggerEvent, TriggerEventKind, TriggerId,
    TriggerRegistry,
};

/// Configuration for the engine, provided by the page shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub scroll: ScrollConfig,
    pub scramble: ScrambleConfig,
    /// Pixels below the viewport top used as the section focus point (default: 200).
    pub focus_bias: f32,
    /// Viewport height until the first resize arrives.
    pub viewport_height: f32,
    /// Longest frame delta accepted by the frame clock, in seconds.
    pub max_frame_dt: f32,
    /// Maximum property writes shipped per frame (default: 512).
    pub max_writes: usize,
    /// Maximum engine events shipped per frame (default: 64).
    pub max_events: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            scroll: ScrollConfig::default(),
            scramble: ScrambleConfig::default(),
            focus_bias: 200.0,
            viewport_height: 800.0,
            max_frame_dt: 0.1,
            max_writes: 512,
            max_events: 64,
        }
    }
}

impl MotionConfig {
    pub fn from_json(json: &str) -> Result<Self, MotionError> {
        Ok(serde_json::from_str(json)?)
    }
}

struct RevealBinding {
    trigger: TriggerId,
    target: TargetId,
    timeline: TimelineHandle,
    actions: ToggleActions,
}

/// Teardown handle for `MotionEngine::attach`. Cancelling is idempotent.
#[derive(Debug)]
pub struct Attachment {
    subscriptions: Vec<Subscription>,
}

impl Attachment {
    pub fn cancel(&self) {
        for subscription in &self.subscriptions {
            subscription.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscriptions.iter().any(Subscription::is_active)
    }
}

/// Owns every animation system plus the surface they write to, and runs them
/// as one pipeline per frame: input, scroll, triggers, then timelines and
/// sections. Scramble jobs advance separately on `scramble_tick`.
pub struct MotionEngine<S: Surface> {
    config: MotionConfig,
    surface: S,
    input: InputQueue,
    scroll: ScrollVirtualizer,
    triggers: TriggerRegistry,
    timelines: TimelineOrchestrator,
    scramble: ScrambleEngine,
    sections: SectionTracker,
    reveals: Vec<RevealBinding>,
    hovers: Vec<HoverSpec>,
    cue_scrambles: HashMap<u32, ScrambleSpec>,
    content_height: f32,
    viewport_height: f32,
    /// Set by the scroll listener and by layout changes; sections are
    /// recomputed on the next animate step.
    sections_dirty: Rc<Cell<bool>>,
    events: Vec<MotionEvent>,
    destroyed: bool,
}

impl<S: Surface> MotionEngine<S> {
    pub fn new(config: MotionConfig, surface: S) -> Self {
        let mut scroll = ScrollVirtualizer::new(config.scroll.clone());
        let sections_dirty = Rc::new(Cell::new(true));
        let dirty = Rc::clone(&sections_dirty);
        scroll.on_scroll(move |_| dirty.set(true));

        Self {
            scroll,
            triggers: TriggerRegistry::new(config.viewport_height),
            timelines: TimelineOrchestrator::new(),
            scramble: ScrambleEngine::new(config.scramble.clone()),
            sections: SectionTracker::new(config.focus_bias),
            input: InputQueue::new(),
            reveals: Vec::new(),
            hovers: Vec::new(),
            cue_scrambles: HashMap::new(),
            content_height: 0.0,
            viewport_height: config.viewport_height,
            sections_dirty,
            events: Vec::with_capacity(config.max_events),
            destroyed: false,
            surface,
            config,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn scroll(&self) -> &ScrollVirtualizer {
        &self.scroll
    }

    pub fn scroll_mut(&mut self) -> &mut ScrollVirtualizer {
        &mut self.scroll
    }

    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    pub fn timelines(&self) -> &TimelineOrchestrator {
        &self.timelines
    }

    pub fn timelines_mut(&mut self) -> &mut TimelineOrchestrator {
        &mut self.timelines
    }

    pub fn sections(&self) -> &SectionTracker {
        &self.sections
    }

    pub fn scrambles(&self) -> &ScrambleEngine {
        &self.scramble
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Queue an input event; applied at the start of the next frame.
    pub fn push_input(&mut self, event: InputEvent) {
        if !self.destroyed {
            self.input.push(event);
        }
    }

    // -- Registration --

    /// Register everything a manifest describes.
    pub fn load_manifest(&mut self, manifest: &MotionManifest) {
        for section in &manifest.sections {
            self.section(&section.name, section.target);
        }
        let reveals: usize = manifest.reveals.iter().map(|r| self.reveal(r).len()).sum();
        for hover in &manifest.hovers {
            self.hover(hover.clone());
        }
        for scramble in &manifest.scrambles {
            self.scramble(scramble);
        }
        for load in &manifest.loads {
            self.load(load);
        }
        for spec in &manifest.loops {
            self.repeat(spec);
        }
        if let Some(intro) = &manifest.intro {
            self.intro(intro);
        }
        log::info!(
            "motion manifest loaded: {} reveals, {} sections, {} hovers",
            reveals,
            self.sections.map().len(),
            self.hovers.len()
        );
    }

    pub fn load_manifest_json(&mut self, json: &str) -> Result<(), MotionError> {
        let manifest = MotionManifest::from_json(json)?;
        self.load_manifest(&manifest);
        Ok(())
    }

    /// Bind a paused timeline per target to a viewport zone on that target.
    /// Unmounted targets are skipped.
    pub fn reveal(&mut self, spec: &RevealSpec) -> Vec<TriggerId> {
        let mut triggers = Vec::new();
        for (index, &target) in spec.targets.iter().enumerate() {
            let options = AnimateOptions::new(spec.duration)
                .with_delay(spec.delay + index as f32 * spec.stagger)
                .with_ease(spec.ease)
                .paused();
            let Some(timeline) =
                self.timelines
                    .animate(target, spec.from.clone(), spec.to.clone(), options, &mut self.surface)
            else {
                continue;
            };
            let trigger = self.triggers.register(
                TriggerConfig::element(target)
                    .with_start(spec.start)
                    .with_end(spec.end),
            );
            self.reveals.push(RevealBinding {
                trigger,
                target,
                timeline,
                actions: spec.toggle_actions,
            });
            triggers.push(trigger);
        }
        triggers
    }

    /// Play an untriggered entrance animation now.
    pub fn load(&mut self, spec: &LoadSpec) -> Option<TimelineHandle> {
        self.timelines.animate_staggered(
            &spec.targets,
            spec.from.clone(),
            spec.to.clone(),
            spec.to_options(),
            &mut self.surface,
        )
    }

    /// Start a repeating animation. Killed like any other timeline when its
    /// target is released or another timeline takes over one of its properties.
    pub fn repeat(&mut self, spec: &LoopSpec) -> Option<TimelineHandle> {
        self.timelines.animate(
            spec.target,
            spec.from.clone(),
            spec.to.clone(),
            spec.to_options(),
            &mut self.surface,
        )
    }

    /// Register a hover draw. The path is put at its rest value right away.
    pub fn hover(&mut self, spec: HoverSpec) -> bool {
        if let Err(err) = self.surface.set_property(spec.path, spec.property, spec.rest) {
            log::debug!("hover path {:?} unavailable: {}", spec.path, err);
            return false;
        }
        self.hovers.retain(|h| h.target != spec.target || h.path != spec.path);
        self.hovers.push(spec);
        true
    }

    /// Register a navigation section measured from a target.
    pub fn section(&mut self, name: &str, target: TargetId) -> bool {
        self.sections_dirty.set(true);
        self.sections.register_target(name, target, &self.surface)
    }

    /// Start a (possibly chained) scramble now.
    pub fn scramble(&mut self, spec: &ScrambleSpec) -> Option<ScrambleHandle> {
        self.scramble.scramble(spec.to_request(), &mut self.surface)
    }

    /// Start the intro sequence; its cues start the bound scrambles.
    pub fn intro(&mut self, spec: &IntroSpec) -> Option<TimelineHandle> {
        for cue in &spec.cues {
            self.cue_scrambles.insert(cue.cue, cue.scramble.clone());
        }
        self.sequence(spec.to_sequence())
    }

    pub fn sequence(&mut self, sequence: Sequence) -> Option<TimelineHandle> {
        self.timelines.sequence(sequence, &mut self.surface)
    }

    /// Start a scramble when any timeline reaches `cue`.
    pub fn bind_cue(&mut self, cue: u32, spec: ScrambleSpec) {
        self.cue_scrambles.insert(cue, spec);
    }

    /// Scroll so the named section's start sits at the focus point.
    pub fn navigate(&mut self, name: &str) -> bool {
        let Some(offset) = self.sections.offset_of(name) else {
            return false;
        };
        self.scroll.scroll_to(offset, false);
        true
    }

    /// Layout moved (fonts, images, resize): re-resolve zones and sections.
    pub fn layout_changed(&mut self) {
        self.triggers.invalidate();
        self.sections.refresh(&self.surface);
        self.sections_dirty.set(true);
    }

    /// One target's bounds changed.
    pub fn target_moved(&mut self, target: TargetId) {
        self.triggers.invalidate_target(target);
        self.sections.refresh(&self.surface);
        self.sections_dirty.set(true);
    }

    /// Drop every animation, zone and job tied to a target (component unmount).
    pub fn release_target(&mut self, target: TargetId) {
        self.timelines.kill_target(target);
        self.scramble.cancel_target(target);
        let removed = self.triggers.unregister_target(target);
        self.reveals.retain(|b| b.target != target && !removed.contains(&b.trigger));
        self.hovers.retain(|h| h.target != target && h.path != target);
    }

    // -- Frame pipeline --

    /// Run one frame. Within a frame the order is strict: scroll, then
    /// triggers, then timelines and sections.
    pub fn frame(&mut self, dt: f32) {
        self.step_scroll(dt);
        self.step_triggers();
        self.step_animate(dt);
    }

    fn step_scroll(&mut self, dt: f32) {
        if self.destroyed {
            return;
        }
        for event in self.input.drain() {
            self.apply_input(event);
        }
        self.scroll.tick(dt);
    }

    fn step_triggers(&mut self) {
        if self.destroyed {
            return;
        }
        let offset = self.scroll.current_offset();
        for event in self.triggers.update(offset, &self.surface) {
            self.apply_trigger(event);
        }
    }

    fn step_animate(&mut self, dt: f32) {
        if self.destroyed {
            return;
        }
        // Sections only move when the scroll listener fired or layout changed
        let changed = if self.sections_dirty.replace(false) {
            self.sections
                .update(self.scroll.current_offset())
                .map(|active| active.map(str::to_string))
        } else {
            None
        };
        if let Some(active) = changed {
            let index = active
                .as_deref()
                .and_then(|name| self.sections.index_of(name))
                .map_or(-1.0, |i| i as f32);
            log::debug!("active section: {:?}", active);
            self.events.push(MotionEvent::new(event_kind::SECTION_CHANGED, index, 0.0, 0.0));
        }

        self.timelines.tick(dt, &mut self.surface);
        let timeline_events: Vec<TimelineEvent> = self.timelines.drain_events().collect();
        for event in timeline_events {
            match event {
                TimelineEvent::Completed(handle) => {
                    self.events.push(MotionEvent::new(event_kind::TIMELINE_COMPLETE, handle.0 as f32, 0.0, 0.0));
                }
                TimelineEvent::Cue { timeline, cue } => {
                    self.events.push(MotionEvent::new(event_kind::CUE, cue as f32, timeline.0 as f32, 0.0));
                    if let Some(spec) = self.cue_scrambles.get(&cue) {
                        self.scramble.scramble(spec.to_request(), &mut self.surface);
                    }
                }
            }
        }
    }

    /// Advance scramble jobs on their own fixed-rate timer.
    pub fn scramble_tick(&mut self, dt: f64) {
        if self.destroyed {
            return;
        }
        self.scramble.advance(dt, &mut self.surface);
        for target in self.scramble.drain_completed() {
            self.events.push(MotionEvent::new(event_kind::SCRAMBLE_COMPLETE, target.0 as f32, 0.0, 0.0));
        }
    }

    fn apply_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::Wheel { delta_y } => self.scroll.wheel(delta_y),
            InputEvent::Touch { delta_y } => self.scroll.touch(delta_y),
            InputEvent::NativeScroll { offset } => self.scroll.native_scroll(offset),
            InputEvent::Resize { height, .. } => {
                self.viewport_height = height;
                self.scroll.set_extent(self.content_height, height);
                self.triggers.set_viewport_height(height);
                self.sections.refresh(&self.surface);
                self.sections_dirty.set(true);
            }
            InputEvent::ContentHeight { height } => {
                self.content_height = height;
                self.scroll.set_extent(height, self.viewport_height);
                self.layout_changed();
            }
            InputEvent::PointerEnter { target } => self.pointer(target, true),
            InputEvent::PointerLeave { target } => self.pointer(target, false),
            InputEvent::NavigateTo { section } => {
                let name = self.sections.map().iter().nth(section as usize).map(|s| s.name.clone());
                match name {
                    Some(name) => {
                        self.navigate(&name);
                    }
                    None => log::debug!("navigate: no section at index {}", section),
                }
            }
        }
    }

    fn pointer(&mut self, target: TargetId, entered: bool) {
        for hover in self.hovers.iter().filter(|h| h.target == target) {
            let (from, to, options) = if entered {
                (
                    Props::new().with(hover.property, hover.rest),
                    Props::new().with(hover.property, hover.active),
                    AnimateOptions::new(hover.enter_duration).with_ease(hover.enter_ease),
                )
            } else {
                // Draw back from wherever the enter animation got to
                (
                    Props::new(),
                    Props::new().with(hover.property, hover.rest),
                    AnimateOptions::new(hover.leave_duration).with_ease(hover.leave_ease),
                )
            };
            self.timelines.animate(hover.path, from, to, options, &mut self.surface);
        }
    }

    fn apply_trigger(&mut self, event: TriggerEvent) {
        let direction = match event.direction {
            ScrollDirection::Forward => 1.0,
            ScrollDirection::Backward => -1.0,
        };
        let kind = match event.kind {
            TriggerEventKind::Enter => event_kind::TRIGGER_ENTER,
            TriggerEventKind::Leave => event_kind::TRIGGER_LEAVE,
            TriggerEventKind::Progress(_) => return,
        };

        for binding in self.reveals.iter().filter(|b| b.trigger == event.zone) {
            self.events.push(MotionEvent::new(kind, event.zone.0 as f32, binding.target.0 as f32, direction));
            let handle = binding.timeline;
            match binding.actions.action_for(event.kind, event.direction) {
                ToggleAction::Play => {
                    self.timelines.play(handle);
                }
                ToggleAction::Pause => {
                    self.timelines.pause(handle);
                }
                ToggleAction::Resume => {
                    self.timelines.resume(handle);
                }
                ToggleAction::Reverse => {
                    self.timelines.reverse(handle);
                }
                ToggleAction::Restart => {
                    self.timelines.restart(handle, &mut self.surface);
                }
                ToggleAction::Reset => {
                    self.timelines.reset(handle, &mut self.surface);
                }
                ToggleAction::None => {}
            }
        }
    }

    // -- Frame output --

    /// Events produced since the last `clear_events`.
    pub fn events(&self) -> &[MotionEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Teardown: stop scrolling, release capture, drop every zone, timeline
    /// and scramble. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.scroll.destroy();
        self.triggers.clear();
        self.timelines.clear();
        self.scramble.clear();
        self.sections.clear();
        self.reveals.clear();
        self.hovers.clear();
        self.cue_scrambles.clear();
        self.input.clear();
        self.events.push(MotionEvent::new(event_kind::SCROLL_RELEASED, 0.0, 0.0, 0.0));
        self.destroyed = true;
        log::info!("motion engine destroyed");
    }
}

impl<S: Surface + 'static> MotionEngine<S> {
    /// Subscribe the pipeline stages to a frame clock, one per phase. The clock
    /// only holds weak references: once the engine is dropped or destroyed its
    /// subscribers are removed on the next tick.
    pub fn attach(engine: &Rc<RefCell<Self>>, clock: &FrameClock) -> Attachment {
        let phases = [TickPhase::Scroll, TickPhase::Triggers, TickPhase::Animate];
        let subscriptions = phases
            .into_iter()
            .map(|phase| {
                let weak = Rc::downgrade(engine);
                clock.subscribe(phase, move |tick| {
                    let rc = weak.upgrade().ok_or(MotionError::Disposed)?;
                    let Ok(mut engine) = rc.try_borrow_mut() else {
                        log::warn!("motion engine busy during {:?} phase, skipping", phase);
                        return Ok(());
                    };
                    if engine.destroyed {
                        return Err(MotionError::Disposed);
                    }
                    match phase {
                        TickPhase::Scroll => engine.step_scroll(tick.dt),
                        TickPhase::Triggers => engine.step_triggers(),
                        TickPhase::Animate => engine.step_animate(tick.dt),
                        TickPhase::Present => {}
                    }
                    Ok(())
                })
            })
            .collect();
        Attachment { subscriptions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::{Node, Stage};
    use crate::core::surface::Rect;

    const DT: f32 = 1.0 / 60.0;
    const CARD: TargetId = TargetId(10);

    fn engine() -> MotionEngine<Stage> {
        let mut stage = Stage::new();
        stage.mount(Node::new(CARD).with_bounds(Rect::band(1500.0, 1800.0)));
        let mut engine = MotionEngine::new(MotionConfig::default(), stage);
        engine.push_input(InputEvent::Resize { width: 1200.0, height: 800.0 });
        engine.push_input(InputEvent::ContentHeight { height: 5000.0 });
        engine.frame(DT);
        engine
    }

    fn run(engine: &mut MotionEngine<Stage>, frames: usize) {
        for _ in 0..frames {
            engine.frame(DT);
        }
    }

    fn opacity(engine: &MotionEngine<Stage>, id: TargetId) -> f32 {
        engine.surface().get(id).unwrap().opacity
    }

    fn kinds(engine: &MotionEngine<Stage>) -> Vec<f32> {
        engine.events().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn reveal_plays_on_enter_and_reverses_on_leave_back() {
        let mut engine = engine();
        engine.reveal(&RevealSpec::fade_up(vec![CARD]));
        assert_eq!(opacity(&engine, CARD), 0.0);

        // Zone starts at 1500 - (800 - 100) = 800
        engine.scroll_mut().scroll_to(1000.0, true);
        engine.frame(DT);
        // Same frame: scroll, trigger, timeline
        assert!(opacity(&engine, CARD) > 0.0);
        assert!(kinds(&engine).contains(&event_kind::TRIGGER_ENTER));

        run(&mut engine, 120);
        assert!((opacity(&engine, CARD) - 1.0).abs() < 1e-4);
        assert!(kinds(&engine).contains(&event_kind::TIMELINE_COMPLETE));

        engine.clear_events();
        engine.scroll_mut().scroll_to(0.0, true);
        run(&mut engine, 120);
        assert!(opacity(&engine, CARD).abs() < 1e-4);
        let leave = engine.events().iter().find(|e| e.kind == event_kind::TRIGGER_LEAVE).unwrap();
        assert_eq!(leave.c, -1.0);
    }

    #[test]
    fn leaving_forward_keeps_revealed_state() {
        let mut engine = engine();
        engine.reveal(&RevealSpec::fade_up(vec![CARD]));
        engine.scroll_mut().scroll_to(1000.0, true);
        run(&mut engine, 120);
        engine.scroll_mut().scroll_to(3000.0, true);
        run(&mut engine, 60);
        assert!((opacity(&engine, CARD) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn sections_follow_scroll_and_navigation() {
        let mut stage = Stage::new();
        let names = ["experience", "projects", "contact"];
        for (i, name) in names.iter().enumerate() {
            let top = 1000.0 * (i + 1) as f32;
            stage.mount(Node::new(TargetId(20 + i as u32)).with_tag(*name).with_bounds(Rect::band(top, top + 1000.0)));
        }
        let mut engine = MotionEngine::new(MotionConfig::default(), stage);
        for (i, name) in names.iter().enumerate() {
            assert!(engine.section(name, TargetId(20 + i as u32)));
        }
        engine.push_input(InputEvent::ContentHeight { height: 5000.0 });
        engine.frame(DT);
        assert_eq!(engine.sections().active_section(), None);

        engine.push_input(InputEvent::NavigateTo { section: 1 });
        engine.frame(DT);
        assert_eq!(engine.scroll().state().raw_offset, 1800.0);

        run(&mut engine, 300);
        assert_eq!(engine.sections().active_section(), Some("projects"));
        let changed = engine.events().iter().filter(|e| e.kind == event_kind::SECTION_CHANGED).last().unwrap();
        assert_eq!(changed.a, 1.0);
    }

    #[test]
    fn sections_recompute_on_layout_change_without_scroll() {
        let mut stage = Stage::new();
        let about = TargetId(20);
        stage.mount(Node::new(about).with_bounds(Rect::band(0.0, 1000.0)));
        let mut engine = MotionEngine::new(MotionConfig::default(), stage);
        assert!(engine.section("about", about));
        engine.frame(DT);
        assert_eq!(engine.sections().active_section(), Some("about"));

        engine.clear_events();
        run(&mut engine, 10);
        assert!(!kinds(&engine).contains(&event_kind::SECTION_CHANGED));

        // The section moves below the focus point while the page stays put
        engine.surface_mut().set_bounds(about, Rect::band(500.0, 1500.0));
        engine.target_moved(about);
        engine.frame(DT);
        assert_eq!(engine.sections().active_section(), None);
        assert!(kinds(&engine).contains(&event_kind::SECTION_CHANGED));
    }

    #[test]
    fn hover_draws_and_undraws_stroke() {
        let mut stage = Stage::new();
        let (card, path) = (TargetId(30), TargetId(31));
        stage.mount(Node::new(card));
        stage.mount(Node::new(path));
        let mut engine = MotionEngine::new(MotionConfig::default(), stage);
        assert!(engine.hover(HoverSpec::stroke_draw(card, path)));
        let stroke = |e: &MotionEngine<Stage>| e.surface().get(path).unwrap().stroke_offset;
        assert_eq!(stroke(&engine), 2000.0);

        engine.push_input(InputEvent::PointerEnter { target: card });
        run(&mut engine, 30);
        let mid = stroke(&engine);
        assert!(mid < 2000.0 && mid > 0.0);

        engine.push_input(InputEvent::PointerLeave { target: card });
        engine.frame(DT);
        assert!(stroke(&engine) >= mid);
        run(&mut engine, 70);
        assert!((stroke(&engine) - 2000.0).abs() < 1e-2);
    }

    #[test]
    fn intro_cue_starts_chained_scramble() {
        let mut stage = Stage::new();
        let (container, logo) = (TargetId(1), TargetId(2));
        stage.mount(Node::new(container));
        stage.mount(Node::new(logo).with_text("RK"));
        let mut engine = MotionEngine::new(MotionConfig::default(), stage);

        let json = r#"{
            "intro": {
                "steps": [
                    { "target": 1, "from": { "opacity": 0 }, "to": { "opacity": 1 }, "duration": 0.3 },
                    { "target": 2, "from": { "opacity": 0 }, "to": { "opacity": 1 }, "duration": 0.5,
                      "position": "+=0.2", "cue": 1 }
                ],
                "cues": [
                    { "cue": 1, "scramble": { "target": 2, "text": "Raphael Kalonji", "duration": 1.2,
                      "then": { "target": 2, "text": "RK", "duration": 0.8, "delay": 0.8 } } }
                ]
            }
        }"#;
        engine.load_manifest_json(json).unwrap();

        // Cue at 0.5s
        run(&mut engine, 31);
        assert!(kinds(&engine).contains(&event_kind::CUE));
        assert_eq!(engine.scrambles().len(), 1);

        let text = |e: &MotionEngine<Stage>| e.surface().get(logo).unwrap().text.clone();
        engine.scramble_tick(1.2);
        assert_eq!(text(&engine), "Raphael Kalonji");
        engine.scramble_tick(0.4);
        engine.scramble_tick(0.4);
        engine.scramble_tick(0.8);
        assert_eq!(text(&engine), "RK");
        let completed = engine.events().iter().filter(|e| e.kind == event_kind::SCRAMBLE_COMPLETE).count();
        assert_eq!(completed, 2);
    }

    #[test]
    fn load_and_loop_entries_start_on_load() {
        let mut stage = Stage::new();
        for id in [40, 41, 50] {
            stage.mount(Node::new(TargetId(id)));
        }
        let mut engine = MotionEngine::new(MotionConfig::default(), stage);
        let json = r#"{
            "loads": [ { "targets": [40, 41], "from": { "opacity": 0 }, "to": { "opacity": 1 },
                         "duration": 0.5, "stagger": 0.5 } ],
            "loops": [ { "target": 50, "to": { "scale": 1.4 }, "duration": 1.5 } ]
        }"#;
        engine.load_manifest_json(json).unwrap();
        assert_eq!(opacity(&engine, TargetId(41)), 0.0);

        run(&mut engine, 120);
        assert!((opacity(&engine, TargetId(40)) - 1.0).abs() < 1e-4);
        assert!((opacity(&engine, TargetId(41)) - 1.0).abs() < 1e-4);
        // Two seconds in, the pulse is on its way back down
        let scale = engine.surface().get(TargetId(50)).unwrap().scale;
        assert!(scale > 1.0 && scale < 1.4);

        assert_eq!(engine.timelines().len(), 2);
        engine.release_target(TargetId(50));
        assert_eq!(engine.timelines().len(), 1);
    }

    #[test]
    fn unmounted_targets_are_skipped() {
        let mut engine = engine();
        assert!(engine.reveal(&RevealSpec::fade_up(vec![TargetId(99), CARD])).len() == 1);
        assert!(!engine.hover(HoverSpec::stroke_draw(CARD, TargetId(98))));
        assert!(!engine.section("nowhere", TargetId(97)));
    }

    #[test]
    fn release_target_tears_down_bindings() {
        let mut engine = engine();
        engine.reveal(&RevealSpec::fade_up(vec![CARD]));
        assert_eq!(engine.triggers().len(), 1);
        engine.release_target(CARD);
        assert!(engine.triggers().is_empty());
        assert!(engine.timelines().is_empty());
    }

    #[test]
    fn attach_runs_pipeline_and_detaches_when_dropped() {
        let clock = FrameClock::default();
        let engine = Rc::new(RefCell::new(engine()));
        engine.borrow_mut().reveal(&RevealSpec::fade_up(vec![CARD]));
        let attachment = MotionEngine::attach(&engine, &clock);
        assert_eq!(clock.len(), 3);

        engine.borrow_mut().scroll_mut().scroll_to(1000.0, true);
        clock.tick_with_dt(0.0, DT);
        assert!(opacity(&engine.borrow(), CARD) > 0.0);

        drop(engine);
        clock.tick_with_dt(16.0, DT);
        assert!(clock.is_empty());
        assert!(!attachment.is_active());
        attachment.cancel();
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut engine = engine();
        engine.reveal(&RevealSpec::fade_up(vec![CARD]));
        engine.clear_events();
        engine.destroy();
        engine.destroy();
        assert_eq!(kinds(&engine), vec![event_kind::SCROLL_RELEASED]);
        assert!(!engine.scroll().captures_native());

        engine.push_input(InputEvent::Wheel { delta_y: 500.0 });
        engine.frame(DT);
        assert_eq!(engine.scroll().current_offset(), 0.0);
    }

    #[test]
    fn config_from_json_fills_defaults() {
        let config = MotionConfig::from_json(r#"{ "focus_bias": 120, "scroll": { "rate": 8 } }"#).unwrap();
        assert_eq!(config.focus_bias, 120.0);
        assert_eq!(config.scroll.rate, 8.0);
        assert_eq!(config.scroll.touch_multiplier, 2.0);
        assert_eq!(config.scramble.tick_rate, 30.0);
    }
}
