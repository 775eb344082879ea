//! Viewport trigger zones.
//!
//! A zone is a range of scroll offsets `[start, end)`. Element zones derive
//! that range from the target's bounds and two GSAP-style positions such as
//! `"top bottom-=100"` ("the element's top meets the viewport's bottom minus
//! 100px"). Every tick the registry classifies the virtual offset as before,
//! inside or after each zone and emits events only when that side changes.
//!
//! Per zone, emitted transitions always alternate Enter, Leave, Enter, ...
//! A zone jumped over in a single tick emits Enter then Leave in that tick.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::types::TargetId;
use crate::core::error::MotionError;
use crate::core::surface::{Rect, Surface};

/// Smallest allowed zone length in pixels; keeps `start < end`.
pub const MIN_ZONE_SPAN: f32 = 1.0;

/// Handle to a registered zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(pub u32);

/// One edge of an element zone: where on the element meets where on the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct TriggerPosition {
    /// Fraction of the element's height (0 = top, 1 = bottom).
    pub element: f32,
    /// Extra pixels added to the element point.
    pub element_offset: f32,
    /// Fraction of the viewport's height (0 = top, 1 = bottom).
    pub viewport: f32,
    /// Extra pixels added to the viewport point.
    pub viewport_offset: f32,
}

impl TriggerPosition {
    pub const fn new(element: f32, viewport: f32) -> Self {
        Self {
            element,
            element_offset: 0.0,
            viewport,
            viewport_offset: 0.0,
        }
    }

    /// `"top bottom"`: the element's top reaches the bottom of the viewport.
    pub const TOP_BOTTOM: TriggerPosition = TriggerPosition::new(0.0, 1.0);
    /// `"bottom top"`: the element's bottom passes the top of the viewport.
    pub const BOTTOM_TOP: TriggerPosition = TriggerPosition::new(1.0, 0.0);

    /// Scroll offset at which this edge is crossed.
    pub fn resolve(&self, bounds: Rect, viewport_height: f32) -> f32 {
        let element_point = bounds.top() + self.element * bounds.height() + self.element_offset;
        let viewport_point = self.viewport * viewport_height + self.viewport_offset;
        element_point - viewport_point
    }

    pub fn parse(text: &str) -> Result<Self, MotionError> {
        let mut parts = text.split_whitespace();
        let (Some(element), Some(viewport), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(MotionError::Position(text.to_string()));
        };
        let (element, element_offset) =
            parse_edge(element).ok_or_else(|| MotionError::Position(text.to_string()))?;
        let (viewport, viewport_offset) =
            parse_edge(viewport).ok_or_else(|| MotionError::Position(text.to_string()))?;
        Ok(Self {
            element,
            element_offset,
            viewport,
            viewport_offset,
        })
    }
}

impl FromStr for TriggerPosition {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TriggerPosition {
    type Error = MotionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Parse `"bottom-=100"`, `"center"`, `"80%"` or `"120px"` into (fraction, pixels).
fn parse_edge(token: &str) -> Option<(f32, f32)> {
    let (anchor, adjust) = if let Some(idx) = token.find("+=") {
        (&token[..idx], parse_px(&token[idx + 2..])?)
    } else if let Some(idx) = token.find("-=") {
        (&token[..idx], -parse_px(&token[idx + 2..])?)
    } else {
        (token, 0.0)
    };
    let fraction = match anchor {
        "top" => 0.0,
        "center" => 0.5,
        "bottom" => 1.0,
        pct if pct.ends_with('%') => pct.trim_end_matches('%').parse::<f32>().ok()? / 100.0,
        // A bare pixel value is measured from the top
        px => return Some((0.0, parse_px(px)? + adjust)),
    };
    Some((fraction, adjust))
}

fn parse_px(text: &str) -> Option<f32> {
    text.trim_end_matches("px").parse().ok()
}

/// How a zone's scroll range is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneSpan {
    /// Explicit scroll offsets.
    Fixed { start: f32, end: f32 },
    /// Derived from a target's bounds; recomputed when bounds are invalidated.
    Element {
        target: TargetId,
        start: TriggerPosition,
        end: TriggerPosition,
    },
}

/// Registration parameters for a zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerConfig {
    pub span: ZoneSpan,
}

impl TriggerConfig {
    pub fn fixed(start: f32, end: f32) -> Self {
        Self {
            span: ZoneSpan::Fixed { start, end },
        }
    }

    /// Element zone with GSAP's defaults: `"top bottom"` to `"bottom top"`.
    pub fn element(target: TargetId) -> Self {
        Self {
            span: ZoneSpan::Element {
                target,
                start: TriggerPosition::TOP_BOTTOM,
                end: TriggerPosition::BOTTOM_TOP,
            },
        }
    }

    pub fn with_start(mut self, position: TriggerPosition) -> Self {
        if let ZoneSpan::Element { start, .. } = &mut self.span {
            *start = position;
        }
        self
    }

    pub fn with_end(mut self, position: TriggerPosition) -> Self {
        if let ZoneSpan::Element { end, .. } = &mut self.span {
            *end = position;
        }
        self
    }

    pub fn target(&self) -> Option<TargetId> {
        match self.span {
            ZoneSpan::Element { target, .. } => Some(target),
            ZoneSpan::Fixed { .. } => None,
        }
    }
}

/// Which way the virtual offset moved this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// Toward the end of the document.
    Forward,
    /// Toward the top.
    Backward,
}

/// Lifecycle of a zone as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoneState {
    /// Outside the range.
    #[default]
    Idle,
    /// Entered during the latest tick.
    Entering,
    /// Inside the range.
    Active,
    /// Left during the latest tick.
    Leaving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Before,
    Inside,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerEventKind {
    Enter,
    Leave,
    /// Linear position within the zone, clamped to [0, 1]. Only while active.
    Progress(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEvent {
    pub zone: TriggerId,
    pub kind: TriggerEventKind,
    pub direction: ScrollDirection,
}

/// A registered zone.
#[derive(Debug, Clone)]
pub struct TriggerZone {
    id: TriggerId,
    span: ZoneSpan,
    start_offset: f32,
    end_offset: f32,
    state: ZoneState,
    /// Side at the last evaluation; `None` until first evaluated.
    side: Option<Side>,
    progress: f32,
    /// Bounds must be re-read before the next evaluation.
    dirty: bool,
}

impl TriggerZone {
    pub fn id(&self) -> TriggerId {
        self.id
    }

    pub fn state(&self) -> ZoneState {
        self.state
    }

    pub fn start_offset(&self) -> f32 {
        self.start_offset
    }

    pub fn end_offset(&self) -> f32 {
        self.end_offset
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn target(&self) -> Option<TargetId> {
        match self.span {
            ZoneSpan::Element { target, .. } => Some(target),
            ZoneSpan::Fixed { .. } => None,
        }
    }

    /// Recompute the scroll range. Returns false if the target is not mounted.
    fn resolve(&mut self, surface: &dyn Surface, viewport_height: f32) -> bool {
        let (start, end) = match self.span {
            ZoneSpan::Fixed { start, end } => (start, end),
            ZoneSpan::Element { target, start, end } => {
                let Some(bounds) = surface.bounds(target) else {
                    return false;
                };
                (
                    start.resolve(bounds, viewport_height),
                    end.resolve(bounds, viewport_height),
                )
            }
        };
        self.start_offset = start;
        self.end_offset = if end - start < MIN_ZONE_SPAN {
            start + MIN_ZONE_SPAN
        } else {
            end
        };
        self.dirty = false;
        true
    }

    fn side_of(&self, offset: f32) -> Side {
        if offset < self.start_offset {
            Side::Before
        } else if offset < self.end_offset {
            Side::Inside
        } else {
            Side::After
        }
    }

    fn evaluate(&mut self, offset: f32, direction: ScrollDirection, out: &mut Vec<TriggerEvent>) {
        // Transitional states last exactly one tick
        self.state = match self.state {
            ZoneState::Entering => ZoneState::Active,
            ZoneState::Leaving => ZoneState::Idle,
            other => other,
        };

        let next = self.side_of(offset);
        let prev = self.side;
        self.side = Some(next);

        let id = self.id;
        let mut emit = |kind| out.push(TriggerEvent { zone: id, kind, direction });

        match (prev, next) {
            (Some(Side::Inside), Side::Inside) => {
                let p = self.progress_at(offset);
                if p != self.progress {
                    self.progress = p;
                    emit(TriggerEventKind::Progress(p));
                }
            }
            (_, Side::Inside) => {
                self.state = ZoneState::Entering;
                self.progress = self.progress_at(offset);
                emit(TriggerEventKind::Enter);
                emit(TriggerEventKind::Progress(self.progress));
            }
            (Some(Side::Inside), outside) => {
                self.state = ZoneState::Leaving;
                self.progress = if outside == Side::After { 1.0 } else { 0.0 };
                emit(TriggerEventKind::Leave);
            }
            // Traversed the whole zone between two ticks (or registered already past it)
            (Some(Side::Before), Side::After) | (Some(Side::After), Side::Before) | (None, Side::After) => {
                self.state = ZoneState::Leaving;
                self.progress = if next == Side::After { 1.0 } else { 0.0 };
                emit(TriggerEventKind::Enter);
                emit(TriggerEventKind::Leave);
            }
            _ => {}
        }
    }

    fn progress_at(&self, offset: f32) -> f32 {
        ((offset - self.start_offset) / (self.end_offset - self.start_offset)).clamp(0.0, 1.0)
    }
}

/// Tracks all registered zones and evaluates them against the virtual offset.
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    zones: Vec<TriggerZone>,
    next_id: u32,
    viewport_height: f32,
    last_offset: Option<f32>,
}

impl TriggerRegistry {
    pub fn new(viewport_height: f32) -> Self {
        Self {
            viewport_height,
            ..Default::default()
        }
    }

    /// Register a zone. It is evaluated on the next `update`.
    pub fn register(&mut self, config: TriggerConfig) -> TriggerId {
        let id = TriggerId(self.next_id);
        self.next_id += 1;
        self.zones.push(TriggerZone {
            id,
            span: config.span,
            start_offset: 0.0,
            end_offset: MIN_ZONE_SPAN,
            state: ZoneState::Idle,
            side: None,
            progress: 0.0,
            dirty: true,
        });
        id
    }

    /// Remove a zone. Idempotent; returns whether it was registered.
    pub fn unregister(&mut self, id: TriggerId) -> bool {
        let before = self.zones.len();
        self.zones.retain(|z| z.id != id);
        self.zones.len() != before
    }

    /// Remove every zone bound to a target (element unmounted).
    pub fn unregister_target(&mut self, target: TargetId) -> Vec<TriggerId> {
        let removed: Vec<TriggerId> = self
            .zones
            .iter()
            .filter(|z| z.target() == Some(target))
            .map(|z| z.id)
            .collect();
        self.zones.retain(|z| z.target() != Some(target));
        removed
    }

    pub fn get(&self, id: TriggerId) -> Option<&TriggerZone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    /// New viewport height: every element zone must be re-resolved.
    pub fn set_viewport_height(&mut self, height: f32) {
        if height != self.viewport_height {
            self.viewport_height = height;
            self.invalidate();
        }
    }

    /// Mark all zone bounds stale (resize, content mutation).
    pub fn invalidate(&mut self) {
        for zone in &mut self.zones {
            zone.dirty = true;
        }
    }

    /// Mark one target's zones stale.
    pub fn invalidate_target(&mut self, target: TargetId) {
        for zone in self.zones.iter_mut().filter(|z| z.target() == Some(target)) {
            zone.dirty = true;
        }
    }

    /// Evaluate every zone against the virtual offset, in registration order.
    pub fn update(&mut self, offset: f32, surface: &dyn Surface) -> Vec<TriggerEvent> {
        let direction = match self.last_offset {
            Some(last) if offset < last => ScrollDirection::Backward,
            _ => ScrollDirection::Forward,
        };
        self.last_offset = Some(offset);

        let mut events = Vec::new();
        for zone in &mut self.zones {
            if zone.dirty && !zone.resolve(surface, self.viewport_height) {
                // Target not mounted yet; stays dormant until it is
                continue;
            }
            zone.evaluate(offset, direction, &mut events);
        }
        events
    }

    pub fn clear(&mut self) {
        self.zones.clear();
        self.last_offset = None;
    }
}

/// What a bound timeline does on each zone crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Play,
    Pause,
    Resume,
    Reverse,
    Restart,
    Reset,
    None,
}

impl FromStr for ToggleAction {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "play" => ToggleAction::Play,
            "pause" => ToggleAction::Pause,
            "resume" => ToggleAction::Resume,
            "reverse" => ToggleAction::Reverse,
            "restart" => ToggleAction::Restart,
            "reset" => ToggleAction::Reset,
            "none" => ToggleAction::None,
            other => return Err(MotionError::ToggleActions(other.to_string())),
        })
    }
}

impl ToggleAction {
    fn name(self) -> &'static str {
        match self {
            ToggleAction::Play => "play",
            ToggleAction::Pause => "pause",
            ToggleAction::Resume => "resume",
            ToggleAction::Reverse => "reverse",
            ToggleAction::Restart => "restart",
            ToggleAction::Reset => "reset",
            ToggleAction::None => "none",
        }
    }
}

/// Actions for enter, leave, enter-back and leave-back, written like
/// `"play none none reverse"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToggleActions {
    pub on_enter: ToggleAction,
    pub on_leave: ToggleAction,
    pub on_enter_back: ToggleAction,
    pub on_leave_back: ToggleAction,
}

impl ToggleActions {
    /// Action for a crossing. Leaving or entering while scrolling backward
    /// crosses the zone's far edge.
    pub fn action_for(&self, kind: TriggerEventKind, direction: ScrollDirection) -> ToggleAction {
        match (kind, direction) {
            (TriggerEventKind::Enter, ScrollDirection::Forward) => self.on_enter,
            (TriggerEventKind::Enter, ScrollDirection::Backward) => self.on_enter_back,
            (TriggerEventKind::Leave, ScrollDirection::Forward) => self.on_leave,
            (TriggerEventKind::Leave, ScrollDirection::Backward) => self.on_leave_back,
            (TriggerEventKind::Progress(_), _) => ToggleAction::None,
        }
    }
}

impl Default for ToggleActions {
    /// `"play none none reverse"`: reveal on the way down, undo on the way back up.
    fn default() -> Self {
        Self {
            on_enter: ToggleAction::Play,
            on_leave: ToggleAction::None,
            on_enter_back: ToggleAction::None,
            on_leave_back: ToggleAction::Reverse,
        }
    }
}

impl FromStr for ToggleActions {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let actions = s
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<ToggleAction>, _>>()?;
        let [on_enter, on_leave, on_enter_back, on_leave_back] = actions[..] else {
            return Err(MotionError::ToggleActions(s.to_string()));
        };
        Ok(Self {
            on_enter,
            on_leave,
            on_enter_back,
            on_leave_back,
        })
    }
}

impl TryFrom<String> for ToggleActions {
    type Error = MotionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ToggleActions> for String {
    fn from(a: ToggleActions) -> String {
        format!(
            "{} {} {} {}",
            a.on_enter.name(),
            a.on_leave.name(),
            a.on_enter_back.name(),
            a.on_leave_back.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::{Node, Stage};
    use crate::systems::rng::Rng;

    fn kinds(events: &[TriggerEvent]) -> Vec<&'static str> {
        events
            .iter()
            .filter_map(|e| match e.kind {
                TriggerEventKind::Enter => Some("enter"),
                TriggerEventKind::Leave => Some("leave"),
                TriggerEventKind::Progress(_) => None,
            })
            .collect()
    }

    #[test]
    fn parses_gsap_positions() {
        let p = TriggerPosition::parse("top bottom-=100").unwrap();
        assert_eq!(p.element, 0.0);
        assert_eq!(p.viewport, 1.0);
        assert_eq!(p.viewport_offset, -100.0);

        let p: TriggerPosition = "center 80%".parse().unwrap();
        assert_eq!(p.element, 0.5);
        assert!((p.viewport - 0.8).abs() < 1e-6);

        assert!(TriggerPosition::parse("top").is_err());
        assert!(TriggerPosition::parse("top middle").is_err());
    }

    #[test]
    fn resolves_against_bounds_and_viewport() {
        // Element top at 2000, viewport 800: "top bottom-=100" fires at 2000 - 800 + 100
        let p = TriggerPosition::parse("top bottom-=100").unwrap();
        let offset = p.resolve(Rect::new(0.0, 2000.0, 100.0, 400.0), 800.0);
        assert_eq!(offset, 1300.0);
    }

    #[test]
    fn high_velocity_jump_emits_enter_then_leave() {
        let stage = Stage::new();
        let mut reg = TriggerRegistry::new(800.0);
        let id = reg.register(TriggerConfig::fixed(500.0, 700.0));

        assert!(reg.update(400.0, &stage).is_empty());
        let events = reg.update(900.0, &stage);
        assert_eq!(kinds(&events), vec!["enter", "leave"]);
        assert!(events.iter().all(|e| e.zone == id && e.direction == ScrollDirection::Forward));
        assert_eq!(reg.get(id).unwrap().state(), ZoneState::Leaving);
    }

    #[test]
    fn enter_active_leave_cycle() {
        let stage = Stage::new();
        let mut reg = TriggerRegistry::new(800.0);
        let id = reg.register(TriggerConfig::fixed(500.0, 700.0));

        reg.update(0.0, &stage);
        assert_eq!(kinds(&reg.update(550.0, &stage)), vec!["enter"]);
        assert_eq!(reg.get(id).unwrap().state(), ZoneState::Entering);

        let events = reg.update(600.0, &stage);
        assert_eq!(reg.get(id).unwrap().state(), ZoneState::Active);
        assert_eq!(events[0].kind, TriggerEventKind::Progress(0.5));

        let events = reg.update(450.0, &stage);
        assert_eq!(kinds(&events), vec!["leave"]);
        assert_eq!(events[0].direction, ScrollDirection::Backward);

        reg.update(450.0, &stage);
        assert_eq!(reg.get(id).unwrap().state(), ZoneState::Idle);
    }

    #[test]
    fn already_satisfied_zone_enters_on_first_tick() {
        let stage = Stage::new();
        let mut reg = TriggerRegistry::new(800.0);
        reg.register(TriggerConfig::fixed(0.0, 0.0));
        assert_eq!(kinds(&reg.update(0.0, &stage)), vec!["enter"]);
    }

    #[test]
    fn zone_registered_past_its_range_still_terminates() {
        let stage = Stage::new();
        let mut reg = TriggerRegistry::new(800.0);
        reg.register(TriggerConfig::fixed(100.0, 200.0));
        assert_eq!(kinds(&reg.update(5000.0, &stage)), vec!["enter", "leave"]);
    }

    #[test]
    fn jitter_on_boundary_never_duplicates() {
        let stage = Stage::new();
        let mut reg = TriggerRegistry::new(800.0);
        reg.register(TriggerConfig::fixed(500.0, 700.0));
        reg.update(0.0, &stage);

        let mut all = Vec::new();
        for offset in [500.0, 500.0, 499.0, 500.0, 500.5, 499.9, 499.9] {
            all.extend(kinds(&reg.update(offset, &stage)));
        }
        assert_eq!(all, vec!["enter", "leave", "enter", "leave"]);
    }

    #[test]
    fn event_sequence_always_alternates() {
        let stage = Stage::new();
        let mut reg = TriggerRegistry::new(800.0);
        reg.register(TriggerConfig::fixed(1000.0, 1400.0));
        let mut rng = Rng::new(1234);

        let mut sequence = Vec::new();
        for _ in 0..2000 {
            let offset = rng.next_int(3000) as f32;
            sequence.extend(kinds(&reg.update(offset, &stage)));
        }

        assert!(!sequence.is_empty());
        for (i, kind) in sequence.iter().enumerate() {
            let expected = if i % 2 == 0 { "enter" } else { "leave" };
            assert_eq!(*kind, expected, "bad transition at {}", i);
        }
    }

    #[test]
    fn progress_only_while_active() {
        let stage = Stage::new();
        let mut reg = TriggerRegistry::new(800.0);
        reg.register(TriggerConfig::fixed(0.0, 100.0));
        reg.update(0.0, &stage);

        let events = reg.update(25.0, &stage);
        assert_eq!(events[0].kind, TriggerEventKind::Progress(0.25));

        let events = reg.update(300.0, &stage);
        assert!(events.iter().all(|e| !matches!(e.kind, TriggerEventKind::Progress(_))));
        let events = reg.update(400.0, &stage);
        assert!(events.is_empty());
    }

    #[test]
    fn element_zone_waits_for_mount_and_follows_resize() {
        let mut stage = Stage::new();
        let target = TargetId(7);
        let mut reg = TriggerRegistry::new(800.0);
        let id = reg.register(
            TriggerConfig::element(target).with_start(TriggerPosition::parse("top bottom-=100").unwrap()),
        );

        // Not mounted: dormant, no events
        assert!(reg.update(0.0, &stage).is_empty());

        stage.mount(Node::new(target).with_bounds(Rect::new(0.0, 1500.0, 300.0, 400.0)));
        reg.update(0.0, &stage);
        assert_eq!(reg.get(id).unwrap().start_offset(), 800.0);
        assert_eq!(reg.get(id).unwrap().end_offset(), 1900.0);

        // Viewport shrinks: start moves later
        reg.set_viewport_height(600.0);
        reg.update(0.0, &stage);
        assert_eq!(reg.get(id).unwrap().start_offset(), 1000.0);
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut reg = TriggerRegistry::new(800.0);
        let id = reg.register(TriggerConfig::fixed(0.0, 10.0));
        assert!(reg.unregister(id));
        assert!(!reg.unregister(id));
        assert!(reg.is_empty());
    }

    #[test]
    fn toggle_actions_parse() {
        let actions: ToggleActions = "play none none reverse".parse().unwrap();
        assert_eq!(actions, ToggleActions::default());
        assert_eq!(
            actions.action_for(TriggerEventKind::Leave, ScrollDirection::Backward),
            ToggleAction::Reverse
        );
        assert_eq!(String::from(actions), "play none none reverse");
        assert!("play none".parse::<ToggleActions>().is_err());
        assert!("play none none explode".parse::<ToggleActions>().is_err());
    }
}
