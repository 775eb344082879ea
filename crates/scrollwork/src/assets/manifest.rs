use serde::{Deserialize, Serialize};

use crate::api::types::{Property, TargetId};
use crate::core::error::MotionError;
use crate::extensions::easing::Easing;
use crate::extensions::timeline::{AnimateOptions, Position, Props, Sequence};
use crate::systems::scramble::ScrambleRequest;
use crate::systems::triggers::{ToggleActions, TriggerPosition};

/// Motion manifest describing every scroll-driven animation on a page.
/// Loaded from a JSON file at runtime; target ids are assigned by the page shell.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionManifest {
    /// Elements revealed as they scroll into view.
    pub reveals: Vec<RevealSpec>,
    /// Navigation sections, in any order.
    pub sections: Vec<SectionSpec>,
    /// Hover-triggered stroke draws.
    pub hovers: Vec<HoverSpec>,
    /// Text scrambles started as soon as the manifest loads.
    pub scrambles: Vec<ScrambleSpec>,
    /// Entrance animations started as soon as the manifest loads.
    pub loads: Vec<LoadSpec>,
    /// Repeating ambient animations (pulses), started on load.
    pub loops: Vec<LoopSpec>,
    /// Page-load intro sequence.
    pub intro: Option<IntroSpec>,
}

impl MotionManifest {
    /// Parse a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, MotionError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Trigger-bound entrance animation. Each target gets its own zone; target
/// `i` is delayed by `delay + i * stagger`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealSpec {
    pub targets: Vec<TargetId>,
    #[serde(default)]
    pub from: Props,
    pub to: Props,
    #[serde(default = "default_reveal_duration")]
    pub duration: f32,
    #[serde(default)]
    pub delay: f32,
    #[serde(default)]
    pub stagger: f32,
    #[serde(default = "default_reveal_ease")]
    pub ease: Easing,
    #[serde(default = "default_reveal_start")]
    pub start: TriggerPosition,
    #[serde(default = "default_reveal_end")]
    pub end: TriggerPosition,
    #[serde(default)]
    pub toggle_actions: ToggleActions,
}

impl RevealSpec {
    pub fn new(targets: Vec<TargetId>, from: Props, to: Props) -> Self {
        Self {
            targets,
            from,
            to,
            duration: default_reveal_duration(),
            delay: 0.0,
            stagger: 0.0,
            ease: default_reveal_ease(),
            start: default_reveal_start(),
            end: default_reveal_end(),
            toggle_actions: ToggleActions::default(),
        }
    }

    /// Fade up from 50px below, the look used for cards and headings.
    pub fn fade_up(targets: Vec<TargetId>) -> Self {
        Self::new(
            targets,
            Props::new().opacity(0.0).translate_y(50.0),
            Props::new().opacity(1.0).translate_y(0.0),
        )
    }

    pub fn with_stagger(mut self, stagger: f32) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn with_start(mut self, start: TriggerPosition) -> Self {
        self.start = start;
        self
    }

    pub fn with_toggle_actions(mut self, actions: ToggleActions) -> Self {
        self.toggle_actions = actions;
        self
    }
}

fn default_reveal_duration() -> f32 {
    1.0
}

fn default_reveal_ease() -> Easing {
    Easing::QuintOut
}

/// `"top bottom-=100"`: start once the element is 100px into the viewport.
fn default_reveal_start() -> TriggerPosition {
    TriggerPosition {
        viewport_offset: -100.0,
        ..TriggerPosition::TOP_BOTTOM
    }
}

fn default_reveal_end() -> TriggerPosition {
    TriggerPosition::BOTTOM_TOP
}

/// Untriggered entrance animation, played once on load. Target `i` starts
/// at `delay + i * stagger`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSpec {
    pub targets: Vec<TargetId>,
    #[serde(default)]
    pub from: Props,
    pub to: Props,
    #[serde(default = "default_reveal_duration")]
    pub duration: f32,
    #[serde(default)]
    pub delay: f32,
    #[serde(default)]
    pub stagger: f32,
    #[serde(default = "default_load_ease")]
    pub ease: Easing,
}

impl LoadSpec {
    pub fn to_options(&self) -> AnimateOptions {
        AnimateOptions::new(self.duration)
            .with_delay(self.delay)
            .with_stagger(self.stagger)
            .with_ease(self.ease)
    }
}

fn default_load_ease() -> Easing {
    Easing::QuartOut
}

/// Repeating animation on one target. Missing `from` values start at the
/// target's current value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSpec {
    pub target: TargetId,
    #[serde(default)]
    pub from: Props,
    pub to: Props,
    pub duration: f32,
    #[serde(default = "default_loop_ease")]
    pub ease: Easing,
    /// Extra passes; negative loops forever.
    #[serde(default = "default_loop_repeat")]
    pub repeat: i32,
    #[serde(default = "default_loop_yoyo")]
    pub yoyo: bool,
}

impl LoopSpec {
    /// Scale and fade pulse for "live" indicators.
    pub fn pulse(target: TargetId) -> Self {
        Self {
            target,
            from: Props::new(),
            to: Props::new().scale(1.4).opacity(0.6),
            duration: 1.5,
            ease: default_loop_ease(),
            repeat: default_loop_repeat(),
            yoyo: default_loop_yoyo(),
        }
    }

    pub fn to_options(&self) -> AnimateOptions {
        let options = AnimateOptions::new(self.duration)
            .with_ease(self.ease)
            .with_repeat(self.repeat);
        if self.yoyo {
            options.yoyo()
        } else {
            options
        }
    }
}

fn default_loop_ease() -> Easing {
    Easing::CubicInOut
}

fn default_loop_repeat() -> i32 {
    -1
}

fn default_loop_yoyo() -> bool {
    true
}

/// A named navigation range measured from a target's bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSpec {
    pub name: String,
    pub target: TargetId,
}

/// Pointer-driven draw: entering `target` animates `path` to `active`,
/// leaving animates it back to `rest` from wherever it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoverSpec {
    pub target: TargetId,
    pub path: TargetId,
    #[serde(default = "default_hover_property")]
    pub property: Property,
    #[serde(default = "default_hover_rest")]
    pub rest: f32,
    #[serde(default)]
    pub active: f32,
    #[serde(default = "default_hover_enter_duration")]
    pub enter_duration: f32,
    #[serde(default = "default_hover_enter_ease")]
    pub enter_ease: Easing,
    #[serde(default = "default_hover_leave_duration")]
    pub leave_duration: f32,
    #[serde(default = "default_hover_leave_ease")]
    pub leave_ease: Easing,
}

impl HoverSpec {
    /// Stroke-dashoffset draw on `path` while `target` is hovered.
    pub fn stroke_draw(target: TargetId, path: TargetId) -> Self {
        Self {
            target,
            path,
            property: default_hover_property(),
            rest: default_hover_rest(),
            active: 0.0,
            enter_duration: default_hover_enter_duration(),
            enter_ease: default_hover_enter_ease(),
            leave_duration: default_hover_leave_duration(),
            leave_ease: default_hover_leave_ease(),
        }
    }
}

fn default_hover_property() -> Property {
    Property::StrokeOffset
}

fn default_hover_rest() -> f32 {
    2000.0
}

fn default_hover_enter_duration() -> f32 {
    1.5
}

fn default_hover_enter_ease() -> Easing {
    Easing::QuintOut
}

fn default_hover_leave_duration() -> f32 {
    1.0
}

fn default_hover_leave_ease() -> Easing {
    Easing::QuintIn
}

/// Scramble description; `then` chains another scramble after completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrambleSpec {
    pub target: TargetId,
    pub text: String,
    pub duration: f32,
    #[serde(default)]
    pub delay: f32,
    #[serde(default)]
    pub then: Option<Box<ScrambleSpec>>,
}

impl ScrambleSpec {
    /// Build the request, wiring `then` into the completion callback.
    pub fn to_request(&self) -> ScrambleRequest {
        let request = ScrambleRequest::new(self.target, self.text.clone(), self.duration).with_delay(self.delay);
        match self.then.clone() {
            Some(next) => request.on_complete(move |engine| {
                engine.enqueue(next.to_request());
            }),
            None => request,
        }
    }
}

/// One step of the intro sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub target: TargetId,
    /// Absent: animate from the current value.
    #[serde(default)]
    pub from: Option<Props>,
    pub to: Props,
    pub duration: f32,
    #[serde(default = "default_step_ease")]
    pub ease: Easing,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub cue: Option<u32>,
}

fn default_step_ease() -> Easing {
    Easing::QuadOut
}

/// Scramble started when the intro reaches a cue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueSpec {
    pub cue: u32,
    pub scramble: ScrambleSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntroSpec {
    pub steps: Vec<StepSpec>,
    pub cues: Vec<CueSpec>,
}

impl IntroSpec {
    pub fn to_sequence(&self) -> Sequence {
        self.steps.iter().fold(Sequence::new(), |seq, step| {
            let seq = match &step.from {
                Some(from) => seq.from_to(step.target, from.clone(), step.to.clone(), step.duration, step.ease, step.position),
                None => seq.to(step.target, step.to.clone(), step.duration, step.ease, step.position),
            };
            match step.cue {
                Some(cue) => seq.cue(cue),
                None => seq,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::triggers::ToggleAction;

    const PORTFOLIO: &str = r#"{
        "reveals": [
            { "targets": [10, 11, 12],
              "from": { "opacity": 0, "translate_y": 50 },
              "to": { "opacity": 1, "translate_y": 0 },
              "stagger": 0.2 }
        ],
        "sections": [
            { "name": "experience", "target": 20 },
            { "name": "projects", "target": 21 },
            { "name": "contact", "target": 22 }
        ],
        "hovers": [ { "target": 30, "path": 31 } ],
        "loads": [
            { "targets": [40], "from": { "opacity": 0, "translate_y": 30 }, "to": { "opacity": 1, "translate_y": 0 } },
            { "targets": [41, 42], "from": { "opacity": 0, "translate_y": 20 }, "to": { "opacity": 1, "translate_y": 0 },
              "duration": 0.8, "stagger": 0.2, "delay": 0.3 }
        ],
        "loops": [ { "target": 50, "to": { "scale": 1.4, "opacity": 0.6 }, "duration": 1.5 } ],
        "intro": {
            "steps": [
                { "target": 1, "to": { "opacity": 1 }, "duration": 0.3 },
                { "target": 2, "from": { "opacity": 0, "scale": 0.8 }, "to": { "opacity": 1, "scale": 1 },
                  "duration": 0.5, "ease": "power2.out", "position": "+=0.2", "cue": 1 },
                { "target": 3, "from": { "opacity": 0, "translate_y": 30 }, "to": { "opacity": 1, "translate_y": 0 },
                  "duration": 1.0, "ease": "power2.out", "position": "-=0.8" }
            ],
            "cues": [
                { "cue": 1, "scramble": { "target": 2, "text": "Raphael Kalonji", "duration": 1.2,
                  "then": { "target": 2, "text": "RK", "duration": 0.8, "delay": 0.8 } } }
            ]
        }
    }"#;

    #[test]
    fn parse_portfolio_manifest() {
        let manifest = MotionManifest::from_json(PORTFOLIO).unwrap();

        let reveal = &manifest.reveals[0];
        assert_eq!(reveal.targets.len(), 3);
        assert_eq!(reveal.ease, Easing::QuintOut);
        assert_eq!(reveal.start.viewport_offset, -100.0);
        assert_eq!(reveal.toggle_actions.on_leave_back, ToggleAction::Reverse);

        let hover = &manifest.hovers[0];
        assert_eq!(hover.property, Property::StrokeOffset);
        assert_eq!(hover.rest, 2000.0);
        assert_eq!(hover.enter_ease, Easing::QuintOut);
        assert_eq!(hover.leave_ease, Easing::QuintIn);

        assert_eq!(manifest.loads[0].ease, Easing::QuartOut);
        assert_eq!(manifest.loads[1].stagger, 0.2);
        let pulse = &manifest.loops[0];
        assert_eq!(pulse.repeat, -1);
        assert!(pulse.yoyo);
        assert_eq!(pulse.ease, Easing::CubicInOut);
        assert_eq!(pulse.to, LoopSpec::pulse(TargetId(50)).to);

        let intro = manifest.intro.as_ref().unwrap();
        assert_eq!(intro.steps[1].position, Position::After(0.2));
        assert_eq!(intro.steps[2].position, Position::Overlap(0.8));
        assert_eq!(intro.to_sequence().len(), 3);
        assert_eq!(intro.cues[0].scramble.then.as_ref().unwrap().text, "RK");
    }

    #[test]
    fn empty_manifest_uses_defaults() {
        let manifest = MotionManifest::from_json("{}").unwrap();
        assert!(manifest.reveals.is_empty());
        assert!(manifest.intro.is_none());
        assert!(manifest.loads.is_empty() && manifest.loops.is_empty());
    }

    #[test]
    fn bad_positions_are_rejected() {
        let json = r#"{ "reveals": [ { "targets": [1], "to": {}, "start": "top sideways" } ] }"#;
        assert!(matches!(MotionManifest::from_json(json), Err(MotionError::Json(_))));
    }

    #[test]
    fn reveal_defaults_match_builder() {
        let spec = RevealSpec::fade_up(vec![TargetId(1)]);
        assert_eq!(spec.duration, 1.0);
        assert_eq!(spec.start, "top bottom-=100".parse::<TriggerPosition>().unwrap());
        assert_eq!(spec.end, TriggerPosition::BOTTOM_TOP);
    }
}
