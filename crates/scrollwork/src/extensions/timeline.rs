// extensions/timeline.rs
//
// Timeline system: interpolated property animations keyed by TargetId.
// Reads and writes visual state only through the Surface trait.
//
// Usage:
//   let mut timelines = TimelineOrchestrator::new();
//   let h = timelines.animate(id, Props::new().opacity(0.0), Props::new().opacity(1.0),
//                             AnimateOptions::new(1.0), &mut stage);
//   timelines.tick(dt, &mut stage);   // advances playheads, writes properties
//   if let Some(h) = h { timelines.reverse(h); }   // plays back from current progress
//
// Every (target, property) pair has at most one live writer. A new timeline
// claiming any pair of a live one kills it first; the killed timeline's
// completion callback never runs.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::easing::{ease, Easing};
use crate::api::types::{Property, TargetId};
use crate::core::error::MotionError;
use crate::core::surface::Surface;

/// Property values for one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Props(BTreeMap<Property, f32>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, property: Property, value: f32) -> Self {
        self.0.insert(property, value);
        self
    }

    pub fn opacity(self, value: f32) -> Self {
        self.with(Property::Opacity, value)
    }

    pub fn translate(self, offset: Vec2) -> Self {
        self.with(Property::TranslateX, offset.x)
            .with(Property::TranslateY, offset.y)
    }

    pub fn translate_x(self, value: f32) -> Self {
        self.with(Property::TranslateX, value)
    }

    pub fn translate_y(self, value: f32) -> Self {
        self.with(Property::TranslateY, value)
    }

    pub fn scale(self, value: f32) -> Self {
        self.with(Property::Scale, value)
    }

    pub fn stroke_offset(self, value: f32) -> Self {
        self.with(Property::StrokeOffset, value)
    }

    pub fn get(&self, property: Property) -> Option<f32> {
        self.0.get(&property).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Property, f32)> + '_ {
        self.0.iter().map(|(p, v)| (*p, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

type OnComplete = Box<dyn FnOnce()>;

/// Timing options for `animate`.
pub struct AnimateOptions {
    /// Seconds per target.
    pub duration: f32,
    /// Seconds before the first target starts.
    pub delay: f32,
    /// Extra delay per target index in `animate_staggered`.
    pub stagger: f32,
    pub ease: Easing,
    /// Create without starting; `play` starts it.
    pub paused: bool,
    /// Extra passes after the first; negative repeats forever.
    pub repeat: i32,
    /// Alternate direction on every repeat.
    pub yoyo: bool,
    on_complete: Option<OnComplete>,
}

impl AnimateOptions {
    pub fn new(duration: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            delay: 0.0,
            stagger: 0.0,
            ease: Easing::QuadOut,
            paused: false,
            repeat: 0,
            yoyo: false,
            on_complete: None,
        }
    }

    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay.max(0.0);
        self
    }

    pub fn with_stagger(mut self, stagger: f32) -> Self {
        self.stagger = stagger.max(0.0);
        self
    }

    pub fn with_ease(mut self, ease: Easing) -> Self {
        self.ease = ease;
        self
    }

    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }

    /// Play `repeat` more times after the first pass; `-1` loops forever
    /// and never completes.
    pub fn with_repeat(mut self, repeat: i32) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn yoyo(mut self) -> Self {
        self.yoyo = true;
        self
    }

    /// Runs once, the first time the timeline completes playing forward.
    pub fn on_complete<F: FnOnce() + 'static>(mut self, callback: F) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

/// Where a sequence entry starts, relative to what came before.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Position {
    /// At the end of the sequence so far.
    #[default]
    End,
    /// `"+=gap"`: this many seconds after the end.
    After(f32),
    /// `"-=overlap"`: this many seconds before the end.
    Overlap(f32),
    /// `"<"`: together with the previous entry.
    WithPrevious,
    /// Absolute time in seconds.
    At(f32),
}

impl Position {
    fn resolve(self, end: f32, previous_start: f32) -> f32 {
        let t = match self {
            Position::End => end,
            Position::After(gap) => end + gap,
            Position::Overlap(overlap) => end - overlap,
            Position::WithPrevious => previous_start,
            Position::At(t) => t,
        };
        t.max(0.0)
    }
}

impl FromStr for Position {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let seconds = |v: &str| {
            v.trim()
                .parse::<f32>()
                .map_err(|_| MotionError::Position(s.to_string()))
        };
        if s.is_empty() {
            Ok(Position::End)
        } else if s == "<" {
            Ok(Position::WithPrevious)
        } else if let Some(v) = s.strip_prefix("+=") {
            Ok(Position::After(seconds(v)?))
        } else if let Some(v) = s.strip_prefix("-=") {
            Ok(Position::Overlap(seconds(v)?))
        } else {
            Ok(Position::At(seconds(s)?))
        }
    }
}

impl TryFrom<String> for Position {
    type Error = MotionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Position> for String {
    fn from(p: Position) -> String {
        match p {
            Position::End => String::new(),
            Position::After(gap) => format!("+={}", gap),
            Position::Overlap(overlap) => format!("-={}", overlap),
            Position::WithPrevious => "<".to_string(),
            Position::At(t) => t.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    target: TargetId,
    /// `None` animates from the target's value at creation.
    from: Option<Props>,
    to: Props,
    position: Position,
    duration: f32,
    ease: Easing,
    cue: Option<u32>,
}

/// Builder for multi-step timelines.
///
/// ```text
/// Sequence::new()
///     .to(container, Props::new().opacity(1.0), 0.3, Easing::QuadOut, Position::End)
///     .from_to(logo, hidden, shown, 0.5, Easing::CubicOut, "+=0.2".parse()?)
///     .cue(1)
/// ```
#[derive(Default)]
pub struct Sequence {
    entries: Vec<Entry>,
    paused: bool,
    on_complete: Option<OnComplete>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_to(
        mut self,
        target: TargetId,
        from: Props,
        to: Props,
        duration: f32,
        ease: Easing,
        position: Position,
    ) -> Self {
        self.entries.push(Entry {
            target,
            from: Some(from),
            to,
            position,
            duration: duration.max(0.0),
            ease,
            cue: None,
        });
        self
    }

    pub fn to(mut self, target: TargetId, to: Props, duration: f32, ease: Easing, position: Position) -> Self {
        self.entries.push(Entry {
            target,
            from: None,
            to,
            position,
            duration: duration.max(0.0),
            ease,
            cue: None,
        });
        self
    }

    /// Emit `TimelineEvent::Cue` when the playhead first reaches the start of
    /// the most recently added entry.
    pub fn cue(mut self, cue: u32) -> Self {
        if let Some(entry) = self.entries.last_mut() {
            entry.cue = Some(cue);
        }
        self
    }

    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }

    pub fn on_complete<F: FnOnce() + 'static>(mut self, callback: F) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One interpolated property inside a timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Step {
    target: TargetId,
    property: Property,
    from: f32,
    to: f32,
    /// Seconds from timeline start.
    start: f32,
    duration: f32,
    ease: Easing,
}

impl Step {
    fn key(&self) -> (TargetId, Property) {
        (self.target, self.property)
    }

    fn value_at(&self, playhead: f32) -> f32 {
        let t = if self.duration <= 0.0 {
            if playhead >= self.start { 1.0 } else { 0.0 }
        } else {
            ((playhead - self.start) / self.duration).clamp(0.0, 1.0)
        };
        ease(self.from, self.to, t, self.ease)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

struct Timeline {
    steps: Vec<Step>,
    /// (time, cue id, fired)
    cues: Vec<(f32, u32, bool)>,
    duration: f32,
    playhead: f32,
    direction: Direction,
    playing: bool,
    /// Reached the end playing forward and has not been rewound since.
    finished: bool,
    looping: Looping,
    /// Passes completed so far.
    pass: u32,
    on_complete: Option<OnComplete>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Looping {
    repeat: i32,
    yoyo: bool,
}

impl Timeline {
    /// Playhead as seen by the steps: mirrored on odd yoyo passes.
    fn local_time(&self) -> f32 {
        if self.looping.yoyo && self.pass % 2 == 1 {
            self.duration - self.playhead
        } else {
            self.playhead
        }
    }

    fn has_more_passes(&self) -> bool {
        self.duration > 0.0 && (self.looping.repeat < 0 || (self.pass as i64) < self.looping.repeat as i64)
    }

    /// Move forward by `dt`, wrapping into the next pass while any remain.
    fn advance_forward(&mut self, dt: f32) {
        self.playhead += dt;
        while self.playhead >= self.duration && self.has_more_passes() {
            self.playhead -= self.duration;
            self.pass += 1;
        }
        self.playhead = self.playhead.min(self.duration);
    }

    fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            if self.finished { 1.0 } else { 0.0 }
        } else {
            (self.playhead / self.duration).clamp(0.0, 1.0)
        }
    }

    /// Whether step `i` is the one that drives its (target, property) at the
    /// current playhead: the latest-starting step that has begun, or the
    /// earliest one if none has.
    fn drives(&self, i: usize) -> bool {
        let key = self.steps[i].key();
        let local = self.local_time();
        let mut current: Option<usize> = None;
        let mut earliest: Option<usize> = None;
        for (j, s) in self.steps.iter().enumerate().filter(|(_, s)| s.key() == key) {
            if earliest.map_or(true, |e| s.start < self.steps[e].start) {
                earliest = Some(j);
            }
            if s.start <= local && current.map_or(true, |c| s.start >= self.steps[c].start) {
                current = Some(j);
            }
        }
        current.or(earliest) == Some(i)
    }

    fn render(
        &self,
        handle: TimelineHandle,
        owners: &HashMap<(TargetId, Property), TimelineHandle>,
        surface: &mut dyn Surface,
    ) -> Result<(), MotionError> {
        for (i, step) in self.steps.iter().enumerate() {
            if owners.get(&step.key()) != Some(&handle) || !self.drives(i) {
                continue;
            }
            surface.set_property(step.target, step.property, step.value_at(self.local_time()))?;
        }
        Ok(())
    }
}

/// Handle to a timeline for later control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimelineHandle(pub u32);

/// Events produced by `tick`, polled with `drain_events`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineEvent {
    /// Playhead reached the end while playing forward.
    Completed(TimelineHandle),
    /// Playhead reached a cued sequence entry.
    Cue { timeline: TimelineHandle, cue: u32 },
}

/// Owns every timeline and the (target, property) ownership table.
#[derive(Default)]
pub struct TimelineOrchestrator {
    timelines: BTreeMap<TimelineHandle, Timeline>,
    owners: HashMap<(TargetId, Property), TimelineHandle>,
    next_id: u32,
    events: Vec<TimelineEvent>,
}

impl TimelineOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Animate one target between `from` and `to`. Properties missing from
    /// `from` start at the target's current value.
    /// Returns `None` if the target is not mounted.
    pub fn animate(
        &mut self,
        target: TargetId,
        from: Props,
        to: Props,
        options: AnimateOptions,
        surface: &mut dyn Surface,
    ) -> Option<TimelineHandle> {
        self.animate_staggered(&[target], from, to, options, surface)
    }

    /// Animate several targets with the same values; target `i` starts at
    /// `delay + i * stagger`. Unmounted targets are skipped.
    pub fn animate_staggered(
        &mut self,
        targets: &[TargetId],
        from: Props,
        to: Props,
        options: AnimateOptions,
        surface: &mut dyn Surface,
    ) -> Option<TimelineHandle> {
        let mut steps = Vec::new();
        for (index, &target) in targets.iter().enumerate() {
            let start = options.delay + index as f32 * options.stagger;
            let Some(resolved) = resolve_steps(target, Some(&from), &to, start, options.duration, options.ease, surface)
            else {
                log::debug!("animate: target {:?} not mounted, skipping", target);
                continue;
            };
            steps.extend(resolved);
        }
        if steps.is_empty() {
            return None;
        }
        let looping = Looping {
            repeat: options.repeat,
            yoyo: options.yoyo,
        };
        self.insert(steps, Vec::new(), options.paused, looping, options.on_complete, surface)
    }

    /// Build a timeline from a sequence. Entries on unmounted targets are
    /// skipped; returns `None` if nothing is left.
    pub fn sequence(&mut self, sequence: Sequence, surface: &mut dyn Surface) -> Option<TimelineHandle> {
        let mut steps = Vec::new();
        let mut cues = Vec::new();
        let mut end = 0.0_f32;
        let mut previous_start = 0.0_f32;

        for entry in &sequence.entries {
            let start = entry.position.resolve(end, previous_start);
            previous_start = start;
            end = end.max(start + entry.duration);
            if let Some(cue) = entry.cue {
                cues.push((start, cue, false));
            }
            match resolve_steps(entry.target, entry.from.as_ref(), &entry.to, start, entry.duration, entry.ease, surface)
            {
                Some(resolved) => steps.extend(resolved),
                None => log::debug!("sequence: target {:?} not mounted, skipping", entry.target),
            }
        }
        if steps.is_empty() {
            return None;
        }
        self.insert(steps, cues, sequence.paused, Looping::default(), sequence.on_complete, surface)
    }

    fn insert(
        &mut self,
        steps: Vec<Step>,
        cues: Vec<(f32, u32, bool)>,
        paused: bool,
        looping: Looping,
        on_complete: Option<OnComplete>,
        surface: &mut dyn Surface,
    ) -> Option<TimelineHandle> {
        let handle = TimelineHandle(self.next_id);
        self.next_id += 1;

        // Claim every pair; a previous owner of any of them is killed
        let mut displaced = Vec::new();
        for step in &steps {
            if let Some(prev) = self.owners.insert(step.key(), handle) {
                if prev != handle && !displaced.contains(&prev) {
                    displaced.push(prev);
                }
            }
        }
        for prev in displaced {
            if self.timelines.contains_key(&prev) {
                log::debug!("timeline {:?} killed by {:?}", prev, handle);
            }
            self.release(prev);
        }

        let duration = steps.iter().map(|s| s.start + s.duration).fold(0.0, f32::max);
        let timeline = Timeline {
            steps,
            cues,
            duration,
            playhead: 0.0,
            direction: Direction::Forward,
            playing: !paused,
            finished: false,
            looping,
            pass: 0,
            on_complete,
        };

        // Start values are rendered immediately
        if let Err(err) = timeline.render(handle, &self.owners, surface) {
            log::debug!("timeline {:?} dropped on first render: {}", handle, err);
            self.release(handle);
            return None;
        }
        self.timelines.insert(handle, timeline);
        Some(handle)
    }

    /// Play forward from the current progress.
    pub fn play(&mut self, handle: TimelineHandle) -> bool {
        self.set_playing(handle, Direction::Forward)
    }

    /// Play backward from the current progress.
    pub fn reverse(&mut self, handle: TimelineHandle) -> bool {
        self.set_playing(handle, Direction::Reverse)
    }

    fn set_playing(&mut self, handle: TimelineHandle, direction: Direction) -> bool {
        let Some(timeline) = self.timelines.get_mut(&handle) else {
            return false;
        };
        timeline.direction = direction;
        timeline.playing = true;
        true
    }

    /// Continue in the current direction.
    pub fn resume(&mut self, handle: TimelineHandle) -> bool {
        let Some(timeline) = self.timelines.get_mut(&handle) else {
            return false;
        };
        timeline.playing = true;
        true
    }

    pub fn pause(&mut self, handle: TimelineHandle) -> bool {
        let Some(timeline) = self.timelines.get_mut(&handle) else {
            return false;
        };
        timeline.playing = false;
        true
    }

    /// Jump to the start and play forward. Cues fire again.
    pub fn restart(&mut self, handle: TimelineHandle, surface: &mut dyn Surface) -> bool {
        if !self.seek(handle, 0.0, surface) {
            return false;
        }
        self.play(handle)
    }

    /// Jump to the start, render it and stop.
    pub fn reset(&mut self, handle: TimelineHandle, surface: &mut dyn Surface) -> bool {
        if !self.seek(handle, 0.0, surface) {
            return false;
        }
        self.pause(handle)
    }

    fn seek(&mut self, handle: TimelineHandle, playhead: f32, surface: &mut dyn Surface) -> bool {
        let Some(timeline) = self.timelines.get_mut(&handle) else {
            return false;
        };
        timeline.playhead = playhead.clamp(0.0, timeline.duration);
        timeline.finished = false;
        timeline.pass = 0;
        for cue in &mut timeline.cues {
            cue.2 = cue.0 < timeline.playhead;
        }
        if let Err(err) = timeline.render(handle, &self.owners, surface) {
            log::debug!("timeline {:?} killed: {}", handle, err);
            self.release(handle);
            return false;
        }
        true
    }

    /// Stop and discard. The completion callback never runs. Idempotent.
    pub fn kill(&mut self, handle: TimelineHandle) -> bool {
        let existed = self.timelines.contains_key(&handle);
        self.release(handle);
        existed
    }

    /// Kill every timeline writing to `target` (unmount).
    pub fn kill_target(&mut self, target: TargetId) {
        let handles: Vec<TimelineHandle> = self
            .timelines
            .iter()
            .filter(|(_, tl)| tl.steps.iter().any(|s| s.target == target))
            .map(|(h, _)| *h)
            .collect();
        for handle in handles {
            self.release(handle);
        }
    }

    fn release(&mut self, handle: TimelineHandle) {
        self.timelines.remove(&handle);
        self.owners.retain(|_, h| *h != handle);
    }

    /// Advance playing timelines by `dt` seconds and write their values.
    pub fn tick(&mut self, dt: f32, surface: &mut dyn Surface) {
        let mut failed = Vec::new();
        let mut callbacks = Vec::new();

        for (&handle, timeline) in self.timelines.iter_mut() {
            if !timeline.playing {
                continue;
            }

            match timeline.direction {
                Direction::Forward => timeline.advance_forward(dt),
                Direction::Reverse => timeline.playhead = (timeline.playhead - dt).max(0.0),
            }

            if timeline.direction == Direction::Forward {
                for (at, cue, fired) in timeline.cues.iter_mut() {
                    if !*fired && *at <= timeline.playhead {
                        *fired = true;
                        self.events.push(TimelineEvent::Cue { timeline: handle, cue: *cue });
                    }
                }
            }

            if let Err(err) = timeline.render(handle, &self.owners, surface) {
                log::debug!("timeline {:?} killed: {}", handle, err);
                failed.push(handle);
                continue;
            }

            match timeline.direction {
                Direction::Forward if timeline.playhead >= timeline.duration => {
                    timeline.playing = false;
                    timeline.finished = true;
                    self.events.push(TimelineEvent::Completed(handle));
                    if let Some(callback) = timeline.on_complete.take() {
                        callbacks.push(callback);
                    }
                }
                Direction::Reverse if timeline.playhead <= 0.0 => {
                    timeline.playing = false;
                    timeline.finished = false;
                }
                _ => {}
            }
        }

        for handle in failed {
            self.release(handle);
        }
        for callback in callbacks {
            callback();
        }
    }

    /// Normalized progress [0, 1] of the current pass, `None` for unknown handles.
    pub fn progress(&self, handle: TimelineHandle) -> Option<f32> {
        self.timelines.get(&handle).map(Timeline::progress)
    }

    pub fn direction(&self, handle: TimelineHandle) -> Option<Direction> {
        self.timelines.get(&handle).map(|tl| tl.direction)
    }

    pub fn is_playing(&self, handle: TimelineHandle) -> bool {
        self.timelines.get(&handle).is_some_and(|tl| tl.playing)
    }

    pub fn contains(&self, handle: TimelineHandle) -> bool {
        self.timelines.contains_key(&handle)
    }

    /// Current writer of a (target, property) pair.
    pub fn owner(&self, target: TargetId, property: Property) -> Option<TimelineHandle> {
        self.owners.get(&(target, property)).copied()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = TimelineEvent> + '_ {
        self.events.drain(..)
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Discard everything without running callbacks.
    pub fn clear(&mut self) {
        self.timelines.clear();
        self.owners.clear();
        self.events.clear();
    }
}

/// Turn one (target, from, to) entry into per-property steps.
/// `None` if the target is not mounted.
fn resolve_steps(
    target: TargetId,
    from: Option<&Props>,
    to: &Props,
    start: f32,
    duration: f32,
    ease: Easing,
    surface: &dyn Surface,
) -> Option<Vec<Step>> {
    if !surface.contains(target) {
        return None;
    }
    let mut steps = Vec::new();
    for (property, end) in to.iter() {
        let begin = match from.and_then(|f| f.get(property)) {
            Some(v) => v,
            None => surface.property(target, property)?,
        };
        steps.push(Step {
            target,
            property,
            from: begin,
            to: end,
            start,
            duration,
            ease,
        });
    }
    Some(steps)
}
