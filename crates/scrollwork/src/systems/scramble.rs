//! Character-scramble text reveal.
//!
//! Runs on its own fixed-rate interval (30 ticks/s by default), not on the
//! frame clock. After `n` ticks the reveal position is
//! `n * len / (duration * rate)`; characters before it show the final text,
//! the rest show random alphabet glyphs. Whitespace is never scrambled.
//! Once the reveal position reaches the text length the target is snapped to
//! the final text and the job completes.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::api::types::TargetId;
use crate::core::surface::Surface;
use crate::core::time::IntervalTimer;
use crate::systems::rng::Rng;

pub const DEFAULT_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrambleConfig {
    /// Internal ticks per second.
    pub tick_rate: f64,
    /// Glyphs used for unrevealed characters.
    pub alphabet: String,
    /// RNG seed; fixed seeds make runs reproducible.
    pub seed: u64,
}

impl Default for ScrambleConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30.0,
            alphabet: DEFAULT_ALPHABET.to_string(),
            seed: 0x5eed,
        }
    }
}

/// Completion callback. Receives the engine so it can chain the next scramble.
pub type OnComplete = Box<dyn FnOnce(&mut ScrambleEngine)>;

/// Parameters for one scramble run.
pub struct ScrambleRequest {
    pub target: TargetId,
    pub final_text: String,
    /// Seconds from first scrambled frame to fully revealed.
    pub duration: f32,
    /// Seconds to wait before the first scrambled frame.
    pub delay: f32,
    on_complete: Option<OnComplete>,
}

impl ScrambleRequest {
    pub fn new(target: TargetId, final_text: impl Into<String>, duration: f32) -> Self {
        Self {
            target,
            final_text: final_text.into(),
            duration,
            delay: 0.0,
            on_complete: None,
        }
    }

    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay.max(0.0);
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&mut ScrambleEngine) + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for ScrambleRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrambleRequest")
            .field("target", &self.target)
            .field("final_text", &self.final_text)
            .field("duration", &self.duration)
            .field("delay", &self.delay)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScrambleId(pub u32);

/// Teardown handle for a scramble. `cancel` is idempotent and never writes
/// to the target or runs the completion callback.
#[derive(Debug, Clone)]
pub struct ScrambleHandle {
    id: ScrambleId,
    cancelled: Rc<Cell<bool>>,
}

impl ScrambleHandle {
    pub fn id(&self) -> ScrambleId {
        self.id
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

struct ScrambleJob {
    id: ScrambleId,
    target: TargetId,
    final_chars: Vec<char>,
    timer: IntervalTimer,
    /// Ticks needed for a full reveal (`duration * rate`).
    total_ticks: f64,
    delay_remaining: f64,
    cancelled: Rc<Cell<bool>>,
    on_complete: Option<OnComplete>,
}

enum JobOutcome {
    Running,
    Completed,
    Failed,
}

/// Runs all scramble jobs on the shared fixed-rate interval.
pub struct ScrambleEngine {
    config: ScrambleConfig,
    alphabet: Vec<char>,
    rng: Rng,
    jobs: Vec<ScrambleJob>,
    /// Requests started from completion callbacks; begin on the next advance.
    pending: Vec<(ScrambleRequest, ScrambleHandle)>,
    next_id: u32,
    completed: Vec<TargetId>,
}

impl ScrambleEngine {
    pub fn new(config: ScrambleConfig) -> Self {
        let mut alphabet: Vec<char> = config.alphabet.chars().filter(|c| !c.is_whitespace()).collect();
        if alphabet.is_empty() {
            alphabet = DEFAULT_ALPHABET.chars().collect();
        }
        Self {
            rng: Rng::new(config.seed),
            alphabet,
            config,
            jobs: Vec::new(),
            pending: Vec::new(),
            next_id: 0,
            completed: Vec::new(),
        }
    }

    /// Seconds between internal ticks. Hosts schedule `advance` at this interval.
    pub fn interval(&self) -> f64 {
        1.0 / self.config.tick_rate
    }

    /// Start a scramble now. Returns `None` (no-op) if the target is not mounted.
    /// A live job on the same target is cancelled first.
    pub fn scramble(&mut self, request: ScrambleRequest, surface: &mut dyn Surface) -> Option<ScrambleHandle> {
        let handle = self.new_handle();
        if self.start(request, handle.clone(), surface) {
            Some(handle)
        } else {
            None
        }
    }

    /// Queue a scramble to start on the next `advance`. Used from completion
    /// callbacks, where no surface is at hand.
    pub fn enqueue(&mut self, request: ScrambleRequest) -> ScrambleHandle {
        let handle = self.new_handle();
        self.pending.push((request, handle.clone()));
        handle
    }

    fn new_handle(&mut self) -> ScrambleHandle {
        let id = ScrambleId(self.next_id);
        self.next_id += 1;
        ScrambleHandle {
            id,
            cancelled: Rc::new(Cell::new(false)),
        }
    }

    fn start(&mut self, request: ScrambleRequest, handle: ScrambleHandle, surface: &mut dyn Surface) -> bool {
        if handle.is_cancelled() {
            return false;
        }
        if !surface.contains(request.target) {
            log::debug!("scramble target {:?} not mounted, skipping", request.target);
            return false;
        }
        self.cancel_target(request.target);

        let rate = self.config.tick_rate;
        let duration = whole_micros(request.duration.max(0.0));
        let mut job = ScrambleJob {
            id: handle.id,
            target: request.target,
            final_chars: request.final_text.chars().collect(),
            timer: IntervalTimer::new(rate),
            total_ticks: duration * rate,
            delay_remaining: whole_micros(request.delay),
            cancelled: handle.cancelled,
            on_complete: request.on_complete,
        };

        if job.delay_remaining <= 0.0 {
            let outcome = Self::render(&mut job, &self.alphabet, &mut self.rng, surface);
            self.finish(job, outcome);
            return true;
        }
        self.jobs.push(job);
        true
    }

    /// Advance every job by `dt` seconds of interval-timer time.
    pub fn advance(&mut self, dt: f64, surface: &mut dyn Surface) {
        for (request, handle) in std::mem::take(&mut self.pending) {
            self.start(request, handle, surface);
        }

        let mut outcomes = Vec::new();
        for (idx, job) in self.jobs.iter_mut().enumerate() {
            if job.cancelled.get() {
                outcomes.push((idx, JobOutcome::Failed));
                continue;
            }
            let mut dt = dt;
            if job.delay_remaining > 0.0 {
                if dt < job.delay_remaining {
                    job.delay_remaining -= dt;
                    continue;
                }
                dt -= job.delay_remaining;
                job.delay_remaining = 0.0;
                // Delay over: first scrambled frame
                let outcome = Self::render(job, &self.alphabet, &mut self.rng, surface);
                if !matches!(outcome, JobOutcome::Running) {
                    outcomes.push((idx, outcome));
                    continue;
                }
            }
            if job.timer.advance(dt) == 0 {
                continue;
            }
            let outcome = Self::render(job, &self.alphabet, &mut self.rng, surface);
            if !matches!(outcome, JobOutcome::Running) {
                outcomes.push((idx, outcome));
            }
        }

        // Remove back to front so indices stay valid
        let mut finished = Vec::new();
        for (idx, outcome) in outcomes.into_iter().rev() {
            finished.push((self.jobs.remove(idx), outcome));
        }
        for (job, outcome) in finished.into_iter().rev() {
            self.finish(job, outcome);
        }
    }

    /// Write the frame for the job's current tick count.
    fn render(job: &mut ScrambleJob, alphabet: &[char], rng: &mut Rng, surface: &mut dyn Surface) -> JobOutcome {
        let len = job.final_chars.len() as f64;
        let fired = job.timer.fired() as f64;
        // Nothing to reveal: an empty final text is done on its first frame
        let done = len == 0.0 || fired + 1e-6 >= job.total_ticks;

        let text: String = if done {
            job.final_chars.iter().collect()
        } else {
            let iteration = (fired * len / job.total_ticks).floor() as usize;
            job.final_chars
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    if c.is_whitespace() || i < iteration {
                        c
                    } else {
                        rng.pick(alphabet).copied().unwrap_or(c)
                    }
                })
                .collect()
        };

        match surface.set_text(job.target, &text) {
            Ok(()) if done => JobOutcome::Completed,
            Ok(()) => JobOutcome::Running,
            Err(err) => {
                log::debug!("scramble on {:?} stopped: {}", job.target, err);
                JobOutcome::Failed
            }
        }
    }

    /// Retire or keep a job. Returns true if the job is still running.
    fn finish(&mut self, mut job: ScrambleJob, outcome: JobOutcome) -> bool {
        match outcome {
            JobOutcome::Running => {
                self.jobs.push(job);
                true
            }
            JobOutcome::Completed => {
                job.cancelled.set(true);
                self.completed.push(job.target);
                if let Some(callback) = job.on_complete.take() {
                    callback(self);
                }
                false
            }
            JobOutcome::Failed => {
                // Cancelled or target gone: completion is discarded
                job.cancelled.set(true);
                false
            }
        }
    }

    /// Cancel by id. Returns whether a live job was cancelled.
    pub fn cancel(&mut self, id: ScrambleId) -> bool {
        let Some(idx) = self.jobs.iter().position(|j| j.id == id) else {
            return false;
        };
        let job = self.jobs.remove(idx);
        job.cancelled.set(true);
        true
    }

    /// Cancel every job writing to `target` (unmount, or a new scramble taking over).
    pub fn cancel_target(&mut self, target: TargetId) {
        self.jobs.retain(|j| {
            if j.target == target {
                j.cancelled.set(true);
                false
            } else {
                true
            }
        });
    }

    pub fn is_running(&self, id: ScrambleId) -> bool {
        self.jobs.iter().any(|j| j.id == id && !j.cancelled.get())
    }

    /// Targets whose scramble completed since the last drain.
    pub fn drain_completed(&mut self) -> impl Iterator<Item = TargetId> + '_ {
        self.completed.drain(..)
    }

    pub fn len(&self) -> usize {
        self.jobs.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel everything, including queued requests.
    pub fn clear(&mut self) {
        for job in self.jobs.drain(..) {
            job.cancelled.set(true);
        }
        for (_, handle) in self.pending.drain(..) {
            handle.cancel();
        }
        self.completed.clear();
    }
}

/// Widen seconds to f64 at microsecond precision, so 1.2f32 means 1.2 and
/// not 1.2000000476837158.
fn whole_micros(seconds: f32) -> f64 {
    (seconds as f64 * 1e6).round() / 1e6
}

impl Default for ScrambleEngine {
    fn default() -> Self {
        Self::new(ScrambleConfig::default())
    }
}
