//! FrameClock: the single per-frame tick source.
//!
//! Subscribers are ordered by `TickPhase` (then by subscription order), which
//! makes the scroll → triggers → animate pipeline explicit even when the
//! stages are owned by different components.
//!
//! Iteration contract: `tick` snapshots the subscriber list and releases its
//! borrow before calling anyone. Subscribing or cancelling from inside a
//! callback is therefore safe; a subscriber cancelled mid-tick is skipped for
//! the rest of that tick.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::error::MotionError;
use crate::core::time::FrameDelta;

/// Pipeline position of a subscriber within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TickPhase {
    /// Scroll virtualization.
    Scroll = 0,
    /// Trigger evaluation.
    Triggers = 1,
    /// Timelines and section state.
    Animate = 2,
    /// Host-side consumers of the frame's results.
    Present = 3,
}

/// Information passed to every subscriber.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Frame number, starting at 1.
    pub frame: u64,
    /// Seconds since the previous frame.
    pub dt: f32,
    /// rAF timestamp in milliseconds.
    pub timestamp_ms: f64,
}

type Callback = RefCell<Box<dyn FnMut(&FrameTick) -> Result<(), MotionError>>>;

struct Subscriber {
    id: u64,
    phase: TickPhase,
    alive: Rc<Cell<bool>>,
    callback: Rc<Callback>,
}

#[derive(Default)]
struct ClockInner {
    subscribers: Vec<Subscriber>,
    next_id: u64,
    frame: u64,
}

/// Shared handle to the frame clock. Cloning shares the same subscriber set.
#[derive(Clone)]
pub struct FrameClock {
    inner: Rc<RefCell<ClockInner>>,
    delta: Rc<RefCell<FrameDelta>>,
}

impl FrameClock {
    pub fn new(max_dt: f32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ClockInner::default())),
            delta: Rc::new(RefCell::new(FrameDelta::new(max_dt))),
        }
    }

    /// Register a per-frame callback. Keep the returned subscription; cancelling
    /// it is the teardown for this callback.
    pub fn subscribe<F>(&self, phase: TickPhase, callback: F) -> Subscription
    where
        F: FnMut(&FrameTick) -> Result<(), MotionError> + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let alive = Rc::new(Cell::new(true));
        inner.subscribers.push(Subscriber {
            id,
            phase,
            alive: alive.clone(),
            callback: Rc::new(RefCell::new(Box::new(callback))),
        });
        // Stable sort keeps subscription order within a phase
        inner.subscribers.sort_by_key(|s| s.phase);
        Subscription {
            id,
            alive,
            clock: Rc::downgrade(&self.inner),
        }
    }

    /// Run one frame from a rAF timestamp.
    pub fn tick(&self, timestamp_ms: f64) -> FrameTick {
        let dt = self.delta.borrow_mut().step(timestamp_ms);
        self.tick_with_dt(timestamp_ms, dt)
    }

    /// Run one frame with an explicit delta (tests, offline stepping).
    pub fn tick_with_dt(&self, timestamp_ms: f64, dt: f32) -> FrameTick {
        let (tick, snapshot) = {
            let mut inner = self.inner.borrow_mut();
            inner.frame += 1;
            inner.subscribers.retain(|s| s.alive.get());
            let tick = FrameTick {
                frame: inner.frame,
                dt,
                timestamp_ms,
            };
            let snapshot: Vec<(u64, Rc<Cell<bool>>, Rc<Callback>)> = inner
                .subscribers
                .iter()
                .map(|s| (s.id, s.alive.clone(), s.callback.clone()))
                .collect();
            (tick, snapshot)
        };

        let mut disposed = Vec::new();
        for (id, alive, callback) in snapshot {
            if !alive.get() {
                continue;
            }
            // A callback that is already running (re-entrant tick) is skipped
            let Ok(mut callback) = callback.try_borrow_mut() else {
                log::warn!("frame clock: subscriber {} re-entered, skipping", id);
                continue;
            };
            match (&mut **callback)(&tick) {
                Ok(()) => {}
                Err(MotionError::Disposed) => {
                    alive.set(false);
                    disposed.push(id);
                }
                Err(err) => {
                    log::warn!("frame clock: subscriber {} failed: {}", id, err);
                }
            }
        }

        if !disposed.is_empty() {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|s| !disposed.contains(&s.id));
        }
        tick
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames ticked so far.
    pub fn frame(&self) -> u64 {
        self.inner.borrow().frame
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(0.1)
    }
}

/// Teardown handle for a clock subscription. `cancel` is idempotent.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    alive: Rc<Cell<bool>>,
    clock: Weak<RefCell<ClockInner>>,
}

impl Subscription {
    pub fn cancel(&self) {
        if !self.alive.replace(false) {
            return;
        }
        if let Some(clock) = self.clock.upgrade() {
            // Only the subscriber list is borrowed here, never a callback
            if let Ok(mut inner) = clock.try_borrow_mut() {
                inner.subscribers.retain(|s| s.id != self.id);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.alive.get()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.alive.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_run_in_pipeline_order() {
        let clock = FrameClock::default();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        let _a = clock.subscribe(TickPhase::Animate, move |_| {
            l.borrow_mut().push("animate");
            Ok(())
        });
        let l = log.clone();
        let _b = clock.subscribe(TickPhase::Scroll, move |_| {
            l.borrow_mut().push("scroll");
            Ok(())
        });
        let l = log.clone();
        let _c = clock.subscribe(TickPhase::Triggers, move |_| {
            l.borrow_mut().push("triggers");
            Ok(())
        });

        clock.tick(0.0);
        assert_eq!(*log.borrow(), vec!["scroll", "triggers", "animate"]);
    }

    #[test]
    fn cancel_during_tick_skips_later_subscriber() {
        let clock = FrameClock::default();
        let calls = Rc::new(Cell::new(0));
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let v = victim.clone();
        let _killer = clock.subscribe(TickPhase::Scroll, move |_| {
            if let Some(sub) = v.borrow().as_ref() {
                sub.cancel();
            }
            Ok(())
        });
        let c = calls.clone();
        let sub = clock.subscribe(TickPhase::Animate, move |_| {
            c.set(c.get() + 1);
            Ok(())
        });
        *victim.borrow_mut() = Some(sub);

        clock.tick(0.0);
        clock.tick(16.0);
        assert_eq!(calls.get(), 0);
        assert_eq!(clock.len(), 1);
    }

    #[test]
    fn subscribe_during_tick_is_safe() {
        let clock = FrameClock::default();
        let inner_calls = Rc::new(Cell::new(0));
        let handles = Rc::new(RefCell::new(Vec::new()));

        let clock2 = clock.clone();
        let c = inner_calls.clone();
        let h = handles.clone();
        let _outer = clock.subscribe(TickPhase::Scroll, move |_| {
            if h.borrow().is_empty() {
                let c = c.clone();
                let sub = clock2.subscribe(TickPhase::Animate, move |_| {
                    c.set(c.get() + 1);
                    Ok(())
                });
                h.borrow_mut().push(sub);
            }
            Ok(())
        });

        // New subscriber is not part of the snapshot for the current tick
        clock.tick(0.0);
        assert_eq!(inner_calls.get(), 0);
        clock.tick(16.0);
        assert_eq!(inner_calls.get(), 1);
    }

    #[test]
    fn failing_subscriber_does_not_stall_others() {
        let clock = FrameClock::default();
        let calls = Rc::new(Cell::new(0));

        let _bad = clock.subscribe(TickPhase::Scroll, |_| {
            Err(MotionError::Position("broken".into()))
        });
        let c = calls.clone();
        let _good = clock.subscribe(TickPhase::Animate, move |_| {
            c.set(c.get() + 1);
            Ok(())
        });

        clock.tick(0.0);
        clock.tick(16.0);
        assert_eq!(calls.get(), 2);
        assert_eq!(clock.len(), 2);
    }

    #[test]
    fn disposed_subscriber_is_dropped() {
        let clock = FrameClock::default();
        let sub = clock.subscribe(TickPhase::Scroll, |_| Err(MotionError::Disposed));
        clock.tick(0.0);
        assert!(!sub.is_active());
        assert!(clock.is_empty());
    }

    #[test]
    fn cancel_is_idempotent() {
        let clock = FrameClock::default();
        let sub = clock.subscribe(TickPhase::Present, |_| Ok(()));
        sub.cancel();
        sub.cancel();
        assert!(clock.is_empty());
    }

    #[test]
    fn tick_reports_variable_delta() {
        let clock = FrameClock::default();
        let seen = Rc::new(Cell::new(0.0f32));
        let s = seen.clone();
        let _sub = clock.subscribe(TickPhase::Scroll, move |t| {
            s.set(t.dt);
            Ok(())
        });
        clock.tick(1000.0);
        clock.tick(1033.0);
        assert!((seen.get() - 0.033).abs() < 1e-5);
    }
}
