/// Converts rAF timestamps into variable frame deltas.
/// Per-frame motion is scaled by the real delta, so speed does not depend on frame rate.
#[derive(Debug, Clone)]
pub struct FrameDelta {
    /// Timestamp of the previous frame in milliseconds.
    last_ms: Option<f64>,
    /// Upper bound for a single delta, in seconds.
    max_dt: f32,
}

impl FrameDelta {
    pub fn new(max_dt: f32) -> Self {
        Self {
            last_ms: None,
            max_dt,
        }
    }

    /// Feed a frame timestamp (ms). Returns the delta in seconds.
    /// The first frame yields 0.0.
    pub fn step(&mut self, timestamp_ms: f64) -> f32 {
        let dt = match self.last_ms {
            Some(last) => ((timestamp_ms - last) / 1000.0) as f32,
            None => 0.0,
        };
        self.last_ms = Some(timestamp_ms);
        // Cap to avoid a jump after the tab was backgrounded
        dt.clamp(0.0, self.max_dt)
    }

    /// Forget the previous timestamp (e.g. after the loop was paused).
    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}

/// Fixed-rate interval timer, independent of the frame loop.
///
/// Counts how many whole periods have elapsed; firing is derived from total
/// elapsed time rather than accumulated period subtraction, so it does not drift.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    /// Ticks per second.
    rate: f64,
    /// Total elapsed time in seconds.
    elapsed: f64,
    /// Ticks fired so far.
    fired: u64,
}

impl IntervalTimer {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.max(f64::MIN_POSITIVE),
            elapsed: 0.0,
            fired: 0,
        }
    }

    /// Add elapsed time. Returns the number of ticks that became due.
    pub fn advance(&mut self, dt: f64) -> u64 {
        self.elapsed += dt.max(0.0);
        // Tolerance absorbs representation error such as 0.8 * 30 = 24.000000000000004
        let due = (self.elapsed * self.rate + 1e-6).floor() as u64;
        let ticks = due.saturating_sub(self.fired);
        self.fired = due;
        ticks
    }

    /// Period between ticks in seconds.
    pub fn period(&self) -> f64 {
        1.0 / self.rate
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_has_zero_delta() {
        let mut fd = FrameDelta::new(0.1);
        assert_eq!(fd.step(1000.0), 0.0);
        let dt = fd.step(1016.0);
        assert!((dt - 0.016).abs() < 1e-6);
    }

    #[test]
    fn delta_is_capped() {
        let mut fd = FrameDelta::new(0.1);
        fd.step(0.0);
        assert_eq!(fd.step(5000.0), 0.1);
    }

    #[test]
    fn backwards_timestamp_clamps_to_zero() {
        let mut fd = FrameDelta::new(0.1);
        fd.step(100.0);
        assert_eq!(fd.step(50.0), 0.0);
    }

    #[test]
    fn interval_fires_once_per_period() {
        let mut timer = IntervalTimer::new(30.0);
        assert_eq!(timer.advance(0.02), 0);
        assert_eq!(timer.advance(0.02), 1);
        assert_eq!(timer.advance(1.0), 30);
        assert_eq!(timer.fired(), 31);
    }

    #[test]
    fn interval_does_not_drift_on_exact_boundaries() {
        let mut timer = IntervalTimer::new(30.0);
        let mut total = 0;
        for _ in 0..24 {
            total += timer.advance(1.0 / 30.0);
        }
        assert_eq!(total, 24);
    }
}
