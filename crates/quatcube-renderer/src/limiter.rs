use std::time::{Duration, Instant};

/// Paces the render loop at a fixed rate.
///
/// Deadlines advance by whole periods so the cadence does not drift with
/// render time. A frame that finishes after the next deadline resets the
/// cadence instead of trying to catch up.
pub struct FrameLimiter {
    period: Duration,
    next: Option<Instant>,
}

impl FrameLimiter {
    pub fn new(target_fps: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / target_fps.max(1) as f64),
            next: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// When the next frame should be drawn. `None` until the first frame.
    pub fn deadline(&self) -> Option<Instant> {
        self.next
    }

    /// Whether a frame should be drawn at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.next.map_or(true, |next| now >= next)
    }

    /// Record a frame drawn at `now` and return the next deadline.
    pub fn advance(&mut self, now: Instant) -> Instant {
        let next = match self.next {
            Some(prev) if prev + self.period > now => prev + self.period,
            _ => now + self.period,
        };
        self.next = Some(next);
        next
    }
}
