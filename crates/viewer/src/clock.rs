use std::time::Instant;

/// Supplies seconds elapsed between ticks.
///
/// The first tick reports zero. Deltas are capped at `max_delta` so a stalled
/// frame (debugger, window drag) does not produce a huge jump.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Option<Instant>,
    max_delta: f32,
    elapsed: f64,
}

impl FrameClock {
    pub fn new(max_delta: f32) -> Self {
        Self {
            last: None,
            max_delta: max_delta.max(0.0),
            elapsed: 0.0,
        }
    }

    /// Seconds since the previous call.
    pub fn delta(&mut self) -> f32 {
        self.delta_at(Instant::now())
    }

    /// Seconds between the previous call and `now`.
    pub fn delta_at(&mut self, now: Instant) -> f32 {
        let dt = match self.last {
            Some(last) => now
                .saturating_duration_since(last)
                .as_secs_f32()
                .min(self.max_delta),
            None => 0.0,
        };
        self.last = Some(now);
        self.elapsed += f64::from(dt);
        dt
    }

    /// Sum of all reported deltas.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(0.1)
    }
}
