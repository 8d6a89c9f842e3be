/// Playback cursor for gapless sequential scheduling.
///
/// Times are seconds on the playback device's monotonic audio clock; wall
/// clock is never used, so the cursor cannot drift against the rendered
/// stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackTimeline {
    next_start: f64,
}

impl PlaybackTimeline {
    pub fn new() -> Self {
        Self { next_start: 0.0 }
    }

    /// Reserve a slot for a segment of `duration` seconds.
    ///
    /// Returns the scheduled start time: back-to-back with the previous
    /// segment when audio is arriving faster than real time, otherwise
    /// starting immediately at `now`. Advances the cursor by `duration`.
    pub fn schedule(&mut self, duration: f64, now: f64) -> f64 {
        let start = self.next_start.max(now);
        self.next_start = start + duration;
        start
    }

    /// Barge-in: forget all reserved slots.
    pub fn reset(&mut self) {
        self.next_start = 0.0;
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}

impl Default for PlaybackTimeline {
    fn default() -> Self {
        Self::new()
    }
}
