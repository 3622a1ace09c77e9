use std::time::Instant;

/// Instantaneous frame rate from consecutive timestamps.
#[derive(Debug, Default)]
pub(crate) struct FpsCounter {
    previous: Option<Instant>,
}

impl FpsCounter {
    /// Record a frame at `now` and return `1 / elapsed` seconds.
    ///
    /// The first tick and a zero elapsed time both report 0.
    pub(crate) fn tick(&mut self, now: Instant) -> f32 {
        let fps = match self.previous {
            Some(previous) => {
                let elapsed = now.saturating_duration_since(previous).as_secs_f32();
                if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 }
            }
            None => 0.0,
        };
        self.previous = Some(now);
        fps
    }
}
