/// Samples in the rolling analysis window
pub const ANALYSIS_WINDOW: usize = 256;

/// How often the capture pipeline reports a volume reading
pub const VOLUME_INTERVAL_MS: u64 = 50;

/// Rolling input-level estimate for visualization.
///
/// Keeps the last [`ANALYSIS_WINDOW`] samples and reports their RMS energy
/// mapped into [0, 1]. This is the session's one true volume signal; any
/// animated bar shapes are derived from it in the presentation layer.
pub struct VolumeMeter {
    window: Vec<f32>,
    cursor: usize,
    filled: bool,
}

impl VolumeMeter {
    pub fn new() -> Self {
        Self {
            window: vec![0.0; ANALYSIS_WINDOW],
            cursor: 0,
            filled: false,
        }
    }

    /// Feed capture samples into the analysis window.
    pub fn push(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.window[self.cursor] = sample;
            self.cursor = (self.cursor + 1) % self.window.len();
            if self.cursor == 0 {
                self.filled = true;
            }
        }
    }

    /// Current level in [0, 1].
    ///
    /// RMS of the window, scaled so that conversational speech sits in the
    /// visible range. Full-scale sine input maps to 1.0.
    pub fn level(&self) -> f32 {
        let len = if self.filled {
            self.window.len()
        } else {
            self.cursor
        };
        if len == 0 {
            return 0.0;
        }

        let sum_squares: f32 = self.window[..len].iter().map(|&s| s * s).sum();
        let rms = (sum_squares / len as f32).sqrt();

        // Full-scale sine has RMS 1/sqrt(2)
        (rms * std::f32::consts::SQRT_2).clamp(0.0, 1.0)
    }

    pub fn reset(&mut self) {
        self.window.fill(0.0);
        self.cursor = 0;
        self.filled = false;
    }
}

impl Default for VolumeMeter {
    fn default() -> Self {
        Self::new()
    }
}
