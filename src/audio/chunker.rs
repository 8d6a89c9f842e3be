use ringbuf::{traits::*, HeapRb};

/// Reframes the capture callback's variable-size buffers into fixed-size
/// frames.
///
/// The audio callback pushes whatever cpal hands it; complete frames are
/// popped out as they fill. Leftover samples stay buffered for the next
/// push, so no input is dropped at frame boundaries.
pub struct FrameChunker {
    buffer: HeapRb<f32>,
    frame_size: usize,
}

impl FrameChunker {
    pub fn new(frame_size: usize) -> Self {
        Self {
            // Room for one full frame plus one worst-case callback buffer
            buffer: HeapRb::new(frame_size * 2),
            frame_size,
        }
    }

    /// Append samples and pop every frame that completed.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        let mut frames = Vec::new();

        for &sample in samples {
            if self.buffer.try_push(sample).is_err() {
                // Consumer fell behind; drop the oldest sample
                let _ = self.buffer.try_pop();
                let _ = self.buffer.try_push(sample);
            }

            if self.buffer.occupied_len() >= self.frame_size {
                let mut frame = Vec::with_capacity(self.frame_size);
                for _ in 0..self.frame_size {
                    if let Some(s) = self.buffer.try_pop() {
                        frame.push(s);
                    }
                }
                frames.push(frame);
            }
        }

        frames
    }

    /// Number of samples waiting for the next frame boundary
    pub fn pending(&self) -> usize {
        self.buffer.occupied_len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
