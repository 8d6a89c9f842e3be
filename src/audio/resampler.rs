use crate::{ParleyError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

const CHUNK_FRAMES: usize = 1024;

/// Sample-rate converter for devices that cannot open at the session's
/// fixed rates (16 kHz capture, 24 kHz playback).
pub struct AudioResampler {
    resampler: SincFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
}

impl AudioResampler {
    /// Create a mono resampler between the given rates.
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(ParleyError::ConfigError(
                "sample rates must be greater than 0".into(),
            ));
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            2.0,
            params,
            CHUNK_FRAMES,
            1,
        )
        .map_err(|e| ParleyError::ConfigError(format!("failed to create resampler: {}", e)))?;

        debug!("Created resampler: {} Hz -> {} Hz", input_rate, output_rate);

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
        })
    }

    /// Resample a mono buffer.
    ///
    /// SincFixedIn consumes fixed-size chunks, so the tail is zero-padded
    /// and the corresponding slice of output is trimmed back off.
    pub fn resample(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let ratio = self.output_rate as f64 / self.input_rate as f64;
        let mut output = Vec::with_capacity((input.len() as f64 * ratio * 1.1) as usize);

        for chunk in input.chunks(CHUNK_FRAMES) {
            let mut planar = vec![vec![0.0f32; CHUNK_FRAMES]];
            planar[0][..chunk.len()].copy_from_slice(chunk);

            let resampled = self
                .resampler
                .process(&planar, None)
                .map_err(|e| ParleyError::FormatError(format!("resampling failed: {}", e)))?;

            let produced = resampled[0].len();
            let wanted = if chunk.len() < CHUNK_FRAMES {
                ((chunk.len() as f64) * ratio).ceil() as usize
            } else {
                produced
            };
            output.extend_from_slice(&resampled[0][..wanted.min(produced)]);
        }

        Ok(output)
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn reset(&mut self) {
        self.resampler.reset();
    }
}

/// One-shot mono resample between two rates.
pub fn resample_audio(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        return Ok(input.to_vec());
    }
    AudioResampler::new(input_rate, output_rate)?.resample(input)
}
