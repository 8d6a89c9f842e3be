//! PCM wire codec for the live session
//!
//! Outbound microphone audio travels as base64-encoded 16-bit little-endian
//! PCM at 16 kHz mono; inbound model audio arrives in the same framing at
//! 24 kHz mono.

use crate::{ParleyError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Sample rate the model expects for microphone input
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of audio generated by the model
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Samples per outbound frame (one capture tick)
pub const FRAME_SIZE: usize = 4096;

const BYTES_PER_SAMPLE: usize = 2;

/// One base64 PCM chunk plus its MIME type, as sent over the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaChunk {
    pub data: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// One fixed-size chunk of outbound microphone audio.
///
/// Ephemeral: produced per capture tick and handed straight to the
/// transport; never buffered beyond one frame in flight once the session
/// is open.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFrame {
    /// Quantize normalized float samples into a 16 kHz mono frame.
    ///
    /// The scale factor matches the decoder's 1/32768 exactly, so a
    /// round-trip error never exceeds half a quantization step.
    pub fn from_samples(samples: &[f32]) -> Self {
        let samples = samples
            .iter()
            .map(|&s| {
                (s * 32768.0)
                    .round()
                    .clamp(i16::MIN as f32, i16::MAX as f32) as i16
            })
            .collect();
        Self {
            samples,
            sample_rate: INPUT_SAMPLE_RATE,
            channels: 1,
        }
    }

    /// Encode this frame into its wire representation.
    pub fn encode(&self) -> MediaChunk {
        let mut bytes = Vec::with_capacity(self.samples.len() * BYTES_PER_SAMPLE);
        for &sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        MediaChunk {
            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
            mime_type: format!("audio/pcm;rate={}", self.sample_rate),
        }
    }
}

/// One decoded chunk of inbound model-generated audio.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Encode normalized float samples into a transport-safe media chunk.
///
/// Fails only on empty input; otherwise deterministic and pure.
pub fn encode_frame(samples: &[f32]) -> Result<MediaChunk> {
    if samples.is_empty() {
        return Err(ParleyError::FormatError("empty audio frame".into()));
    }
    Ok(AudioFrame::from_samples(samples).encode())
}

/// Reverse the transport text encoding, yielding raw PCM bytes.
pub fn decode_frame(blob: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(blob)
        .map_err(|e| ParleyError::FormatError(format!("invalid base64 audio: {}", e)))
}

/// Reinterpret raw bytes as 16-bit PCM and wrap them into a playable segment.
pub fn decode_audio_segment(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioSegment> {
    let stride = BYTES_PER_SAMPLE * channels as usize;
    if bytes.is_empty() || bytes.len() % stride != 0 {
        return Err(ParleyError::FormatError(format!(
            "PCM payload of {} bytes is not a multiple of {} ({} channels)",
            bytes.len(),
            stride,
            channels
        )));
    }

    let samples = bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(AudioSegment::new(samples, sample_rate, channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_rejects_empty_input() {
        assert!(encode_frame(&[]).is_err());
    }

    #[test]
    fn test_encode_frame_mime_type() {
        let chunk = encode_frame(&[0.0, 0.5, -0.5]).unwrap();
        assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
        assert!(!chunk.data.is_empty());
    }

    #[test]
    fn test_decode_frame_rejects_invalid_base64() {
        assert!(decode_frame("not valid base64!!!").is_err());
    }

    #[test]
    fn test_decode_segment_rejects_odd_length() {
        assert!(decode_audio_segment(&[0u8, 1, 2], OUTPUT_SAMPLE_RATE, 1).is_err());
        assert!(decode_audio_segment(&[], OUTPUT_SAMPLE_RATE, 1).is_err());
    }

    #[test]
    fn test_decode_segment_rejects_partial_stereo_frame() {
        // 6 bytes is 3 mono samples but 1.5 stereo frames
        assert!(decode_audio_segment(&[0u8; 6], OUTPUT_SAMPLE_RATE, 2).is_err());
        assert!(decode_audio_segment(&[0u8; 8], OUTPUT_SAMPLE_RATE, 2).is_ok());
    }

    #[test]
    fn test_lossy_round_trip_within_one_quantization_step() {
        let samples: Vec<f32> = (0..512)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * 0.8)
            .collect();

        let chunk = encode_frame(&samples).unwrap();
        let bytes = decode_frame(&chunk.data).unwrap();
        let segment = decode_audio_segment(&bytes, INPUT_SAMPLE_RATE, 1).unwrap();

        assert_eq!(segment.samples.len(), samples.len());
        let step = 1.0 / 32768.0;
        for (orig, round) in samples.iter().zip(segment.samples.iter()) {
            assert!(
                (orig - round).abs() <= step,
                "quantization error {} exceeds one step",
                (orig - round).abs()
            );
        }
    }

    #[test]
    fn test_quantization_matches_decoder_scale() {
        let frame = AudioFrame::from_samples(&[0.5, -0.5, 1.0, -1.0]);
        assert_eq!(frame.samples, vec![16384, -16384, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_clipping_is_clamped() {
        let chunk = encode_frame(&[2.0, -2.0]).unwrap();
        let bytes = decode_frame(&chunk.data).unwrap();
        let segment = decode_audio_segment(&bytes, INPUT_SAMPLE_RATE, 1).unwrap();
        assert!(segment.samples[0] <= 1.0);
        assert!(segment.samples[1] >= -1.0);
    }

    #[test]
    fn test_segment_duration() {
        let segment = AudioSegment::new(vec![0.0; 12000], OUTPUT_SAMPLE_RATE, 1);
        assert!((segment.duration_secs() - 0.5).abs() < 1e-9);
    }
}
