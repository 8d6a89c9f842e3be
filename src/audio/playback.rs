//! Gapless playback of model audio segments.
//!
//! Segments are scheduled against the output device's own clock (frames
//! rendered so far), back-to-back with no gap or overlap even when the
//! network delivers audio faster than real time. An interruption cancels
//! everything still scheduled; whatever already reached the speaker is not
//! un-rendered.
//!
//! The scheduler itself is a cheap clonable handle around shared state; the
//! cpal stream lives in [`PlaybackDevice`], which is constructed and dropped
//! on the session worker thread because streams are not `Send` on every
//! backend.

use crate::audio::codec::AudioSegment;
use crate::audio::resampler::resample_audio;
use crate::audio::timeline::PlaybackTimeline;
use crate::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(feature = "audio-io")]
use crate::ParleyError;
#[cfg(feature = "audio-io")]
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

struct ScheduledSegment {
    samples: Vec<f32>,
    start_frame: u64,
}

struct SchedulerState {
    timeline: PlaybackTimeline,
    active: Vec<ScheduledSegment>,
    clock_frames: u64,
    sample_rate: u32,
}

impl SchedulerState {
    fn new(sample_rate: u32) -> Self {
        Self {
            timeline: PlaybackTimeline::new(),
            active: Vec::new(),
            clock_frames: 0,
            sample_rate,
        }
    }

    fn now(&self) -> f64 {
        self.clock_frames as f64 / self.sample_rate as f64
    }

    fn enqueue(&mut self, samples: Vec<f32>, duration: f64) -> f64 {
        let start = self.timeline.schedule(duration, self.now());
        self.active.push(ScheduledSegment {
            samples,
            start_frame: (start * self.sample_rate as f64).round() as u64,
        });
        start
    }

    fn interrupt(&mut self) -> usize {
        let cancelled = self.active.len();
        self.active.clear();
        self.timeline.reset();
        cancelled
    }

    /// Fill one mono output block and advance the clock.
    ///
    /// Called from the device callback; completed segments fall out of the
    /// active set here.
    fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let base = self.clock_frames;
        let window_end = base + out.len() as u64;

        for segment in &self.active {
            let seg_start = segment.start_frame;
            let seg_end = seg_start + segment.samples.len() as u64;
            if seg_end <= base || seg_start >= window_end {
                continue;
            }
            for frame in seg_start.max(base)..seg_end.min(window_end) {
                out[(frame - base) as usize] += segment.samples[(frame - seg_start) as usize];
            }
        }

        self.clock_frames = window_end;
        let clock = self.clock_frames;
        self.active
            .retain(|s| s.start_frame + s.samples.len() as u64 > clock);
    }
}

/// Schedules decoded model audio for sequential playback.
#[derive(Clone)]
pub struct PlaybackScheduler {
    state: Arc<Mutex<SchedulerState>>,
    sample_rate: u32,
}

impl PlaybackScheduler {
    /// Create a scheduler rendering at the given rate.
    ///
    /// The clock only advances when a device (or a test) drives `render`.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::new(sample_rate))),
            sample_rate,
        }
    }

    /// Schedule a segment to start at `max(next_start, clock)`.
    ///
    /// Returns the scheduled start time in seconds. Segments at a foreign
    /// sample rate are resampled to the render rate first; the reserved
    /// duration is the segment's own.
    pub fn enqueue(&self, segment: AudioSegment) -> Result<f64> {
        let duration = segment.duration_secs();

        let mono = if segment.channels <= 1 {
            segment.samples
        } else {
            let channels = segment.channels as usize;
            segment
                .samples
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        let samples = if segment.sample_rate == self.sample_rate {
            mono
        } else {
            resample_audio(&mono, segment.sample_rate, self.sample_rate)?
        };

        let start = self.state.lock().enqueue(samples, duration);
        debug!(
            "Scheduled {:.3}s segment at t={:.3}s ({} active)",
            duration,
            start,
            self.active_segments()
        );
        Ok(start)
    }

    /// Hard-cancel everything scheduled and reset the cursor to 0.
    pub fn interrupt(&self) {
        let cancelled = self.state.lock().interrupt();
        if cancelled > 0 {
            info!("Playback interrupted, {} segments cancelled", cancelled);
        }
    }

    /// Drop all pending audio. Idempotent; the device is released
    /// separately by dropping [`PlaybackDevice`].
    pub fn shutdown(&self) {
        self.state.lock().interrupt();
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Segments scheduled or currently playing
    pub fn active_segments(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Where the next segment would be appended, in seconds
    pub fn next_start_secs(&self) -> f64 {
        self.state.lock().timeline.next_start()
    }

    /// Current position of the audio clock, in seconds
    pub fn clock_secs(&self) -> f64 {
        self.state.lock().now()
    }

    fn render(&self, out: &mut [f32]) {
        self.state.lock().render(out);
    }
}

/// The cpal half: owns the output stream driving a scheduler.
#[cfg(feature = "audio-io")]
pub struct PlaybackDevice {
    stream: Option<cpal::Stream>,
}

#[cfg(feature = "audio-io")]
impl PlaybackDevice {
    /// Open the default output device and return it with a scheduler
    /// rendering at the device's native rate.
    pub fn open() -> Result<(Self, PlaybackScheduler)> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| ParleyError::DeviceUnavailable("no output device available".into()))?;

        info!(
            "Using output device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let config: cpal::StreamConfig = device
            .default_output_config()
            .map_err(|e| {
                ParleyError::DeviceUnavailable(format!("failed to get output config: {}", e))
            })?
            .into();

        let sample_rate = config.sample_rate.0;
        let channels = config.channels as usize;
        let scheduler = PlaybackScheduler::new(sample_rate);
        let callback_scheduler = scheduler.clone();

        let err_fn = |err| {
            tracing::error!("Audio output stream error: {}", err);
        };

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    let mut mono = vec![0.0f32; frames];
                    callback_scheduler.render(&mut mono);
                    for (i, &sample) in mono.iter().enumerate() {
                        for c in 0..channels {
                            data[i * channels + c] = sample;
                        }
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| {
                ParleyError::DeviceUnavailable(format!("failed to build output stream: {}", e))
            })?;

        stream.play().map_err(|e| {
            ParleyError::DeviceUnavailable(format!("failed to start output stream: {}", e))
        })?;

        info!("Playback device started at {} Hz", sample_rate);

        Ok((
            Self {
                stream: Some(stream),
            },
            scheduler,
        ))
    }

    /// Stop rendering and release the device. Idempotent.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            info!("Playback device released");
        }
    }
}

#[cfg(feature = "audio-io")]
impl Drop for PlaybackDevice {
    fn drop(&mut self) {
        self.close();
    }
}
