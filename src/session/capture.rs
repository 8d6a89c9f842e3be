//! The seam between the session controller and the microphone.
//!
//! Mirrors the transport seam: the controller only sees these traits. The
//! cpal-backed pipeline lives in [`crate::audio::capture`]; tests plug in
//! scripted sources to drive the outbound audio path without a device.

use crate::audio::codec::AudioFrame;
use crate::Result;
use crossbeam_channel::Sender;

#[cfg(feature = "audio-io")]
use crate::audio::capture::CapturePipeline;

/// A startable microphone source.
///
/// Deliberately not `Send`: cpal streams must stay on the thread that
/// opened them, so sources are opened and dropped on the session worker.
pub trait CaptureSource {
    /// Begin producing 16 kHz mono frames on `frame_tx` and volume readings
    /// in [0, 1] on `volume_tx`. Neither send may block.
    fn start(&mut self, frame_tx: Sender<AudioFrame>, volume_tx: Sender<f32>) -> Result<()>;

    /// Stop and release the microphone. Idempotent.
    fn stop(&mut self);
}

/// Factory opening a capture source on the session worker thread.
pub trait CaptureFactory: Send {
    fn open(&self) -> Result<Box<dyn CaptureSource>>;
}

#[cfg(feature = "audio-io")]
impl CaptureSource for CapturePipeline {
    fn start(&mut self, frame_tx: Sender<AudioFrame>, volume_tx: Sender<f32>) -> Result<()> {
        CapturePipeline::start(self, frame_tx, volume_tx)
    }

    fn stop(&mut self) {
        CapturePipeline::stop(self);
    }
}

/// The default input device, behind the seam.
#[cfg(feature = "audio-io")]
pub struct MicrophoneCapture;

#[cfg(feature = "audio-io")]
impl CaptureFactory for MicrophoneCapture {
    fn open(&self) -> Result<Box<dyn CaptureSource>> {
        Ok(Box::new(CapturePipeline::new()?))
    }
}
