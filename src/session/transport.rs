//! The seam between the session controller and the remote voice service.
//!
//! The transport is an external collaborator: a persistent bidirectional
//! channel that accepts outbound media chunks and delivers open / message /
//! close / error events. The controller only sees these traits; the real
//! WebSocket client lives in [`crate::gemini::live`] and tests plug in a
//! mock.

use crate::audio::codec::MediaChunk;
use crate::Result;
use crossbeam_channel::Sender;

pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
pub const DEFAULT_VOICE: &str = "Zephyr";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a friendly and concise AI assistant. Keep responses short and conversational.";

/// Fixed model configuration sent when the transport opens.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub model: String,
    pub voice: String,
    pub system_instruction: String,
    pub response_modalities: Vec<String>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_LIVE_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            response_modalities: vec!["AUDIO".to_string()],
        }
    }
}

/// Inbound events from the remote channel, in arrival order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The channel is established; outbound audio may flow.
    Opened,
    /// One inline audio chunk of the model's turn (base64 PCM).
    Audio { data: String },
    /// The model's current turn was cut off; stop playing it.
    Interrupted,
    /// Graceful remote close. Normal termination, not an error.
    Closed,
    /// The channel failed; the session cannot continue.
    Error(String),
}

/// Handle to an established (or establishing) channel.
pub trait LiveTransport: Send {
    /// Send one encoded microphone frame. Frames must be sent in capture
    /// order; the transport does not reorder or batch.
    fn send_audio(&self, chunk: MediaChunk) -> Result<()>;

    /// Best-effort close request; safe even while the connection is still
    /// being established.
    fn close(&self);
}

/// Factory opening a live channel. One call, one connection attempt.
pub trait TransportConnector: Send {
    fn connect(
        &self,
        config: &LiveConfig,
        events: Sender<TransportEvent>,
    ) -> Result<Box<dyn LiveTransport>>;
}
