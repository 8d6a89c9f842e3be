use crate::session::transport::LiveConfig;

/// Configuration for one live voice session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Model configuration sent at transport open
    pub live: LiveConfig,

    /// Whether to acquire the microphone
    pub enable_capture: bool,

    /// Whether to open a real output device (tests drive the scheduler
    /// without one)
    pub enable_playback_device: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            live: LiveConfig::default(),
            enable_capture: true,
            enable_playback_device: true,
        }
    }
}

impl SessionConfig {
    pub fn with_live(mut self, live: LiveConfig) -> Self {
        self.live = live;
        self
    }

    /// Disable microphone capture (receive-only session)
    pub fn without_capture(mut self) -> Self {
        self.enable_capture = false;
        self
    }

    /// Disable the output device; audio is scheduled but never rendered
    pub fn without_playback_device(mut self) -> Self {
        self.enable_playback_device = false;
        self
    }
}
