pub mod audio;
pub mod gemini;
pub mod session;
pub mod ui;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ParleyError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Malformed audio payload: {0}")]
    FormatError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Transport closed")]
    TransportClosed,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl ParleyError {
    /// Whether this error terminates the current session.
    ///
    /// Format errors are contained: the offending frame or segment is
    /// dropped and the session continues. A graceful transport close is
    /// normal termination, not a failure.
    pub fn is_fatal(&self) -> bool {
        match self {
            ParleyError::PermissionDenied(_) => true,
            ParleyError::DeviceUnavailable(_) => true,
            ParleyError::FormatError(_) => false,
            ParleyError::TransportError(_) => true,
            ParleyError::TransportClosed => false,
            ParleyError::ApiError(_) => true,
            ParleyError::ConfigError(_) => true,
            ParleyError::ChannelError(_) => true,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ParleyError::PermissionDenied(_) => {
                "Microphone access was denied. Please allow microphone use and try again."
                    .to_string()
            }
            ParleyError::DeviceUnavailable(_) => {
                "No usable audio device was found. Please check your microphone/speakers."
                    .to_string()
            }
            ParleyError::FormatError(_) => {
                "Received malformed audio data. The chunk was skipped.".to_string()
            }
            ParleyError::TransportError(_) => "Connection error occurred.".to_string(),
            ParleyError::TransportClosed => "The session ended.".to_string(),
            ParleyError::ApiError(_) => {
                "The AI service returned an error. Please try again.".to_string()
            }
            ParleyError::ConfigError(_) => {
                "Configuration error. Please check your API key and settings.".to_string()
            }
            ParleyError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;
