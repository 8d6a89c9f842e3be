pub mod chat;
pub mod live;

pub use chat::{analyze_image, stream_chat, ChatTurn};
pub use live::GeminiLiveConnector;

use crate::{ParleyError, Result};

/// The one piece of environment-level configuration
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub fn api_key_from_env() -> Result<String> {
    std::env::var(API_KEY_ENV)
        .map_err(|_| ParleyError::ConfigError(format!("{} is not set", API_KEY_ENV)))
}
