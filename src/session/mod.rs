pub mod capture;
pub mod config;
pub mod controller;
pub mod state;
pub mod transport;

#[cfg(feature = "audio-io")]
pub use capture::MicrophoneCapture;
pub use capture::{CaptureFactory, CaptureSource};
pub use config::SessionConfig;
pub use controller::{SessionCommand, SessionController, SessionHandle};
pub use state::{ConnectionStatus, SessionState};
pub use transport::{LiveConfig, LiveTransport, TransportConnector, TransportEvent};
