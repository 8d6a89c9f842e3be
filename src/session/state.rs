//! Observable session state.
//!
//! One value, owned by the session controller, mutated only through the
//! typed transitions below in response to transport and capture events.
//! The UI reads snapshots of it and nothing else.

use tracing::warn;

/// Lifecycle of the remote connection.
///
/// `Idle → Connecting → Open → Closed`, with `Failed` reachable from
/// `Connecting` or `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

/// The read-model exposed to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub status: ConnectionStatus,
    pub streaming: bool,
    /// Microphone level in [0, 1], for visualization
    pub volume: f32,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            status: ConnectionStatus::Idle,
            streaming: false,
            volume: 0.0,
            last_error: None,
        }
    }

    /// A new connection may only be attempted when no session is live.
    pub fn can_connect(&self) -> bool {
        matches!(
            self.status,
            ConnectionStatus::Idle | ConnectionStatus::Closed | ConnectionStatus::Failed
        )
    }

    /// Begin a connection attempt. Returns false (and changes nothing) if a
    /// session is already connecting or open.
    pub fn begin_connect(&mut self) -> bool {
        if !self.can_connect() {
            warn!("Connect requested while {:?}, ignoring", self.status);
            return false;
        }
        self.status = ConnectionStatus::Connecting;
        self.streaming = false;
        self.volume = 0.0;
        self.last_error = None;
        true
    }

    /// The transport reported open: audio is now streaming both ways.
    pub fn mark_open(&mut self) {
        if self.status != ConnectionStatus::Connecting {
            warn!("Transport opened while {:?}, ignoring", self.status);
            return;
        }
        self.status = ConnectionStatus::Open;
        self.streaming = true;
    }

    /// Normal termination: graceful remote close or local disconnect.
    pub fn mark_closed(&mut self) {
        self.status = ConnectionStatus::Closed;
        self.streaming = false;
        self.volume = 0.0;
    }

    /// Fatal error: the session is torn down and the message surfaced.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = ConnectionStatus::Failed;
        self.streaming = false;
        self.volume = 0.0;
        self.last_error = Some(message.into());
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Open
        )
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SessionState::new();
        assert_eq!(state.status, ConnectionStatus::Idle);
        assert!(!state.streaming);
        assert_eq!(state.volume, 0.0);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = SessionState::new();
        assert!(state.begin_connect());
        assert_eq!(state.status, ConnectionStatus::Connecting);

        state.mark_open();
        assert_eq!(state.status, ConnectionStatus::Open);
        assert!(state.streaming);

        state.mark_closed();
        assert_eq!(state.status, ConnectionStatus::Closed);
        assert!(!state.streaming);
        assert_eq!(state.volume, 0.0);
    }

    #[test]
    fn test_connect_rejected_while_open() {
        let mut state = SessionState::new();
        state.begin_connect();
        state.mark_open();

        assert!(!state.begin_connect());
        assert_eq!(state.status, ConnectionStatus::Open);
        assert!(state.streaming);
    }

    #[test]
    fn test_connect_allowed_after_close_and_failure() {
        let mut state = SessionState::new();
        state.begin_connect();
        state.mark_closed();
        assert!(state.begin_connect());

        state.mark_failed("boom");
        assert!(state.begin_connect());
        // A fresh attempt clears the stale error
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_failure_surfaces_message() {
        let mut state = SessionState::new();
        state.begin_connect();
        state.mark_failed("permission denied");
        assert_eq!(state.status, ConnectionStatus::Failed);
        assert_eq!(state.last_error.as_deref(), Some("permission denied"));
        assert!(!state.streaming);
    }

    #[test]
    fn test_open_ignored_outside_connecting() {
        let mut state = SessionState::new();
        state.mark_open();
        assert_eq!(state.status, ConnectionStatus::Idle);

        state.begin_connect();
        state.mark_failed("gone");
        state.mark_open();
        assert_eq!(state.status, ConnectionStatus::Failed);
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut state = SessionState::new();
        state.set_volume(1.5);
        assert_eq!(state.volume, 1.0);
        state.set_volume(-0.2);
        assert_eq!(state.volume, 0.0);
    }
}
