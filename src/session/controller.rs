//! Session controller: owns the lifecycle of one live voice connection.
//!
//! A dedicated worker thread wires capture output to the transport and
//! transport output to the playback scheduler, applying discrete state
//! transitions in response to typed events. The UI talks to it through
//! [`SessionHandle`] only: two control operations and a state snapshot.

use crate::audio::codec::{decode_audio_segment, decode_frame, AudioFrame, OUTPUT_SAMPLE_RATE};
use crate::audio::playback::PlaybackScheduler;
use crate::session::capture::{CaptureFactory, CaptureSource};
use crate::session::config::SessionConfig;
use crate::session::state::{ConnectionStatus, SessionState};
use crate::session::transport::{LiveTransport, TransportConnector, TransportEvent};
use crate::ParleyError;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

#[cfg(feature = "audio-io")]
use crate::audio::playback::PlaybackDevice;
#[cfg(feature = "audio-io")]
use crate::session::capture::MicrophoneCapture;

/// Frames buffered while the transport is still connecting. The handshake
/// lasts well under a second; anything beyond this is stale speech.
const PENDING_FRAME_LIMIT: usize = 16;

/// Commands from the UI layer
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Open a live session (no-op while one is connecting or open)
    Connect,

    /// Close the session and release all audio resources
    Disconnect,

    /// Tear everything down and stop the worker
    Shutdown,
}

/// Control handle for the UI: the session's entire public surface.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: Sender<SessionCommand>,
    state: Arc<Mutex<SessionState>>,
    scheduler_slot: Arc<Mutex<Option<PlaybackScheduler>>>,
}

impl SessionHandle {
    pub fn connect(&self) {
        if self.command_tx.send(SessionCommand::Connect).is_err() {
            warn!("Session worker is gone, connect ignored");
        }
    }

    pub fn disconnect(&self) {
        if self.command_tx.send(SessionCommand::Disconnect).is_err() {
            warn!("Session worker is gone, disconnect ignored");
        }
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(SessionCommand::Shutdown);
    }

    /// Snapshot of the observable session state
    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// The live session's playback scheduler, or `None` when no session is
    /// active
    pub fn playback(&self) -> Option<PlaybackScheduler> {
        self.scheduler_slot.lock().clone()
    }
}

/// Everything owned for the duration of one connection. Dropped as a unit
/// on teardown, which releases the microphone and the output device.
///
/// Lives as a local of the worker loop, never inside [`SessionController`]:
/// cpal streams are not `Send`, so they must be created, owned and dropped
/// entirely on the worker thread.
struct ActiveSession {
    transport: Box<dyn LiveTransport>,
    transport_rx: Receiver<TransportEvent>,
    frame_rx: Receiver<AudioFrame>,
    volume_rx: Receiver<f32>,
    scheduler: PlaybackScheduler,
    pending_frames: VecDeque<AudioFrame>,
    open: bool,
    capture: Option<Box<dyn CaptureSource>>,
    #[cfg(feature = "audio-io")]
    device: Option<PlaybackDevice>,
}

enum PumpOutcome {
    Continue,
    Closed,
    Failed(String),
}

/// Worker owning the session state machine and all audio resources.
pub struct SessionController {
    config: SessionConfig,
    connector: Box<dyn TransportConnector>,
    capture: Option<Box<dyn CaptureFactory>>,
    command_rx: Receiver<SessionCommand>,
    state: Arc<Mutex<SessionState>>,
    scheduler_slot: Arc<Mutex<Option<PlaybackScheduler>>>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        connector: Box<dyn TransportConnector>,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = bounded(16);
        let state = Arc::new(Mutex::new(SessionState::new()));
        let scheduler_slot = Arc::new(Mutex::new(None));

        let handle = SessionHandle {
            command_tx,
            state: Arc::clone(&state),
            scheduler_slot: Arc::clone(&scheduler_slot),
        };

        #[cfg(feature = "audio-io")]
        let capture: Option<Box<dyn CaptureFactory>> = if config.enable_capture {
            Some(Box::new(MicrophoneCapture))
        } else {
            None
        };
        #[cfg(not(feature = "audio-io"))]
        let capture: Option<Box<dyn CaptureFactory>> = None;

        let controller = Self {
            config,
            connector,
            capture,
            command_rx,
            state,
            scheduler_slot,
        };

        (controller, handle)
    }

    /// Replace the microphone factory.
    ///
    /// Tests use this to drive the outbound audio path with scripted
    /// sources instead of a real input device.
    pub fn with_capture(mut self, factory: Box<dyn CaptureFactory>) -> Self {
        self.capture = Some(factory);
        self
    }

    /// Spawn the worker thread. All device acquisition and transport work
    /// happens there; the caller's thread never blocks on audio I/O.
    pub fn start(mut self) -> JoinHandle<()> {
        thread::spawn(move || {
            info!("Session controller started");
            self.run();
            info!("Session controller stopped");
        })
    }

    fn run(&mut self) {
        let mut session: Option<ActiveSession> = None;

        loop {
            match self.command_rx.try_recv() {
                Ok(SessionCommand::Connect) => self.begin_connect(&mut session),
                Ok(SessionCommand::Disconnect) => self.disconnect(&mut session),
                Ok(SessionCommand::Shutdown) => {
                    self.disconnect(&mut session);
                    break;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    debug!("Session handle dropped, shutting down");
                    self.disconnect(&mut session);
                    break;
                }
            }

            let outcome = match session.as_mut() {
                Some(active) => Self::pump(active, &self.state),
                None => PumpOutcome::Continue,
            };
            match outcome {
                PumpOutcome::Continue => {}
                PumpOutcome::Closed => {
                    info!("Transport closed");
                    self.teardown(&mut session);
                    self.state.lock().mark_closed();
                }
                PumpOutcome::Failed(message) => {
                    error!("Session failed: {}", message);
                    self.teardown(&mut session);
                    self.state.lock().mark_failed(message);
                }
            }

            thread::sleep(std::time::Duration::from_millis(10));
        }
    }

    /// Acquire playback, then capture, then open the transport.
    ///
    /// A capture failure (permission denied, no device) aborts before any
    /// transport connection is attempted.
    fn begin_connect(&mut self, session: &mut Option<ActiveSession>) {
        if !self.state.lock().begin_connect() {
            return;
        }
        info!("Connecting live session");

        #[cfg(feature = "audio-io")]
        let (device, scheduler) = if self.config.enable_playback_device {
            match PlaybackDevice::open() {
                Ok((device, scheduler)) => (Some(device), scheduler),
                Err(e) => {
                    self.fail(session, e);
                    return;
                }
            }
        } else {
            (None, PlaybackScheduler::new(OUTPUT_SAMPLE_RATE))
        };
        #[cfg(not(feature = "audio-io"))]
        let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);

        let (frame_tx, frame_rx) = bounded::<AudioFrame>(64);
        let (volume_tx, volume_rx) = bounded::<f32>(16);

        let capture = match self.capture.as_ref() {
            Some(factory) => {
                let mut source = match factory.open() {
                    Ok(source) => source,
                    Err(e) => {
                        self.fail(session, e);
                        return;
                    }
                };
                if let Err(e) = source.start(frame_tx, volume_tx) {
                    self.fail(session, e);
                    return;
                }
                Some(source)
            }
            None => {
                drop(frame_tx);
                drop(volume_tx);
                None
            }
        };

        let (transport_tx, transport_rx) = unbounded();
        let transport = match self.connector.connect(&self.config.live, transport_tx) {
            Ok(transport) => transport,
            Err(e) => {
                self.fail(session, e);
                return;
            }
        };

        *self.scheduler_slot.lock() = Some(scheduler.clone());
        *session = Some(ActiveSession {
            transport,
            transport_rx,
            frame_rx,
            volume_rx,
            scheduler,
            pending_frames: VecDeque::new(),
            open: false,
            capture,
            #[cfg(feature = "audio-io")]
            device,
        });
    }

    /// Drain transport events, outbound frames and volume readings.
    fn pump(session: &mut ActiveSession, state: &Arc<Mutex<SessionState>>) -> PumpOutcome {
        loop {
            match session.transport_rx.try_recv() {
                Ok(TransportEvent::Opened) => {
                    state.lock().mark_open();
                    session.open = true;
                    let buffered = session.pending_frames.len();
                    while let Some(frame) = session.pending_frames.pop_front() {
                        if let Err(e) = session.transport.send_audio(frame.encode()) {
                            return PumpOutcome::Failed(e.user_message());
                        }
                    }
                    info!("Live session open ({} buffered frames flushed)", buffered);
                }
                Ok(TransportEvent::Audio { data }) => {
                    // A malformed chunk is dropped; the session continues.
                    let decoded = decode_frame(&data)
                        .and_then(|bytes| decode_audio_segment(&bytes, OUTPUT_SAMPLE_RATE, 1));
                    match decoded {
                        Ok(segment) => {
                            if let Err(e) = session.scheduler.enqueue(segment) {
                                warn!("Dropping unplayable segment: {}", e);
                            }
                        }
                        Err(e) => warn!("Dropping malformed audio segment: {}", e),
                    }
                }
                Ok(TransportEvent::Interrupted) => {
                    session.scheduler.interrupt();
                }
                Ok(TransportEvent::Closed) => return PumpOutcome::Closed,
                Ok(TransportEvent::Error(message)) => {
                    return PumpOutcome::Failed(
                        ParleyError::TransportError(message).user_message(),
                    );
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return PumpOutcome::Failed(
                        ParleyError::TransportError("event channel lost".into()).user_message(),
                    );
                }
            }
        }

        while let Ok(frame) = session.frame_rx.try_recv() {
            if session.open {
                if let Err(e) = session.transport.send_audio(frame.encode()) {
                    return PumpOutcome::Failed(e.user_message());
                }
            } else {
                // Hold early frames until the transport reports open, so
                // nothing is fired at a half-established connection.
                if session.pending_frames.len() >= PENDING_FRAME_LIMIT {
                    session.pending_frames.pop_front();
                    debug!("Pending frame buffer full, oldest frame dropped");
                }
                session.pending_frames.push_back(frame);
            }
        }

        let mut latest_volume = None;
        while let Ok(volume) = session.volume_rx.try_recv() {
            latest_volume = Some(volume);
        }
        if let Some(volume) = latest_volume {
            state.lock().set_volume(volume);
        }

        PumpOutcome::Continue
    }

    /// Best-effort close, then unconditional teardown.
    fn disconnect(&mut self, session: &mut Option<ActiveSession>) {
        if self.state.lock().status == ConnectionStatus::Idle {
            debug!("Disconnect while idle, no-op");
            return;
        }
        if let Some(active) = session.as_ref() {
            active.transport.close();
        }
        self.teardown(session);
        self.state.lock().mark_closed();
    }

    fn fail(&mut self, session: &mut Option<ActiveSession>, err: ParleyError) {
        error!("Session setup failed: {}", err);
        self.teardown(session);
        self.state.lock().mark_failed(err.user_message());
    }

    /// Release microphone, playback and transport, and withdraw the
    /// scheduler from the handle. Idempotent.
    fn teardown(&mut self, session: &mut Option<ActiveSession>) {
        *self.scheduler_slot.lock() = None;
        if let Some(mut active) = session.take() {
            if let Some(mut capture) = active.capture.take() {
                capture.stop();
            }
            active.scheduler.shutdown();
            #[cfg(feature = "audio-io")]
            if let Some(mut device) = active.device.take() {
                device.close();
            }
            info!("Session resources released");
        }
    }
}
