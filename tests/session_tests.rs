//! Session lifecycle tests against a scripted transport.
//!
//! These drive the real controller worker with a mock connector, so they
//! cover the full event path: connect, open, inbound audio scheduling,
//! interruption, close and failure. No audio devices are used.

use base64::Engine;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use parley::audio::codec::{AudioFrame, MediaChunk, FRAME_SIZE, OUTPUT_SAMPLE_RATE};
use parley::session::{
    CaptureFactory, CaptureSource, ConnectionStatus, LiveConfig, LiveTransport, SessionConfig,
    SessionController, SessionHandle, TransportConnector, TransportEvent,
};
use parley::{ParleyError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct MockTransport {
    sent: Arc<Mutex<Vec<MediaChunk>>>,
    closed: Arc<Mutex<bool>>,
}

impl LiveTransport for MockTransport {
    fn send_audio(&self, chunk: MediaChunk) -> Result<()> {
        self.sent.lock().push(chunk);
        Ok(())
    }

    fn close(&self) {
        *self.closed.lock() = true;
    }
}

/// Connector that hands the test a sender for injecting transport events.
#[derive(Clone, Default)]
struct MockConnector {
    events: Arc<Mutex<Option<Sender<TransportEvent>>>>,
    sent: Arc<Mutex<Vec<MediaChunk>>>,
    closed: Arc<Mutex<bool>>,
    seen_config: Arc<Mutex<Option<LiveConfig>>>,
    connect_count: Arc<Mutex<usize>>,
}

impl MockConnector {
    fn emit(&self, event: TransportEvent) {
        let guard = self.events.lock();
        let sender = guard.as_ref().expect("transport not connected yet");
        sender.send(event).expect("controller dropped event channel");
    }
}

impl TransportConnector for MockConnector {
    fn connect(
        &self,
        config: &LiveConfig,
        events: Sender<TransportEvent>,
    ) -> Result<Box<dyn LiveTransport>> {
        *self.events.lock() = Some(events);
        *self.seen_config.lock() = Some(config.clone());
        *self.connect_count.lock() += 1;
        Ok(Box::new(MockTransport {
            sent: Arc::clone(&self.sent),
            closed: Arc::clone(&self.closed),
        }))
    }
}

/// Microphone stand-in: hands the test the frame and volume senders so it
/// can script capture output.
#[derive(Clone, Default)]
struct ScriptedMicrophone {
    frames: Arc<Mutex<Option<Sender<AudioFrame>>>>,
    volumes: Arc<Mutex<Option<Sender<f32>>>>,
}

impl ScriptedMicrophone {
    fn started(&self) -> bool {
        self.frames.lock().is_some()
    }

    fn send_frame(&self, amplitude: f32) {
        let guard = self.frames.lock();
        let tx = guard.as_ref().expect("capture not started yet");
        tx.send(AudioFrame::from_samples(&[amplitude; FRAME_SIZE]))
            .expect("controller dropped frame channel");
    }

    fn send_volume(&self, level: f32) {
        let guard = self.volumes.lock();
        let tx = guard.as_ref().expect("capture not started yet");
        tx.send(level).expect("controller dropped volume channel");
    }
}

impl CaptureFactory for ScriptedMicrophone {
    fn open(&self) -> Result<Box<dyn CaptureSource>> {
        Ok(Box::new(self.clone()))
    }
}

impl CaptureSource for ScriptedMicrophone {
    fn start(&mut self, frame_tx: Sender<AudioFrame>, volume_tx: Sender<f32>) -> Result<()> {
        *self.frames.lock() = Some(frame_tx);
        *self.volumes.lock() = Some(volume_tx);
        Ok(())
    }

    fn stop(&mut self) {
        *self.frames.lock() = None;
        *self.volumes.lock() = None;
    }
}

/// Microphone stand-in that refuses to open, like an OS permission denial.
struct DeniedMicrophone;

impl CaptureFactory for DeniedMicrophone {
    fn open(&self) -> Result<Box<dyn CaptureSource>> {
        Err(ParleyError::PermissionDenied("denied by user".to_string()))
    }
}

fn start_session(connector: MockConnector) -> (SessionHandle, std::thread::JoinHandle<()>) {
    let config = SessionConfig::default()
        .without_capture()
        .without_playback_device();
    let (controller, handle) = SessionController::new(config, Box::new(connector));
    let worker = controller.start();
    (handle, worker)
}

fn start_session_with_capture(
    connector: MockConnector,
    capture: Box<dyn CaptureFactory>,
) -> (SessionHandle, std::thread::JoinHandle<()>) {
    let config = SessionConfig::default().without_playback_device();
    let (controller, handle) = SessionController::new(config, Box::new(connector));
    let worker = controller.with_capture(capture).start();
    (handle, worker)
}

/// The worker ticks every 10ms; poll until the condition holds.
fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached within 2s");
}

fn open_session(handle: &SessionHandle, connector: &MockConnector) {
    handle.connect();
    wait_for(|| connector.events.lock().is_some());
    connector.emit(TransportEvent::Opened);
    wait_for(|| handle.state().status == ConnectionStatus::Open);
}

/// Base64 PCM for `secs` of silence at the playback rate.
fn pcm_chunk(secs: f64) -> String {
    let samples = (secs * OUTPUT_SAMPLE_RATE as f64) as usize;
    let bytes = vec![0u8; samples * 2];
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[test]
fn test_disconnect_while_idle_is_noop() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());

    handle.disconnect();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(handle.state().status, ConnectionStatus::Idle);
    assert_eq!(*connector.connect_count.lock(), 0);

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_connect_reaches_open() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());

    handle.connect();
    wait_for(|| handle.state().status == ConnectionStatus::Connecting);
    wait_for(|| connector.events.lock().is_some());

    connector.emit(TransportEvent::Opened);
    wait_for(|| {
        let state = handle.state();
        state.status == ConnectionStatus::Open && state.streaming
    });
    assert!(handle.playback().is_some());

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_connector_receives_default_live_config() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());

    handle.connect();
    wait_for(|| connector.seen_config.lock().is_some());

    let config = connector.seen_config.lock().clone().unwrap();
    assert_eq!(config.model, "gemini-2.5-flash-native-audio-preview-09-2025");
    assert_eq!(config.voice, "Zephyr");
    assert_eq!(config.response_modalities, vec!["AUDIO"]);

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_model_audio_is_scheduled_gaplessly() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());
    open_session(&handle, &connector);

    connector.emit(TransportEvent::Audio {
        data: pcm_chunk(0.5),
    });
    connector.emit(TransportEvent::Audio {
        data: pcm_chunk(0.25),
    });

    let scheduler = handle.playback().unwrap();
    wait_for(|| scheduler.active_segments() == 2);

    // Segments queue back to back: cursor sits at the summed duration
    let cursor = scheduler.next_start_secs();
    assert!((cursor - 0.75).abs() < 1e-6, "cursor was {}", cursor);

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_interruption_flushes_playback() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());
    open_session(&handle, &connector);

    connector.emit(TransportEvent::Audio {
        data: pcm_chunk(1.0),
    });
    let scheduler = handle.playback().unwrap();
    wait_for(|| scheduler.active_segments() == 1);

    connector.emit(TransportEvent::Interrupted);
    wait_for(|| scheduler.active_segments() == 0);
    assert_eq!(scheduler.next_start_secs(), 0.0);

    // The session itself stays open for the next model turn
    assert_eq!(handle.state().status, ConnectionStatus::Open);

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_malformed_audio_is_dropped_not_fatal() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());
    open_session(&handle, &connector);

    connector.emit(TransportEvent::Audio {
        data: "not base64!!".to_string(),
    });
    connector.emit(TransportEvent::Audio {
        data: pcm_chunk(0.25),
    });

    let scheduler = handle.playback().unwrap();
    wait_for(|| scheduler.active_segments() == 1);
    assert_eq!(handle.state().status, ConnectionStatus::Open);

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_remote_close_is_normal_termination() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());
    open_session(&handle, &connector);

    connector.emit(TransportEvent::Closed);
    wait_for(|| handle.state().status == ConnectionStatus::Closed);

    let state = handle.state();
    assert!(!state.streaming);
    assert!(state.last_error.is_none());
    assert_eq!(state.volume, 0.0);

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_transport_error_fails_session() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());
    open_session(&handle, &connector);

    connector.emit(TransportEvent::Error("socket reset".to_string()));
    wait_for(|| handle.state().status == ConnectionStatus::Failed);
    assert!(handle.state().last_error.is_some());
    assert!(handle.playback().is_none());

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_disconnect_closes_transport() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());
    open_session(&handle, &connector);

    handle.disconnect();
    wait_for(|| handle.state().status == ConnectionStatus::Closed);
    assert!(*connector.closed.lock());

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_connect_while_open_is_ignored() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());
    open_session(&handle, &connector);

    handle.connect();
    // Give the worker time to (not) act on it
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(*connector.connect_count.lock(), 1);
    assert_eq!(handle.state().status, ConnectionStatus::Open);

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_reconnect_after_close() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());
    open_session(&handle, &connector);

    handle.disconnect();
    wait_for(|| handle.state().status == ConnectionStatus::Closed);

    handle.connect();
    wait_for(|| *connector.connect_count.lock() == 2);
    connector.emit(TransportEvent::Opened);
    wait_for(|| handle.state().status == ConnectionStatus::Open);

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_permission_denied_fails_without_transport_attempt() {
    let connector = MockConnector::default();
    let (handle, worker) =
        start_session_with_capture(connector.clone(), Box::new(DeniedMicrophone));

    handle.connect();
    wait_for(|| handle.state().status == ConnectionStatus::Failed);

    assert!(handle.state().last_error.is_some());
    assert!(handle.playback().is_none());
    // Capture is acquired first; the transport was never contacted
    assert_eq!(*connector.connect_count.lock(), 0);
    assert!(connector.events.lock().is_none());

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_frames_buffer_until_transport_opens() {
    let connector = MockConnector::default();
    let mic = ScriptedMicrophone::default();
    let (handle, worker) = start_session_with_capture(connector.clone(), Box::new(mic.clone()));

    handle.connect();
    wait_for(|| mic.started() && connector.events.lock().is_some());

    // Transport not yet open: frames must be held back
    mic.send_frame(0.1);
    mic.send_frame(0.2);
    std::thread::sleep(Duration::from_millis(50));
    assert!(connector.sent.lock().is_empty());

    connector.emit(TransportEvent::Opened);
    wait_for(|| connector.sent.lock().len() == 2);

    // Buffered frames flush in capture order
    let expected = AudioFrame::from_samples(&[0.1; FRAME_SIZE]).encode();
    assert_eq!(connector.sent.lock()[0].data, expected.data);
    assert_eq!(connector.sent.lock()[0].mime_type, "audio/pcm;rate=16000");

    // Frames after open go straight out
    mic.send_frame(0.3);
    wait_for(|| connector.sent.lock().len() == 3);

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_pre_open_buffer_caps_and_keeps_newest_frames() {
    let connector = MockConnector::default();
    let mic = ScriptedMicrophone::default();
    let (handle, worker) = start_session_with_capture(connector.clone(), Box::new(mic.clone()));

    handle.connect();
    wait_for(|| mic.started() && connector.events.lock().is_some());

    for i in 0..20 {
        mic.send_frame(i as f32 / 100.0);
    }
    std::thread::sleep(Duration::from_millis(100));

    connector.emit(TransportEvent::Opened);
    wait_for(|| connector.sent.lock().len() == 16);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(connector.sent.lock().len(), 16);

    // The four oldest frames were dropped; the flush starts at frame 4
    let expected = AudioFrame::from_samples(&[0.04; FRAME_SIZE]).encode();
    assert_eq!(connector.sent.lock()[0].data, expected.data);

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_volume_readings_reach_session_state() {
    let connector = MockConnector::default();
    let mic = ScriptedMicrophone::default();
    let (handle, worker) = start_session_with_capture(connector.clone(), Box::new(mic.clone()));

    handle.connect();
    wait_for(|| mic.started() && connector.events.lock().is_some());
    connector.emit(TransportEvent::Opened);
    wait_for(|| handle.state().status == ConnectionStatus::Open);

    mic.send_volume(0.6);
    wait_for(|| (handle.state().volume - 0.6).abs() < 1e-6);

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_playback_handle_withdrawn_after_session_ends() {
    let connector = MockConnector::default();
    let (handle, worker) = start_session(connector.clone());
    open_session(&handle, &connector);
    assert!(handle.playback().is_some());

    handle.disconnect();
    wait_for(|| handle.state().status == ConnectionStatus::Closed);
    assert!(handle.playback().is_none());

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_failed_connector_surfaces_error() {
    struct FailingConnector;
    impl TransportConnector for FailingConnector {
        fn connect(
            &self,
            _config: &LiveConfig,
            _events: Sender<TransportEvent>,
        ) -> Result<Box<dyn LiveTransport>> {
            Err(parley::ParleyError::TransportError("no route".to_string()))
        }
    }

    let config = SessionConfig::default()
        .without_capture()
        .without_playback_device();
    let (controller, handle) = SessionController::new(config, Box::new(FailingConnector));
    let worker = controller.start();

    handle.connect();
    wait_for(|| handle.state().status == ConnectionStatus::Failed);
    assert!(handle.state().last_error.is_some());

    handle.shutdown();
    worker.join().unwrap();
}
