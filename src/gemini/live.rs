//! WebSocket client for the Gemini live (BidiGenerateContent) API.
//!
//! One connect attempt per session, no reconnection. The connector spawns a
//! worker thread with its own tokio runtime; the session controller drives
//! it synchronously through the [`LiveTransport`] handle and receives
//! [`TransportEvent`]s on a crossbeam channel.

use crate::audio::codec::MediaChunk;
use crate::session::transport::{LiveConfig, LiveTransport, TransportConnector, TransportEvent};
use crate::{ParleyError, Result};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

enum TransportCommand {
    Send(MediaChunk),
    Close,
}

/// Opens live sessions against the Gemini API.
pub struct GeminiLiveConnector {
    api_key: String,
}

impl GeminiLiveConnector {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl TransportConnector for GeminiLiveConnector {
    fn connect(
        &self,
        config: &LiveConfig,
        events: crossbeam_channel::Sender<TransportEvent>,
    ) -> Result<Box<dyn LiveTransport>> {
        let (command_tx, command_rx) = unbounded_channel();
        let url = format!("{}?key={}", LIVE_ENDPOINT, self.api_key);
        let setup = setup_message(config);

        std::thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to create transport runtime: {}", e);
                    let _ = events.send(TransportEvent::Error(format!(
                        "runtime creation failed: {}",
                        e
                    )));
                    return;
                }
            };
            runtime.block_on(run_transport(url, setup, command_rx, events));
        });

        Ok(Box::new(GeminiLiveTransport { command_tx }))
    }
}

/// Handle returned to the session controller before the connection has
/// resolved; commands queue until the worker is ready.
struct GeminiLiveTransport {
    command_tx: UnboundedSender<TransportCommand>,
}

impl LiveTransport for GeminiLiveTransport {
    fn send_audio(&self, chunk: MediaChunk) -> Result<()> {
        self.command_tx
            .send(TransportCommand::Send(chunk))
            .map_err(|_| ParleyError::TransportError("transport worker is gone".into()))
    }

    fn close(&self) {
        let _ = self.command_tx.send(TransportCommand::Close);
    }
}

async fn run_transport(
    url: String,
    setup: serde_json::Value,
    mut command_rx: UnboundedReceiver<TransportCommand>,
    events: crossbeam_channel::Sender<TransportEvent>,
) {
    let (socket, _) = match connect_async(&url).await {
        Ok(connected) => connected,
        Err(e) => {
            let _ = events.send(TransportEvent::Error(format!("connect failed: {}", e)));
            return;
        }
    };
    let (mut write, mut read) = socket.split();

    if let Err(e) = write.send(Message::Text(setup.to_string())).await {
        let _ = events.send(TransportEvent::Error(format!("setup failed: {}", e)));
        return;
    }

    info!("Live transport connected");
    let _ = events.send(TransportEvent::Opened);

    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(TransportCommand::Send(chunk)) => {
                    let message = json!({
                        "realtimeInput": {
                            "mediaChunks": [{
                                "mimeType": chunk.mime_type,
                                "data": chunk.data,
                            }]
                        }
                    });
                    if let Err(e) = write.send(Message::Text(message.to_string())).await {
                        let _ = events.send(TransportEvent::Error(format!("send failed: {}", e)));
                        break;
                    }
                }
                Some(TransportCommand::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    let _ = events.send(TransportEvent::Closed);
                    break;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    dispatch_server_message(&text, &events);
                }
                Some(Ok(Message::Binary(bytes))) => {
                    // The live API also delivers JSON frames as binary
                    if let Ok(text) = String::from_utf8(bytes) {
                        dispatch_server_message(&text, &events);
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    let _ = events.send(TransportEvent::Closed);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
            },
        }
    }

    debug!("Live transport worker finished");
}

fn setup_message(config: &LiveConfig) -> serde_json::Value {
    json!({
        "setup": {
            "model": format!("models/{}", config.model),
            "generationConfig": {
                "responseModalities": config.response_modalities,
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": config.voice }
                    }
                }
            },
            "systemInstruction": {
                "parts": [{ "text": config.system_instruction }]
            }
        }
    })
}

fn dispatch_server_message(text: &str, events: &crossbeam_channel::Sender<TransportEvent>) {
    let message: ServerMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("Ignoring unparseable server message: {}", e);
            return;
        }
    };

    if let Some(content) = message.server_content {
        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(inline) = part.inline_data {
                    let _ = events.send(TransportEvent::Audio { data: inline.data });
                }
            }
        }
        if content.interrupted == Some(true) {
            let _ = events.send(TransportEvent::Interrupted);
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    server_content: Option<ServerContent>,
    #[allow(dead_code)]
    setup_complete: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<ModelTurn>,
    interrupted: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<TurnPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnPart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}
