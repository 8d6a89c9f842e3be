//! Application state for the Parley UI.
//!
//! All session logic lives behind [`SessionHandle`]; the chat and vision
//! tabs are plain request/response plumbing on worker threads.

use crate::gemini::{self, ChatTurn, GeminiLiveConnector};
use crate::session::{SessionConfig, SessionController, SessionHandle};
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver};
use tokio::runtime::Runtime;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppTab {
    Chat,
    Vision,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub streaming: bool,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
            streaming: false,
        }
    }
}

pub enum ChatEvent {
    Delta(String),
    Complete,
    Error(String),
}

pub enum VisionEvent {
    Result(String),
    Error(String),
}

/// An image staged for analysis
pub struct StagedImage {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

pub struct AppState {
    pub tab: AppTab,
    pub api_key: Option<String>,

    // Chat tab
    pub messages: Vec<ChatMessage>,
    pub chat_input: String,
    pub chat_busy: bool,
    pub chat_error: Option<String>,
    chat_rx: Option<Receiver<ChatEvent>>,

    // Vision tab
    pub image_path_input: String,
    pub staged_image: Option<StagedImage>,
    pub vision_prompt: String,
    pub vision_result: Option<String>,
    pub vision_busy: bool,
    pub vision_error: Option<String>,
    vision_rx: Option<Receiver<VisionEvent>>,

    // Live tab
    pub session: Option<SessionHandle>,
}

impl AppState {
    pub fn new() -> Self {
        let api_key = gemini::api_key_from_env().ok();

        let session = api_key.as_ref().map(|key| {
            let connector = GeminiLiveConnector::new(key.clone());
            let (controller, handle) =
                SessionController::new(SessionConfig::default(), Box::new(connector));
            controller.start();
            handle
        });

        Self {
            tab: AppTab::Chat,
            api_key,
            messages: Vec::new(),
            chat_input: String::new(),
            chat_busy: false,
            chat_error: None,
            chat_rx: None,
            image_path_input: String::new(),
            staged_image: None,
            vision_prompt: String::new(),
            vision_result: None,
            vision_busy: false,
            vision_error: None,
            vision_rx: None,
            session,
        }
    }

    /// Send the current chat input and start streaming the reply.
    pub fn send_chat_message(&mut self) {
        let message = self.chat_input.trim().to_string();
        if message.is_empty() || self.chat_busy {
            return;
        }
        let Some(api_key) = self.api_key.clone() else {
            self.chat_error = Some(format!("{} is not set", gemini::API_KEY_ENV));
            return;
        };
        self.chat_input.clear();
        self.chat_error = None;

        let history: Vec<ChatTurn> = self
            .messages
            .iter()
            .map(|m| match m.role {
                Role::User => ChatTurn::user(m.text.clone()),
                Role::Model => ChatTurn::model(m.text.clone()),
            })
            .collect();

        self.messages.push(ChatMessage::new(Role::User, &message));
        let mut reply = ChatMessage::new(Role::Model, "");
        reply.streaming = true;
        self.messages.push(reply);
        self.chat_busy = true;

        let (tx, rx) = unbounded();
        self.chat_rx = Some(rx);

        std::thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to create chat runtime: {}", e);
                    let _ = tx.send(ChatEvent::Error(e.to_string()));
                    return;
                }
            };
            runtime.block_on(async move {
                let stream = gemini::stream_chat(api_key, message, history);
                futures::pin_mut!(stream);
                use futures::StreamExt;
                while let Some(delta) = stream.next().await {
                    match delta {
                        Ok(text) => {
                            let _ = tx.send(ChatEvent::Delta(text));
                        }
                        Err(e) => {
                            let _ = tx.send(ChatEvent::Error(e.user_message()));
                            return;
                        }
                    }
                }
                let _ = tx.send(ChatEvent::Complete);
            });
        });
    }

    /// Read the file named in the path input and stage it for analysis.
    pub fn stage_image(&mut self) {
        let path = std::path::PathBuf::from(self.image_path_input.trim());
        self.vision_error = None;
        self.vision_result = None;

        match std::fs::read(&path) {
            Ok(bytes) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image".to_string());
                let mime_type = mime_for_path(&path);
                self.staged_image = Some(StagedImage {
                    name,
                    bytes,
                    mime_type,
                });
            }
            Err(e) => {
                self.vision_error = Some(format!("Could not read {}: {}", path.display(), e));
            }
        }
    }

    /// Run the single-shot analysis on the staged image.
    pub fn analyze_staged_image(&mut self) {
        if self.vision_busy {
            return;
        }
        let Some(image) = self.staged_image.as_ref() else {
            return;
        };
        let Some(api_key) = self.api_key.clone() else {
            self.vision_error = Some(format!("{} is not set", gemini::API_KEY_ENV));
            return;
        };

        let bytes = image.bytes.clone();
        let mime_type = image.mime_type.clone();
        let prompt = self.vision_prompt.clone();
        self.vision_busy = true;
        self.vision_error = None;
        self.vision_result = None;

        let (tx, rx) = unbounded();
        self.vision_rx = Some(rx);

        std::thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = tx.send(VisionEvent::Error(e.to_string()));
                    return;
                }
            };
            let result =
                runtime.block_on(gemini::analyze_image(&api_key, &bytes, &mime_type, &prompt));
            let _ = tx.send(match result {
                Ok(text) => VisionEvent::Result(text),
                Err(e) => VisionEvent::Error(e.user_message()),
            });
        });
    }

    /// Drain worker events into the render state. Called once per frame.
    pub fn poll_events(&mut self) {
        if let Some(rx) = &self.chat_rx {
            let mut done = false;
            while let Ok(event) = rx.try_recv() {
                match event {
                    ChatEvent::Delta(text) => {
                        if let Some(last) = self.messages.last_mut() {
                            last.text.push_str(&text);
                        }
                    }
                    ChatEvent::Complete => {
                        if let Some(last) = self.messages.last_mut() {
                            last.streaming = false;
                        }
                        self.chat_busy = false;
                        done = true;
                    }
                    ChatEvent::Error(message) => {
                        if let Some(last) = self.messages.last_mut() {
                            last.streaming = false;
                        }
                        self.chat_error = Some(message);
                        self.chat_busy = false;
                        done = true;
                    }
                }
            }
            if done {
                self.chat_rx = None;
            }
        }

        if let Some(rx) = &self.vision_rx {
            let mut done = false;
            while let Ok(event) = rx.try_recv() {
                match event {
                    VisionEvent::Result(text) => self.vision_result = Some(text),
                    VisionEvent::Error(message) => self.vision_error = Some(message),
                }
                done = true;
            }
            if done {
                self.vision_busy = false;
                self.vision_rx = None;
            }
        }
    }

    pub fn clear_messages(&mut self) {
        if !self.chat_busy {
            self.messages.clear();
            self.chat_error = None;
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn mime_for_path(path: &std::path::Path) -> String {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_roles() {
        let user = ChatMessage::new(Role::User, "hi");
        let model = ChatMessage::new(Role::Model, "hello");
        assert_ne!(user.id, model.id);
        assert!(!user.streaming);
    }

    #[test]
    fn test_mime_detection() {
        use std::path::Path;
        assert_eq!(mime_for_path(Path::new("a.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("photo")), "image/jpeg");
    }
}
