//! Request/response Gemini calls backing the chat and vision tabs.
//!
//! Chat is a streaming completion: one message plus prior turns in, a lazy
//! sequence of text deltas out (finite, not restartable). Vision is a
//! single-shot multimodal call: image bytes plus an optional prompt in, one
//! text result out.

use crate::{ParleyError, Result};
use async_stream::try_stream;
use base64::Engine;
use futures::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub const CHAT_MODEL: &str = "gemini-2.5-flash";
pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are a helpful and knowledgeable AI assistant.";
pub const DEFAULT_VISION_PROMPT: &str = "Describe this image in detail.";

/// One prior turn of the conversation, role "user" or "model".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            text: text.into(),
        }
    }
}

fn contents_json(history: &[ChatTurn], message: &str) -> serde_json::Value {
    let mut contents: Vec<serde_json::Value> = history
        .iter()
        .map(|turn| json!({ "role": turn.role, "parts": [{ "text": turn.text }] }))
        .collect();
    contents.push(json!({ "role": "user", "parts": [{ "text": message }] }));
    json!(contents)
}

/// Stream a chat reply as text deltas.
///
/// Arguments are owned because the stream outlives the call site's borrows;
/// the request is not sent until the stream is first polled.
pub fn stream_chat(
    api_key: String,
    message: String,
    history: Vec<ChatTurn>,
) -> impl Stream<Item = Result<String>> {
    try_stream! {
        let url = format!(
            "{}/{}:streamGenerateContent?alt=sse&key={}",
            API_BASE, CHAT_MODEL, api_key
        );
        let body = json!({
            "contents": contents_json(&history, &message),
            "systemInstruction": { "parts": [{ "text": CHAT_SYSTEM_INSTRUCTION }] },
        });

        let response = reqwest::Client::new()
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::ApiError(format!("chat request failed: {}", e)))?;

        if !response.status().is_success() {
            Err(ParleyError::ApiError(format!(
                "chat request returned {}",
                response.status()
            )))?;
        }

        let mut bytes = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk
                .map_err(|e| ParleyError::ApiError(format!("chat stream failed: {}", e)))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // SSE events are newline-delimited; keep any partial line
            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);
                if let Some(text) = sse_line_text(&line) {
                    yield text;
                }
            }
        }

        if let Some(text) = sse_line_text(buffer.trim()) {
            yield text;
        }
    }
}

/// Extract the text delta from one `data:` line, if it carries any.
fn sse_line_text(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<GenerateContentResponse>(payload) {
        Ok(response) => response.text(),
        Err(e) => {
            debug!("Skipping unparseable SSE payload: {}", e);
            None
        }
    }
}

/// One-shot image analysis.
pub async fn analyze_image(
    api_key: &str,
    image: &[u8],
    mime_type: &str,
    prompt: &str,
) -> Result<String> {
    let prompt = if prompt.trim().is_empty() {
        DEFAULT_VISION_PROMPT
    } else {
        prompt
    };

    let url = format!("{}/{}:generateContent?key={}", API_BASE, CHAT_MODEL, api_key);
    let body = json!({
        "contents": [{
            "parts": [
                {
                    "inlineData": {
                        "data": base64::engine::general_purpose::STANDARD.encode(image),
                        "mimeType": mime_type,
                    }
                },
                { "text": prompt },
            ]
        }]
    });

    let response = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| ParleyError::ApiError(format!("vision request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(ParleyError::ApiError(format!(
            "vision request returned {}",
            response.status()
        )));
    }

    let parsed: GenerateContentResponse = response
        .json()
        .await
        .map_err(|e| ParleyError::ApiError(format!("vision response unreadable: {}", e)))?;

    Ok(parsed
        .text()
        .unwrap_or_else(|| "No response generated.".to_string()))
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}
