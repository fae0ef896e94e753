//! Request and response bodies of the chat API.

use serde::{Deserialize, Serialize};

/// Body of `POST /chat`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's message. Kept loosely typed: scalars are stringified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    #[serde(default, alias = "session_id", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// The message as text, or `None` when it is missing or empty.
    pub fn message_text(&self) -> Option<String> {
        let text = match self.message.as_ref()? {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!text.trim().is_empty()).then_some(text)
    }

    /// The caller's session key, ignoring blank values.
    pub fn session_key(&self) -> Option<&str> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Successful `POST /chat` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

/// `GET /health` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub model: String,
}

/// `GET /session` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
}
