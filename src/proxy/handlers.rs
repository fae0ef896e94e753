//! HTTP request handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::server::AppState;
use super::types::{ChatReply, ChatRequest, HealthResponse, SessionResponse};
use crate::conversation::Message;
use crate::error::Error;

/// Handle POST /chat
///
/// Precondition: the body carries a non-empty `message`; otherwise the
/// request fails with 400 before any session is touched.
///
/// Postcondition: the user message is appended (and the history trimmed)
/// before the upstream call, so it survives an upstream failure. The
/// assistant reply is appended only after a successful call. The session
/// stays locked for the whole turn.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, Error> {
    let Json(request) = body.map_err(|rejection| Error::Validation(rejection.body_text()))?;

    let message = request
        .message_text()
        .ok_or_else(|| Error::Validation("message is required".to_string()))?;
    let session_key = request
        .session_key()
        .unwrap_or(&state.config.history.default_session)
        .to_string();
    let request_id = Uuid::new_v4();

    let session = state.store.session(&session_key);
    let mut conversation = session.lock().await;

    conversation.push(Message::user(message));
    let history_len = conversation.trim().len();

    tracing::info!(
        request_id = %request_id,
        session = %session_key,
        strategy = state.upstream.provider().strategy().as_str(),
        history_len,
        "Forwarding chat turn"
    );

    let start = std::time::Instant::now();
    let outcome = state.upstream.complete(conversation.messages()).await;
    session.touch();
    let reply = match outcome {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                session = %session_key,
                error = %e,
                "Chat turn failed"
            );
            return Err(e);
        }
    };

    conversation.push(Message::assistant(reply.clone()));
    let history_len = conversation.trim().len();

    tracing::info!(
        request_id = %request_id,
        session = %session_key,
        latency_ms = start.elapsed().as_millis() as u64,
        history_len,
        "Chat turn completed"
    );

    Ok(Json(ChatReply { reply }))
}

/// Handle GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        model: state.config.upstream.model_label().to_string(),
    })
}

/// Handle GET /session - issue a fresh opaque session identifier
pub async fn new_session() -> impl IntoResponse {
    Json(SessionResponse {
        session_id: Uuid::new_v4().to_string(),
    })
}

/// Fallback for unknown routes, keeping error bodies JSON.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
}
