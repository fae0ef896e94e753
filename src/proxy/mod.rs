//! HTTP front door.
//!
//! This module provides the chat API that accepts user messages, keeps
//! the per-session history and forwards each turn to the upstream model.

mod handlers;
mod server;
pub mod types;
mod upstream;

pub use server::{create_router, run_server, AppState};
pub use types::{ChatReply, ChatRequest, HealthResponse, SessionResponse};
pub use upstream::Upstream;
