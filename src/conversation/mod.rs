//! Conversation history module.
//!
//! This module holds the rolling per-session transcripts:
//! - Role-tagged messages
//! - Trim policies bounding each transcript
//! - The session store shared by request handlers

pub mod message;
mod store;
pub mod trim;

pub use message::{split_system, Message, Role};
pub use store::{Conversation, ConversationStore, Session, SessionLimits, DEFAULT_MAX_SESSIONS};
pub use trim::{TrimPolicy, DEFAULT_MAX_CHARS, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_TURNS};
