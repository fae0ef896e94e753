//! Role-tagged chat messages.

use serde::{Deserialize, Serialize};

/// Speaker of a message in a conversation transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message. Serializes as `{"role": ..., "content": ...}`,
/// which is also the element shape of chat-completion payloads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Split a transcript into its leading system text and the remaining turns.
///
/// Only a system message in first position counts; later system messages
/// are dropped from the returned turns.
pub fn split_system(messages: &[Message]) -> (Option<&str>, Vec<&Message>) {
    let (system, rest) = match messages.split_first() {
        Some((first, rest)) if first.is_system() => (Some(first.content.as_str()), rest),
        _ => (None, messages),
    };
    let turns = rest.iter().filter(|m| !m.is_system()).collect();
    (system, turns)
}
