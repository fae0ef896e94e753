//! Inference provider adapters.
//!
//! An [`InferenceProvider`] turns a conversation transcript into the
//! payload a specific upstream API expects, and picks the reply out of
//! that upstream's response. One implementation exists per wire format:
//! - [`StructuredChat`]: chat-completion APIs taking a message list
//! - [`InstructionPrompt`]: text completion with `[INST]` blocks
//! - [`PlainPrompt`]: text completion with role-prefixed lines

pub mod extract;
mod instruction;
mod plain;
mod structured;

pub use extract::{extract_text, ExtractError, ReplyExtractor};
pub use instruction::{instruction_prompt, InstructionPrompt};
pub use plain::{plain_prompt, PlainPrompt};
pub use structured::StructuredChat;

use crate::config::{Strategy, UpstreamConfig};
use crate::conversation::Message;

/// A request body ready to send upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub body: serde_json::Value,
    /// Flattened prompt text, for text-completion strategies.
    pub prompt: Option<String>,
}

/// Capability shared by every upstream wire format.
pub trait InferenceProvider: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Build the upstream request body from the full transcript.
    fn build_payload(&self, transcript: &[Message]) -> Payload;

    /// Extract the reply text from a parsed response body.
    fn parse_reply(
        &self,
        body: &serde_json::Value,
        payload: &Payload,
    ) -> Result<String, ExtractError>;
}

/// Select the provider implementation configured for the upstream.
pub fn from_config(config: &UpstreamConfig) -> Box<dyn InferenceProvider> {
    let extractor = ReplyExtractor::from_config(config);
    let parameters = config.parameters.clone();
    match config.strategy {
        Strategy::Structured => Box::new(StructuredChat::new(
            config.model.clone(),
            parameters,
            extractor,
        )),
        Strategy::Instruction => Box::new(InstructionPrompt::new(parameters, extractor)),
        Strategy::Plain => Box::new(PlainPrompt::new(parameters, extractor)),
    }
}

/// `{"inputs": prompt, "parameters": {...}}`, the text-generation body shape.
fn text_generation_body(
    prompt: &str,
    parameters: &serde_json::Map<String, serde_json::Value>,
) -> serde_json::Value {
    let mut body = serde_json::json!({ "inputs": prompt });
    if !parameters.is_empty() {
        body["parameters"] = serde_json::Value::Object(parameters.clone());
    }
    body
}
