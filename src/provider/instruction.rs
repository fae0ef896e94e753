//! Mistral-Instruct style flattened prompts.
//!
//! The transcript becomes one string of `[INST]` blocks:
//!
//! ```text
//! <s>[INST] <<SYS>>
//! {system}
//! <</SYS>>
//!
//! {user 1} [/INST] {assistant 1}</s>
//! <s>[INST] {user 2} [/INST]
//! ```
//!
//! A trailing user block is left open so the model writes the continuation.

use serde_json::{Map, Value};

use super::{text_generation_body, ExtractError, InferenceProvider, Payload, ReplyExtractor};
use crate::config::Strategy;
use crate::conversation::{split_system, Message, Role};

/// Render a transcript as instruction blocks.
pub fn instruction_prompt(transcript: &[Message]) -> String {
    let (system, turns) = split_system(transcript);
    let system_block = match system {
        Some(text) if !text.is_empty() => format!("<<SYS>>\n{}\n<</SYS>>\n\n", text),
        _ => String::new(),
    };

    let mut blocks: Vec<String> = Vec::new();
    let mut first_user_seen = false;
    let mut awaiting_reply = false;

    for message in turns {
        match message.role {
            Role::User => {
                let prefix = if first_user_seen { "" } else { system_block.as_str() };
                blocks.push(format!("<s>[INST] {}{} [/INST]", prefix, message.content));
                first_user_seen = true;
                awaiting_reply = true;
            }
            Role::Assistant if awaiting_reply => {
                if let Some(block) = blocks.last_mut() {
                    block.push_str(&format!(" {}</s>", message.content));
                }
                awaiting_reply = false;
            }
            // Assistant text without an open block, and stray system messages.
            _ => {}
        }
    }

    blocks.join("\n")
}

/// Text-generation endpoint fed with instruction blocks.
#[derive(Debug, Clone)]
pub struct InstructionPrompt {
    parameters: Map<String, Value>,
    extractor: ReplyExtractor,
}

impl InstructionPrompt {
    pub fn new(parameters: Map<String, Value>, extractor: ReplyExtractor) -> Self {
        Self {
            parameters,
            extractor,
        }
    }
}

impl InferenceProvider for InstructionPrompt {
    fn strategy(&self) -> Strategy {
        Strategy::Instruction
    }

    fn build_payload(&self, transcript: &[Message]) -> Payload {
        let prompt = instruction_prompt(transcript);
        Payload {
            body: text_generation_body(&prompt, &self.parameters),
            prompt: Some(prompt),
        }
    }

    fn parse_reply(&self, body: &Value, payload: &Payload) -> Result<String, ExtractError> {
        self.extractor.extract(body, payload.prompt.as_deref())
    }
}
