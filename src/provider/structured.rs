//! Chat-completion payloads (OpenAI-compatible and Mistral hosted APIs).

use serde_json::{Map, Value};

use super::{ExtractError, InferenceProvider, Payload, ReplyExtractor};
use crate::config::Strategy;
use crate::conversation::Message;

/// Sends the transcript as a `messages` list with the configured model.
#[derive(Debug, Clone)]
pub struct StructuredChat {
    model: String,
    parameters: Map<String, Value>,
    extractor: ReplyExtractor,
}

impl StructuredChat {
    pub fn new(model: String, parameters: Map<String, Value>, extractor: ReplyExtractor) -> Self {
        Self {
            model,
            parameters,
            extractor,
        }
    }
}

impl InferenceProvider for StructuredChat {
    fn strategy(&self) -> Strategy {
        Strategy::Structured
    }

    fn build_payload(&self, transcript: &[Message]) -> Payload {
        // Only a leading system message is forwarded.
        let messages: Vec<&Message> = transcript
            .iter()
            .enumerate()
            .filter(|(i, m)| *i == 0 || !m.is_system())
            .map(|(_, m)| m)
            .collect();

        let mut body = self.parameters.clone();
        body.insert("model".to_string(), Value::String(self.model.clone()));
        body.insert(
            "messages".to_string(),
            serde_json::to_value(messages).unwrap_or_default(),
        );

        Payload {
            body: Value::Object(body),
            prompt: None,
        }
    }

    fn parse_reply(&self, body: &Value, _payload: &Payload) -> Result<String, ExtractError> {
        self.extractor.extract(body, None)
    }
}
