//! Role-prefixed plain text prompts for the simplest completion models.

use serde_json::{Map, Value};

use super::{text_generation_body, ExtractError, InferenceProvider, Payload, ReplyExtractor};
use crate::config::Strategy;
use crate::conversation::{split_system, Message, Role};

/// Render a transcript as `User:`/`Assistant:` lines ending with an open
/// `Assistant:` cue. Leading system text goes on the first line.
pub fn plain_prompt(transcript: &[Message]) -> String {
    let (system, turns) = split_system(transcript);

    let mut lines: Vec<String> = Vec::with_capacity(turns.len() + 2);
    if let Some(text) = system.filter(|t| !t.is_empty()) {
        lines.push(text.to_string());
    }
    for message in turns {
        let label = match message.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => continue,
        };
        lines.push(format!("{}: {}", label, message.content));
    }
    lines.push("Assistant:".to_string());

    lines.join("\n")
}

/// Text-generation endpoint fed with a plain transcript.
#[derive(Debug, Clone)]
pub struct PlainPrompt {
    parameters: Map<String, Value>,
    extractor: ReplyExtractor,
}

impl PlainPrompt {
    pub fn new(parameters: Map<String, Value>, extractor: ReplyExtractor) -> Self {
        Self {
            parameters,
            extractor,
        }
    }
}

impl InferenceProvider for PlainPrompt {
    fn strategy(&self) -> Strategy {
        Strategy::Plain
    }

    fn build_payload(&self, transcript: &[Message]) -> Payload {
        let prompt = plain_prompt(transcript);
        Payload {
            body: text_generation_body(&prompt, &self.parameters),
            prompt: Some(prompt),
        }
    }

    fn parse_reply(&self, body: &Value, payload: &Payload) -> Result<String, ExtractError> {
        self.extractor.extract(body, payload.prompt.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_prompt_lines() {
        let transcript = vec![
            Message::system("You are helpful."),
            Message::user("A"),
            Message::assistant("B"),
            Message::user("C"),
        ];
        assert_eq!(
            plain_prompt(&transcript),
            "You are helpful.\nUser: A\nAssistant: B\nUser: C\nAssistant:"
        );
    }

    #[test]
    fn test_plain_prompt_empty_transcript() {
        assert_eq!(plain_prompt(&[]), "Assistant:");
    }

    #[test]
    fn test_payload_without_parameters_omits_field() {
        let provider = PlainPrompt::new(Map::new(), ReplyExtractor::strict());
        let payload = provider.build_payload(&[Message::user("hi")]);
        assert_eq!(payload.body, json!({"inputs": "User: hi\nAssistant:"}));
    }

    #[test]
    fn test_echoed_prompt_is_removed_from_reply() {
        let provider = PlainPrompt::new(
            Map::new(),
            ReplyExtractor::lenient(None).stripping_prompt_echo(true),
        );
        let payload = provider.build_payload(&[Message::user("hi")]);
        let body = json!([{"generated_text": "User: hi\nAssistant: hey, how are you?"}]);
        assert_eq!(
            provider.parse_reply(&body, &payload).unwrap(),
            "hey, how are you?"
        );
    }
}
