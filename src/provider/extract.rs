//! Reply extraction from upstream response bodies.
//!
//! Known shapes, tried in order:
//! 1. `[{"generated_text": "..."}]` (text-generation inference)
//! 2. `{"choices": [{"message": {"content": "..."}}]}` (chat completions)
//! 3. `{"content": [{"text": "..."}]}` or the same under `result`
//! 4. `{"generated_text": "..."}`

use serde_json::Value;

use crate::config::{ExtractMode, UpstreamConfig};

/// Why no reply could be extracted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("no known reply field in response")]
    UnknownShape,

    #[error("reply field is empty")]
    EmptyReply,
}

/// Pull the generated text out of a response body, if the shape is known.
pub fn extract_text(body: &Value) -> Option<String> {
    if let Some(items) = body.as_array() {
        return items
            .first()
            .and_then(|item| item.get("generated_text"))
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    if let Some(choice) = body.get("choices").and_then(|c| c.get(0)) {
        let text = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .or_else(|| choice.get("text"))
            .and_then(Value::as_str);
        if let Some(text) = text {
            return Some(text.to_string());
        }
    }

    let content = body
        .get("content")
        .or_else(|| body.get("result").and_then(|r| r.get("content")))
        .or_else(|| body.get("result").filter(|r| r.is_array()))
        .and_then(Value::as_array);
    if let Some(parts) = content {
        let texts: Vec<&str> = parts
            .iter()
            .filter_map(|part| part.as_str().or_else(|| part.get("text")?.as_str()))
            .collect();
        if !texts.is_empty() {
            return Some(texts.concat());
        }
    }

    body.get("generated_text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Configured extraction behavior shared by every provider.
#[derive(Debug, Clone)]
pub struct ReplyExtractor {
    mode: ExtractMode,
    placeholder: Option<String>,
    strip_prompt_echo: bool,
}

impl Default for ReplyExtractor {
    fn default() -> Self {
        Self {
            mode: ExtractMode::Strict,
            placeholder: None,
            strip_prompt_echo: false,
        }
    }
}

impl ReplyExtractor {
    pub fn strict() -> Self {
        Self::default()
    }

    /// Unknown shapes fall back to `placeholder`, or to the body's JSON text.
    pub fn lenient(placeholder: Option<String>) -> Self {
        Self {
            mode: ExtractMode::Lenient,
            placeholder,
            strip_prompt_echo: false,
        }
    }

    pub fn stripping_prompt_echo(mut self, strip: bool) -> Self {
        self.strip_prompt_echo = strip;
        self
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            mode: config.extract,
            placeholder: config.placeholder.clone(),
            strip_prompt_echo: config.strip_prompt_echo,
        }
    }

    /// Extract the reply text. `prompt` is the text sent upstream, removed
    /// from the front of the reply when echo stripping is enabled.
    pub fn extract(&self, body: &Value, prompt: Option<&str>) -> Result<String, ExtractError> {
        let reply = extract_text(body).map(|text| {
            let text = match prompt {
                Some(prompt) if self.strip_prompt_echo && !prompt.is_empty() => {
                    text.strip_prefix(prompt).unwrap_or(text.as_str())
                }
                _ => text.as_str(),
            };
            text.trim().to_string()
        });

        match (reply, self.mode) {
            (Some(reply), _) if !reply.is_empty() => Ok(reply),
            (Some(_), ExtractMode::Strict) => Err(ExtractError::EmptyReply),
            (None, ExtractMode::Strict) => Err(ExtractError::UnknownShape),
            (_, ExtractMode::Lenient) => Ok(self.fallback(body)),
        }
    }

    fn fallback(&self, body: &Value) -> String {
        if let Some(text) = body.as_str() {
            return text.trim().to_string();
        }
        match &self.placeholder {
            Some(placeholder) => placeholder.clone(),
            None => body.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_text_array() {
        let body = json!([{"generated_text": "hello"}]);
        assert_eq!(extract_text(&body).as_deref(), Some("hello"));
        assert_eq!(ReplyExtractor::strict().extract(&body, None).unwrap(), "hello");
    }

    #[test]
    fn test_chat_choices() {
        let body = json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(ReplyExtractor::strict().extract(&body, None).unwrap(), "hi");
    }

    #[test]
    fn test_completion_choices_text() {
        let body = json!({"choices": [{"text": " done "}]});
        assert_eq!(ReplyExtractor::strict().extract(&body, None).unwrap(), "done");
    }

    #[test]
    fn test_content_array() {
        let body = json!({"content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]});
        assert_eq!(extract_text(&body).as_deref(), Some("ab"));

        let nested = json!({"result": {"content": ["x", "y"]}});
        assert_eq!(extract_text(&nested).as_deref(), Some("xy"));
    }

    #[test]
    fn test_top_level_generated_text() {
        let body = json!({"generated_text": "plain"});
        assert_eq!(extract_text(&body).as_deref(), Some("plain"));
    }

    #[test]
    fn test_array_shape_wins_over_later_shapes() {
        let body = json!([{"generated_text": "first"}, {"generated_text": "second"}]);
        assert_eq!(extract_text(&body).as_deref(), Some("first"));
    }

    #[test]
    fn test_strict_unknown_shape_fails() {
        let body = json!({"error": "loading"});
        assert_eq!(
            ReplyExtractor::strict().extract(&body, None),
            Err(ExtractError::UnknownShape)
        );
    }

    #[test]
    fn test_strict_empty_reply_fails() {
        let body = json!([{"generated_text": "   "}]);
        assert_eq!(
            ReplyExtractor::strict().extract(&body, None),
            Err(ExtractError::EmptyReply)
        );
    }

    #[test]
    fn test_lenient_placeholder() {
        let body = json!({"unexpected": true});
        let extractor = ReplyExtractor::lenient(Some("(no reply)".to_string()));
        assert_eq!(extractor.extract(&body, None).unwrap(), "(no reply)");
    }

    #[test]
    fn test_lenient_without_placeholder_returns_body_text() {
        let body = json!({"unexpected": true});
        let extractor = ReplyExtractor::lenient(None);
        assert_eq!(extractor.extract(&body, None).unwrap(), r#"{"unexpected":true}"#);

        let string_body = json!("  just text ");
        assert_eq!(extractor.extract(&string_body, None).unwrap(), "just text");
    }

    #[test]
    fn test_prompt_echo_is_stripped() {
        let prompt = "User: hi\nAssistant:";
        let body = json!([{"generated_text": "User: hi\nAssistant: hello there"}]);

        let stripping = ReplyExtractor::strict().stripping_prompt_echo(true);
        assert_eq!(stripping.extract(&body, Some(prompt)).unwrap(), "hello there");

        let keeping = ReplyExtractor::strict();
        assert_eq!(
            keeping.extract(&body, Some(prompt)).unwrap(),
            "User: hi\nAssistant: hello there"
        );
    }

    #[test]
    fn test_echo_strip_ignores_non_prefix() {
        let body = json!([{"generated_text": "fresh answer"}]);
        let extractor = ReplyExtractor::strict().stripping_prompt_echo(true);
        assert_eq!(
            extractor.extract(&body, Some("User: hi")).unwrap(),
            "fresh answer"
        );
    }
}
