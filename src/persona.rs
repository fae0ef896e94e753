//! System persona derived from a read-only profile document.
//!
//! The profile is a JSON object describing the person the assistant speaks
//! as. A few fields are recognized (Hungarian key names are accepted as
//! aliases); the whole document is embedded in the prompt as the fact sheet.

use serde_json::Value;
use std::path::Path;

use crate::config::{ConfigError, PersonaConfig};

const NAME_KEYS: &[&str] = &["name", "nev"];
const STYLE_KEYS: &[&str] = &["style", "szemelyiseg"];
const LANGUAGE_KEYS: &[&str] = &["language", "nyelv"];
const SALARY_KEYS: &[&str] = &["salary_expectation", "fizetesi_igeny"];
const CONCRETE_KEYS: &[&str] = &["concrete", "konkret"];

/// A parsed profile document.
///
/// Recognized fields are read leniently: a field of an unexpected shape is
/// treated as absent and still shows up in the embedded fact sheet.
#[derive(Debug, Clone)]
pub struct Profile {
    document: Value,
}

/// First of `keys` present in `object`.
fn lookup<'a>(object: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

/// Scalars as display text; strings verbatim, blank and structured values dropped.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Profile {
    /// Parse a profile from JSON text. `origin` names the source in errors.
    pub fn from_json(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let document: Value =
            serde_json::from_str(text).map_err(|source| ConfigError::Profile {
                path: origin.to_string(),
                source,
            })?;
        if !document.is_object() {
            return Err(ConfigError::Validation(format!(
                "profile '{}' must be a JSON object",
                origin
            )));
        }
        Ok(Self { document })
    }

    /// Read and parse a profile file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&text, &path.display().to_string())
    }

    pub fn name(&self) -> Option<&str> {
        lookup(&self.document, NAME_KEYS)
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
    }

    fn text(&self, keys: &[&str]) -> Option<String> {
        lookup(&self.document, keys).and_then(scalar_text)
    }

    /// The concrete salary figure, from `{"konkret": ...}` or a bare scalar.
    fn concrete_salary(&self) -> Option<String> {
        let salary = lookup(&self.document, SALARY_KEYS)?;
        match salary {
            Value::Object(_) => lookup(salary, CONCRETE_KEYS).and_then(scalar_text),
            other => scalar_text(other),
        }
    }

    /// Render the system prompt seeding new conversations.
    pub fn system_prompt(&self) -> String {
        let name = self.name().unwrap_or("the person described below");
        let style = self
            .text(STYLE_KEYS)
            .unwrap_or_else(|| "natural and friendly".to_string());
        let language = self.text(LANGUAGE_KEYS).unwrap_or_else(|| "hu".to_string());
        let facts = serde_json::to_string_pretty(&self.document).unwrap_or_default();

        let mut prompt = format!(
            "You are {name}. Communication style: {style}.\n\
             Language: {language}.\n\n\
             Facts about you (use them when answering, do not invent new facts):\n\
             {facts}\n\n\
             When answering:\n\
             - Be concise and natural, with a human tone.\n\
             - If asked again about the same topic (for example the salary expectation), \
             stay consistent with the data above."
        );

        if let Some(figure) = self.concrete_salary() {
            prompt.push_str(&format!(
                "\n- If asked for a concrete figure, use the concrete salary expectation: {}.",
                figure
            ));
        }

        prompt.push_str(
            "\n- If something cannot be determined from the data above, ask back or say the information is not available.",
        );
        prompt
    }
}

/// Resolve the system prompt configured for new conversations, if any.
pub fn seed_prompt(config: &PersonaConfig) -> Result<Option<String>, ConfigError> {
    if let Some(path) = &config.profile {
        let profile = Profile::load(path)?;
        tracing::info!(
            profile = %path.display(),
            name = profile.name().unwrap_or("<unnamed>"),
            "Loaded persona profile"
        );
        return Ok(Some(profile.system_prompt()));
    }
    Ok(config.system_prompt.clone())
}
