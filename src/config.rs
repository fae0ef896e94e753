//! Configuration parsing and validation for chatrelay.
//!
//! Configuration comes from an optional TOML file, `${VAR}` references
//! expanded from the environment, an upstream preset supplying defaults,
//! and a few environment overrides (`PORT`, `MAX_TURNS`, `MAX_CHARS`).

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::conversation::{
    SessionLimits, TrimPolicy, DEFAULT_MAX_CHARS, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_SESSIONS,
    DEFAULT_MAX_TURNS,
};

/// Default upstream request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub history: HistoryConfig,
    pub persona: PersonaConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:3000")
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value. Every call site is auditable via `grep expose_secret`.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How the upstream API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was read from the upstream's api key variable (holds var name)
    Environment(String),
    /// No key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Environment(var) => write!(f, "environment ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// Wire format spoken by the upstream inference API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Chat-completion style: `{model, messages: [{role, content}]}`.
    Structured,
    /// Text completion with Mistral-Instruct `[INST]` blocks.
    Instruction,
    /// Text completion with `User:`/`Assistant:` lines.
    Plain,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Structured => "structured",
            Strategy::Instruction => "instruction",
            Strategy::Plain => "plain",
        }
    }
}

/// What the reply extractor does with a response shape it does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    /// Fail with a malformed-response error.
    Strict,
    /// Fall back to a placeholder (or the raw body text).
    Lenient,
}

/// Named upstream defaults, one per supported inference API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    HuggingfaceMistralInstruct,
    HuggingfaceGpt2,
    HuggingfaceZephyr,
    Openai,
    Mistral,
}

/// Values a preset contributes before explicit fields are applied.
struct PresetDefaults {
    name: &'static str,
    strategy: Strategy,
    url: &'static str,
    model: &'static str,
    api_key_env: &'static str,
    extract: ExtractMode,
    strip_prompt_echo: bool,
    parameters: serde_json::Value,
}

/// Preset used when the config names no upstream at all.
pub const DEFAULT_PRESET: Preset = Preset::HuggingfaceMistralInstruct;

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "huggingface-mistral-instruct" => Ok(Preset::HuggingfaceMistralInstruct),
            "huggingface-gpt2" => Ok(Preset::HuggingfaceGpt2),
            "huggingface-zephyr" => Ok(Preset::HuggingfaceZephyr),
            "openai" => Ok(Preset::Openai),
            "mistral" => Ok(Preset::Mistral),
            other => Err(format!("unknown preset '{}'", other)),
        }
    }
}

impl Preset {
    fn defaults(self) -> PresetDefaults {
        match self {
            Preset::HuggingfaceMistralInstruct => PresetDefaults {
                name: "Mistral-7B-Instruct-v0.2",
                strategy: Strategy::Instruction,
                url: "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.2",
                model: "Mistral-7B-Instruct-v0.2",
                api_key_env: "HF_TOKEN",
                extract: ExtractMode::Lenient,
                strip_prompt_echo: false,
                parameters: serde_json::json!({
                    "max_new_tokens": 300,
                    "temperature": 0.7,
                    "top_p": 0.95,
                    "repetition_penalty": 1.05,
                    "return_full_text": false
                }),
            },
            Preset::HuggingfaceGpt2 => PresetDefaults {
                name: "gpt2",
                strategy: Strategy::Plain,
                url: "https://api-inference.huggingface.co/models/gpt2",
                model: "gpt2",
                api_key_env: "HF_TOKEN",
                extract: ExtractMode::Lenient,
                strip_prompt_echo: true,
                parameters: serde_json::json!({ "max_new_tokens": 100 }),
            },
            Preset::HuggingfaceZephyr => PresetDefaults {
                name: "zephyr-7b-beta",
                strategy: Strategy::Plain,
                url: "https://api-inference.huggingface.co/models/HuggingFaceH4/zephyr-7b-beta",
                model: "zephyr-7b-beta",
                api_key_env: "HF_TOKEN",
                extract: ExtractMode::Lenient,
                strip_prompt_echo: false,
                parameters: serde_json::json!({
                    "max_new_tokens": 300,
                    "temperature": 0.7,
                    "return_full_text": false
                }),
            },
            Preset::Openai => PresetDefaults {
                name: "openai",
                strategy: Strategy::Structured,
                url: "https://api.openai.com/v1/chat/completions",
                model: "gpt-4o-mini",
                api_key_env: "OPENAI_API_KEY",
                extract: ExtractMode::Strict,
                strip_prompt_echo: false,
                parameters: serde_json::json!({}),
            },
            Preset::Mistral => PresetDefaults {
                name: "mistral",
                strategy: Strategy::Structured,
                url: "https://api.mistral.ai/v1/chat/completions",
                model: "mistral-small-latest",
                api_key_env: "MISTRAL_API_KEY",
                extract: ExtractMode::Strict,
                strip_prompt_echo: false,
                parameters: serde_json::json!({}),
            },
        }
    }
}

/// Resolved upstream inference API configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Display name, used in logs and when no model is set
    pub name: String,
    pub strategy: Strategy,
    /// Full endpoint URL the payload is POSTed to
    pub url: String,
    /// Model identifier (sent in structured payloads, reported by /health)
    pub model: String,
    pub api_key: Option<ApiKey>,
    /// Environment variable the key is read from when not set inline
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
    pub extract: ExtractMode,
    /// Lenient-mode reply for unrecognized response shapes
    pub placeholder: Option<String>,
    /// Remove the prompt when the upstream echoes it before the reply
    pub strip_prompt_echo: bool,
    /// Generation parameters merged into the payload
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl UpstreamConfig {
    /// Model label reported to clients.
    pub fn model_label(&self) -> &str {
        if self.model.is_empty() {
            &self.name
        } else {
            &self.model
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which trim policy bounds conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStrategy {
    #[default]
    Paired,
    Flat,
}

/// Conversation history configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    #[serde(default)]
    pub strategy: HistoryStrategy,
    /// User/assistant pairs kept by the paired policy
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Character budget of the paired policy
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Message cap of the flat policy
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Live session cap; 0 disables the cap
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Idle session expiry in seconds
    pub idle_ttl_secs: Option<u64>,
    /// Session key used when a request carries no sessionId
    #[serde(default = "default_session")]
    pub default_session: String,
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}

fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

fn default_session() -> String {
    "default".to_string()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            strategy: HistoryStrategy::default(),
            max_turns: default_max_turns(),
            max_chars: default_max_chars(),
            max_messages: default_max_messages(),
            max_sessions: default_max_sessions(),
            idle_ttl_secs: None,
            default_session: default_session(),
        }
    }
}

impl HistoryConfig {
    pub fn trim_policy(&self) -> TrimPolicy {
        match self.strategy {
            HistoryStrategy::Paired => TrimPolicy::Paired {
                max_turns: self.max_turns,
                max_chars: self.max_chars,
            },
            HistoryStrategy::Flat => TrimPolicy::Flat {
                max_messages: self.max_messages,
            },
        }
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            max_sessions: (self.max_sessions > 0).then_some(self.max_sessions),
            idle_ttl: self.idle_ttl_secs.map(Duration::from_secs),
        }
    }
}

/// System persona seeding every new conversation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonaConfig {
    /// JSON profile document rendered into the system prompt
    pub profile: Option<PathBuf>,
    /// Literal system prompt, used when no profile is given
    pub system_prompt: Option<String>,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not usable for '{field}': {message}")]
    EnvVar {
        var: String,
        field: String,
        message: String,
    },

    #[error("Missing upstream API key: set {var} or upstream.api_key")]
    MissingApiKey { var: String },

    #[error("Invalid profile document '{path}': {source}")]
    Profile {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Raw upstream config deserialized directly from TOML.
/// Every field is optional so a preset can fill the gaps.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawUpstreamConfig {
    preset: Option<Preset>,
    name: Option<String>,
    strategy: Option<Strategy>,
    url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    api_key_env: Option<String>,
    require_api_key: Option<bool>,
    timeout_secs: Option<u64>,
    extract: Option<ExtractMode>,
    placeholder: Option<String>,
    strip_prompt_echo: Option<bool>,
    #[serde(default)]
    parameters: serde_json::Map<String, serde_json::Value>,
}

/// Raw configuration deserialized directly from TOML.
/// Upstream values may contain `${VAR}` references not yet expanded.
#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    upstream: RawUpstreamConfig,
    #[serde(default)]
    history: HistoryConfig,
    #[serde(default)]
    persona: PersonaConfig,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}/v1`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, field: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            field: field.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                field: field.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            field: field.to_string(),
            message: "not set".to_string(),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Parse an optional numeric environment override.
fn env_number<T, F>(lookup: &F, var: &str, field: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVar {
                var: var.to_string(),
                field: field.to_string(),
                message: format!("'{}' is not a valid number", raw),
            }),
    }
}

/// Read the `UPSTREAM_PRESET` override.
fn env_preset<F>(lookup: &F) -> Result<Option<Preset>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("UPSTREAM_PRESET") {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|message| ConfigError::EnvVar {
            var: "UPSTREAM_PRESET".to_string(),
            field: "upstream.preset".to_string(),
            message,
        }),
    }
}

/// Replace the port of a `host:port` listen address.
fn with_port(listen: &str, port: u16) -> String {
    match listen.rsplit_once(':') {
        Some((host, _)) => format!("{}:{}", host, port),
        None => format!("{}:{}", listen, port),
    }
}

impl Config {
    /// Load configuration from an optional TOML file plus the process environment.
    ///
    /// Returns the config and how the upstream API key was resolved.
    pub fn load(path: Option<&Path>) -> Result<(Self, KeySource), ConfigError> {
        let content = match path {
            Some(path) => std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            })?,
            None => String::new(),
        };
        Self::parse_str_with(&content, |name| std::env::var(name).ok())
    }

    /// Parse configuration from a TOML string, resolving environment
    /// references through `lookup` instead of the process environment.
    pub fn parse_str_with<F>(content: &str, lookup: F) -> Result<(Self, KeySource), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        let (config, key_source) = Self::from_raw(raw, lookup)?;
        config.validate()?;
        Ok((config, key_source))
    }

    /// Convert raw (deserialized) config to final config.
    ///
    /// Preset defaults are applied first, then explicit fields, then the
    /// `PORT`, `MAX_TURNS` and `MAX_CHARS` overrides. For the API key:
    /// - `${VAR}` references are expanded, source = `EnvExpanded`
    /// - a literal string is used as-is, source = `Literal`
    /// - otherwise `api_key_env` is consulted, source = `Environment(var)`
    pub fn from_raw<F>(raw: RawConfig, lookup: F) -> Result<(Self, KeySource), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ru = raw.upstream;
        let preset = match ru.preset {
            Some(preset) => Some(preset),
            None => env_preset(&lookup)?,
        };
        // Nothing names an upstream: fall back to the default preset.
        let preset = preset
            .or_else(|| (ru.strategy.is_none() && ru.url.is_none()).then_some(DEFAULT_PRESET))
            .map(Preset::defaults);

        let strategy = ru
            .strategy
            .or(preset.as_ref().map(|p| p.strategy))
            .ok_or_else(|| {
                ConfigError::Validation(
                    "upstream.strategy is required when no preset is selected".to_string(),
                )
            })?;

        let raw_url = ru
            .url
            .or(preset.as_ref().map(|p| p.url.to_string()))
            .ok_or_else(|| {
                ConfigError::Validation(
                    "upstream.url is required when no preset is selected".to_string(),
                )
            })?;
        let url = expand_env_vars_with(&raw_url, "upstream.url", &lookup)?;

        let api_key_env = ru
            .api_key_env
            .or(preset.as_ref().map(|p| p.api_key_env.to_string()));

        let (api_key, key_source) = match ru.api_key {
            Some(ref raw_key) if raw_key.contains("${") => {
                let expanded = expand_env_vars_with(raw_key, "upstream.api_key", &lookup)?;
                (Some(ApiKey::from(expanded)), KeySource::EnvExpanded)
            }
            Some(raw_key) => (Some(ApiKey::from(raw_key)), KeySource::Literal),
            None => match api_key_env.as_deref().and_then(|var| lookup(var).map(|v| (var, v))) {
                Some((var, value)) if !value.is_empty() => (
                    Some(ApiKey::from(value)),
                    KeySource::Environment(var.to_string()),
                ),
                _ => (None, KeySource::None),
            },
        };

        let require_api_key = ru.require_api_key.unwrap_or(api_key_env.is_some());
        if require_api_key && api_key.is_none() {
            return Err(ConfigError::MissingApiKey {
                var: api_key_env.unwrap_or_else(|| "an api key variable".to_string()),
            });
        }

        // Preset parameters first, explicit keys override.
        let mut parameters = match preset.as_ref().map(|p| p.parameters.clone()) {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        parameters.extend(ru.parameters);

        let upstream = UpstreamConfig {
            name: ru
                .name
                .or(preset.as_ref().map(|p| p.name.to_string()))
                .unwrap_or_else(|| "upstream".to_string()),
            strategy,
            url,
            model: ru
                .model
                .or(preset.as_ref().map(|p| p.model.to_string()))
                .unwrap_or_default(),
            api_key,
            api_key_env,
            timeout_secs: ru.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            extract: ru
                .extract
                .or(preset.as_ref().map(|p| p.extract))
                .unwrap_or(ExtractMode::Strict),
            placeholder: ru.placeholder,
            strip_prompt_echo: ru
                .strip_prompt_echo
                .or(preset.as_ref().map(|p| p.strip_prompt_echo))
                .unwrap_or(false),
            parameters,
        };

        let mut server = raw.server;
        if let Some(port) = env_number::<u16, _>(&lookup, "PORT", "server.listen")? {
            server.listen = with_port(&server.listen, port);
        }

        let mut history = raw.history;
        if let Some(max_turns) = env_number(&lookup, "MAX_TURNS", "history.max_turns")? {
            history.max_turns = max_turns;
        }
        if let Some(max_chars) = env_number(&lookup, "MAX_CHARS", "history.max_chars")? {
            history.max_chars = max_chars;
        }

        let config = Config {
            server,
            upstream,
            history,
            persona: raw.persona,
        };

        Ok((config, key_source))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let upstream = &self.upstream;
        if !(upstream.url.starts_with("http://") || upstream.url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "upstream.url must be an http(s) URL, got '{}'",
                upstream.url
            )));
        }
        if upstream.strategy == Strategy::Structured && upstream.model.is_empty() {
            return Err(ConfigError::Validation(
                "upstream.model is required for the structured strategy".to_string(),
            ));
        }
        if upstream.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upstream.timeout_secs must be greater than zero".to_string(),
            ));
        }

        let history = &self.history;
        match history.strategy {
            HistoryStrategy::Paired if history.max_turns == 0 => {
                return Err(ConfigError::Validation(
                    "history.max_turns must be greater than zero".to_string(),
                ));
            }
            HistoryStrategy::Flat if history.max_messages == 0 => {
                return Err(ConfigError::Validation(
                    "history.max_messages must be greater than zero".to_string(),
                ));
            }
            _ => {}
        }
        if history.default_session.is_empty() {
            return Err(ConfigError::Validation(
                "history.default_session must not be empty".to_string(),
            ));
        }

        if self.persona.profile.is_some() && self.persona.system_prompt.is_some() {
            tracing::warn!("Both persona.profile and persona.system_prompt set - using the profile");
        }

        Ok(())
    }
}
