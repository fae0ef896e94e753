//! Integration tests for the full Config::load pipeline.
//!
//! These tests exercise the end-to-end flow: TOML file -> raw parse -> preset
//! defaults -> env var expansion -> final Config with KeySource metadata,
//! plus persona profile loading into a seeded store.
//!
//! Each test uses unique env var names to avoid parallel test interference.

use std::io::Write;

use chatrelay::config::{Config, ConfigError, KeySource, Strategy};
use chatrelay::proxy::AppState;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp config");
    file.write_all(content.as_bytes()).expect("write temp config");
    file
}

#[test]
fn test_load_expands_api_key_reference() {
    let var_name = "CHATRELAY_TEST_CFG_KEY_01";
    std::env::set_var(var_name, "hf_resolved");

    let file = write_config(&format!(
        r#"
[server]
listen = "127.0.0.1:19876"

[upstream]
strategy = "instruction"
url = "https://llm.example.com/generate"
api_key = "${{{}}}"
"#,
        var_name
    ));

    let (config, source) = Config::load(Some(file.path())).expect("config loads");
    assert_eq!(source, KeySource::EnvExpanded);
    assert_eq!(config.upstream.strategy, Strategy::Instruction);
    assert_eq!(
        config.upstream.api_key.as_ref().unwrap().expose_secret(),
        "hf_resolved"
    );

    std::env::remove_var(var_name);
}

#[test]
fn test_load_missing_reference_names_variable() {
    let var_name = "CHATRELAY_TEST_CFG_MISSING_02";
    std::env::remove_var(var_name);

    let file = write_config(&format!(
        r#"
[upstream]
strategy = "plain"
url = "https://llm.example.com/generate"
api_key = "${{{}}}"
"#,
        var_name
    ));

    let err = Config::load(Some(file.path())).unwrap_err().to_string();
    assert!(err.contains(var_name), "Error should name the variable: {}", err);
    assert!(err.contains("upstream.api_key"), "Error should name the field: {}", err);
}

#[test]
fn test_load_reads_key_from_api_key_env() {
    let var_name = "CHATRELAY_TEST_CFG_ENV_03";
    std::env::set_var(var_name, "sk-from-env");

    let file = write_config(&format!(
        r#"
[upstream]
preset = "openai"
api_key_env = "{}"
"#,
        var_name
    ));

    let (config, source) = Config::load(Some(file.path())).expect("config loads");
    assert_eq!(source, KeySource::Environment(var_name.to_string()));
    assert_eq!(config.upstream.model, "gpt-4o-mini");

    std::env::remove_var(var_name);
}

#[test]
fn test_load_fails_without_required_key() {
    let var_name = "CHATRELAY_TEST_CFG_ABSENT_04";
    std::env::remove_var(var_name);

    let file = write_config(&format!(
        r#"
[upstream]
preset = "mistral"
api_key_env = "{}"
"#,
        var_name
    ));

    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::MissingApiKey { .. }));
    assert!(err.to_string().contains(var_name));
}

#[test]
fn test_load_missing_file_is_io_error() {
    let err = Config::load(Some(std::path::Path::new("/nonexistent/chatrelay.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[tokio::test]
async fn test_profile_seeds_new_sessions() {
    let mut profile = tempfile::NamedTempFile::new().unwrap();
    profile
        .write_all(br#"{"nev": "Kiss Anna", "szemelyiseg": "direct", "nyelv": "hu"}"#)
        .unwrap();

    let file = write_config(&format!(
        r#"
[upstream]
strategy = "instruction"
url = "https://llm.example.com/generate"

[persona]
profile = "{}"
"#,
        profile.path().display()
    ));

    let (config, _) = Config::load(Some(file.path())).expect("config loads");
    let state = AppState::from_config(config).expect("app state");

    let history = state.store.get_or_create("new-session").await;
    assert_eq!(history.len(), 1);
    assert!(history[0].is_system());
    assert!(history[0].content.starts_with("You are Kiss Anna."));
}

#[test]
fn test_broken_profile_fails_startup() {
    let mut profile = tempfile::NamedTempFile::new().unwrap();
    profile.write_all(b"{ not json").unwrap();

    let file = write_config(&format!(
        r#"
[upstream]
strategy = "plain"
url = "https://llm.example.com/generate"

[persona]
profile = "{}"
"#,
        profile.path().display()
    ));

    let (config, _) = tokio_test::assert_ok!(Config::load(Some(file.path())));
    assert!(AppState::from_config(config).is_err());
}
