//! Integration tests for loading configuration from disk and building the
//! orchestrator from it.

use std::io::Write;

use tempfile::NamedTempFile;

use serginho::config::{Config, ConfigError, RuntimeEnv};
use serginho::orchestrator::Orchestrator;
use serginho::provider::Tier;

/// Env var that no test environment sets.
const UNSET_KEY_VAR: &str = "SERGINHO_INTEGRATION_UNSET_KEY";

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn deployment(upstream: &str) -> String {
    format!(
        r#"
[server]
listen = "127.0.0.1:0"

{upstream}

[[providers]]
id = "tier-120b"
tier = "genius"
model = "openai/gpt-oss-120b"

[[providers]]
id = "tier-70b"
tier = "expert"
model = "llama-3.3-70b-versatile"

[[providers]]
id = "tier-8b"
tier = "fast"
model = "llama-3.1-8b-instant"

[[providers]]
id = "tier-backup"
tier = "fallback"
model = "gemma2-9b-it"
url = "https://backup.example.com/v1"

[routing]
hybrid = ["tier-120b", "tier-70b", "tier-8b"]

[routing.fallback]
"tier-120b" = ["tier-70b", "tier-backup"]
"tier-70b" = ["tier-8b", "tier-backup"]
"tier-8b" = ["tier-backup"]

[sessions]
max_sessions = 1000

[[specialists]]
id = "chef"
name = "Chef"
system_prompt = "You are a chef."
"#
    )
}

#[test]
fn test_from_file_loads_full_deployment() {
    let file = write_config(&deployment(&format!(
        "[upstream]\napi_key_env = \"{UNSET_KEY_VAR}\""
    )));

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.server.listen, "127.0.0.1:0");
    assert_eq!(config.providers.len(), 4);
    assert_eq!(config.providers[0].tier, Tier::Genius);
    assert_eq!(
        config.provider_url(&config.providers[1]),
        "https://api.groq.com/openai/v1"
    );
    assert_eq!(
        config.provider_url(&config.providers[3]),
        "https://backup.example.com/v1"
    );
    assert_eq!(config.routing.fallback["tier-70b"], ["tier-8b", "tier-backup"]);
    assert_eq!(config.sessions.max_sessions, Some(1000));
    assert_eq!(config.specialists[0].id, "chef");
}

#[test]
fn test_missing_file_is_io_error() {
    let result = Config::from_file("/nonexistent/serginho.toml");
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_test_runtime_builds_without_credentials() {
    let file = write_config(&deployment(&format!(
        "[upstream]\napi_key_env = \"{UNSET_KEY_VAR}\""
    )));
    let config = Config::from_file(file.path()).unwrap();

    let orchestrator = Orchestrator::from_config(&config, RuntimeEnv::Test).unwrap();

    assert_eq!(orchestrator.providers().len(), 4);
    assert_eq!(orchestrator.race_set(), ["tier-120b", "tier-70b", "tier-8b"]);
    assert_eq!(
        orchestrator.fallback().chain("tier-120b"),
        ["tier-70b", "tier-backup"]
    );
}

#[test]
fn test_production_runtime_requires_credentials() {
    let file = write_config(&deployment(&format!(
        "[upstream]\napi_key_env = \"{UNSET_KEY_VAR}\""
    )));
    let config = Config::from_file(file.path()).unwrap();

    let result = Orchestrator::from_config(&config, RuntimeEnv::Production);

    match result {
        Err(ConfigError::MissingCredential { var }) => assert_eq!(var, UNSET_KEY_VAR),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected missing credential"),
    }
}

#[test]
fn test_production_runtime_accepts_literal_key() {
    let file = write_config(&deployment("[upstream]\napi_key = \"gsk-literal\""));
    let config = Config::from_file(file.path()).unwrap();

    let (key, _) = config
        .upstream
        .resolve_credential(RuntimeEnv::Production)
        .unwrap();
    assert_eq!(key.expose_secret(), "gsk-literal");
    assert!(Orchestrator::from_config(&config, RuntimeEnv::Production).is_ok());
}

#[test]
fn test_fallback_to_unknown_provider_is_rejected() {
    let file = write_config(
        r#"
[[providers]]
id = "tier-8b"
tier = "fast"
model = "llama-3.1-8b-instant"

[routing.fallback]
"tier-8b" = ["tier-ghost"]
"#,
    );

    let result = Config::from_file(file.path());
    match result {
        Err(ConfigError::Validation(msg)) => assert!(msg.contains("tier-ghost")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected validation error"),
    }
}

#[test]
fn test_unknown_tier_is_parse_error() {
    let file = write_config(
        r#"
[[providers]]
id = "tier-x"
tier = "legendary"
model = "x"
"#,
    );

    assert!(matches!(
        Config::from_file(file.path()),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_minimal_config_uses_defaults() {
    let file = write_config("");
    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.server.listen, "127.0.0.1:8080");
    assert_eq!(config.routing.default_session, "default");
    assert_eq!(config.logging.level, "info");
    assert!(config.providers.is_empty());
}
