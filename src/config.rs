//! Configuration parsing and validation for serginho.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::orchestrator::RetentionPolicy;
use crate::provider::Tier;
use crate::router::{
    check_downward, KeywordClassifier, DEFAULT_CASUAL_PATTERNS, DEFAULT_TECHNICAL_KEYWORDS,
};

/// Env var selecting the runtime environment (`test` enables placeholder credentials).
pub const RUNTIME_ENV_VAR: &str = "SERGINHO_ENV";

/// Key used when no credential is available in the test runtime.
pub const PLACEHOLDER_API_KEY: &str = "test-placeholder-key";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub specialists: Vec<SpecialistConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8080")
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Requests processed concurrently before callers queue
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_concurrent_requests() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// Only accessible via `.expose_secret()`, so every use is grep-auditable.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value.
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

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
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

/// Runtime environment. Only affects credential handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnv {
    Production,
    Test,
}

impl RuntimeEnv {
    /// Read [`RUNTIME_ENV_VAR`]; `test` selects [`RuntimeEnv::Test`].
    pub fn detect() -> Self {
        match std::env::var(RUNTIME_ENV_VAR) {
            Ok(v) if v.eq_ignore_ascii_case("test") => RuntimeEnv::Test,
            _ => RuntimeEnv::Production,
        }
    }
}

/// How the upstream API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was read from the configured env var (holds var name)
    Environment(String),
    /// No key available; test runtime placeholder in use
    Placeholder,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Environment(var) => write!(f, "environment ({})", var),
            KeySource::Placeholder => write!(f, "test placeholder"),
        }
    }
}

/// Upstream endpoint and the single credential shared by all tiers.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// OpenAI-compatible base URL (e.g., "https://api.groq.com/openai/v1")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional key; may contain ${VAR} references
    pub api_key: Option<ApiKey>,
    /// Env var consulted when `api_key` is absent
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Whole-request timeout per provider call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_api_key_env() -> String {
    "SERGINHO_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Resolve the upstream credential from config and the process environment.
    ///
    /// Missing credentials are fatal in production and replaced by
    /// [`PLACEHOLDER_API_KEY`] in the test runtime.
    pub fn resolve_credential(&self, env: RuntimeEnv) -> Result<(ApiKey, KeySource), ConfigError> {
        self.resolve_credential_with(env, |name| std::env::var(name).ok())
    }

    fn resolve_credential_with<F>(
        &self,
        env: RuntimeEnv,
        lookup: F,
    ) -> Result<(ApiKey, KeySource), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = &self.api_key {
            let raw = key.expose_secret();
            if raw.contains("${") {
                let expanded = expand_env_vars_with(raw, "upstream.api_key", &lookup)?;
                return Ok((ApiKey::from(expanded), KeySource::EnvExpanded));
            }
            if !raw.is_empty() {
                return Ok((key.clone(), KeySource::Literal));
            }
        }

        match lookup(&self.api_key_env).filter(|v| !v.is_empty()) {
            Some(value) => Ok((
                ApiKey::from(value),
                KeySource::Environment(self.api_key_env.clone()),
            )),
            None if env == RuntimeEnv::Test => {
                tracing::debug!("No upstream credential; using test placeholder");
                Ok((ApiKey::from(PLACEHOLDER_API_KEY), KeySource::Placeholder))
            }
            None => Err(ConfigError::MissingCredential {
                var: self.api_key_env.clone(),
            }),
        }
    }
}

/// One tiered backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Stable identifier (e.g., "tier-70b")
    pub id: String,
    pub tier: Tier,
    /// Upstream model name
    pub model: String,
    /// Overrides `upstream.base_url`
    pub url: Option<String>,
    /// Overrides the tier's default persona prompt
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Session used when the caller supplies none
    #[serde(default = "default_session")]
    pub default_session: String,
    /// Providers raced in hybrid mode (default: every non-fallback provider)
    pub hybrid: Option<Vec<String>>,
    /// Provider id -> ordered downstream chain (default: derived from tiers)
    #[serde(default)]
    pub fallback: HashMap<String, Vec<String>>,
}

fn default_session() -> String {
    "default".to_string()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_session: default_session(),
            hybrid: None,
            fallback: HashMap::new(),
        }
    }
}

/// Intent classifier pattern sets.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_casual_patterns")]
    pub casual_patterns: Vec<String>,
    #[serde(default = "default_technical_keywords")]
    pub technical_keywords: Vec<String>,
}

fn default_casual_patterns() -> Vec<String> {
    DEFAULT_CASUAL_PATTERNS.iter().map(|s| s.to_string()).collect()
}

fn default_technical_keywords() -> Vec<String> {
    DEFAULT_TECHNICAL_KEYWORDS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            casual_patterns: default_casual_patterns(),
            technical_keywords: default_technical_keywords(),
        }
    }
}

impl ClassifierConfig {
    pub fn build(&self) -> Result<KeywordClassifier, ConfigError> {
        KeywordClassifier::new(&self.casual_patterns, &self.technical_keywords)
            .map_err(|e| ConfigError::Validation(format!("Invalid classifier pattern: {}", e)))
    }
}

/// Session retention. Absent limits mean unbounded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionsConfig {
    pub max_sessions: Option<usize>,
    pub max_age_secs: Option<u64>,
}

impl SessionsConfig {
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_sessions: self.max_sessions,
            max_age: self.max_age_secs.map(Duration::from_secs),
        }
    }
}

/// A specialist persona served through `/specialist-chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpecialistConfig {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
    pub temperature: Option<f32>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            tracing::warn!("No providers configured - every request will fail");
        }

        let mut ids = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "Provider with empty id".to_string(),
                ));
            }
            if !ids.insert(provider.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate provider id '{}'",
                    provider.id
                )));
            }
            if provider.model.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has empty model",
                    provider.id
                )));
            }
            if self.provider_url(provider).is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has empty URL",
                    provider.id
                )));
            }
        }

        let tiers: HashMap<&str, Tier> = self
            .providers
            .iter()
            .map(|p| (p.id.as_str(), p.tier))
            .collect();

        for (root, chain) in &self.routing.fallback {
            let root_tier = tiers.get(root.as_str()).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "Fallback chain references unknown provider '{}'",
                    root
                ))
            })?;
            for id in chain {
                let tier = tiers.get(id.as_str()).ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "Fallback chain references unknown provider '{}'",
                        id
                    ))
                })?;
                check_downward(root, *root_tier, id, *tier).map_err(ConfigError::Validation)?;
            }
        }

        let mut raced = HashSet::new();
        for id in self.routing.hybrid.iter().flatten() {
            if !ids.contains(id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Hybrid race set references unknown provider '{}'",
                    id
                )));
            }
            if !raced.insert(id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Hybrid race set lists provider '{}' twice",
                    id
                )));
            }
        }

        self.sessions
            .retention_policy()
            .check()
            .map_err(ConfigError::Validation)?;

        let mut specialist_ids = HashSet::new();
        for specialist in &self.specialists {
            if !specialist_ids.insert(specialist.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate specialist id '{}'",
                    specialist.id
                )));
            }
        }

        self.classifier.build()?;

        Ok(())
    }

    /// Base URL for a provider, falling back to the shared upstream.
    pub fn provider_url<'a>(&'a self, provider: &'a ProviderConfig) -> &'a str {
        provider.url.as_deref().unwrap_or(&self.upstream.base_url)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for {context}: {message}")]
    EnvVar {
        var: String,
        context: String,
        message: String,
    },

    #[error("Upstream API key missing: set '{var}' or upstream.api_key")]
    MissingCredential { var: String },
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}/v1`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, context: &str, lookup: F) -> Result<String, ConfigError>
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
            context: context.to_string(),
            message: "Unclosed '${' in config value".to_string(),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                context: context.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            context: context.to_string(),
            message: format!("Environment variable '{}' is not set", var_name),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::parse_str("").unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(config.routing.default_session, "default");
        assert_eq!(config.upstream.api_key_env, "SERGINHO_API_KEY");
        assert!(config.providers.is_empty());
        assert_eq!(config.sessions.retention_policy(), RetentionPolicy::unbounded());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [server]
            listen = "0.0.0.0:9000"
            max_concurrent_requests = 32

            [upstream]
            base_url = "https://llm.example.com/v1"
            api_key_env = "MY_LLM_KEY"
            timeout_secs = 12

            [[providers]]
            id = "tier-120b"
            tier = "genius"
            model = "big-model"

            [[providers]]
            id = "tier-8b"
            tier = "fast"
            model = "small-model"
            url = "https://fast.example.com/v1"
            temperature = 0.2

            [routing]
            default_session = "anon"
            hybrid = ["tier-120b", "tier-8b"]

            [routing.fallback]
            "tier-120b" = ["tier-8b"]

            [classifier]
            casual_patterns = ["^yo\\b"]
            technical_keywords = ["zig"]

            [sessions]
            max_sessions = 100
            max_age_secs = 600

            [[specialists]]
            id = "chef"
            name = "Chef"
            system_prompt = "You are a chef."
            temperature = 0.9

            [logging]
            level = "debug"
        "#;

        let config = Config::parse_str(toml).unwrap();
        assert_eq!(config.server.max_concurrent_requests, 32);
        assert_eq!(config.upstream.timeout(), Duration::from_secs(12));
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].tier, Tier::Genius);
        assert_eq!(config.provider_url(&config.providers[0]), "https://llm.example.com/v1");
        assert_eq!(config.provider_url(&config.providers[1]), "https://fast.example.com/v1");
        assert_eq!(config.routing.fallback["tier-120b"], vec!["tier-8b"]);
        assert_eq!(
            config.sessions.retention_policy(),
            RetentionPolicy {
                max_sessions: Some(100),
                max_age: Some(Duration::from_secs(600)),
            }
        );
        assert_eq!(config.specialists[0].id, "chef");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_duplicate_provider_ids_rejected() {
        let toml = r#"
            [[providers]]
            id = "tier-8b"
            tier = "fast"
            model = "a"

            [[providers]]
            id = "tier-8b"
            tier = "expert"
            model = "b"
        "#;
        let err = Config::parse_str(toml).unwrap_err().to_string();
        assert!(err.contains("Duplicate provider id"), "{}", err);
    }

    #[test]
    fn test_unknown_fallback_target_rejected() {
        let toml = r#"
            [[providers]]
            id = "tier-8b"
            tier = "fast"
            model = "a"

            [routing.fallback]
            "tier-8b" = ["tier-ghost"]
        "#;
        let err = Config::parse_str(toml).unwrap_err().to_string();
        assert!(err.contains("tier-ghost"), "{}", err);
    }

    #[test]
    fn test_upward_fallback_rejected() {
        let toml = r#"
            [[providers]]
            id = "tier-120b"
            tier = "genius"
            model = "big"

            [[providers]]
            id = "tier-8b"
            tier = "fast"
            model = "small"

            [routing.fallback]
            "tier-8b" = ["tier-120b"]
        "#;
        let err = Config::parse_str(toml).unwrap_err().to_string();
        assert!(err.contains("tier-8b"), "{}", err);
        assert!(err.contains("tier-120b"), "{}", err);
    }

    #[test]
    fn test_same_tier_fallback_rejected() {
        let toml = r#"
            [[providers]]
            id = "tier-70b"
            tier = "expert"
            model = "a"

            [[providers]]
            id = "tier-70b-b"
            tier = "expert"
            model = "b"

            [routing.fallback]
            "tier-70b" = ["tier-70b-b"]
        "#;
        assert!(matches!(
            Config::parse_str(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_hybrid_member_rejected() {
        let toml = r#"
            [[providers]]
            id = "tier-8b"
            tier = "fast"
            model = "a"

            [routing]
            hybrid = ["tier-8b", "tier-8b"]
        "#;
        let err = Config::parse_str(toml).unwrap_err().to_string();
        assert!(err.contains("twice"), "{}", err);
    }

    #[test]
    fn test_zero_retention_limits_rejected() {
        for toml in ["[sessions]\nmax_sessions = 0\n", "[sessions]\nmax_age_secs = 0\n"] {
            let err = Config::parse_str(toml).unwrap_err().to_string();
            assert!(err.contains("at least 1"), "{}", err);
        }
    }

    #[test]
    fn test_unknown_hybrid_member_rejected() {
        let toml = r#"
            [routing]
            hybrid = ["nobody"]
        "#;
        assert!(Config::parse_str(toml).is_err());
    }

    #[test]
    fn test_invalid_classifier_pattern_rejected() {
        let toml = r#"
            [classifier]
            casual_patterns = ["(unclosed"]
        "#;
        let err = Config::parse_str(toml).unwrap_err().to_string();
        assert!(err.contains("classifier"), "{}", err);
    }

    #[test]
    fn test_unknown_tier_rejected() {
        let toml = r#"
            [[providers]]
            id = "x"
            tier = "legendary"
            model = "m"
        "#;
        assert!(matches!(Config::parse_str(toml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_api_key_debug_redaction() {
        let key = ApiKey::from("super-secret-token");
        let debug_output = format!("{:?}", key);
        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("super-secret"));
    }

    #[test]
    fn test_api_key_serialize_redaction() {
        let key = ApiKey::from("real-secret-value");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");
    }

    #[test]
    fn test_upstream_debug_redaction() {
        let toml = r#"
            [upstream]
            api_key = "gsk_live_secret"
        "#;
        let config = Config::parse_str(toml).unwrap();
        let debug = format!("{:?}", config.upstream);
        assert!(!debug.contains("gsk_live_secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    // ── Expansion tests (using expand_env_vars_with, no global env state) ──

    #[test]
    fn test_expand_single_var() {
        let lookup = |name: &str| match name {
            "MY_KEY" => Some("gsk_abc".to_string()),
            _ => None,
        };
        let result = expand_env_vars_with("${MY_KEY}", "test", lookup).unwrap();
        assert_eq!(result, "gsk_abc");
    }

    #[test]
    fn test_expand_mixed_literal_and_var() {
        let lookup = |name: &str| match name {
            "KEY" => Some("resolved".to_string()),
            _ => None,
        };
        let result = expand_env_vars_with("prefix-${KEY}-suffix", "test", lookup).unwrap();
        assert_eq!(result, "prefix-resolved-suffix");
    }

    #[test]
    fn test_expand_missing_var_fails() {
        let lookup = |_: &str| None;
        let err = expand_env_vars_with("${MISSING}", "upstream.api_key", lookup)
            .unwrap_err()
            .to_string();
        assert!(err.contains("MISSING"));
        assert!(err.contains("upstream.api_key"));
    }

    #[test]
    fn test_expand_unclosed_brace_fails() {
        let lookup = |_: &str| -> Option<String> { panic!("should not be called") };
        let err = expand_env_vars_with("${UNCLOSED", "test", lookup)
            .unwrap_err()
            .to_string()
            .to_lowercase();
        assert!(err.contains("unclosed"));
    }

    #[test]
    fn test_expand_empty_var_name_fails() {
        let lookup = |_: &str| -> Option<String> { panic!("should not be called") };
        let err = expand_env_vars_with("${}", "test", lookup)
            .unwrap_err()
            .to_string()
            .to_lowercase();
        assert!(err.contains("empty"));
    }

    // ── Credential resolution ──

    fn upstream_with_key(key: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            api_key: key.map(ApiKey::from),
            api_key_env: "TEST_SERGINHO_KEY".to_string(),
            ..UpstreamConfig::default()
        }
    }

    #[test]
    fn test_credential_literal() {
        let upstream = upstream_with_key(Some("literal-key"));
        let (key, source) = upstream
            .resolve_credential_with(RuntimeEnv::Production, |_| None)
            .unwrap();
        assert_eq!(key.expose_secret(), "literal-key");
        assert_eq!(source, KeySource::Literal);
    }

    #[test]
    fn test_credential_expanded() {
        let upstream = upstream_with_key(Some("${GROQ_KEY}"));
        let (key, source) = upstream
            .resolve_credential_with(RuntimeEnv::Production, |name| {
                (name == "GROQ_KEY").then(|| "gsk_expanded".to_string())
            })
            .unwrap();
        assert_eq!(key.expose_secret(), "gsk_expanded");
        assert_eq!(source, KeySource::EnvExpanded);
    }

    #[test]
    fn test_credential_from_env_var() {
        let upstream = upstream_with_key(None);
        let (key, source) = upstream
            .resolve_credential_with(RuntimeEnv::Production, |name| {
                (name == "TEST_SERGINHO_KEY").then(|| "from-env".to_string())
            })
            .unwrap();
        assert_eq!(key.expose_secret(), "from-env");
        assert_eq!(
            source,
            KeySource::Environment("TEST_SERGINHO_KEY".to_string())
        );
    }

    #[test]
    fn test_credential_missing_is_fatal_in_production() {
        let upstream = upstream_with_key(None);
        let err = upstream
            .resolve_credential_with(RuntimeEnv::Production, |_| None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { ref var } if var == "TEST_SERGINHO_KEY"));
    }

    #[test]
    fn test_credential_missing_is_placeholder_in_test_env() {
        let upstream = upstream_with_key(None);
        let (key, source) = upstream
            .resolve_credential_with(RuntimeEnv::Test, |_| None)
            .unwrap();
        assert_eq!(key.expose_secret(), PLACEHOLDER_API_KEY);
        assert_eq!(source, KeySource::Placeholder);
    }

    #[test]
    fn test_credential_empty_env_value_counts_as_missing() {
        let upstream = upstream_with_key(None);
        let result =
            upstream.resolve_credential_with(RuntimeEnv::Production, |_| Some(String::new()));
        assert!(matches!(result, Err(ConfigError::MissingCredential { .. })));
    }
}
