//! Backend model providers.
//!
//! Every backend implements [`Provider`]: one `generate` call per prompt, no
//! retries and no cross-request state. Retry and fallback belong to the
//! orchestrator.

pub mod http;
mod wire;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpProvider;

/// Default sampling temperature when the caller does not supply one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion budget when the caller does not supply one.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Capability/cost class of a backend model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Fast,
    Expert,
    Genius,
    Fallback,
}

impl Tier {
    /// Lowercase label used in responses and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Fast => "fast",
            Tier::Expert => "expert",
            Tier::Genius => "genius",
            Tier::Fallback => "fallback",
        }
    }

    /// Capability rank. Fallback chains only ever point to a lower rank.
    pub fn rank(&self) -> u8 {
        match self {
            Tier::Genius => 3,
            Tier::Expert => 2,
            Tier::Fast => 1,
            Tier::Fallback => 0,
        }
    }

    /// Persona prompt used when the caller supplies no system prompt.
    pub fn default_system_prompt(&self) -> &'static str {
        match self {
            Tier::Fast => {
                "You are Serginho, a friendly assistant. Keep answers short, warm and direct."
            }
            Tier::Expert => {
                "You are Serginho, a senior software engineer. Give precise, working technical \
                 answers with code when it helps."
            }
            Tier::Genius => {
                "You are Serginho, a thoughtful expert. Reason carefully and give thorough, \
                 well-structured answers."
            }
            Tier::Fallback => "You are Serginho, a helpful assistant. Answer clearly.",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call generation options. Unset fields fall back to provider defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Token accounting reported by the upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Generated text plus usage counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

/// A single backend call failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("upstream request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// HTTP-ish status for attempt records: upstream status, 504 on timeout, 502 otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::Status { status, .. } => *status,
            ProviderError::Timeout => 504,
            ProviderError::Network(_) | ProviderError::InvalidResponse(_) => 502,
        }
    }
}

/// Uniform contract for invoking one backend model endpoint.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier, e.g. `tier-70b`.
    fn id(&self) -> &str;

    /// Tier label used for routing and reporting.
    fn tier(&self) -> Tier;

    /// Upstream model name, for listings.
    fn model(&self) -> &str {
        self.id()
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, ProviderError>;
}

/// Immutable set of providers, in declaration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
    index: HashMap<String, usize>,
}

impl ProviderRegistry {
    /// Build a registry. Duplicate ids are rejected.
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Result<Self, DuplicateProvider> {
        let mut index = HashMap::with_capacity(providers.len());
        for (i, p) in providers.iter().enumerate() {
            if index.insert(p.id().to_string(), i).is_some() {
                return Err(DuplicateProvider(p.id().to_string()));
            }
        }
        Ok(Self { providers, index })
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Provider>> {
        self.index.get(id).map(|&i| &self.providers[i])
    }

    /// First declared provider serving `tier`.
    pub fn for_tier(&self, tier: Tier) -> Option<&Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.tier() == tier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| (p.id(), p.tier())))
            .finish()
    }
}

/// Two providers were registered under the same id.
#[derive(Debug, Clone, thiserror::Error)]
#[error("duplicate provider id '{0}'")]
pub struct DuplicateProvider(pub String);
