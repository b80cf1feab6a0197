//! OpenAI-compatible HTTP provider client.

use async_trait::async_trait;
use reqwest::{header, Client};

use super::wire::{error_message, ChatCompletionRequest, ChatCompletionResponse, Message};
use super::{
    GenerateOptions, Generation, Provider, ProviderError, Tier, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE,
};
use crate::config::ApiKey;

/// A tier backed by a `/chat/completions` endpoint.
///
/// The timeout is enforced by the shared `reqwest::Client`; a timed-out call
/// surfaces as [`ProviderError::Timeout`].
#[derive(Debug, Clone)]
pub struct HttpProvider {
    id: String,
    tier: Tier,
    model: String,
    base_url: String,
    api_key: ApiKey,
    system_prompt: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    client: Client,
}

impl HttpProvider {
    pub fn new(
        id: impl Into<String>,
        tier: Tier,
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: ApiKey,
        client: Client,
    ) -> Self {
        Self {
            id: id.into(),
            tier,
            model: model.into(),
            base_url: base_url.into(),
            api_key,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            client,
        }
    }

    /// Override the tier persona prompt.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Provider-level defaults, still overridden by per-call options.
    pub fn with_defaults(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn tier(&self) -> Tier {
        self.tier
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, ProviderError> {
        let system_prompt = options
            .system_prompt
            .as_deref()
            .or(self.system_prompt.as_deref())
            .unwrap_or_else(|| self.tier.default_system_prompt());

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![Message::system(system_prompt), Message::user(prompt)],
            temperature: options
                .temperature
                .or(self.temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: options
                .max_tokens
                .or(self.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
        };

        tracing::debug!(provider = %self.id, model = %self.model, "Calling upstream");

        let response = self
            .client
            .post(self.endpoint())
            .header(header::CONTENT_TYPE, "application/json")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: error_message(&error_body),
            });
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::InvalidResponse(e.to_string())
            }
        })?;

        parsed.into_generation()
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(e.to_string())
    }
}
