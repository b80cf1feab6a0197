//! Request orchestration.
//!
//! The [`Orchestrator`] is the single entry point for a prompt. It:
//! - Classifies the prompt (or honours an explicit mode) to pick the initial tier
//! - Executes sequentially, walking the fallback chain on failure, or races
//!   the hybrid set in parallel
//! - Records metrics and appends the exchange to the caller's session

mod metrics;
mod race;
mod session;

pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use race::{ParallelRaceExecutor, RaceExhausted, RaceWin};
pub use session::{Arrival, Exchange, RetentionPolicy, SessionStore};

use std::collections::HashSet;
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::{Config, ConfigError, RuntimeEnv};
use crate::error::{Error, Result};
use crate::provider::{
    GenerateOptions, Generation, HttpProvider, Provider, ProviderRegistry, Tier, TokenUsage,
};
use crate::router::{
    check_downward, AttemptRecord, Classifier, FallbackResolver, Intent, KeywordClassifier,
};

/// How the initial provider is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Classify the prompt.
    #[default]
    Auto,
    Fast,
    Expert,
    Genius,
    /// Race the hybrid set in parallel.
    #[serde(alias = "betinho-hybrid")]
    Hybrid,
}

impl Mode {
    fn forced_tier(&self) -> Option<Tier> {
        match self {
            Mode::Fast => Some(Tier::Fast),
            Mode::Expert => Some(Tier::Expert),
            Mode::Genius => Some(Tier::Genius),
            Mode::Auto | Mode::Hybrid => None,
        }
    }
}

/// Caller-supplied options for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub session_id: Option<String>,
    pub mode: Mode,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl RequestOptions {
    fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Which execution path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Sequential,
    Parallel,
}

/// A successful request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub success: bool,
    pub provider: String,
    pub tier: Tier,
    pub intent: Intent,
    pub source: Source,
    /// Wall-clock milliseconds from request start to result.
    pub duration: u64,
    pub result: String,
    pub usage: TokenUsage,
    pub session_id: String,
    /// Provider calls made, including the successful one.
    pub attempts: usize,
    /// Calls that failed before the result.
    #[serde(skip)]
    pub failures: Vec<AttemptRecord>,
}

/// Internal result of either execution path.
struct Outcome {
    provider: Arc<dyn Provider>,
    generation: Generation,
    /// Tier counted in `routing_decisions`.
    routed_tier: Tier,
    source: Source,
    attempts: usize,
    failures: Vec<AttemptRecord>,
}

/// Sequential execution states. `Execute` and `Fallback` alternate until a
/// provider succeeds or the chain is exhausted.
enum Step {
    Execute(Arc<dyn Provider>),
    Fallback { failed: String },
}

/// Composes classification, execution, fallback, racing, sessions and metrics.
pub struct Orchestrator {
    providers: ProviderRegistry,
    classifier: Arc<dyn Classifier>,
    fallback: FallbackResolver,
    race: ParallelRaceExecutor,
    sessions: SessionStore,
    metrics: MetricsCollector,
    default_session: String,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Build HTTP-backed providers and routing from configuration.
    ///
    /// Fails with [`ConfigError::MissingCredential`] when no upstream key is
    /// available outside the test runtime.
    pub fn from_config(config: &Config, env: RuntimeEnv) -> std::result::Result<Self, ConfigError> {
        let (api_key, key_source) = config.upstream.resolve_credential(env)?;
        tracing::info!(key_source = %key_source, "Resolved upstream credential");

        let client = Client::builder()
            .timeout(config.upstream.timeout())
            .connect_timeout(config.upstream.connect_timeout())
            .build()
            .map_err(|e| ConfigError::Validation(format!("Failed to build HTTP client: {}", e)))?;

        let providers: Vec<Arc<dyn Provider>> = config
            .providers
            .iter()
            .map(|p| {
                let provider = HttpProvider::new(
                    p.id.clone(),
                    p.tier,
                    p.model.clone(),
                    config.provider_url(p),
                    api_key.clone(),
                    client.clone(),
                )
                .with_system_prompt(p.system_prompt.clone())
                .with_defaults(p.temperature, p.max_tokens);
                Arc::new(provider) as Arc<dyn Provider>
            })
            .collect();

        let mut builder = Orchestrator::builder()
            .providers(providers)
            .classifier(Arc::new(config.classifier.build()?))
            .retention(config.sessions.retention_policy())
            .default_session(config.routing.default_session.clone());

        if !config.routing.fallback.is_empty() {
            builder = builder.fallback(FallbackResolver::new(config.routing.fallback.clone()));
        }
        if let Some(hybrid) = &config.routing.hybrid {
            builder = builder.race_set(hybrid.clone());
        }

        builder.build()
    }

    /// Serve one prompt.
    ///
    /// Fails only with the aggregated [`Error::AllProvidersFailed`] or
    /// [`Error::RaceExhausted`]; individual provider errors are logged.
    pub async fn handle_request(&self, prompt: &str, options: RequestOptions) -> Result<Completion> {
        let start = Instant::now();
        let session_id = options
            .session_id
            .clone()
            .unwrap_or_else(|| self.default_session.clone());
        let intent = self.classifier.classify(prompt);
        let arrival = self.sessions.arrive();
        let exchange = Exchange::new(prompt, intent);
        let generate = options.generate_options();

        let outcome = match options.mode {
            Mode::Hybrid => self.run_race(prompt, &generate).await?,
            mode => {
                let tier = mode.forced_tier().unwrap_or_else(|| intent.tier());
                self.run_sequential(tier, prompt, &generate).await?
            }
        };

        let duration = start.elapsed().as_millis() as u64;
        self.metrics
            .record_completion(outcome.routed_tier, duration as f64);
        self.sessions.insert(&session_id, arrival, exchange);

        tracing::info!(
            provider = %outcome.provider.id(),
            tier = %outcome.provider.tier(),
            intent = intent.as_str(),
            source = ?outcome.source,
            attempts = outcome.attempts,
            duration_ms = duration,
            "Request completed"
        );

        Ok(Completion {
            success: true,
            provider: outcome.provider.id().to_string(),
            tier: outcome.provider.tier(),
            intent,
            source: outcome.source,
            duration,
            result: outcome.generation.text,
            usage: outcome.generation.usage,
            session_id,
            attempts: outcome.attempts,
            failures: outcome.failures,
        })
    }

    /// Initial provider for `tier`: the first declared provider of that tier,
    /// else the most capable provider available.
    fn initial_provider(&self, tier: Tier) -> Option<&Arc<dyn Provider>> {
        self.providers.for_tier(tier).or_else(|| {
            let substitute = self.providers.iter().max_by_key(|p| p.tier().rank());
            if let Some(p) = substitute {
                tracing::warn!(
                    tier = %tier,
                    substitute = %p.id(),
                    "No provider for tier, routing to substitute"
                );
            }
            substitute
        })
    }

    async fn run_sequential(
        &self,
        tier: Tier,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Outcome> {
        let Some(initial) = self.initial_provider(tier).cloned() else {
            tracing::error!("No providers configured");
            return Err(Error::AllProvidersFailed);
        };
        let root = initial.id().to_string();

        tracing::info!(provider = %root, tier = %tier, "Selected provider");

        let mut tried: HashSet<String> = HashSet::new();
        let mut failures: Vec<AttemptRecord> = Vec::new();
        let mut step = Step::Execute(initial);

        loop {
            step = match step {
                Step::Execute(provider) => {
                    tried.insert(provider.id().to_string());
                    match provider.generate(prompt, options).await {
                        Ok(generation) => {
                            return Ok(Outcome {
                                provider,
                                generation,
                                routed_tier: tier,
                                source: Source::Sequential,
                                attempts: tried.len(),
                                failures,
                            });
                        }
                        Err(e) => {
                            tracing::warn!(
                                provider = %provider.id(),
                                status = e.status_code(),
                                error = %e,
                                "Provider failed"
                            );
                            failures.push(AttemptRecord {
                                provider: provider.id().to_string(),
                                status_code: e.status_code(),
                            });
                            Step::Fallback {
                                failed: provider.id().to_string(),
                            }
                        }
                    }
                }
                Step::Fallback { failed } => {
                    let next = self
                        .fallback
                        .next_provider(&root, &tried)
                        .and_then(|id| self.providers.get(id));
                    match next {
                        Some(next) => {
                            tracing::info!(from = %failed, to = %next.id(), "Falling back");
                            Step::Execute(Arc::clone(next))
                        }
                        None => {
                            tracing::error!(
                                root = %root,
                                attempts = failures.len(),
                                "Fallback chain exhausted"
                            );
                            return Err(Error::AllProvidersFailed);
                        }
                    }
                }
            };
        }
    }

    async fn run_race(&self, prompt: &str, options: &GenerateOptions) -> Result<Outcome> {
        match self.race.race(&self.providers, prompt, options).await {
            Ok(win) => {
                let attempts = win.failures.len() + 1;
                Ok(Outcome {
                    routed_tier: win.provider.tier(),
                    provider: win.provider,
                    generation: win.generation,
                    source: Source::Parallel,
                    attempts,
                    failures: win.failures,
                })
            }
            Err(exhausted) => {
                tracing::error!(
                    branches = exhausted.failures.len(),
                    "All race branches failed"
                );
                Err(Error::RaceExhausted)
            }
        }
    }

    /// Ordered history for a session.
    pub fn history(&self, session_id: &str) -> Vec<Exchange> {
        self.sessions.get(session_id)
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.sessions.len())
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Provider ids raced in hybrid mode.
    pub fn race_set(&self) -> &[String] {
        self.race.provider_ids()
    }

    pub fn fallback(&self) -> &FallbackResolver {
        &self.fallback
    }
}

/// Builder for [`Orchestrator`]. Unset parts get defaults: keyword
/// classifier, tier-derived fallback chains, every non-fallback provider in
/// the race set, unbounded sessions.
pub struct OrchestratorBuilder {
    providers: Vec<Arc<dyn Provider>>,
    classifier: Option<Arc<dyn Classifier>>,
    fallback: Option<FallbackResolver>,
    race_set: Option<Vec<String>>,
    retention: RetentionPolicy,
    default_session: String,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            classifier: None,
            fallback: None,
            race_set: None,
            retention: RetentionPolicy::unbounded(),
            default_session: "default".to_string(),
        }
    }
}

impl OrchestratorBuilder {
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(mut self, providers: impl IntoIterator<Item = Arc<dyn Provider>>) -> Self {
        self.providers.extend(providers);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn fallback(mut self, fallback: FallbackResolver) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn race_set(mut self, provider_ids: Vec<String>) -> Self {
        self.race_set = Some(provider_ids);
        self
    }

    pub fn retention(mut self, policy: RetentionPolicy) -> Self {
        self.retention = policy;
        self
    }

    pub fn default_session(mut self, session_id: impl Into<String>) -> Self {
        self.default_session = session_id.into();
        self
    }

    /// Validate ids and assemble the orchestrator.
    pub fn build(self) -> std::result::Result<Orchestrator, ConfigError> {
        let providers = ProviderRegistry::new(self.providers)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        let fallback = self
            .fallback
            .unwrap_or_else(|| FallbackResolver::from_tiers(&providers));
        if let Some(unknown) = fallback.referenced_ids().find(|id| providers.get(id).is_none()) {
            return Err(ConfigError::Validation(format!(
                "Fallback chain references unknown provider '{}'",
                unknown
            )));
        }
        for (root, chain) in fallback.chains() {
            let Some(root_provider) = providers.get(root) else {
                continue;
            };
            for target in chain.iter().filter_map(|id| providers.get(id)) {
                check_downward(root, root_provider.tier(), target.id(), target.tier())
                    .map_err(ConfigError::Validation)?;
            }
        }

        let race_set = self.race_set.unwrap_or_else(|| {
            providers
                .iter()
                .filter(|p| p.tier() != Tier::Fallback)
                .map(|p| p.id().to_string())
                .collect()
        });
        if let Some(unknown) = race_set.iter().find(|id| providers.get(id).is_none()) {
            return Err(ConfigError::Validation(format!(
                "Hybrid race set references unknown provider '{}'",
                unknown
            )));
        }
        let mut raced = HashSet::new();
        if let Some(duplicate) = race_set.iter().find(|id| !raced.insert(id.as_str())) {
            return Err(ConfigError::Validation(format!(
                "Hybrid race set lists provider '{}' twice",
                duplicate
            )));
        }

        self.retention.check().map_err(ConfigError::Validation)?;

        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(KeywordClassifier::default()));

        tracing::debug!(
            providers = providers.len(),
            race_set = ?race_set,
            "Orchestrator assembled"
        );

        Ok(Orchestrator {
            providers,
            classifier,
            fallback,
            race: ParallelRaceExecutor::new(race_set),
            sessions: SessionStore::new(self.retention),
            metrics: MetricsCollector::new(),
            default_session: self.default_session,
        })
    }
}
