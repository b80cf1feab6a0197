//! Parallel race execution ("hybrid" mode).
//!
//! Fans the same prompt out to a fixed set of providers and returns the first
//! success. Calls run concurrently in a [`FuturesUnordered`]; once a winner
//! resolves the set is dropped, which cancels the losers' in-flight requests.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::provider::{GenerateOptions, Generation, Provider, ProviderRegistry};
use crate::router::AttemptRecord;

/// The first successful branch of a race.
pub struct RaceWin {
    pub provider: Arc<dyn Provider>,
    pub generation: Generation,
    /// Branches that failed before the winner resolved.
    pub failures: Vec<AttemptRecord>,
}

/// Every branch failed.
#[derive(Debug, Clone, Default)]
pub struct RaceExhausted {
    pub failures: Vec<AttemptRecord>,
}

/// Races a pre-declared set of providers.
#[derive(Debug, Clone, Default)]
pub struct ParallelRaceExecutor {
    provider_ids: Vec<String>,
}

impl ParallelRaceExecutor {
    pub fn new(provider_ids: Vec<String>) -> Self {
        Self { provider_ids }
    }

    pub fn provider_ids(&self) -> &[String] {
        &self.provider_ids
    }

    /// Run the race. Ids missing from `registry` are skipped.
    pub async fn race(
        &self,
        registry: &ProviderRegistry,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<RaceWin, RaceExhausted> {
        let mut in_flight: FuturesUnordered<_> = self
            .provider_ids
            .iter()
            .filter_map(|id| registry.get(id))
            .map(|provider| {
                let provider = Arc::clone(provider);
                async move {
                    let result = provider.generate(prompt, options).await;
                    (provider, result)
                }
            })
            .collect();

        tracing::debug!(branches = in_flight.len(), "Starting parallel race");

        let mut failures = Vec::new();
        while let Some((provider, result)) = in_flight.next().await {
            match result {
                Ok(generation) => {
                    tracing::debug!(
                        winner = %provider.id(),
                        cancelled = in_flight.len(),
                        "Race won, cancelling remaining branches"
                    );
                    return Ok(RaceWin {
                        provider,
                        generation,
                        failures,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %provider.id(),
                        status = e.status_code(),
                        error = %e,
                        "Race branch failed"
                    );
                    failures.push(AttemptRecord {
                        provider: provider.id().to_string(),
                        status_code: e.status_code(),
                    });
                }
            }
        }

        Err(RaceExhausted { failures })
    }
}
