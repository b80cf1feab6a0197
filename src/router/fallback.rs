//! Fallback chain resolution.
//!
//! Each provider maps to an ordered list of downstream providers. A request's
//! chain is rooted at its initially selected provider. Resolution always skips
//! providers already attempted within the current request, so even a cyclic
//! configuration terminates.

use std::collections::{HashMap, HashSet};

use crate::provider::{ProviderRegistry, Tier};

/// Record of a single failed attempt, for the `x-serginho-attempts` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub provider: String,
    pub status_code: u16,
}

/// Static fallback chains keyed by provider id.
#[derive(Debug, Clone, Default)]
pub struct FallbackResolver {
    chains: HashMap<String, Vec<String>>,
}

impl FallbackResolver {
    pub fn new(chains: HashMap<String, Vec<String>>) -> Self {
        Self { chains }
    }

    /// Derive chains from tier ranks: every provider falls back to every
    /// provider of a strictly lower rank, highest rank first, declaration
    /// order within a rank.
    pub fn from_tiers(registry: &ProviderRegistry) -> Self {
        let mut ranked: Vec<(String, Tier)> = registry
            .iter()
            .map(|p| (p.id().to_string(), p.tier()))
            .collect();
        // stable: keeps declaration order within a tier
        ranked.sort_by_key(|(_, tier)| std::cmp::Reverse(tier.rank()));

        let chains = ranked
            .iter()
            .map(|(id, tier)| {
                let downstream = ranked
                    .iter()
                    .filter(|(_, t)| t.rank() < tier.rank())
                    .map(|(other, _)| other.clone())
                    .collect();
                (id.clone(), downstream)
            })
            .collect();

        Self { chains }
    }

    /// Next untried provider in the chain rooted at `root`, or `None` when the
    /// chain is exhausted. The provider that just failed must be in `already_tried`.
    pub fn next_provider(&self, root: &str, already_tried: &HashSet<String>) -> Option<&str> {
        self.chains
            .get(root)?
            .iter()
            .find(|id| id.as_str() != root && !already_tried.contains(id.as_str()))
            .map(String::as_str)
    }

    /// Configured downstream chain for `provider`.
    pub fn chain(&self, provider: &str) -> &[String] {
        self.chains.get(provider).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every configured `(root, downstream chain)` pair.
    pub fn chains(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.chains
            .iter()
            .map(|(root, chain)| (root.as_str(), chain.as_slice()))
    }

    /// Every id referenced as a key or chain entry.
    pub fn referenced_ids(&self) -> impl Iterator<Item = &str> {
        self.chains
            .iter()
            .flat_map(|(k, v)| std::iter::once(k).chain(v.iter()))
            .map(String::as_str)
    }
}

/// A fallback hop must land on a strictly lower tier rank.
pub fn check_downward(root: &str, root_tier: Tier, target: &str, tier: Tier) -> Result<(), String> {
    if tier.rank() < root_tier.rank() {
        Ok(())
    } else {
        Err(format!(
            "Fallback from '{}' ({}) to '{}' ({}) must move to a cheaper tier",
            root, root_tier, target, tier
        ))
    }
}

/// Format attempt records into the `x-serginho-attempts` header value.
///
/// Format: `"tier-120b:503, tier-70b:504"`, in attempt order.
/// Returns `None` when nothing failed.
pub fn format_attempts_header(attempts: &[AttemptRecord]) -> Option<String> {
    if attempts.is_empty() {
        return None;
    }
    Some(
        attempts
            .iter()
            .map(|a| format!("{}:{}", a.provider, a.status_code))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(root: &str, downstream: &[&str]) -> FallbackResolver {
        let mut chains = HashMap::new();
        chains.insert(
            root.to_string(),
            downstream.iter().map(|s| s.to_string()).collect(),
        );
        FallbackResolver::new(chains)
    }

    fn tried(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_next_in_chain() {
        let resolver = chain("genius", &["expert", "fast", "fallback"]);
        assert_eq!(
            resolver.next_provider("genius", &tried(&["genius"])),
            Some("expert")
        );
    }

    #[test]
    fn test_skips_already_tried() {
        let resolver = chain("genius", &["expert", "fast", "fallback"]);
        assert_eq!(
            resolver.next_provider("genius", &tried(&["genius", "expert"])),
            Some("fast")
        );
    }

    #[test]
    fn test_exhausted_chain_returns_none() {
        let resolver = chain("fast", &["fallback"]);
        assert_eq!(
            resolver.next_provider("fast", &tried(&["fast", "fallback"])),
            None
        );
    }

    #[test]
    fn test_unknown_provider_has_no_chain() {
        let resolver = chain("fast", &["fallback"]);
        assert_eq!(resolver.next_provider("mystery", &tried(&[])), None);
    }

    #[test]
    fn test_cyclic_chain_terminates() {
        let resolver = chain("a", &["b", "a", "b", "c"]);
        let mut attempted = tried(&["a"]);
        let mut order = Vec::new();
        while let Some(next) = resolver.next_provider("a", &attempted) {
            order.push(next.to_string());
            attempted.insert(next.to_string());
            assert!(order.len() < 10, "fallback did not terminate");
        }
        assert_eq!(order, vec!["b", "c"]);
    }

    #[test]
    fn test_self_reference_is_skipped() {
        let resolver = chain("a", &["a", "b"]);
        assert_eq!(resolver.next_provider("a", &tried(&[])), Some("b"));
    }

    #[test]
    fn test_check_downward() {
        assert!(check_downward("g", Tier::Genius, "e", Tier::Expert).is_ok());
        assert!(check_downward("f", Tier::Fast, "b", Tier::Fallback).is_ok());
        assert!(check_downward("f", Tier::Fast, "g", Tier::Genius).is_err());
        assert!(check_downward("e", Tier::Expert, "e2", Tier::Expert).is_err());
    }

    #[test]
    fn test_format_attempts_header_empty() {
        assert_eq!(format_attempts_header(&[]), None);
    }

    #[test]
    fn test_format_attempts_header_in_order() {
        let attempts = vec![
            AttemptRecord {
                provider: "tier-120b".to_string(),
                status_code: 503,
            },
            AttemptRecord {
                provider: "tier-70b".to_string(),
                status_code: 504,
            },
        ];
        assert_eq!(
            format_attempts_header(&attempts),
            Some("tier-120b:503, tier-70b:504".to_string())
        );
    }
}
