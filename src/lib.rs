//! serginho - tiered LLM request orchestration
//!
//! This library provides the orchestration engine behind the assistant:
//! intent classification, tiered provider routing with ordered fallback,
//! parallel racing, per-session history and routing metrics.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod proxy;
pub mod router;

pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, RequestOptions};
