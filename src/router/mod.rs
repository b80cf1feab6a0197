//! Routing decisions.
//!
//! This module decides which provider serves a request:
//! - Intent classification picks the initial tier
//! - Fallback chains pick the next provider after a failure

mod classifier;
mod fallback;

pub use classifier::{
    Classifier, Intent, KeywordClassifier, DEFAULT_CASUAL_PATTERNS, DEFAULT_TECHNICAL_KEYWORDS,
};
pub use fallback::{check_downward, format_attempts_header, AttemptRecord, FallbackResolver};
