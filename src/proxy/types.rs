//! HTTP request bodies.
//!
//! Responses serialize [`crate::orchestrator::Completion`] directly.

use serde::Deserialize;

use crate::error::Error;
use crate::orchestrator::Mode;

/// Body of `POST /chat` and `POST /hybrid`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub session_id: Option<String>,
    /// Ignored on `/hybrid`, which always races.
    pub mode: Option<Mode>,
}

/// Body of `POST /specialist-chat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistChatRequest {
    pub message: Option<String>,
    pub session_id: Option<String>,
    pub specialist_id: Option<String>,
}

/// Reject a missing or blank `message`.
pub fn require_message(message: Option<&str>) -> Result<&str, Error> {
    match message {
        Some(m) if !m.trim().is_empty() => Ok(m),
        _ => Err(Error::BadRequest("message is required".to_string())),
    }
}
