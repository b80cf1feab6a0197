//! HTTP surface.
//!
//! This module exposes the orchestrator over JSON endpoints (`/chat`,
//! `/hybrid`, `/specialist-chat`) plus health, metrics and listings.

mod handlers;
mod server;
pub mod specialists;
pub mod types;

pub use handlers::{SERGINHO_ATTEMPTS_HEADER, SERGINHO_LATENCY_MS_HEADER, SERGINHO_PROVIDER_HEADER};
pub use server::{create_router, run_server, AppState, RequestId, SERGINHO_REQUEST_ID_HEADER};
pub use specialists::{Specialist, SpecialistRegistry};
pub use types::{ChatRequest, SpecialistChatRequest};
