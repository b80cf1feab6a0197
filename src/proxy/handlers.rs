//! HTTP request handlers.

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

use super::server::{AppState, RequestId};
use super::types::{require_message, ChatRequest, SpecialistChatRequest};
use crate::error::Error;
use crate::orchestrator::{Completion, Mode, RequestOptions};
use crate::router::format_attempts_header;

/// Response header: wall-clock latency in milliseconds (integer).
pub const SERGINHO_LATENCY_MS_HEADER: &str = "x-serginho-latency-ms";
/// Response header: provider id that produced the result.
pub const SERGINHO_PROVIDER_HEADER: &str = "x-serginho-provider";
/// Response header: failed attempts before the result, e.g. "tier-120b:503".
pub const SERGINHO_ATTEMPTS_HEADER: &str = "x-serginho-attempts";

/// Attach serginho metadata headers to a successful response.
fn attach_serginho_headers(response: &mut Response, completion: &Completion) {
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static(SERGINHO_LATENCY_MS_HEADER),
        HeaderValue::from(completion.duration),
    );

    if let Ok(provider) = HeaderValue::from_str(&completion.provider) {
        headers.insert(HeaderName::from_static(SERGINHO_PROVIDER_HEADER), provider);
    }

    if let Some(attempts) = format_attempts_header(&completion.failures) {
        if let Ok(value) = HeaderValue::from_str(&attempts) {
            headers.insert(HeaderName::from_static(SERGINHO_ATTEMPTS_HEADER), value);
        }
    }
}

/// Run the orchestrator and render the completion.
async fn complete(
    state: &AppState,
    request_id: RequestId,
    prompt: &str,
    options: RequestOptions,
) -> Result<Response, Error> {
    tracing::info!(
        request_id = %request_id.0,
        mode = ?options.mode,
        session = ?options.session_id,
        "Received chat request"
    );

    let completion = state
        .orchestrator
        .handle_request(prompt, options)
        .await
        .map_err(|e| {
            tracing::error!(request_id = %request_id.0, error = %e, "Request failed");
            e
        })?;

    let mut response = Json(&completion).into_response();
    attach_serginho_headers(&mut response, &completion);
    Ok(response)
}

/// Handle POST /chat
pub async fn chat(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(body) = payload?;
    let prompt = require_message(body.message.as_deref())?;
    let options = RequestOptions {
        session_id: body.session_id.clone(),
        mode: body.mode.unwrap_or_default(),
        ..RequestOptions::default()
    };
    complete(&state, request_id, prompt, options).await
}

/// Handle POST /hybrid - always races the hybrid set
pub async fn hybrid(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(body) = payload?;
    let prompt = require_message(body.message.as_deref())?;
    let options = RequestOptions {
        session_id: body.session_id.clone(),
        mode: Mode::Hybrid,
        ..RequestOptions::default()
    };
    complete(&state, request_id, prompt, options).await
}

/// Handle POST /specialist-chat
pub async fn specialist_chat(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<SpecialistChatRequest>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(body) = payload?;
    let prompt = require_message(body.message.as_deref())?;
    let specialist_id = body
        .specialist_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::BadRequest("specialistId is required".to_string()))?;

    let specialist = state
        .specialists
        .get(specialist_id)
        .ok_or_else(|| Error::NotFound(format!("Specialist '{}' not found", specialist_id)))?;

    let mut options = RequestOptions {
        session_id: body.session_id.clone(),
        ..RequestOptions::default()
    };
    specialist.apply(&mut options);

    tracing::debug!(specialist = %specialist.id, "Applying specialist persona");
    complete(&state, request_id, prompt, options).await
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "serginho"
    }))
}

/// Handle GET /metrics
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.metrics())
}

/// Handle GET /providers
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    let providers: Vec<serde_json::Value> = state
        .orchestrator
        .providers()
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id(),
                "tier": p.tier(),
                "model": p.model(),
                "fallback": state.orchestrator.fallback().chain(p.id()),
            })
        })
        .collect();

    Json(serde_json::json!({
        "providers": providers,
        "hybrid": state.orchestrator.race_set(),
    }))
}

/// Handle GET /specialists
pub async fn list_specialists(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "specialists": state.specialists.all(),
    }))
}
