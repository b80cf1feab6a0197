//! HTTP server setup and configuration.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::handlers;
use super::specialists::SpecialistRegistry;
use crate::config::{Config, RuntimeEnv};
use crate::orchestrator::Orchestrator;

/// Response header: correlation ID (UUID v4).
pub const SERGINHO_REQUEST_ID_HEADER: &str = "x-serginho-request-id";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub specialists: Arc<SpecialistRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, config: Config) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            specialists: Arc::new(SpecialistRegistry::from_config(&config.specialists)),
            config: Arc::new(config),
        }
    }
}

/// Per-request correlation id, inserted as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Tag every request with a [`RequestId`] and echo it in the response.
async fn request_id(mut request: Request, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id.0.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(SERGINHO_REQUEST_ID_HEADER), value);
    }
    response
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let max_concurrent = state.config.server.max_concurrent_requests.max(1);

    Router::new()
        // Chat endpoints
        .route("/chat", post(handlers::chat))
        .route("/hybrid", post(handlers::hybrid))
        .route("/specialist-chat", post(handlers::specialist_chat))
        // Introspection
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/providers", get(handlers::list_providers))
        .route("/specialists", get(handlers::list_specialists))
        // State and middleware
        .with_state(state)
        .layer(middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
}

/// Run the HTTP server.
pub async fn run_server(config: Config, env: RuntimeEnv) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();

    let orchestrator = Orchestrator::from_config(&config, env)?;
    tracing::info!(
        providers = orchestrator.providers().len(),
        race_set = ?orchestrator.race_set(),
        "Orchestrator ready"
    );

    let app = create_router(AppState::new(orchestrator, config));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting serginho server");

    axum::serve(listener, app).await?;

    Ok(())
}
