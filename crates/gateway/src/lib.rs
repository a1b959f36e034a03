//! HTTP API gateway for Roadwatch.
//!
//! Endpoints:
//!
//! - `POST /api/chat`: ask a question, get the agent's answer
//! - `GET  /.well-known/agent.json`: A2A agent card
//! - `POST /tasks/send`: A2A task endpoint
//! - `GET  /health`: liveness check
//!
//! Built on Axum. Every request runs its own conversation; nothing is kept
//! between requests.

pub mod a2a;
pub mod chat;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode};
use axum::response::Json;
use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, info, warn};

use roadwatch_agent::ConversationEngine;
use roadwatch_config::{AppConfig, GatewayConfig};
use roadwatch_core::event::EventBus;
use roadwatch_core::message::ConversationState;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    /// Alias of the engine used when a request names no usable model.
    pub default_model: String,
    /// One engine per model alias that could be bound at start-up.
    pub engines: BTreeMap<String, Arc<ConversationEngine>>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    /// State with a single engine registered as the default.
    pub fn new(config: AppConfig, default_model: impl Into<String>, engine: ConversationEngine) -> Self {
        let default_model = default_model.into();
        let mut engines = BTreeMap::new();
        engines.insert(default_model.clone(), Arc::new(engine));
        Self {
            config,
            default_model,
            engines,
        }
    }

    /// Register an engine for another model alias.
    pub fn with_engine(mut self, alias: impl Into<String>, engine: ConversationEngine) -> Self {
        self.engines.insert(alias.into(), Arc::new(engine));
        self
    }

    /// The engine for `requested`, falling back to the default one.
    pub fn engine_for(&self, requested: Option<&str>) -> Option<(&str, Arc<ConversationEngine>)> {
        requested
            .and_then(|alias| self.engines.get_key_value(alias))
            .or_else(|| self.engines.get_key_value(self.default_model.as_str()))
            .map(|(alias, engine)| (alias.as_str(), engine.clone()))
    }

    /// Run a single question through an engine, starting from
    /// `[System(greeting), Human(question)]`.
    pub(crate) async fn answer(
        &self,
        engine: &ConversationEngine,
        question: &str,
    ) -> Result<ConversationState, ApiError> {
        let initial = ConversationState::from_question(Some(&self.config.agent.greeting), question);
        engine.run_conversation(initial.messages).await.map_err(|e| {
            tracing::error!(error = %e, "Conversation failed");
            internal_error(e.to_string())
        })
    }
}

/// Error body, shaped `{"detail": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn internal_error(detail: String) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { detail }))
}

pub(crate) fn bad_request(detail: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            detail: detail.to_string(),
        }),
    )
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway);
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat::chat_handler))
        .route("/.well-known/agent.json", get(a2a::agent_card_handler))
        .route("/tasks/send", post(a2a::task_send_handler))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS from `gateway.allowed_origins`; `"*"` allows any origin.
fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

/// Start the gateway HTTP server.
///
/// Builds the tool registry and event bus once and shares them between the
/// engines of every model alias that can be bound with the current keys.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let event_bus = Arc::new(EventBus::default());
    let tools = Arc::new(roadwatch_tools::default_registry(&config)?.with_event_bus(event_bus.clone()));

    let default_binding = roadwatch_providers::bind_model(&config, &config.model_core)?;
    let default_engine = ConversationEngine::from_config(&config, default_binding, tools.clone())?
        .with_event_bus(event_bus.clone());
    let mut state = GatewayState::new(config.clone(), config.model_core.clone(), default_engine);

    for alias in config.model_aliases() {
        if alias == config.model_core {
            continue;
        }
        let engine = roadwatch_providers::bind_model(&config, &alias).and_then(|binding| {
            ConversationEngine::from_config(&config, binding, tools.clone()).map_err(|e| {
                roadwatch_core::Error::Config {
                    message: e.to_string(),
                }
            })
        });
        match engine {
            Ok(engine) => state = state.with_engine(alias, engine.with_event_bus(event_bus.clone())),
            Err(e) => debug!(alias = %alias, error = %e, "Model alias unavailable"),
        }
    }

    spawn_event_logger(&event_bus);

    info!(
        addr = %addr,
        model = %state.default_model,
        models = state.engines.len(),
        "Gateway starting"
    );
    let app = build_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Mirror domain events into the trace log.
fn spawn_event_logger(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(event = ?event, "Domain event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}
