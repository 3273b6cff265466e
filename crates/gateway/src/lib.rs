//! HTTP gateway for Discovery AI.
//!
//! Exposes the chat facade under `/discovery-ai`: the stateful `/prompt`
//! turn, per-user history, the stateless `/chat` and `/create-dataset`
//! endpoints and a liveness check.
//!
//! Built on Axum. Every collaborator is constructed once in [`start`] and
//! shared read-only through [`AppState`].

pub mod api;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use discovery_agent::{
    ComplianceClassifier, IntentPolicyInjector, ModelOrchestrator, PolicyMode, PromptAssembler,
    PromptError,
};
use discovery_config::{AppConfig, ConfigError};
use discovery_core::memory::ChatMemory;
use discovery_core::provider::Provider;
use discovery_core::tool::ToolRegistry;
use discovery_memory::WindowChatMemory;

/// Startup failures. Any of these stops the process before it binds.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("No provider registered for '{0}'")]
    NoProvider(String),

    #[error("Unknown prompt mode: '{0}'")]
    InvalidPromptMode(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state for the gateway.
pub struct AppState {
    pub orchestrator: ModelOrchestrator,
    pub memory: Arc<dyn ChatMemory>,
    pub tools: ToolRegistry,
    pub injector: IntentPolicyInjector,
    pub assembler: PromptAssembler,
    pub classifier: ComplianceClassifier,
    /// Injection mode of the stateful `/prompt` endpoint
    pub prompt_mode: PolicyMode,
    pub fallback_message: String,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the state around an already built provider and assembler.
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        assembler: PromptAssembler,
    ) -> Result<Self, GatewayError> {
        let prompt_mode = PolicyMode::parse(&config.policy.prompt_mode)
            .ok_or_else(|| GatewayError::InvalidPromptMode(config.policy.prompt_mode.clone()))?;

        let memory: Arc<dyn ChatMemory> = Arc::new(WindowChatMemory::new(config.memory.max_messages));

        let orchestrator = ModelOrchestrator::new(
            provider,
            &config.default_model,
            config.default_temperature,
            memory.clone(),
        )
        .with_max_tokens(config.default_max_tokens)
        .with_timeout(Duration::from_secs(config.agent.timeout_secs))
        .with_max_tool_iterations(config.agent.max_tool_iterations);

        Ok(Self {
            orchestrator,
            memory,
            tools: discovery_tools::default_registry(config),
            injector: IntentPolicyInjector::from_config(&config.policy),
            assembler,
            classifier: ComplianceClassifier::from_config(&config.compliance),
            prompt_mode,
            fallback_message: config.agent.fallback_message.clone(),
        })
    }

    /// Build everything from configuration: provider, template, memory.
    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        config.validate()?;

        let router = discovery_providers::build_from_config(config);
        let provider = router
            .default()
            .ok_or_else(|| GatewayError::NoProvider(config.default_provider.clone()))?;

        let assembler = PromptAssembler::from_config(&config.prompt)?;
        Self::new(config, provider, assembler)
    }
}

/// Build the router with every `/discovery-ai` route.
///
/// Layers applied:
/// - CORS open to any origin
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/discovery-ai", api::routes(state))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(AppState::from_config(&config)?);
    info!(
        provider = %config.default_provider,
        model = %config.default_model,
        tools = state.tools.len(),
        window = config.memory.max_messages,
        "Gateway state ready"
    );

    let app = router(state);

    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
