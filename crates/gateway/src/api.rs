//! `/discovery-ai` route handlers.
//!
//! | Method | Path | Notes |
//! |---|---|---|
//! | GET | `/prompt?userId&message` | stateful, plain-text reply |
//! | GET | `/{userId}/history` | JSON array of messages |
//! | DELETE | `/{userId}/history` | plain-text confirmation |
//! | POST | `/chat` | stateless, trigger-gated policy |
//! | GET | `/health` | liveness |
//! | POST | `/create-dataset` | stateless, unconditional policy |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use discovery_agent::{PolicyMode, TurnOutcome};
use discovery_core::message::{ChatMessage, ConversationId};

use crate::SharedState;

const DEFAULT_PROMPT_MESSAGE: &str = "qui es tu ?";
const SERVICE_NAME: &str = "Discovery Intech MCP Chat";
const FEATURES: [&str; 4] = ["chat", "history", "dataset-creation", "email-notification"];

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/prompt", get(prompt_handler))
        .route("/{userId}/history", get(history_handler).delete(clear_history_handler))
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .route("/create-dataset", post(create_dataset_handler))
        .with_state(state)
}

/// RFC 3339, UTC, millisecond precision, `Z` suffix.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// --- Error body ---

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(code: StatusCode, error: impl Into<String>, timestamp: String) -> ApiError {
    (
        code,
        Json(ErrorBody {
            error: error.into(),
            timestamp,
            status: None,
        }),
    )
}

fn dataset_error(code: StatusCode, error: impl Into<String>, timestamp: String) -> ApiError {
    let (code, Json(mut body)) = api_error(code, error, timestamp);
    body.status = Some("ERROR");
    (code, Json(body))
}

// --- Stateful prompt ---

#[derive(Debug, Deserialize)]
pub struct PromptParams {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    message: Option<String>,
}

async fn prompt_handler(
    State(state): State<SharedState>,
    Query(params): Query<PromptParams>,
) -> Result<String, ApiError> {
    let Some(user_id) = non_blank(params.user_id) else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "userId is required",
            now_timestamp(),
        ));
    };
    let message = non_blank(params.message).unwrap_or_else(|| DEFAULT_PROMPT_MESSAGE.to_string());
    let request_id = uuid::Uuid::new_v4();

    let injection = state
        .injector
        .apply_with_mode(state.prompt_mode, &message, &now_timestamp());
    info!(
        %request_id,
        user_id = %user_id,
        message_len = message.len(),
        injected = injection.injected,
        "Prompt request received"
    );

    let prompt = state.assembler.build(injection.message);
    let id = ConversationId::from(user_id);

    match state.orchestrator.converse(&prompt, &id, &state.tools).await {
        TurnOutcome::Success(reply) => Ok(reply),
        TurnOutcome::Failure { kind, .. } => {
            warn!(%request_id, user_id = %id, kind = kind.as_str(), "Returning fallback reply");
            Ok(state.fallback_message.clone())
        }
    }
}

// --- History ---

async fn history_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Json<Vec<ChatMessage>> {
    Json(state.memory.get(&ConversationId::from(user_id)).await)
}

async fn clear_history_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> String {
    state.memory.clear(&ConversationId::from(user_id.as_str())).await;
    info!(user_id = %user_id, "Conversation history cleared");
    format!("Conversation history cleared for user: {user_id}")
}

// --- Stateless chat ---

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    message: Option<String>,
    timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    message: String,
    response: String,
    timestamp: String,
    response_timestamp: String,
    email_instruction_provided: bool,
    email_notification_detected: bool,
}

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(%rejection, "Rejected chat body");
        api_error(StatusCode::BAD_REQUEST, rejection.body_text(), now_timestamp())
    })?;
    let timestamp = non_blank(payload.timestamp).unwrap_or_else(now_timestamp);
    let Some(message) = non_blank(payload.message) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Message is required", timestamp));
    };

    let injection = state.injector.apply(&message, &timestamp);
    info!(
        message_len = message.len(),
        injected = injection.injected,
        "Chat request received"
    );

    match state
        .orchestrator
        .converse_stateless(&injection.message, &state.tools)
        .await
    {
        TurnOutcome::Success(response) => {
            let verdict = state.classifier.classify(&response);
            Ok(Json(ChatResponse {
                message,
                response,
                timestamp,
                response_timestamp: now_timestamp(),
                email_instruction_provided: injection.injected,
                email_notification_detected: verdict.is_confirmed(),
            }))
        }
        TurnOutcome::Failure { detail, .. } => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            detail,
            now_timestamp(),
        )),
    }
}

// --- Health ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    timestamp: String,
    features: [&'static str; 4],
    mcp_tools_connected: bool,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        service: SERVICE_NAME,
        timestamp: now_timestamp(),
        features: FEATURES,
        mcp_tools_connected: !state.tools.is_empty(),
    })
}

// --- Dataset creation ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatasetRequest {
    topic: Option<String>,
    custom_query: Option<String>,
    timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatasetResponse {
    original_query: String,
    response: String,
    topic: String,
    timestamp: String,
    response_timestamp: String,
    email_notification_confirmed: bool,
    status: &'static str,
}

async fn create_dataset_handler(
    State(state): State<SharedState>,
    payload: Result<Json<CreateDatasetRequest>, JsonRejection>,
) -> Result<Json<CreateDatasetResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(%rejection, "Rejected dataset body");
        dataset_error(StatusCode::BAD_REQUEST, rejection.body_text(), now_timestamp())
    })?;
    let timestamp = non_blank(payload.timestamp).unwrap_or_else(now_timestamp);
    let topic = non_blank(payload.topic);

    let query = match (non_blank(payload.custom_query), &topic) {
        (Some(custom), _) => custom,
        (None, Some(topic)) => format!("Créez un dataset sur {topic}"),
        (None, None) => {
            return Err(dataset_error(
                StatusCode::BAD_REQUEST,
                "Either topic or customQuery is required",
                timestamp,
            ));
        }
    };

    let injection = state
        .injector
        .apply_with_mode(PolicyMode::Unconditional, &query, &timestamp);
    info!(topic = topic.as_deref().unwrap_or("custom"), "Dataset creation requested");

    match state
        .orchestrator
        .converse_stateless(&injection.message, &state.tools)
        .await
    {
        TurnOutcome::Success(response) => {
            let verdict = state.classifier.classify(&response);
            Ok(Json(CreateDatasetResponse {
                original_query: query,
                response,
                topic: topic.unwrap_or_else(|| "custom".into()),
                timestamp,
                response_timestamp: now_timestamp(),
                email_notification_confirmed: verdict.is_confirmed(),
                status: "SUCCESS",
            }))
        }
        TurnOutcome::Failure { detail, .. } => Err(dataset_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            detail,
            now_timestamp(),
        )),
    }
}
