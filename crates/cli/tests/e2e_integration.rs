//! End-to-end integration tests for the Discovery AI facade.
//!
//! These drive the full HTTP router: policy injection, prompt assembly,
//! the model tool loop, the email tool, compliance classification and
//! conversation memory.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use discovery_agent::policy::parse_instruction;
use discovery_agent::{PromptAssembler, SystemTemplate};
use discovery_config::AppConfig;
use discovery_core::error::ProviderError;
use discovery_core::memory::ChatMemory;
use discovery_core::message::{ChatMessage, ConversationId, MessageToolCall, Role};
use discovery_core::provider::{Provider, ProviderRequest, ProviderResponse};
use discovery_core::tool::ToolRegistry;
use discovery_gateway::{AppState, SharedState};
use discovery_memory::WindowChatMemory;
use discovery_tools::SendEmailTool;

// ── Mock providers ───────────────────────────────────────────────────────

/// Numbers its replies: "reply 0", "reply 1", ...
struct CountingProvider {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Provider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(text_response(&format!("reply {n}")))
    }
}

/// Follows the injected instruction the way a compliant model would:
/// first calls `send_email` with the placeholders filled in, then
/// reports completion once it sees the tool result.
struct CompliantModel;

#[async_trait::async_trait]
impl Provider for CompliantModel {
    fn name(&self) -> &str {
        "compliant"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let last = request.messages.last().expect("request has messages");
        if last.role == Role::Tool {
            return Ok(text_response("Dataset created and email sent"));
        }

        let Some(call) = parse_instruction(&last.content) else {
            return Ok(text_response("Voici votre réponse."));
        };
        assert!(request.tools.iter().any(|t| t.name == call["tool"]));

        let mut arguments = call["arguments"].clone();
        for key in ["subject", "body"] {
            let filled = arguments[key]
                .as_str()
                .unwrap()
                .replace("<TOPIC>", "chats")
                .replace("<ELEMENT_COUNT>", "25");
            arguments[key] = serde_json::Value::String(filled);
        }

        let mut message = ChatMessage::assistant("");
        message.tool_calls = vec![MessageToolCall {
            id: "call_1".into(),
            name: call["tool"].as_str().unwrap().into(),
            arguments: arguments.to_string(),
        }];
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "compliant".into(),
        })
    }
}

struct UnreachableModel;

#[async_trait::async_trait]
impl Provider for UnreachableModel {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: ChatMessage::assistant(text),
        usage: None,
        model: "mock".into(),
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

fn state(provider: Arc<dyn Provider>) -> AppState {
    let params = BTreeMap::from([("name".to_string(), "L'assistant IA officiel".to_string())]);
    let assembler = PromptAssembler::new(
        &SystemTemplate::from_source("Tu es {{ name }} de Discovery Intech."),
        &params,
    )
    .unwrap();
    AppState::new(&AppConfig::default(), provider, assembler).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_plain_chat_gets_no_instruction() {
    let app = discovery_gateway::router(Arc::new(state(Arc::new(CompliantModel))));

    let (status, body) = send(&app, post_json("/discovery-ai/chat", serde_json::json!({"message": "hello"}))).await;
    assert_eq!(status, StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["emailInstructionProvided"], false);
    assert_eq!(body["emailNotificationDetected"], false);
    assert_eq!(body["response"], "Voici votre réponse.");
}

#[tokio::test]
async fn e2e_dataset_chat_sends_email_and_confirms() {
    let mut state = state(Arc::new(CompliantModel));
    let tool = SendEmailTool::new("assistant@discovery-intech.com", None);
    let outbox = tool.outbox();
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(tool));
    state.tools = registry;
    let app = discovery_gateway::router(Arc::new(state));

    let (status, body) = send(
        &app,
        post_json(
            "/discovery-ai/chat",
            serde_json::json!({
                "message": "Créez un dataset sur les chats",
                "timestamp": "2026-10-14T10:00:00.000Z"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["emailInstructionProvided"], true);
    assert_eq!(body["response"], "Dataset created and email sent");
    assert_eq!(body["emailNotificationDetected"], true);

    let sent = outbox.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "datasets@discovery-intech.com");
    assert_eq!(sent[0].subject, "Dataset généré : chats");
    assert!(sent[0].body.contains("25 éléments"));
    assert!(sent[0].body.contains("2026-10-14T10:00:00.000Z"));
}

#[tokio::test]
async fn e2e_create_dataset_without_input_is_rejected() {
    let app = discovery_gateway::router(Arc::new(state(Arc::new(CompliantModel))));

    let (status, body) = send(&app, post_json("/discovery-ai/create-dataset", serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    assert_eq!(body["status"], "ERROR");
}

#[tokio::test]
async fn e2e_create_dataset_runs_email_tool() {
    let mut state = state(Arc::new(CompliantModel));
    let tool = SendEmailTool::new("assistant@discovery-intech.com", None);
    let outbox = tool.outbox();
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(tool));
    state.tools = registry;
    let app = discovery_gateway::router(Arc::new(state));

    let (status, body) = send(
        &app,
        post_json("/discovery-ai/create-dataset", serde_json::json!({"customQuery": "liste de 25 chats"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "SUCCESS");
    assert_eq!(body["topic"], "custom");
    assert_eq!(body["emailNotificationConfirmed"], true);
    assert_eq!(outbox.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn e2e_history_keeps_last_hundred_messages() {
    let shared: SharedState = Arc::new(state(Arc::new(CountingProvider {
        calls: AtomicUsize::new(0),
    })));
    let app = discovery_gateway::router(shared.clone());

    // 75 turns = 150 messages against a window of 100
    for i in 0..75 {
        let (status, _) = send(&app, get(&format!("/discovery-ai/prompt?userId=alice&message=turn%20{i}"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(&app, get("/discovery-ai/alice/history")).await;
    let history: Vec<ChatMessage> = serde_json::from_str(&body).unwrap();
    assert_eq!(history.len(), 100);

    let ordinals: Vec<u64> = history.iter().map(|m| m.ordinal).collect();
    assert_eq!(ordinals, (50..150).collect::<Vec<u64>>());
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "turn 25");
    assert_eq!(history[99].content, "reply 74");

    // other users are unaffected
    assert!(shared.memory.get(&ConversationId::from("bob")).await.is_empty());
}

#[tokio::test]
async fn e2e_window_memory_single_appends() {
    let memory = WindowChatMemory::new(100);
    let id = ConversationId::from("scenario-4");
    for i in 0..150 {
        memory.append(&id, ChatMessage::user(format!("m{i}"))).await;
    }

    let log = memory.get(&id).await;
    assert_eq!(log.len(), 100);
    assert_eq!(log.first().unwrap().content, "m50");
    assert_eq!(log.last().unwrap().content, "m149");
}

#[tokio::test]
async fn e2e_model_failure_is_contained() {
    let shared: SharedState = Arc::new(state(Arc::new(UnreachableModel)));
    let app = discovery_gateway::router(shared.clone());

    let (status, body) = send(&app, get("/discovery-ai/prompt?userId=dave&message=dataset%20de%20villes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "Désolé, je n'ai pas pu accéder aux informations demandées. Veuillez réessayer ou contacter le support."
    );
    assert!(shared.memory.get(&ConversationId::from("dave")).await.is_empty());

    let (status, body) = send(&app, post_json("/discovery-ai/chat", serde_json::json!({"message": "hello"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("connection refused"));

    let (status, body) = send(&app, post_json("/discovery-ai/create-dataset", serde_json::json!({"topic": "villes"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "ERROR");
}

#[tokio::test]
async fn e2e_clear_then_continue() {
    let shared: SharedState = Arc::new(state(Arc::new(CountingProvider {
        calls: AtomicUsize::new(0),
    })));
    let app = discovery_gateway::router(shared.clone());

    send(&app, get("/discovery-ai/prompt?userId=erin&message=un")).await;
    let (status, body) = send(
        &app,
        Request::builder()
            .method(Method::DELETE)
            .uri("/discovery-ai/erin/history")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Conversation history cleared for user: erin");
    assert_eq!(shared.memory.conversation_count().await, 0);

    send(&app, get("/discovery-ai/prompt?userId=erin&message=deux")).await;
    let history = shared.memory.get(&ConversationId::from("erin")).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].ordinal, 0);
    assert_eq!(history[0].content, "deux");
}
