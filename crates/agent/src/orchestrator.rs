//! The model turn: history splice, tool-call loop and memory commit.

use discovery_core::error::{Error, ToolError};
use discovery_core::memory::ChatMemory;
use discovery_core::message::{ChatMessage, ConversationId};
use discovery_core::provider::{Provider, ProviderRequest};
use discovery_core::tool::{ToolCall, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Returned as the reply when the model keeps requesting tools.
pub const ITERATION_LIMIT_TEXT: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Provider,
    Tool,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Provider => "provider",
            Self::Tool => "tool",
        }
    }
}

/// Result of one turn. Failures are values, never panics or `Err`s, so
/// each entry point decides its own degraded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Success(String),
    Failure { kind: FailureKind, detail: String },
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    fn from_error(error: Error) -> Self {
        let kind = match &error {
            Error::Provider(_) => FailureKind::Provider,
            Error::Tool(_) => FailureKind::Tool,
        };
        Self::Failure {
            kind,
            detail: error.to_string(),
        }
    }
}

pub struct ModelOrchestrator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    memory: Arc<dyn ChatMemory>,
    timeout: Duration,
    max_tool_iterations: u32,
}

impl ModelOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        memory: Arc<dyn ChatMemory>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            memory,
            timeout: Duration::from_secs(60),
            max_tool_iterations: 10,
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Clamped to at least one model call per turn.
    pub fn with_max_tool_iterations(mut self, max: u32) -> Self {
        self.max_tool_iterations = max.max(1);
        self
    }

    /// Run a stateful turn for `id`.
    ///
    /// The model sees `[system, history..., user]`. Only a successful turn
    /// is written back, as `[user, assistant]` in one `append_all`, so a
    /// failed or timed-out turn leaves the log exactly as it was.
    pub async fn converse(
        &self,
        prompt: &crate::prompt::Prompt,
        id: &ConversationId,
        tools: &ToolRegistry,
    ) -> TurnOutcome {
        let history = self.memory.get(id).await;
        info!(conversation_id = %id, history = history.len(), "Processing conversation turn");

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(prompt.system.clone());
        messages.extend(history);
        messages.push(prompt.user.clone());

        let outcome = self.run_with_timeout(messages, tools).await;
        if let TurnOutcome::Success(text) = &outcome {
            self.memory
                .append_all(id, vec![prompt.user.clone(), ChatMessage::assistant(text.clone())])
                .await;
        }
        outcome
    }

    /// Run a single turn with no system template and no memory.
    pub async fn converse_stateless(&self, message: &str, tools: &ToolRegistry) -> TurnOutcome {
        info!("Processing stateless turn");
        self.run_with_timeout(vec![ChatMessage::user(message)], tools)
            .await
    }

    async fn run_with_timeout(&self, messages: Vec<ChatMessage>, tools: &ToolRegistry) -> TurnOutcome {
        let outcome = match tokio::time::timeout(self.timeout, self.tool_loop(messages, tools)).await {
            Ok(Ok(text)) => TurnOutcome::Success(text),
            Ok(Err(e)) => TurnOutcome::from_error(e),
            Err(_) => TurnOutcome::Failure {
                kind: FailureKind::Timeout,
                detail: format!("model turn exceeded {}s", self.timeout.as_secs()),
            },
        };

        if let TurnOutcome::Failure { kind, detail } = &outcome {
            warn!(kind = kind.as_str(), %detail, "Model turn failed");
        }
        outcome
    }

    async fn tool_loop(&self, mut messages: Vec<ChatMessage>, tools: &ToolRegistry) -> Result<String, Error> {
        let tool_definitions = tools.definitions();

        for iteration in 1..=self.max_tool_iterations {
            debug!(iteration, messages = messages.len(), "Model loop iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = self.provider.complete(request).await?;

            if response.message.tool_calls.is_empty() {
                return Ok(response.message.content);
            }

            debug!(tool_count = response.message.tool_calls.len(), "Executing tool calls");

            let tool_calls = response.message.tool_calls.clone();
            messages.push(response.message);

            for tc in &tool_calls {
                let arguments = serde_json::from_str(&tc.arguments).map_err(|e| {
                    ToolError::InvalidArguments(format!("{}: {e}", tc.name))
                })?;
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };

                let result = tools.execute(&call).await?;
                debug!(tool = %tc.name, success = result.success, "Tool executed");
                messages.push(ChatMessage::tool_result(&tc.id, &result.output));
            }
        }

        warn!(
            iterations = self.max_tool_iterations,
            "Max tool iterations reached, returning fixed reply"
        );
        Ok(ITERATION_LIMIT_TEXT.into())
    }
}
