//! Email notification tool.
//!
//! With a relay configured, each call POSTs `{from, to, subject, body}` as
//! JSON to the relay. Without one, the email lands in an in-process outbox
//! and is logged, which keeps local runs and tests free of network access.
//! The outbox holds at most `capacity` emails; the oldest is dropped first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use discovery_core::error::ToolError;
use discovery_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub const TOOL_NAME: &str = "send_email";
pub const DEFAULT_OUTBOX_CAPACITY: usize = 100;

/// An email accepted by the tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub accepted_at: DateTime<Utc>,
}

pub struct SendEmailTool {
    sender: String,
    relay_url: Option<String>,
    client: reqwest::Client,
    outbox: Arc<Mutex<VecDeque<OutboundEmail>>>,
    capacity: usize,
}

impl SendEmailTool {
    pub fn new(sender: impl Into<String>, relay_url: Option<String>) -> Self {
        Self {
            sender: sender.into(),
            relay_url,
            client: reqwest::Client::new(),
            outbox: Arc::new(Mutex::new(VecDeque::new())),
            capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }

    /// Clamped to at least one email.
    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn from_config(config: &discovery_config::EmailConfig) -> Self {
        Self::new(&config.sender, config.relay_url.clone()).with_outbox_capacity(config.outbox_capacity)
    }

    /// Handle on the most recent emails accepted without a relay.
    pub fn outbox(&self) -> Arc<Mutex<VecDeque<OutboundEmail>>> {
        self.outbox.clone()
    }

    fn enqueue(&self, email: OutboundEmail) {
        let mut outbox = self.outbox.lock().unwrap_or_else(|e| e.into_inner());
        while outbox.len() >= self.capacity {
            if let Some(dropped) = outbox.pop_front() {
                debug!(to = %dropped.to, "Outbox full, dropping oldest email");
            }
        }
        outbox.push_back(email);
    }

    async fn relay(&self, url: &str, email: &OutboundEmail) -> Result<(), ToolError> {
        let response = self
            .client
            .post(url)
            .json(email)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: format!("relay returned {}", response.status()),
            });
        }
        Ok(())
    }
}

fn required_str<'a>(arguments: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Send an email notification. Use it to tell the team that a dataset \
         has been generated, with its topic, element count and timestamp."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "to": {
                    "type": "string",
                    "description": "Recipient email address"
                },
                "subject": {
                    "type": "string",
                    "description": "Subject line"
                },
                "body": {
                    "type": "string",
                    "description": "Plain-text message body"
                }
            },
            "required": ["to", "subject", "body"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let to = required_str(&arguments, "to")?;
        if !to.contains('@') {
            return Err(ToolError::InvalidArguments(format!(
                "'to' is not an email address: {to}"
            )));
        }

        let email = OutboundEmail {
            from: self.sender.clone(),
            to: to.to_string(),
            subject: required_str(&arguments, "subject")?.to_string(),
            body: required_str(&arguments, "body")?.to_string(),
            accepted_at: Utc::now(),
        };

        let delivery = match &self.relay_url {
            Some(url) => {
                self.relay(url, &email).await?;
                "relayed"
            }
            None => {
                self.enqueue(email.clone());
                "queued"
            }
        };

        info!(to = %email.to, subject = %email.subject, delivery, "Email notification accepted");

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: format!("Email {delivery} for {}", email.to),
            data: serde_json::to_value(&email).ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};

    fn args() -> serde_json::Value {
        serde_json::json!({
            "to": "team@example.com",
            "subject": "Dataset créé : chats",
            "body": "42 éléments"
        })
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/send")
    }

    #[tokio::test]
    async fn queues_without_relay() {
        let tool = SendEmailTool::new("bot@example.com", None);
        let result = tool.execute(args()).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("queued"));

        let outbox = tool.outbox();
        let sent = outbox.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "bot@example.com");
        assert_eq!(sent[0].subject, "Dataset créé : chats");
    }

    #[tokio::test]
    async fn outbox_keeps_only_most_recent() {
        let tool = SendEmailTool::new("bot@example.com", None).with_outbox_capacity(3);
        for i in 0..5 {
            let mut arguments = args();
            arguments["subject"] = serde_json::json!(format!("n{i}"));
            tool.execute(arguments).await.unwrap();
        }

        let outbox = tool.outbox();
        let sent = outbox.lock().unwrap();
        let subjects: Vec<&str> = sent.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, ["n2", "n3", "n4"]);
    }

    #[tokio::test]
    async fn outbox_capacity_from_config() {
        let config = discovery_config::EmailConfig {
            outbox_capacity: 1,
            ..Default::default()
        };
        let tool = SendEmailTool::from_config(&config);
        tool.execute(args()).await.unwrap();
        tool.execute(args()).await.unwrap();
        assert_eq!(tool.outbox().lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_argument_rejected() {
        let tool = SendEmailTool::new("bot@example.com", None);
        let err = tool
            .execute(serde_json::json!({"to": "team@example.com", "subject": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("body")));
    }

    #[tokio::test]
    async fn bad_recipient_rejected() {
        let tool = SendEmailTool::new("bot@example.com", None);
        let mut arguments = args();
        arguments["to"] = serde_json::json!("nobody");
        assert!(tool.execute(arguments).await.is_err());
    }

    #[tokio::test]
    async fn relays_to_configured_endpoint() {
        let router = Router::new().route(
            "/send",
            post(|Json(email): Json<OutboundEmail>| async move {
                assert_eq!(email.to, "team@example.com");
                StatusCode::ACCEPTED
            }),
        );
        let url = serve(router).await;
        let tool = SendEmailTool::new("bot@example.com", Some(url));

        let result = tool.execute(args()).await.unwrap();
        assert!(result.output.contains("relayed"));
        assert!(tool.outbox().lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn relay_failure_is_execution_error() {
        let router = Router::new().route("/send", post(|| async { StatusCode::BAD_GATEWAY }));
        let url = serve(router).await;
        let tool = SendEmailTool::new("bot@example.com", Some(url));

        let err = tool.execute(args()).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
