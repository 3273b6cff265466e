//! Tool implementations for Discovery AI.
//!
//! The registry built here is what the orchestrator hands to the model on
//! every turn. Today it holds the email notification tool that the
//! dataset policy makes mandatory.

pub mod send_email;

use discovery_core::tool::ToolRegistry;

pub use send_email::{OutboundEmail, SendEmailTool};

/// Create the default tool registry from configuration.
pub fn default_registry(config: &discovery_config::AppConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SendEmailTool::from_config(&config.email)));
    registry
}
