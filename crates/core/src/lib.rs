//! # Discovery AI Core
//!
//! Domain types, traits, and error definitions for the Discovery AI chat
//! facade. This crate has **no framework dependencies**: it defines the
//! model that the memory, provider, tool, agent and gateway crates
//! implement against.
//!
//! ## Seams
//!
//! - [`Provider`]: the model client ("submit a prompt + tools, get text back")
//! - [`Tool`] / [`ToolRegistry`]: capabilities handed to the model
//! - [`ChatMemory`]: the bounded per-conversation message log

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use memory::ChatMemory;
pub use message::{ChatMessage, ConversationId, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
