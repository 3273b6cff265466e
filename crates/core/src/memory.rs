//! ChatMemory trait, the bounded per-conversation message log.
//!
//! Implementations own every log exclusively; nothing else mutates one.
//! The contract is infallible: memory is process-local, so appends,
//! reads and clears always succeed.

use async_trait::async_trait;
use crate::message::{ChatMessage, ConversationId};

/// The core ChatMemory trait.
///
/// Implementations: `WindowChatMemory` (bounded FIFO window).
#[async_trait]
pub trait ChatMemory: Send + Sync {
    /// Append one message to the end of the log, evicting the oldest entry
    /// when the log would exceed its window.
    async fn append(&self, id: &ConversationId, message: ChatMessage) {
        self.append_all(id, vec![message]).await;
    }

    /// Append several messages under one critical section for `id`.
    async fn append_all(&self, id: &ConversationId, messages: Vec<ChatMessage>);

    /// The full current log in insertion order; empty for unknown ids.
    async fn get(&self, id: &ConversationId) -> Vec<ChatMessage>;

    /// Remove the log for `id`. Clearing an unknown id is a no-op.
    async fn clear(&self, id: &ConversationId);

    /// Number of conversations currently holding a log.
    async fn conversation_count(&self) -> usize;
}
