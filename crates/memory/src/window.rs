//! Window memory: the last `max_messages` messages of every conversation.
//!
//! Eviction is strict FIFO by insertion order and ignores roles, so a system
//! message ages out exactly like a user or assistant one.

use async_trait::async_trait;
use dashmap::DashMap;
use discovery_core::memory::ChatMemory;
use discovery_core::message::{ChatMessage, ConversationId};
use std::collections::VecDeque;
use tracing::trace;

/// Default conversation window.
pub const DEFAULT_MAX_MESSAGES: usize = 100;

#[derive(Debug, Default)]
struct ConversationLog {
    messages: VecDeque<ChatMessage>,
    /// Ordinal handed to the next appended message. Survives eviction,
    /// reset by clear.
    next_ordinal: u64,
}

/// A bounded in-process memory keyed by conversation id.
///
/// Every mutation of one conversation runs under that key's shard lock, so
/// racing appends and clears on the same id serialize while unrelated ids
/// proceed independently. No lock is ever held across an `.await`.
pub struct WindowChatMemory {
    max_messages: usize,
    logs: DashMap<ConversationId, ConversationLog>,
}

impl WindowChatMemory {
    /// Create a memory keeping at most `max_messages` per conversation.
    /// A window of zero is treated as one.
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages: max_messages.max(1),
            logs: DashMap::new(),
        }
    }
}

impl Default for WindowChatMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

#[async_trait]
impl ChatMemory for WindowChatMemory {
    async fn append_all(&self, id: &ConversationId, messages: Vec<ChatMessage>) {
        let mut log = self.logs.entry(id.clone()).or_default();
        for mut message in messages {
            message.ordinal = log.next_ordinal;
            log.next_ordinal += 1;
            log.messages.push_back(message);
            if log.messages.len() > self.max_messages {
                log.messages.pop_front();
            }
        }
        trace!(conversation_id = %id, len = log.messages.len(), "Appended to conversation log");
    }

    async fn get(&self, id: &ConversationId) -> Vec<ChatMessage> {
        self.logs
            .get(id)
            .map(|log| log.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn clear(&self, id: &ConversationId) {
        self.logs.remove(id);
    }

    async fn conversation_count(&self) -> usize {
        self.logs.len()
    }
}
