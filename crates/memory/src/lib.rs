//! Conversation memory implementations for Discovery AI.

pub mod window;

pub use window::WindowChatMemory;
