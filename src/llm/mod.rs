//! Conversational fallback backends.
//!
//! Input that matches no command is answered by a [`ConversationBackend`],
//! given the current text and a short window of earlier turns.

mod chat_api;
pub mod error;

pub use chat_api::ChatCompletionsBackend;
pub use error::BackendError;

use crate::context::Turn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Produces a natural-language reply for unmatched input.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Reply to `input`, continuing the conversation in `history`
    /// (chronological, oldest first, not including `input`).
    ///
    /// # Errors
    ///
    /// Returns a classified [`BackendError`]; callers show its advisory.
    async fn reply(&self, input: &str, history: &[Turn]) -> Result<String, BackendError>;

    /// Model identifier, for logs.
    fn model_id(&self) -> &str;
}

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat-completions request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Lay out a request: persona, then each prior turn as a user/assistant
/// pair, then the current input.
pub fn build_messages(system_prompt: &str, history: &[Turn], input: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::new(Role::System, system_prompt));
    for turn in history {
        messages.push(ChatMessage::new(Role::User, turn.user_input.as_str()));
        messages.push(ChatMessage::new(Role::Assistant, turn.assistant_response.as_str()));
    }
    messages.push(ChatMessage::new(Role::User, input));
    messages
}
