//! J.A.R.V.I.S.: a text and voice command assistant.
//!
//! Typed or spoken input is resolved in order against:
//! - **Exact commands**: the whole input is a registered command name
//! - **Prefix commands**: the longest command name the input starts with,
//!   with the rest of the input passed as arguments
//! - **Conversation**: anything else goes to a remote chat-completions model,
//!   along with the last few turns of history
//!
//! Every exchange is recorded in a bounded, time-limited turn history.

pub mod assistant;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod llm;
pub mod session;
pub mod voice;

pub use assistant::{Assistant, Collaborators};
pub use commands::{CommandRegistry, Handler};
pub use config::AssistantConfig;
pub use context::{CommandType, ContextTracker, Turn};
pub use dispatcher::Dispatcher;
pub use error::{AssistantError, Result};
pub use llm::{BackendError, ChatCompletionsBackend, ConversationBackend};
pub use session::{InputEvent, Session, SpokenCommand};
pub use voice::VoiceHandler;
