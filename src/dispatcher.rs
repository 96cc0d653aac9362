//! Input dispatch.
//!
//! [`Dispatcher::process`] resolves each input in three steps: an exact
//! command name, then the longest command name the input starts with, then
//! the conversational backend. Whatever the outcome, exactly one turn is
//! recorded and a reply string is returned; failures never escape.

use crate::commands::{CommandRegistry, Handler};
use crate::context::{CommandType, ContextTracker};
use crate::llm::ConversationBackend;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Reply when a command handler fails.
pub const HANDLER_FAILED: &str = "I'm having trouble with that. Could you try rephrasing?";
/// Reply for unmatched input when no conversational backend is configured.
pub const CONVERSATION_UNAVAILABLE: &str = "Conversation features are not available.";

/// Resolves inputs against a frozen command registry.
pub struct Dispatcher {
    registry: CommandRegistry,
    context: Arc<ContextTracker>,
    backend: Option<Arc<dyn ConversationBackend>>,
}

impl Dispatcher {
    pub fn new(
        registry: CommandRegistry,
        context: Arc<ContextTracker>,
        backend: Option<Arc<dyn ConversationBackend>>,
    ) -> Self {
        tracing::info!(
            commands = ?registry.sorted_names(),
            conversation = backend.is_some(),
            "dispatcher ready"
        );
        Self {
            registry,
            context,
            backend,
        }
    }

    /// The command registry (read-only).
    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// The shared context tracker.
    #[must_use]
    pub fn context(&self) -> &Arc<ContextTracker> {
        &self.context
    }

    /// Resolve `raw_input`, run it, record the turn and return the reply.
    pub async fn process(&self, raw_input: &str) -> String {
        let input = normalize(raw_input);
        debug!(input = %input, "processing input");

        let (response, command_type) = if let Some(handler) = self.registry.lookup(&input) {
            debug!(command = %input, "exact command match");
            let response = run_handler(input.clone(), Arc::clone(handler), String::new()).await;
            (response, CommandType::ExactMatch)
        } else if let Some((name, handler)) = self.registry.longest_prefix(&input) {
            let args = input[name.len()..].trim().to_owned();
            debug!(command = %name, args = %args, "prefix command match");
            let response = run_handler(name.to_owned(), Arc::clone(handler), args).await;
            (response, CommandType::PrefixMatch)
        } else {
            debug!("no command matched, treating as conversation");
            (self.converse(&input).await, CommandType::Conversation)
        };

        self.context.record(&input, &response, Some(command_type));
        response
    }

    async fn converse(&self, input: &str) -> String {
        let Some(backend) = &self.backend else {
            warn!("conversation requested but no backend is configured");
            return CONVERSATION_UNAVAILABLE.to_owned();
        };
        // Snapshot before this turn is recorded; the lock is not held across the call.
        let history = self
            .context
            .recent_turns(self.context.default_recent_turns());
        match backend.reply(input, &history).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(model = backend.model_id(), "conversation backend error: {e}");
                e.advisory().to_owned()
            }
        }
    }
}

/// Lowercase and trim.
#[must_use]
pub fn normalize(raw_input: &str) -> String {
    raw_input.trim().to_lowercase()
}

/// Run a handler on the blocking pool; handlers may do blocking I/O.
async fn run_handler(name: String, handler: Handler, args: String) -> String {
    tokio::task::spawn_blocking(move || invoke(&name, &handler, &args))
        .await
        .unwrap_or_else(|e| {
            error!("command handler task failed: {e}");
            HANDLER_FAILED.to_owned()
        })
}

/// Call a handler, turning errors and panics into the generic apology.
fn invoke(name: &str, handler: &Handler, args: &str) -> String {
    match catch_unwind(AssertUnwindSafe(|| handler(args))) {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!(command = %name, "command handler failed: {e}");
            HANDLER_FAILED.to_owned()
        }
        Err(_) => {
            error!(command = %name, "command handler panicked");
            HANDLER_FAILED.to_owned()
        }
    }
}
