//! Commands that inspect or reset the conversation context.

use super::{CommandRegistry, handler};
use crate::context::ContextTracker;
use std::sync::Arc;

/// Reply to `clear context`.
pub const CONTEXT_CLEARED: &str = "Conversation context cleared.";

/// Register `context` and `clear context`.
pub fn register(registry: &mut CommandRegistry, tracker: Arc<ContextTracker>) {
    let summary_tracker = Arc::clone(&tracker);
    registry.register(
        "context",
        handler(move |_| Ok(summary_tracker.summarize())),
    );
    registry.register(
        "clear context",
        handler(move |_| {
            tracker.clear_current_context();
            Ok(CONTEXT_CLEARED.to_owned())
        }),
    );
    tracing::info!("context commands registered");
}
