//! Conversation context tracking.
//!
//! [`ContextTracker`] wraps the [`TurnStore`] together with a single
//! "current context" slot that command handlers use to leave state for later
//! turns. One mutex guards both, so summaries always see a consistent view.

mod history;

pub use history::{CommandType, Turn, TurnStore};

use crate::config::ContextConfig;
use chrono::Utc;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Opaque structured state stored in the current-context slot.
pub type ContextValue = serde_json::Map<String, serde_json::Value>;

/// Text returned by [`ContextTracker::summarize`] when no turns survive.
pub const NO_CONTEXT_MESSAGE: &str = "No recent conversation context.";

/// Number of turns used by [`ContextTracker::summarize`].
pub const SUMMARY_TURNS: usize = 3;

#[derive(Debug)]
struct ContextState {
    turns: TurnStore,
    current: Option<ContextValue>,
}

/// Thread-safe conversation history plus the current-context slot.
#[derive(Debug)]
pub struct ContextTracker {
    state: Mutex<ContextState>,
    recent_turns: usize,
}

impl ContextTracker {
    /// Create a tracker from configuration.
    #[must_use]
    pub fn new(config: &ContextConfig) -> Self {
        Self::with_limits(
            config.max_history,
            config.context_timeout(),
            config.recent_turns,
        )
    }

    /// Create a tracker with explicit bounds.
    #[must_use]
    pub fn with_limits(max_history: usize, context_timeout: Duration, recent_turns: usize) -> Self {
        Self {
            state: Mutex::new(ContextState {
                turns: TurnStore::new(max_history, context_timeout),
                current: None,
            }),
            recent_turns,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an exchange with the current timestamp.
    pub fn record(
        &self,
        user_input: &str,
        assistant_response: &str,
        command_type: Option<CommandType>,
    ) {
        let turn = Turn::new(user_input, assistant_response, command_type);
        tracing::debug!(
            input = %turn.user_input,
            command_type = ?turn.command_type,
            "recording conversation turn"
        );
        self.lock().turns.push(turn);
    }

    /// The configured number of turns handed to the conversational backend.
    #[must_use]
    pub fn default_recent_turns(&self) -> usize {
        self.recent_turns
    }

    /// Expire stale turns, then return up to `n` of the latest, oldest first.
    pub fn recent_turns(&self, n: usize) -> Vec<Turn> {
        self.lock().turns.recent(n, Utc::now())
    }

    /// Replace the current context.
    pub fn set_current_context(&self, value: ContextValue) {
        tracing::debug!(keys = value.len(), "set current context");
        self.lock().current = Some(value);
    }

    /// A copy of the current context, if any.
    #[must_use]
    pub fn current_context(&self) -> Option<ContextValue> {
        self.lock().current.clone()
    }

    /// Drop the current context. History is left untouched.
    pub fn clear_current_context(&self) {
        self.lock().current = None;
        tracing::debug!("cleared current context");
    }

    /// Human-readable rendering of the latest turns and the current context.
    pub fn summarize(&self) -> String {
        let mut state = self.lock();
        let recent = state.turns.recent(SUMMARY_TURNS, Utc::now());
        if recent.is_empty() {
            return NO_CONTEXT_MESSAGE.to_owned();
        }

        let mut summary = String::from("Recent conversation context:\n");
        for turn in &recent {
            let _ = writeln!(summary, "- User: {}", turn.user_input);
            let _ = writeln!(summary, "  Assistant: {}", turn.assistant_response);
        }

        if let Some(current) = state.current.as_ref().filter(|c| !c.is_empty()) {
            let rendered = serde_json::to_string(current).unwrap_or_default();
            let _ = write!(summary, "\nCurrent context: {rendered}");
        }

        summary
    }
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new(&ContextConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn value(v: serde_json::Value) -> ContextValue {
        match v {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn record_then_read_back() {
        let tracker = ContextTracker::default();
        tracker.record(
            "open github.com",
            "Opening https://github.com",
            Some(CommandType::PrefixMatch),
        );
        tracker.record("hello", "Good evening.", Some(CommandType::Conversation));

        let recent = tracker.recent_turns(3);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user_input, "open github.com");
        assert_eq!(recent[1].command_type, Some(CommandType::Conversation));
    }

    #[test]
    fn capacity_bound_holds() {
        let tracker = ContextTracker::with_limits(2, Duration::from_secs(300), 3);
        for i in 0..5 {
            tracker.record(&format!("q{i}"), "a", None);
        }
        let recent = tracker.recent_turns(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user_input, "q3");
        assert_eq!(recent[1].user_input, "q4");
    }

    #[test]
    fn zero_timeout_expires_everything_on_read() {
        let tracker = ContextTracker::with_limits(10, Duration::ZERO, 3);
        tracker.record("hello", "hi", Some(CommandType::Conversation));
        assert!(tracker.recent_turns(3).is_empty());
        assert_eq!(tracker.summarize(), NO_CONTEXT_MESSAGE);
    }

    #[test]
    fn current_context_last_write_wins() {
        let tracker = ContextTracker::default();
        assert!(tracker.current_context().is_none());

        tracker.set_current_context(value(json!({"topic": "a", "extra": 1})));
        tracker.set_current_context(value(json!({"topic": "b"})));

        let current = tracker.current_context().unwrap();
        assert_eq!(current.get("topic"), Some(&json!("b")));
        assert!(current.get("extra").is_none());

        tracker.clear_current_context();
        assert!(tracker.current_context().is_none());
    }

    #[test]
    fn summary_without_history() {
        let tracker = ContextTracker::default();
        tracker.set_current_context(value(json!({"topic": "weather"})));
        assert_eq!(tracker.summarize(), NO_CONTEXT_MESSAGE);
    }

    #[test]
    fn summary_renders_turns_and_context() {
        let tracker = ContextTracker::default();
        tracker.record("hello", "Good evening.", Some(CommandType::Conversation));
        tracker.set_current_context(value(json!({"site": "github.com"})));

        let summary = tracker.summarize();
        assert_eq!(
            summary,
            "Recent conversation context:\n\
             - User: hello\n  Assistant: Good evening.\n\
             \nCurrent context: {\"site\":\"github.com\"}"
        );
    }

    #[test]
    fn summary_uses_last_three_turns() {
        let tracker = ContextTracker::default();
        for i in 0..5 {
            tracker.record(&format!("q{i}"), &format!("a{i}"), None);
        }
        let summary = tracker.summarize();
        assert!(!summary.contains("q1"));
        assert!(summary.contains("q2"));
        assert!(summary.contains("q4"));
    }

    #[test]
    fn summary_is_idempotent() {
        let tracker = ContextTracker::default();
        tracker.record("one", "1", None);
        tracker.record("two", "2", None);
        assert_eq!(tracker.summarize(), tracker.summarize());
    }

    #[test]
    fn concurrent_records_respect_capacity() {
        let tracker = Arc::new(ContextTracker::with_limits(5, Duration::from_secs(300), 3));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        tracker.record(&format!("t{t}-{i}"), "ok", None);
                        let _ = tracker.recent_turns(3);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.recent_turns(100).len(), 5);
    }
}
