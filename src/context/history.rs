//! Conversation turn storage.
//!
//! Keeps the most recent exchanges in insertion order. Two independent bounds
//! apply: a capacity (oldest turn evicted on overflow) and an age limit that
//! is enforced lazily whenever the history is read.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// How the dispatcher resolved an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    /// The input was exactly a registered command name.
    ExactMatch,
    /// The input started with a registered command name.
    PrefixMatch,
    /// No command matched; the conversational backend answered.
    Conversation,
}

impl CommandType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactMatch => "exact_match",
            Self::PrefixMatch => "prefix_match",
            Self::Conversation => "conversation",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
    /// What the user said or typed (normalized).
    pub user_input: String,
    /// What the assistant answered.
    pub assistant_response: String,
    /// How the input was resolved, if known.
    pub command_type: Option<CommandType>,
}

impl Turn {
    /// Create a turn stamped with the current time.
    pub fn new(
        user_input: impl Into<String>,
        assistant_response: impl Into<String>,
        command_type: Option<CommandType>,
    ) -> Self {
        Self::at(Utc::now(), user_input, assistant_response, command_type)
    }

    /// Create a turn with an explicit timestamp.
    pub fn at(
        timestamp: DateTime<Utc>,
        user_input: impl Into<String>,
        assistant_response: impl Into<String>,
        command_type: Option<CommandType>,
    ) -> Self {
        Self {
            timestamp,
            user_input: user_input.into(),
            assistant_response: assistant_response.into(),
            command_type,
        }
    }
}

/// Bounded, time-limited turn history.
#[derive(Debug, Clone)]
pub struct TurnStore {
    /// Turns in insertion order (oldest first).
    turns: VecDeque<Turn>,
    max_history: usize,
    timeout: TimeDelta,
}

impl TurnStore {
    /// Create an empty store.
    ///
    /// A `max_history` of zero retains nothing. A timeout too large to
    /// represent never expires anything.
    #[must_use]
    pub fn new(max_history: usize, context_timeout: Duration) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_history.min(64)),
            max_history,
            timeout: TimeDelta::from_std(context_timeout).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Append a turn, evicting the oldest one when over capacity.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        if self.turns.len() > self.max_history {
            self.turns.pop_front();
        }
    }

    /// Drop every turn that is no longer younger than the timeout.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let timeout = self.timeout;
        let before = self.turns.len();
        self.turns
            .retain(|turn| now.signed_duration_since(turn.timestamp) < timeout);
        let expired = before - self.turns.len();
        if expired > 0 {
            tracing::debug!(expired, "dropped expired conversation turns");
        }
    }

    /// Sweep, then return copies of the last `n` surviving turns, oldest first.
    pub fn recent(&mut self, n: usize, now: DateTime<Utc>) -> Vec<Turn> {
        self.sweep(now);
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    /// Number of turns currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn turn_at(now: DateTime<Utc>, secs_ago: i64, text: &str) -> Turn {
        Turn::at(
            now - TimeDelta::seconds(secs_ago),
            text,
            format!("re: {text}"),
            Some(CommandType::Conversation),
        )
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let mut store = TurnStore::new(3, Duration::from_secs(300));
        for i in 0..10 {
            store.push(Turn::new(format!("msg{i}"), "ok", None));
            assert!(store.len() <= 3);
        }
        let recent = store.recent(10, Utc::now());
        let inputs: Vec<&str> = recent.iter().map(|t| t.user_input.as_str()).collect();
        assert_eq!(inputs, ["msg7", "msg8", "msg9"]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut store = TurnStore::new(0, Duration::from_secs(300));
        store.push(Turn::new("hello", "hi", None));
        assert!(store.is_empty());
    }

    #[test]
    fn expired_turns_are_excluded() {
        let now = Utc::now();
        let mut store = TurnStore::new(10, Duration::from_secs(300));
        store.push(turn_at(now, 600, "ancient"));
        store.push(turn_at(now, 300, "exactly at the limit"));
        store.push(turn_at(now, 299, "fresh"));

        let recent = store.recent(10, now);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].user_input, "fresh");
        // The sweep is destructive.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn push_does_not_sweep() {
        let now = Utc::now();
        let mut store = TurnStore::new(10, Duration::from_secs(60));
        store.push(turn_at(now, 3600, "old"));
        store.push(turn_at(now, 0, "new"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn recent_is_bounded_and_chronological() {
        let now = Utc::now();
        let mut store = TurnStore::new(10, Duration::from_secs(300));
        for (i, text) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            store.push(turn_at(now, 50 - i as i64, text));
        }

        let recent = store.recent(3, now);
        let inputs: Vec<&str> = recent.iter().map(|t| t.user_input.as_str()).collect();
        assert_eq!(inputs, ["c", "d", "e"]);

        assert!(store.recent(0, now).is_empty());
        assert_eq!(store.recent(100, now).len(), 5);
    }

    #[test]
    fn recent_on_empty_store_is_empty() {
        let mut store = TurnStore::new(10, Duration::from_secs(300));
        assert!(store.recent(3, Utc::now()).is_empty());
    }

    #[test]
    fn huge_timeout_never_expires() {
        let now = Utc::now();
        let mut store = TurnStore::new(10, Duration::MAX);
        store.push(turn_at(now, 86_400 * 365, "last year"));
        assert_eq!(store.recent(3, now).len(), 1);
    }

    #[test]
    fn command_type_serializes_snake_case() {
        let json = serde_json::to_string(&CommandType::PrefixMatch).unwrap();
        assert_eq!(json, "\"prefix_match\"");
        assert_eq!(CommandType::ExactMatch.to_string(), "exact_match");
    }
}
