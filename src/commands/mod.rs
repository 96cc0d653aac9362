//! Command registry and the built-in command collaborators.
//!
//! Every collaborator exposes a `register` function that adds its
//! (name, handler) pairs to a [`CommandRegistry`] during start-up. Once the
//! registry is handed to the [`Dispatcher`](crate::dispatcher::Dispatcher) it
//! is never mutated again.

pub mod context;
pub mod voice;
pub mod web;

use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A command handler: one argument string in, one response string out.
///
/// Exact matches receive an empty argument; prefix matches receive the
/// trimmed remainder of the input.
pub type Handler = Arc<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&str) -> Result<String> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Mapping from lowercase command names to handlers.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Handler>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under the lowercased `name`, replacing any
    /// previous handler for that name.
    pub fn register(&mut self, name: &str, handler: Handler) {
        let key = name.to_lowercase();
        if self.commands.insert(key.clone(), handler).is_some() {
            tracing::debug!(command = %key, "replaced existing command handler");
        } else {
            tracing::debug!(command = %key, "registered command");
        }
    }

    /// Exact-key lookup.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Handler> {
        self.commands.get(name)
    }

    /// Every registered name, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.keys().map(String::as_str)
    }

    /// Every registered name, sorted, for display.
    #[must_use]
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        names
    }

    /// The longest registered name that `input` starts with, and its handler.
    #[must_use]
    pub fn longest_prefix(&self, input: &str) -> Option<(&str, &Handler)> {
        self.commands
            .iter()
            .filter(|(name, _)| input.starts_with(name.as_str()))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(name, handler)| (name.as_str(), handler))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.sorted_names())
            .finish()
    }
}
