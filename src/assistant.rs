//! Start-up assembly.
//!
//! Builds the context tracker, the optional conversational backend, the
//! voice handler and the command registry, then freezes the registry inside
//! a [`Dispatcher`].

use crate::commands::web::{SystemOpener, UrlOpener};
use crate::commands::{self, CommandRegistry};
use crate::config::AssistantConfig;
use crate::context::ContextTracker;
use crate::dispatcher::Dispatcher;
use crate::llm::{ChatCompletionsBackend, ConversationBackend};
use crate::session::InputEvent;
use crate::voice::VoiceHandler;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info};

/// A fully wired assistant.
pub struct Assistant {
    dispatcher: Arc<Dispatcher>,
    voice: Arc<VoiceHandler>,
}

/// Collaborators that can be swapped out when building an [`Assistant`].
pub struct Collaborators {
    pub backend: Option<Arc<dyn ConversationBackend>>,
    pub voice: Arc<VoiceHandler>,
    pub opener: Arc<dyn UrlOpener>,
}

impl Assistant {
    /// Build the assistant from config, using the system browser, the
    /// configured speech programs and the configured chat backend.
    ///
    /// A backend that cannot be configured (usually a missing API key) is
    /// logged and left out; command handling still works.
    pub fn from_config(config: &AssistantConfig, events: UnboundedSender<InputEvent>) -> Self {
        let backend = match ChatCompletionsBackend::from_config(&config.conversation) {
            Ok(backend) => Some(Arc::new(backend) as Arc<dyn ConversationBackend>),
            Err(e) => {
                error!("conversation backend unavailable: {e}");
                None
            }
        };
        let voice = Arc::new(VoiceHandler::from_config(&config.voice, events));
        Self::with_collaborators(
            config,
            Collaborators {
                backend,
                voice,
                opener: Arc::new(SystemOpener::default()),
            },
        )
    }

    /// Build the assistant around explicit collaborators.
    pub fn with_collaborators(config: &AssistantConfig, parts: Collaborators) -> Self {
        let context = Arc::new(ContextTracker::new(&config.context));

        let mut registry = CommandRegistry::new();
        commands::web::register(&mut registry, parts.opener);
        commands::voice::register(&mut registry, Arc::clone(&parts.voice));
        commands::context::register(&mut registry, Arc::clone(&context));
        info!(count = registry.len(), "command registry loaded");

        let dispatcher = Arc::new(Dispatcher::new(registry, context, parts.backend));
        Self {
            dispatcher,
            voice: parts.voice,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn voice(&self) -> &Arc<VoiceHandler> {
        &self.voice
    }

    /// Stop the listening worker, if any.
    pub fn shutdown(&self) {
        if self.voice.is_listening() {
            let reply = self.voice.stop_listening();
            info!("{reply}");
        }
    }
}
