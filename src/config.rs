//! Configuration types for the command assistant.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Presentation settings for the interactive session.
    pub assistant: PersonaConfig,
    /// Conversation history bounds.
    pub context: ContextConfig,
    /// Remote chat-completions backend settings.
    pub conversation: ConversationConfig,
    /// Wake word, speech capture and speech synthesis settings.
    pub voice: VoiceConfig,
}

/// How the assistant presents itself in the terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Name printed in front of every reply.
    pub display_name: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            display_name: "J.A.R.V.I.S.".to_owned(),
        }
    }
}

/// Bounds of the conversation history window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum number of turns retained. Oldest turns are evicted first.
    pub max_history: usize,
    /// Turns older than this many seconds are dropped on the next read.
    pub context_timeout_secs: u64,
    /// Number of recent turns handed to the conversational backend.
    pub recent_turns: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_history: 10,
            context_timeout_secs: 300,
            recent_turns: 3,
        }
    }
}

impl ContextConfig {
    /// Context timeout as a [`Duration`].
    pub fn context_timeout(&self) -> Duration {
        Duration::from_secs(self.context_timeout_secs)
    }
}

/// Remote chat-completions backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Full URL of the chat completions endpoint.
    pub api_url: String,
    /// Literal API key. Leave empty to read it from `api_key_env`.
    pub api_key: String,
    /// Environment variable consulted when `api_key` is empty.
    pub api_key_env: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Upper bound on generated tokens per reply.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Persona preamble sent as the system message.
    pub system_prompt: String,
    /// Value of the `HTTP-Referer` header (OpenRouter app attribution).
    pub referer: String,
    /// Value of the `X-Title` header (OpenRouter app attribution).
    pub title: String,
}

impl ConversationConfig {
    /// Default persona preamble.
    pub const DEFAULT_SYSTEM_PROMPT: &'static str = "You are J.A.R.V.I.S., a sophisticated AI assistant inspired by Iron Man's AI.\n\
Your responses should be helpful, direct, and slightly witty - similar to the J.A.R.V.I.S. from Iron Man.\n\
You can engage in natural conversation while also helping with tasks.";

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the API key: the literal value wins, then the environment.
    ///
    /// Returns `None` when neither yields a non-blank key.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.clone());
        }
        if self.api_key_env.trim().is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            api_url: "https://openrouter.ai/api/v1/chat/completions".to_owned(),
            api_key: String::new(),
            api_key_env: "OPENROUTER_API_KEY".to_owned(),
            model: "deepseek/deepseek-v3-base:free".to_owned(),
            max_tokens: 150,
            temperature: 0.7,
            timeout_secs: 10,
            system_prompt: Self::DEFAULT_SYSTEM_PROMPT.to_owned(),
            referer: "https://github.com/hsynrsd/jarvis-ai-assistantv2".to_owned(),
            title: "J.A.R.V.I.S. AI Assistant".to_owned(),
        }
    }
}

/// Voice capture and playback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Wake word that must appear in a captured phrase (case-insensitive).
    pub wake_word: String,
    /// Seconds to wait for speech to start while listening for the wake word.
    pub wake_timeout_secs: f32,
    /// Maximum length in seconds of a wake word phrase.
    pub wake_phrase_limit_secs: f32,
    /// Seconds to wait for speech to start while listening for a command.
    pub command_timeout_secs: f32,
    /// Maximum length in seconds of a command phrase.
    pub command_phrase_limit_secs: f32,
    /// Ambient noise calibration when the listener starts, in seconds.
    pub initial_calibration_secs: f32,
    /// Ambient noise calibration before each command, in seconds.
    pub command_calibration_secs: f32,
    /// Pause after acknowledging the wake word so playback does not leak
    /// into the microphone, in seconds.
    pub settle_delay_secs: f32,
    /// Back-off after a failed listen iteration, in seconds.
    pub error_backoff_secs: f32,
    /// Speech-to-text program and arguments. It must print the transcript
    /// of one captured phrase on stdout.
    pub stt_command: Option<Vec<String>>,
    /// Text-to-speech program and arguments. The text is appended as the
    /// final argument and the program must block until playback ends.
    pub tts_command: Option<Vec<String>>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            wake_word: "jarvis".to_owned(),
            wake_timeout_secs: 3.0,
            wake_phrase_limit_secs: 3.0,
            command_timeout_secs: 5.0,
            command_phrase_limit_secs: 5.0,
            initial_calibration_secs: 1.0,
            command_calibration_secs: 0.5,
            settle_delay_secs: 1.5,
            error_backoff_secs: 1.0,
            stt_command: None,
            tts_command: None,
        }
    }
}

/// Convert a non-negative seconds value from config into a [`Duration`].
pub(crate) fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or(Duration::ZERO)
}

impl AssistantConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::AssistantError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AssistantError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/jarvis/config.toml`.
    ///
    /// `JARVIS_CONFIG_DIR` overrides the directory.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        config_dir().join("config.toml")
    }
}

fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("JARVIS_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("jarvis"))
        .unwrap_or_else(|| PathBuf::from("/tmp/jarvis-config"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AssistantConfig::default();
        assert_eq!(config.context.max_history, 10);
        assert_eq!(config.context.context_timeout_secs, 300);
        assert_eq!(config.context.recent_turns, 3);
        assert_eq!(config.conversation.max_tokens, 150);
        assert!((config.conversation.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.conversation.timeout(), Duration::from_secs(10));
        assert_eq!(config.voice.wake_word, "jarvis");
        assert!(config.voice.tts_command.is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AssistantConfig::default();
        config.context.max_history = 4;
        config.conversation.model = "test/model".to_owned();
        config.voice.tts_command = Some(vec![
            "espeak".to_owned(),
            "-s".to_owned(),
            "160".to_owned(),
        ]);

        config.save_to_file(&path).unwrap();
        assert!(path.exists());

        let loaded = AssistantConfig::from_file(&path).unwrap();
        assert_eq!(loaded.context.max_history, 4);
        assert_eq!(loaded.conversation.model, "test/model");
        assert_eq!(
            loaded.voice.tts_command.as_deref(),
            Some(&["espeak".to_owned(), "-s".to_owned(), "160".to_owned()][..])
        );
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: AssistantConfig = toml::from_str(
            r#"
            [context]
            max_history = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.context.max_history, 2);
        assert_eq!(config.context.context_timeout_secs, 300);
        assert_eq!(config.assistant.display_name, "J.A.R.V.I.S.");
    }

    #[test]
    fn invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "context = [").unwrap();
        let err = AssistantConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, crate::error::AssistantError::Config(_)));
    }

    #[test]
    fn literal_api_key_wins() {
        let config = ConversationConfig {
            api_key: "sk-literal".to_owned(),
            api_key_env: "JARVIS_TEST_KEY_UNUSED".to_owned(),
            ..ConversationConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-literal"));
    }

    #[test]
    fn missing_api_key_resolves_to_none() {
        let config = ConversationConfig {
            api_key: "  ".to_owned(),
            api_key_env: "JARVIS_TEST_KEY_THAT_IS_NEVER_SET".to_owned(),
            ..ConversationConfig::default()
        };
        assert!(config.resolve_api_key().is_none());
    }

    #[test]
    fn negative_seconds_clamp_to_zero() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(1.5), Duration::from_millis(1500));
    }
}
