//! Error types for the assistant.

/// Top-level error type for the command assistant.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Configuration error (invalid file, missing credential).
    #[error("config error: {0}")]
    Config(String),

    /// A command handler failed.
    #[error("command error: {0}")]
    Command(String),

    /// Speech capture or synthesis error.
    #[error("voice error: {0}")]
    Voice(String),

    /// Launching the system browser failed.
    #[error("browser error: {0}")]
    Browser(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AssistantError>;
