//! OpenAI-compatible chat completions backend (OpenRouter by default).

use super::{BackendError, ChatMessage, ConversationBackend, build_messages};
use crate::config::ConversationConfig;
use crate::context::Turn;
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Remote backend speaking the chat completions wire format.
pub struct ChatCompletionsBackend {
    config: ConversationConfig,
    api_key: String,
    client: reqwest::Client,
}

impl fmt::Debug for ChatCompletionsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionsBackend")
            .field("api_url", &self.config.api_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsBackend {
    /// Create a backend, resolving the API key from config or environment.
    ///
    /// # Errors
    ///
    /// Returns a config error when no API key is available or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &ConversationConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            AssistantError::Config(format!("{} not found", config.api_key_env))
        })?;
        Self::new(config.clone(), api_key)
    }

    /// Create a backend with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns a config error if the HTTP client cannot be built.
    pub fn new(config: ConversationConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("{}/{}", config.title, env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AssistantError::Config(format!("failed to build HTTP client: {e}")))?;
        info!(
            url = %config.api_url,
            model = %config.model,
            "conversation backend configured"
        );
        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    async fn send(&self, messages: &[ChatMessage]) -> std::result::Result<String, BackendError> {
        let body = CompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut request = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .json(&body);
        if !self.config.referer.is_empty() {
            request = request.header("HTTP-Referer", &self.config.referer);
        }
        if !self.config.title.is_empty() {
            request = request.header("X-Title", &self.config.title);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(BackendError::Request(format!(
                "HTTP {}: {}",
                status.as_u16(),
                extract_error_message(&body_text)
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::from_reqwest(&e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::InvalidResponse("response has no choices".to_owned()))
    }
}

#[async_trait]
impl ConversationBackend for ChatCompletionsBackend {
    async fn reply(
        &self,
        input: &str,
        history: &[Turn],
    ) -> std::result::Result<String, BackendError> {
        let messages = build_messages(&self.config.system_prompt, history, input);
        debug!(messages = messages.len(), "sending chat completion request");

        let start = Instant::now();
        let result = self.send(&messages).await;
        let duration_ms = start.elapsed().as_millis();

        match &result {
            Ok(reply) => info!(
                model = %self.config.model,
                duration_ms = %duration_ms,
                reply_chars = reply.len(),
                "chat completion succeeded"
            ),
            Err(e) => warn!(
                model = %self.config.model,
                duration_ms = %duration_ms,
                code = e.code(),
                error = %e.message(),
                "chat completion failed"
            ),
        }
        result
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

/// Extract an error message from an OpenAI-style error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}
