//! OpenAI-compatible Provider Implementation
//!
//! Talks to any endpoint exposing the `/chat/completions` API (OpenAI, Azure
//! gateways, vLLM, DeepSeek, local proxies, ...).
//!
//! # Features
//!
//! - Async HTTP communication via `reqwest`
//! - Configuration from `API_KEY`, `BASE_URL` and `MODEL_NAME`
//! - Retry with exponential backoff on server and connection errors
//! - HTTP status mapped onto the `ClientError` taxonomy
//!
//! # Examples
//!
//! ```no_run
//! use bearingkg_llm::OpenAiProvider;
//!
//! let provider = OpenAiProvider::new("https://api.openai.com/v1", "sk-...", "gpt-4o-mini").unwrap();
//! ```

use crate::LlmError;
use async_trait::async_trait;
use bearingkg_domain::{ClientError, ExtractionClient, ExtractionSettings};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when neither the settings nor `MODEL_NAME` name one
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default number of attempts per call
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.4;

const SYSTEM_PROMPT: &str = "You are a knowledge-graph construction assistant for bearing fault diagnostics.";

/// OpenAI-compatible chat-completions provider
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
    max_retries: u32,
}

/// Request body for the chat-completions API
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response from the chat-completions API
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Outcome of a single HTTP attempt
enum Attempt {
    Done(Result<String, ClientError>),
    Retry(ClientError),
}

impl OpenAiProvider {
    /// Create a new provider
    ///
    /// # Parameters
    ///
    /// - `base_url`: API root, e.g. "https://api.openai.com/v1"
    /// - `api_key`: bearer token
    /// - `model`: default model name
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingCredentials("API key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::Setup(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Create a provider from `API_KEY`, `BASE_URL` and `MODEL_NAME`
    ///
    /// `API_KEY` is required; the others fall back to the defaults.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = env::var("API_KEY")
            .map_err(|_| LlmError::MissingCredentials("API_KEY is not set".to_string()))?;
        let base_url = env::var("BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = env::var("MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(base_url, api_key, model)
    }

    /// Set the maximum number of attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Model used when the call settings leave it empty
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn attempt(&self, url: &str, body: &ChatRequest<'_>, timeout: Duration) -> Attempt {
        let response = match self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Attempt::Done(Err(ClientError::Timeout)),
            Err(e) => return Attempt::Retry(ClientError::Transport(format!("Request failed: {}", e))),
        };

        let status = response.status();
        if status.is_success() {
            return Attempt::Done(match response.json::<ChatResponse>().await {
                Ok(chat) => chat
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .ok_or_else(|| ClientError::Transport("Response contained no message".to_string())),
                Err(e) if e.is_timeout() => Err(ClientError::Timeout),
                Err(e) => Err(ClientError::Transport(format!("Failed to decode response: {}", e))),
            });
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let detail = format!("HTTP {}: {}", status, error_text);

        match status.as_u16() {
            401 | 403 => Attempt::Done(Err(ClientError::Auth(detail))),
            429 => Attempt::Done(Err(ClientError::RateLimited(detail))),
            500..=599 => Attempt::Retry(ClientError::Transport(detail)),
            _ => Attempt::Done(Err(ClientError::Transport(detail))),
        }
    }
}

#[async_trait]
impl ExtractionClient for OpenAiProvider {
    async fn extract(&self, prompt: &str, settings: &ExtractionSettings) -> Result<String, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);
        let model = if settings.model_name.is_empty() {
            self.model.as_str()
        } else {
            settings.model_name.as_str()
        };

        let body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: settings.max_tokens,
        };

        // Retry logic with exponential backoff
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            debug!("Calling {} (model {}, attempt {})", url, model, attempts + 1);
            match self.attempt(&url, &body, settings.timeout).await {
                Attempt::Done(result) => return result,
                Attempt::Retry(error) => {
                    warn!("Extraction request failed: {}", error);
                    last_error = Some(error);
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                // Exponential backoff: 1s, 2s, 4s, etc.
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| ClientError::Transport("Max retries exceeded".to_string())))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
