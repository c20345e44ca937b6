//! bearingkg LLM Provider Layer
//!
//! Implementations of the `ExtractionClient` trait from `bearingkg-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic, scriptable mock for testing
//! - `OpenAiProvider`: OpenAI-compatible chat-completions API
//! - `ThrottledClient`: Wraps any client to bound concurrent requests
//!
//! # Examples
//!
//! ```
//! use bearingkg_llm::MockProvider;
//! use bearingkg_domain::{ExtractionClient, ExtractionSettings};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let provider = MockProvider::new(r#"{"entities": [], "relations": []}"#);
//! let out = provider.extract("prompt", &ExtractionSettings::default()).await.unwrap();
//! assert!(out.contains("entities"));
//! # }
//! ```

#![warn(missing_docs)]

pub mod openai;
pub mod throttle;

use async_trait::async_trait;
use bearingkg_domain::{ClientError, ExtractionClient, ExtractionSettings};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

pub use openai::OpenAiProvider;
pub use throttle::ThrottledClient;

/// Errors that can occur while setting up a provider
#[derive(Error, Debug)]
pub enum LlmError {
    /// Required credentials are not configured
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// The HTTP client could not be built
    #[error("Client setup failed: {0}")]
    Setup(String),
}

#[derive(Debug)]
struct MockState {
    default_response: String,
    script: VecDeque<Result<String, ClientError>>,
    rules: Vec<(String, Result<String, ClientError>)>,
    prompts: Vec<String>,
}

/// Mock extraction client for deterministic testing
///
/// Responses are chosen in this order:
/// 1. the next scripted outcome, if any remain
/// 2. the first rule whose fragment occurs in the prompt
/// 3. the default response
///
/// Every prompt is recorded so tests can inspect what was sent.
///
/// # Examples
///
/// ```
/// use bearingkg_llm::MockProvider;
/// use bearingkg_domain::ClientError;
///
/// let provider = MockProvider::new("default");
/// provider.push_response("first");
/// provider.push_error(ClientError::Timeout);
/// provider.add_response("bearing", "matched");
/// assert_eq!(provider.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
    delay: Option<Duration>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                default_response: response.into(),
                script: VecDeque::new(),
                rules: Vec::new(),
                prompts: Vec::new(),
            })),
            delay: None,
        }
    }

    /// Create a provider that replays the given outcomes in order
    pub fn scripted<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ClientError>>,
    {
        let provider = Self::default();
        provider.lock().script.extend(outcomes);
        provider
    }

    /// Sleep this long before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a response for the next unscripted call
    pub fn push_response(&self, response: impl Into<String>) {
        self.lock().script.push_back(Ok(response.into()));
    }

    /// Queue an error for the next unscripted call
    pub fn push_error(&self, error: ClientError) {
        self.lock().script.push_back(Err(error));
    }

    /// Answer with `response` whenever the prompt contains `fragment`
    pub fn add_response(&self, fragment: impl Into<String>, response: impl Into<String>) {
        self.lock().rules.push((fragment.into(), Ok(response.into())));
    }

    /// Fail with `error` whenever the prompt contains `fragment`
    pub fn add_error(&self, fragment: impl Into<String>, error: ClientError) {
        self.lock().rules.push((fragment.into(), Err(error)));
    }

    /// Get the number of times extract was called
    pub fn call_count(&self) -> usize {
        self.lock().prompts.len()
    }

    /// All prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    /// Forget recorded prompts
    pub fn reset_call_count(&self) {
        self.lock().prompts.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn respond(&self, prompt: &str) -> Result<String, ClientError> {
        let mut state = self.lock();
        state.prompts.push(prompt.to_string());

        if let Some(outcome) = state.script.pop_front() {
            return outcome;
        }

        if let Some((_, outcome)) = state.rules.iter().find(|(fragment, _)| prompt.contains(fragment.as_str())) {
            return outcome.clone();
        }

        Ok(state.default_response.clone())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(r#"{"entities": [], "relations": []}"#)
    }
}

#[async_trait]
impl ExtractionClient for MockProvider {
    async fn extract(&self, prompt: &str, _settings: &ExtractionSettings) -> Result<String, ClientError> {
        let outcome = self.respond(prompt);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ExtractionSettings {
        ExtractionSettings::default()
    }

    #[tokio::test]
    async fn test_mock_provider_default() {
        let provider = MockProvider::new("Test response");
        let result = provider.extract("any prompt", &settings()).await;
        assert_eq!(result.unwrap(), "Test response");
    }

    #[tokio::test]
    async fn test_mock_provider_script_runs_in_order() {
        let provider = MockProvider::scripted(vec![
            Ok("one".to_string()),
            Err(ClientError::RateLimited("slow down".into())),
        ]);

        assert_eq!(provider.extract("a", &settings()).await.unwrap(), "one");
        assert!(matches!(
            provider.extract("b", &settings()).await,
            Err(ClientError::RateLimited(_))
        ));
        // Script exhausted, falls back to the default
        assert!(provider.extract("c", &settings()).await.unwrap().contains("entities"));
    }

    #[tokio::test]
    async fn test_mock_provider_rules_match_fragments() {
        let provider = MockProvider::new("default");
        provider.add_response("outer race", "matched");
        provider.add_error("cage", ClientError::Transport("reset".into()));

        assert_eq!(provider.extract("the outer race spalls", &settings()).await.unwrap(), "matched");
        assert!(provider.extract("a cracked cage", &settings()).await.is_err());
        assert_eq!(provider.extract("nothing here", &settings()).await.unwrap(), "default");
    }

    #[tokio::test]
    async fn test_mock_provider_records_prompts() {
        let provider = MockProvider::default();
        provider.extract("prompt1", &settings()).await.unwrap();
        provider.extract("prompt2", &settings()).await.unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.prompts(), vec!["prompt1", "prompt2"]);

        provider.reset_call_count();
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_provider_clone_shares_state() {
        let provider1 = MockProvider::new("test");
        let provider2 = provider1.clone();

        provider1.extract("test", &settings()).await.unwrap();

        assert_eq!(provider1.call_count(), 1);
        assert_eq!(provider2.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_provider_delay() {
        let provider = MockProvider::new("late").with_delay(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        provider.extract("x", &settings()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
