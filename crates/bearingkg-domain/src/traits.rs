//! Trait definitions for external interactions
//!
//! The language model is the only collaborator the extraction core talks to.
//! Implementations live in `bearingkg-llm`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Per-call settings handed to the extraction client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSettings {
    /// Model to use; empty means the client's own default
    pub model_name: String,

    /// Upper bound on generated tokens
    pub max_tokens: u32,

    /// Time budget for a single call
    pub timeout: Duration,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            max_tokens: 4096,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Errors an extraction client can report
///
/// Only `Auth` is fatal for a document; everything else is confined to the
/// chunk being extracted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The call did not finish in time
    #[error("Extraction timed out")]
    Timeout,

    /// Credentials missing or rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The provider asked us to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Network or protocol failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call was cancelled before it completed
    #[error("Extraction cancelled")]
    Cancelled,
}

/// Trait for sending a prompt to a language model
///
/// Implemented by the infrastructure layer (bearingkg-llm)
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Send a prompt and return the raw model output
    async fn extract(&self, prompt: &str, settings: &ExtractionSettings) -> Result<String, ClientError>;

    /// Short name used in logs and reports
    fn name(&self) -> &str {
        "llm"
    }
}

#[async_trait]
impl<T> ExtractionClient for Arc<T>
where
    T: ExtractionClient + ?Sized,
{
    async fn extract(&self, prompt: &str, settings: &ExtractionSettings) -> Result<String, ClientError> {
        (**self).extract(prompt, settings).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
