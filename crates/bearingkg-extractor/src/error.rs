//! Error types for the Extractor

use bearingkg_domain::ClientError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during document processing
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No parser registered for the file extension
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The document could not be decoded by its parser
    #[error("Format error: {0}")]
    Format(String),

    /// Text exceeds maximum length
    #[error("Text too long: {0} chars (max: {1})")]
    TextTooLong(usize, usize),

    /// Credentials rejected by the model provider
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Extraction timeout
    #[error("Extraction timeout")]
    Timeout,

    /// Provider rate limit hit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Network or protocol failure talking to the provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Extraction call cancelled
    #[error("Extraction cancelled")]
    Cancelled,

    /// Model output is not decodable
    #[error("Parse error: {0}")]
    Parse(String),

    /// Model output decodes but violates the schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractorError {
    /// Serializable tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractorError::Config(_) => ErrorKind::Configuration,
            ExtractorError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ExtractorError::Format(_) => ErrorKind::Format,
            ExtractorError::TextTooLong(_, _) => ErrorKind::TextTooLong,
            ExtractorError::Auth(_) => ErrorKind::Auth,
            ExtractorError::Timeout => ErrorKind::Timeout,
            ExtractorError::RateLimited(_) => ErrorKind::RateLimited,
            ExtractorError::Transport(_) => ErrorKind::Transport,
            ExtractorError::Cancelled => ErrorKind::Cancelled,
            ExtractorError::Parse(_) => ErrorKind::Parse,
            ExtractorError::Schema(_) => ErrorKind::Schema,
            ExtractorError::Io(_) => ErrorKind::Io,
        }
    }

    /// True if this error aborts the whole document
    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}

impl From<ClientError> for ExtractorError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Timeout => ExtractorError::Timeout,
            ClientError::Auth(msg) => ExtractorError::Auth(msg),
            ClientError::RateLimited(msg) => ExtractorError::RateLimited(msg),
            ClientError::Transport(msg) => ExtractorError::Transport(msg),
            ClientError::Cancelled => ExtractorError::Cancelled,
        }
    }
}

/// Error classification carried in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid or inconsistent configuration
    Configuration,
    /// Unknown file extension
    UnsupportedFormat,
    /// Undecodable document
    Format,
    /// Document over the size limit
    TextTooLong,
    /// Rejected credentials
    Auth,
    /// Call timed out
    Timeout,
    /// Provider throttled the call
    RateLimited,
    /// Network failure
    Transport,
    /// Call cancelled
    Cancelled,
    /// Undecodable model output
    Parse,
    /// Model output violates the schema
    Schema,
    /// Local I/O failure
    Io,
}

impl ErrorKind {
    /// Fatal kinds abort the document; the others stay local to a chunk
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::Configuration
                | ErrorKind::UnsupportedFormat
                | ErrorKind::Format
                | ErrorKind::TextTooLong
                | ErrorKind::Auth
                | ErrorKind::Io
        )
    }

    /// Short snake_case name
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::Format => "format",
            ErrorKind::TextTooLong => "text_too_long",
            ErrorKind::Auth => "auth",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Transport => "transport",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Parse => "parse",
            ErrorKind::Schema => "schema",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_kinds() {
        assert_eq!(ExtractorError::from(ClientError::Timeout).kind(), ErrorKind::Timeout);
        assert_eq!(ExtractorError::from(ClientError::Auth("x".into())).kind(), ErrorKind::Auth);
        assert_eq!(
            ExtractorError::from(ClientError::RateLimited("x".into())).kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            ExtractorError::from(ClientError::Transport("x".into())).kind(),
            ErrorKind::Transport
        );
        assert_eq!(ExtractorError::from(ClientError::Cancelled).kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_fatality() {
        assert!(ExtractorError::Auth("bad key".into()).is_fatal());
        assert!(ExtractorError::Config("x".into()).is_fatal());
        assert!(ExtractorError::UnsupportedFormat(".pdf".into()).is_fatal());
        assert!(!ExtractorError::Timeout.is_fatal());
        assert!(!ExtractorError::RateLimited("x".into()).is_fatal());
        assert!(!ExtractorError::Parse("x".into()).is_fatal());
        assert!(!ExtractorError::Schema("x".into()).is_fatal());
        assert!(!ExtractorError::Cancelled.is_fatal());
        assert!(!ExtractorError::Transport("x".into()).is_fatal());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::RateLimited).unwrap();
        assert_eq!(json, "\"rate_limited\"");
        assert_eq!(ErrorKind::RateLimited.to_string(), "rate_limited");
    }
}
