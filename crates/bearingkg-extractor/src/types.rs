//! Types for documents, chunks and per-chunk outcomes

use crate::error::{ErrorKind, ExtractorError};
use crate::pipeline::PipelineState;
use bearingkg_domain::{ChunkExtraction, KnowledgeGraph};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Source format of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// Plain text
    Text,
    /// Markdown
    Markdown,
    /// Word-processor document (.docx)
    Word,
    /// Any other registered extension
    Other(String),
}

impl DocumentFormat {
    /// Detect format from a file extension (without the dot, any case)
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "txt" | "text" => DocumentFormat::Text,
            "md" | "markdown" => DocumentFormat::Markdown,
            "docx" => DocumentFormat::Word,
            _ => DocumentFormat::Other(ext),
        }
    }

    /// Detect format from a path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or_else(|| DocumentFormat::Other(String::new()))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Text => f.write_str("text"),
            DocumentFormat::Markdown => f.write_str("markdown"),
            DocumentFormat::Word => f.write_str("docx"),
            DocumentFormat::Other(ext) => write!(f, ".{}", ext),
        }
    }
}

/// Plain text produced by a format parser, before normalization
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Document identifier
    pub id: String,
    /// Path or label the text came from
    pub source: String,
    /// Source format
    pub format: DocumentFormat,
    /// Parsed plain text
    pub text: String,
}

impl ParsedDocument {
    /// Wrap in-memory text as a plain-text document
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            source: id.clone(),
            id,
            format: DocumentFormat::Text,
            text: text.into(),
        }
    }
}

/// A normalized document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Document identifier
    pub id: String,
    /// Path or label the text came from
    pub source: String,
    /// Source format
    pub format: DocumentFormat,
    /// Normalized text
    #[serde(skip)]
    pub text: String,
    /// Length of the normalized text in characters
    pub char_len: usize,
}

/// Span of one paragraph in the normalized text
///
/// `start..end` are byte offsets. A unit owns its trailing blank-line
/// separator, so the units of a text tile it without gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParagraphUnit {
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// The unit opens with a markdown heading
    pub heading: bool,
}

impl ParagraphUnit {
    /// Text of this unit within `text`
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// How a chunk was cut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// One or more whole paragraphs
    Paragraphs,
    /// Whole sentences of one oversized paragraph
    SentenceFragment,
    /// A slice of a sentence longer than the chunk limit
    HardCut,
}

/// A contiguous slice of the normalized text sized for one extraction call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the chunk sequence
    pub index: usize,
    /// Chunk text
    pub text: String,
    /// Start byte offset in the normalized text
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// Length in characters
    pub char_len: usize,
    /// How the chunk was cut
    pub kind: ChunkKind,
}

/// Outcome of one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Parsed and merged
    Extracted {
        /// What the chunk contributed
        extraction: ChunkExtraction,
        /// Entities that were new to the graph
        new_entities: usize,
        /// Relations that were new to the graph
        new_relations: usize,
    },
    /// Attempted but failed; contributes nothing
    Failed {
        /// Error classification
        kind: ErrorKind,
        /// Error message
        message: String,
        /// Beginning of the raw model output, when there was one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_snippet: Option<String>,
    },
    /// Never attempted because the document was aborted
    Skipped {
        /// Why the chunk was not attempted
        reason: String,
    },
}

/// Per-chunk result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// Chunk index
    pub index: usize,
    /// Outcome
    #[serde(flatten)]
    pub status: ChunkStatus,
}

impl ChunkResult {
    /// Result for a failed chunk
    pub fn failed(index: usize, error: &ExtractorError, raw_snippet: Option<String>) -> Self {
        Self {
            index,
            status: ChunkStatus::Failed {
                kind: error.kind(),
                message: error.to_string(),
                raw_snippet,
            },
        }
    }

    /// True if the chunk was extracted and merged
    pub fn is_success(&self) -> bool {
        matches!(self.status, ChunkStatus::Extracted { .. })
    }

    /// Error classification of a failed chunk
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.status {
            ChunkStatus::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Run metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    /// Unique identifier of this pipeline run
    pub run_id: Uuid,
    /// Extraction client that served the run
    pub client: String,
    /// Model requested from the client
    pub model_name: String,
    /// Unix timestamp at completion
    pub timestamp: u64,
    /// Wall-clock processing time
    pub processing_time_ms: u64,
}

/// Everything one pipeline run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReport {
    /// The document
    pub document: Document,
    /// Final merged graph
    pub graph: KnowledgeGraph,
    /// Chunks, in order
    pub chunks: Vec<Chunk>,
    /// Exactly one result per chunk, in order
    pub results: Vec<ChunkResult>,
    /// Pipeline states visited
    pub state_history: Vec<PipelineState>,
    /// Run metadata
    pub metadata: ReportMetadata,
}

impl DocumentReport {
    /// Number of chunks extracted and merged
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of chunks that failed
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.error_kind().is_some()).count()
    }

    /// Number of chunks never attempted
    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, ChunkStatus::Skipped { .. }))
            .count()
    }

    /// True if every chunk succeeded
    pub fn is_complete(&self) -> bool {
        self.succeeded() == self.chunks.len()
    }
}

/// A document-level abort
///
/// Carries the partial report: the graph merged so far, every chunk
/// result recorded before the abort and `Skipped` for the rest.
#[derive(Debug, Error)]
#[error("Document '{}' aborted: {cause}", .report.document.id)]
pub struct FatalError {
    /// What aborted the document
    #[source]
    pub cause: ExtractorError,
    /// Partial report
    pub report: Box<DocumentReport>,
}

impl FatalError {
    /// Classification of the cause
    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::from_extension("MD"), DocumentFormat::Markdown);
        assert_eq!(DocumentFormat::from_extension(".txt"), DocumentFormat::Text);
        assert_eq!(DocumentFormat::from_extension("docx"), DocumentFormat::Word);
        assert_eq!(
            DocumentFormat::from_path(Path::new("notes/report.PDF")),
            DocumentFormat::Other("pdf".to_string())
        );
    }

    #[test]
    fn test_chunk_result_serialization() {
        let result = ChunkResult::failed(3, &ExtractorError::Parse("no JSON object".into()), None);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["index"], 3);
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "parse");
        assert!(json.get("raw_snippet").is_none());
        assert_eq!(result.error_kind(), Some(ErrorKind::Parse));
        assert!(!result.is_success());
    }

    #[test]
    fn test_skipped_result_serialization() {
        let result = ChunkResult {
            index: 1,
            status: ChunkStatus::Skipped {
                reason: "aborted".to_string(),
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "aborted");
        assert_eq!(result.error_kind(), None);
    }
}
