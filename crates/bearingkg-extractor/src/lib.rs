//! BearingKG Extractor
//!
//! Builds a bearing-fault knowledge graph from long technical documents.
//!
//! # Overview
//!
//! A document is parsed from its file format, normalized, and split into
//! chunks that respect paragraph and sentence boundaries. The chunks are then
//! sent to an LLM one at a time, in order. Every prompt carries a bounded
//! digest of what earlier chunks produced, so names and types stay consistent
//! across the document and later chunks can relate to earlier entities.
//!
//! # Architecture
//!
//! ```text
//! File → ParserRegistry → TextNormalizer → Chunker
//!      → [PromptBuilder → LLM → ResultParser → KnowledgeGraph → ContextSummarizer]*
//!      → DocumentReport
//! ```
//!
//! # Key Features
//!
//! - **Context-Aware Chunking**: Paragraph packing with sentence and hard-cut fallbacks
//! - **Context Carryover**: Each chunk sees a capped digest of the graph so far
//! - **Failure Isolation**: A bad chunk is recorded and skipped; only fatal errors abort
//! - **Formats**: Plain text, markdown and .docx, extensible by extension
//!
//! # Example Usage
//!
//! ```no_run
//! use bearingkg_extractor::{DocumentProcessor, ExtractorConfig};
//! use bearingkg_llm::MockProvider;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let llm = Arc::new(MockProvider::default());
//! let processor = DocumentProcessor::new(llm, ExtractorConfig::default())?;
//!
//! match processor.process_file("notes/outer-race.md").await {
//!     Ok(report) => {
//!         println!("Entities: {}", report.graph.entity_count());
//!         println!("Relations: {}", report.graph.relation_count());
//!         println!("Failed chunks: {}", report.failed());
//!     }
//!     Err(fatal) => eprintln!("{} (graph so far: {} entities)", fatal, fatal.report.graph.entity_count()),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod chunking;
mod config;
mod error;
mod formats;
mod normalizer;
mod parser;
mod pipeline;
mod processor;
mod prompt;
mod summarizer;
mod types;


pub use chunking::Chunker;
pub use config::{ChunkStrategy, ExtractorConfig, DEFAULT_RELATION_TYPES};
pub use error::{ErrorKind, ExtractorError};
pub use formats::{DocumentParser, MarkdownParser, ParserRegistry, TextParser, WordParser};
pub use normalizer::{NormalizedText, TextNormalizer};
pub use parser::{ResultParser, SEVERITY_LEVELS};
pub use pipeline::{DocumentPipeline, PipelineState};
pub use processor::{DocumentOutcome, DocumentProcessor};
pub use prompt::PromptBuilder;
pub use summarizer::{ContextDigest, ContextSummarizer};
pub use types::{
    Chunk, ChunkKind, ChunkResult, ChunkStatus, Document, DocumentFormat, DocumentReport, FatalError,
    ParagraphUnit, ParsedDocument, ReportMetadata,
};
