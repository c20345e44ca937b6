//! Per-document pipeline: normalize, chunk, then extract chunk by chunk
//!
//! Each chunk's prompt carries the digest of everything merged so far, so
//! chunks are processed strictly in order. A chunk-local failure is recorded
//! and skipped; a fatal error aborts the document and returns the partial
//! report alongside the cause.

use crate::chunking::Chunker;
use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::normalizer::TextNormalizer;
use crate::parser::ResultParser;
use crate::prompt::PromptBuilder;
use crate::summarizer::{ContextDigest, ContextSummarizer};
use crate::types::{
    Chunk, ChunkResult, ChunkStatus, Document, DocumentReport, FatalError, ParsedDocument, ReportMetadata,
};
use bearingkg_domain::{ChunkExtraction, ExtractionClient, KnowledgeGraph};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pipeline states
///
/// ```text
/// Normalizing -> Chunking -> ExtractingChunk(0) -> Merging(0) | ChunkFailed(0)
///     -> ExtractingChunk(1) -> ... -> Finalizing -> Done
/// ```
///
/// Any non-terminal state may move to `FatalError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Normalizing the parsed text
    Normalizing,
    /// Splitting into chunks
    Chunking,
    /// Waiting for the extraction of chunk `i`
    ExtractingChunk(usize),
    /// Merging chunk `i` into the graph
    Merging(usize),
    /// Chunk `i` failed locally
    ChunkFailed(usize),
    /// All chunks attempted
    Finalizing,
    /// Finished, possibly with failed chunks
    Done,
    /// Aborted
    FatalError,
}

impl PipelineState {
    /// True if the pipeline may move from `self` to `next`
    pub fn can_advance_to(&self, next: &PipelineState) -> bool {
        use PipelineState as S;

        if *next == S::FatalError {
            return !self.is_terminal();
        }
        match (*self, *next) {
            (S::Normalizing, S::Chunking) => true,
            (S::Chunking, S::ExtractingChunk(0)) | (S::Chunking, S::Finalizing) => true,
            (S::ExtractingChunk(i), S::Merging(j)) | (S::ExtractingChunk(i), S::ChunkFailed(j)) => i == j,
            (S::Merging(i), S::ExtractingChunk(j)) | (S::ChunkFailed(i), S::ExtractingChunk(j)) => j == i + 1,
            (S::Merging(_), S::Finalizing) | (S::ChunkFailed(_), S::Finalizing) => true,
            (S::Finalizing, S::Done) => true,
            _ => false,
        }
    }

    /// True for `Done` and `FatalError`
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::FatalError)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Normalizing => write!(f, "normalizing"),
            PipelineState::Chunking => write!(f, "chunking"),
            PipelineState::ExtractingChunk(i) => write!(f, "extracting chunk {}", i),
            PipelineState::Merging(i) => write!(f, "merging chunk {}", i),
            PipelineState::ChunkFailed(i) => write!(f, "chunk {} failed", i),
            PipelineState::Finalizing => write!(f, "finalizing"),
            PipelineState::Done => write!(f, "done"),
            PipelineState::FatalError => write!(f, "fatal error"),
        }
    }
}

/// Runs documents through normalization, chunking and extraction
///
/// The pipeline itself is immutable; every call to [`run`](Self::run)
/// owns its own graph and digest, so one pipeline can serve several
/// documents concurrently.
pub struct DocumentPipeline {
    client: Arc<dyn ExtractionClient>,
    config: ExtractorConfig,
    normalizer: TextNormalizer,
    chunker: Chunker,
    summarizer: ContextSummarizer,
    prompts: PromptBuilder,
    parser: ResultParser,
}

impl DocumentPipeline {
    /// Create a pipeline, rejecting invalid configuration
    pub fn new(client: Arc<dyn ExtractionClient>, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;

        Ok(Self {
            client,
            normalizer: TextNormalizer::new(config.max_text_length),
            chunker: Chunker::from_config(&config),
            summarizer: ContextSummarizer::from_config(&config),
            prompts: PromptBuilder::new(&config),
            parser: ResultParser::from_config(&config),
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Name of the extraction client
    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// Process in-memory text as a plain-text document
    pub async fn run_text(&self, id: &str, text: &str) -> Result<DocumentReport, FatalError> {
        self.run(ParsedDocument::from_text(id, text)).await
    }

    /// Process one parsed document
    ///
    /// Returns the report once every chunk has been attempted, even if some
    /// chunks failed. Returns `FatalError` with the partial report if the
    /// document had to be aborted.
    pub async fn run(&self, input: ParsedDocument) -> Result<DocumentReport, FatalError> {
        let started = Instant::now();
        let mut run = DocumentRun::new(&input);

        info!(
            "Processing document '{}' ({}, {} bytes) with {}",
            input.id,
            input.format,
            input.text.len(),
            self.client.name()
        );

        match self.execute(&mut run, &input.text).await {
            Ok(()) => {
                let metadata = self.metadata(run.run_id, started);
                let report = run.into_report(metadata);
                info!(
                    "Document '{}' done: {} chunks, {} succeeded, {} failed, {} entities, {} relations",
                    report.document.id,
                    report.chunks.len(),
                    report.succeeded(),
                    report.failed(),
                    report.graph.entity_count(),
                    report.graph.relation_count()
                );
                Ok(report)
            }
            Err(cause) => {
                warn!("Document '{}' aborted during {}: {}", input.id, run.state, cause);
                run.abort(&cause);
                let metadata = self.metadata(run.run_id, started);
                let report = run.into_report(metadata);
                Err(FatalError {
                    cause,
                    report: Box::new(report),
                })
            }
        }
    }

    async fn execute(&self, run: &mut DocumentRun, text: &str) -> Result<(), ExtractorError> {
        let normalized = self.normalizer.normalize(text)?;
        run.document.char_len = normalized.char_len();
        run.document.text = normalized.text.clone();

        run.advance(PipelineState::Chunking)?;
        run.chunks = self.chunker.chunk(&normalized);
        info!("Document '{}' split into {} chunks", run.document.id, run.chunks.len());

        for index in 0..run.chunks.len() {
            run.advance(PipelineState::ExtractingChunk(index))?;
            self.process_chunk(run, index).await?;
        }

        run.advance(PipelineState::Finalizing)?;
        run.advance(PipelineState::Done)?;
        Ok(())
    }

    async fn process_chunk(&self, run: &mut DocumentRun, index: usize) -> Result<(), ExtractorError> {
        debug!(
            "Processing chunk {}/{} ({} chars, digest {} chars)",
            index + 1,
            run.chunks.len(),
            run.chunks[index].char_len,
            run.digest.char_len()
        );

        let outcome = self.extract(&run.chunks[index], &run.digest).await;
        match outcome {
            Ok(extraction) => {
                run.advance(PipelineState::Merging(index))?;
                let stats = run.graph.merge(index, &extraction, self.config.conflict_policy);
                if stats.dangling_relations > 0 {
                    warn!("Chunk {}: {} relations had no endpoints in the graph", index, stats.dangling_relations);
                }
                run.digest = self.summarizer.summarize(&run.graph);

                debug!(
                    "Chunk {} merged: {} new entities, {} new relations",
                    index, stats.new_entities, stats.new_relations
                );
                run.results.push(ChunkResult {
                    index,
                    status: ChunkStatus::Extracted {
                        extraction,
                        new_entities: stats.new_entities,
                        new_relations: stats.new_relations,
                    },
                });
                Ok(())
            }
            Err(failure) if failure.error.is_fatal() => {
                run.results.push(ChunkResult::failed(index, &failure.error, failure.raw_snippet));
                Err(failure.error)
            }
            Err(failure) => {
                run.advance(PipelineState::ChunkFailed(index))?;
                warn!("Chunk {} of '{}' failed: {}", index, run.document.id, failure.error);
                run.results.push(ChunkResult::failed(index, &failure.error, failure.raw_snippet));
                Ok(())
            }
        }
    }

    /// Prompt, call and parse for one chunk
    async fn extract(&self, chunk: &Chunk, digest: &ContextDigest) -> Result<ChunkExtraction, ChunkFailure> {
        let prompt = self.prompts.build(&chunk.text, digest).map_err(ChunkFailure::from)?;
        debug!("Prompt length: {} chars", prompt.len());

        let settings = self.config.extraction_settings();
        let response = match timeout(self.config.extraction_timeout(), self.client.extract(&prompt, &settings)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ChunkFailure::from(ExtractorError::from(e))),
            Err(_) => return Err(ChunkFailure::from(ExtractorError::Timeout)),
        };
        debug!("LLM response length: {} chars", response.len());

        self.parser.parse(&response).map_err(|error| ChunkFailure {
            error,
            raw_snippet: Some(response.chars().take(self.config.raw_snippet_len).collect()),
        })
    }

    pub(crate) fn metadata(&self, run_id: Uuid, started: Instant) -> ReportMetadata {
        ReportMetadata {
            run_id,
            client: self.client.name().to_string(),
            model_name: self.config.model_name.clone(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            processing_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

struct ChunkFailure {
    error: ExtractorError,
    raw_snippet: Option<String>,
}

impl From<ExtractorError> for ChunkFailure {
    fn from(error: ExtractorError) -> Self {
        Self {
            error,
            raw_snippet: None,
        }
    }
}

/// Mutable state of one document run
struct DocumentRun {
    run_id: Uuid,
    state: PipelineState,
    history: Vec<PipelineState>,
    document: Document,
    chunks: Vec<Chunk>,
    results: Vec<ChunkResult>,
    graph: KnowledgeGraph,
    digest: ContextDigest,
}

impl DocumentRun {
    fn new(input: &ParsedDocument) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            state: PipelineState::Normalizing,
            history: vec![PipelineState::Normalizing],
            document: Document {
                id: input.id.clone(),
                source: input.source.clone(),
                format: input.format.clone(),
                text: String::new(),
                char_len: 0,
            },
            chunks: Vec::new(),
            results: Vec::new(),
            graph: KnowledgeGraph::new(),
            digest: ContextDigest::empty(),
        }
    }

    fn advance(&mut self, next: PipelineState) -> Result<(), ExtractorError> {
        if !self.state.can_advance_to(&next) {
            return Err(ExtractorError::Config(format!(
                "invalid pipeline transition: {} -> {}",
                self.state, next
            )));
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Enter `FatalError` and mark every unattempted chunk as skipped
    fn abort(&mut self, cause: &ExtractorError) {
        if self.state.can_advance_to(&PipelineState::FatalError) {
            self.state = PipelineState::FatalError;
            self.history.push(PipelineState::FatalError);
        }

        for index in self.results.len()..self.chunks.len() {
            self.results.push(ChunkResult {
                index,
                status: ChunkStatus::Skipped {
                    reason: format!("document aborted ({})", cause.kind()),
                },
            });
        }
    }

    fn into_report(self, metadata: ReportMetadata) -> DocumentReport {
        DocumentReport {
            document: self.document,
            graph: self.graph,
            chunks: self.chunks,
            results: self.results,
            state_history: self.history,
            metadata,
        }
    }
}
