//! Files in, document reports out

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::formats::{DocumentParser, ParserRegistry};
use crate::pipeline::{DocumentPipeline, PipelineState};
use crate::types::{Document, DocumentFormat, DocumentReport, FatalError};
use bearingkg_domain::{ExtractionClient, KnowledgeGraph};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of processing one document
pub type DocumentOutcome = Result<DocumentReport, FatalError>;

/// Parses files by extension and runs them through a [`DocumentPipeline`]
///
/// Documents are independent: each gets its own graph, and a fatal error in
/// one never affects another.
#[derive(Clone)]
pub struct DocumentProcessor {
    registry: Arc<ParserRegistry>,
    pipeline: Arc<DocumentPipeline>,
}

impl DocumentProcessor {
    /// Create a processor with the built-in format parsers
    pub fn new(client: Arc<dyn ExtractionClient>, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        Ok(Self {
            registry: Arc::new(ParserRegistry::with_defaults()?),
            pipeline: Arc::new(DocumentPipeline::new(client, config)?),
        })
    }

    /// Register an additional parser, replacing any for the same extension
    pub fn register(&mut self, extension: &str, parser: impl DocumentParser + 'static) {
        Arc::make_mut(&mut self.registry).register(extension, parser);
    }

    /// Parser registry in use
    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Underlying pipeline
    pub fn pipeline(&self) -> &DocumentPipeline {
        &self.pipeline
    }

    /// Read, parse and process one file
    pub async fn process_file(&self, path: impl AsRef<Path>) -> DocumentOutcome {
        let path = path.as_ref();
        let name = path.display().to_string();

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.rejected(&name, DocumentFormat::from_path(path), ExtractorError::Io(e))),
        };
        self.process_bytes(&name, &bytes).await
    }

    /// Parse and process a named in-memory document
    pub async fn process_bytes(&self, name: &str, bytes: &[u8]) -> DocumentOutcome {
        match self.registry.parse(name, bytes) {
            Ok(parsed) => self.pipeline.run(parsed).await,
            Err(cause) => Err(self.rejected(name, DocumentFormat::from_path(Path::new(name)), cause)),
        }
    }

    /// Process in-memory plain text
    pub async fn process_text(&self, id: &str, text: &str) -> DocumentOutcome {
        self.pipeline.run_text(id, text).await
    }

    /// Process several files with at most `jobs` documents in flight
    ///
    /// Outcomes are returned in input order.
    pub async fn process_many(&self, paths: &[PathBuf], jobs: usize) -> Vec<DocumentOutcome> {
        let jobs = jobs.max(1);
        info!("Processing {} documents, {} at a time", paths.len(), jobs);
        let semaphore = Arc::new(Semaphore::new(jobs));

        let mut handles = Vec::with_capacity(paths.len());
        for path in paths {
            let processor = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let path = path.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                processor.process_file(&path).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (handle, path) in handles.into_iter().zip(paths) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => {
                    let name = path.display().to_string();
                    outcomes.push(Err(self.rejected(&name, DocumentFormat::from_path(path), ExtractorError::Cancelled)));
                }
            }
        }
        outcomes
    }

    /// Fatal outcome for a document that never reached the pipeline
    fn rejected(&self, name: &str, format: DocumentFormat, cause: ExtractorError) -> FatalError {
        warn!("Document '{}' rejected: {}", name, cause);

        let report = DocumentReport {
            document: Document {
                id: name.to_string(),
                source: name.to_string(),
                format,
                text: String::new(),
                char_len: 0,
            },
            graph: KnowledgeGraph::new(),
            chunks: Vec::new(),
            results: Vec::new(),
            state_history: vec![PipelineState::FatalError],
            metadata: self.pipeline.metadata(Uuid::now_v7(), Instant::now()),
        };
        FatalError {
            cause,
            report: Box::new(report),
        }
    }
}
