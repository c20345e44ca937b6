//! Output formatting for the CLI.

use crate::cli::CliFormat;
use crate::error::Result;
use bearingkg_extractor::{Chunk, ChunkResult, ChunkStatus, DocumentOutcome, DocumentReport};
use colored::*;
use serde_json::{json, Value};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

const PREVIEW_CHARS: usize = 60;

/// Output formatter.
pub struct Formatter {
    format: CliFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: CliFormat, color_enabled: bool) -> Self {
        Self { format, color_enabled }
    }

    /// Selected output format.
    pub fn format(&self) -> CliFormat {
        self.format
    }

    /// Format the outcome of one document.
    pub fn format_outcome(&self, outcome: &DocumentOutcome) -> Result<String> {
        match self.format {
            CliFormat::Json => Ok(serde_json::to_string_pretty(&outcome_json(outcome)?)?),
            CliFormat::Table => Ok(self.outcome_table(outcome)),
        }
    }

    /// Format a chunking preview.
    pub fn format_chunks(&self, chunks: &[Chunk], full: bool) -> Result<String> {
        if self.format == CliFormat::Json {
            return Ok(serde_json::to_string_pretty(chunks)?);
        }
        if chunks.is_empty() {
            return Ok(self.colorize("No chunks (empty document).", "yellow"));
        }

        let mut builder = Builder::default();
        builder.push_record(["#", "Chars", "Kind", "Text"]);
        for chunk in chunks {
            let text = if full { chunk.text.clone() } else { preview(&chunk.text) };
            builder.push_record([
                chunk.index.to_string(),
                chunk.char_len.to_string(),
                format!("{:?}", chunk.kind),
                text,
            ]);
        }
        Ok(styled(builder))
    }

    fn outcome_table(&self, outcome: &DocumentOutcome) -> String {
        let (report, headline) = match outcome {
            Ok(report) if report.is_complete() => (report, self.success(&summary(report))),
            Ok(report) => (report, self.warning(&summary(report))),
            Err(fatal) => (fatal.report.as_ref(), self.error(&fatal.to_string())),
        };

        let mut sections = vec![headline];
        if report.graph.is_empty() {
            sections.push(self.colorize("No entities extracted.", "yellow"));
        } else {
            sections.push(entity_table(report));
            if report.graph.relation_count() > 0 {
                sections.push(relation_table(report));
            }
        }
        if !report.results.is_empty() {
            sections.push(self.chunk_table(&report.results, &report.chunks));
        }
        sections.join("\n")
    }

    fn chunk_table(&self, results: &[ChunkResult], chunks: &[Chunk]) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Chunk", "Chars", "Status", "Detail"]);

        for result in results {
            let chars = chunks.get(result.index).map_or(0, |c| c.char_len);
            let (status, detail) = match &result.status {
                ChunkStatus::Extracted {
                    new_entities,
                    new_relations,
                    ..
                } => (
                    self.colorize("ok", "green"),
                    format!("+{} entities, +{} relations", new_entities, new_relations),
                ),
                ChunkStatus::Failed { kind, message, .. } => {
                    (self.colorize(kind.as_str(), "red"), message.clone())
                }
                ChunkStatus::Skipped { reason } => (self.colorize("skipped", "yellow"), reason.clone()),
            };
            builder.push_record([result.index.to_string(), chars.to_string(), status, detail]);
        }
        styled(builder)
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

/// JSON form of one document outcome.
pub fn outcome_json(outcome: &DocumentOutcome) -> Result<Value> {
    Ok(match outcome {
        Ok(report) => json!({
            "status": "done",
            "report": serde_json::to_value(report)?,
        }),
        Err(fatal) => json!({
            "status": "fatal_error",
            "error": {
                "kind": fatal.kind(),
                "message": fatal.cause.to_string(),
            },
            "report": serde_json::to_value(fatal.report.as_ref())?,
        }),
    })
}

fn summary(report: &DocumentReport) -> String {
    format!(
        "{}: {} chunks ({} ok, {} failed), {} entities, {} relations in {} ms",
        report.document.id,
        report.chunks.len(),
        report.succeeded(),
        report.failed(),
        report.graph.entity_count(),
        report.graph.relation_count(),
        report.metadata.processing_time_ms
    )
}

fn entity_table(report: &DocumentReport) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Entity", "Type", "Attributes", "Chunks"]);
    for entity in report.graph.entities() {
        let attributes: Vec<String> = entity.attributes.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        builder.push_record([
            entity.name.clone(),
            entity.entity_type().to_string(),
            attributes.join(", "),
            join_indices(entity.chunks.iter()),
        ]);
    }
    styled(builder)
}

fn relation_table(report: &DocumentReport) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Source", "Relation", "Target", "Chunks"]);
    for relation in report.graph.relations() {
        builder.push_record([
            relation.source.name.clone(),
            relation.relation.to_string(),
            relation.target.name.clone(),
            join_indices(relation.chunks.iter()),
        ]);
    }
    styled(builder)
}

fn styled(builder: Builder) -> String {
    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

fn join_indices<'a>(indices: impl Iterator<Item = &'a usize>) -> String {
    indices.map(|i| i.to_string()).collect::<Vec<_>>().join(",")
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let head: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}…", head)
    }
}
