//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// BearingKG - Build bearing-fault knowledge graphs from technical documents.
#[derive(Debug, Parser)]
#[command(name = "bearingkg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "table")]
    pub format: CliFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Extractor configuration file (TOML)
    #[arg(short, long, global = true, env = "BEARINGKG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Start from a built-in preset instead of the default configuration
    #[arg(long, value_enum, global = true)]
    pub preset: Option<PresetArg>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Tables (default)
    Table,
    /// JSON, including chunk texts
    Json,
}

/// Built-in configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PresetArg {
    /// Balanced defaults
    Default,
    /// Small chunks and short timeouts
    Aggressive,
    /// Large chunks, sections kept together, long timeouts
    Lenient,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract a knowledge graph from one or more documents
    Process(ProcessArgs),

    /// Preview how a document is chunked, without calling the LLM
    Chunk(ChunkArgs),

    /// Print the effective configuration as TOML
    Config,
}

/// Arguments for the process command.
#[derive(Debug, Parser)]
pub struct ProcessArgs {
    /// Documents to process (.txt, .md, .markdown, .docx)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Documents processed at the same time
    #[arg(short, long, default_value = "1")]
    pub jobs: usize,

    /// LLM requests in flight across all documents
    #[arg(long, default_value = "1")]
    pub max_concurrent_requests: usize,

    /// Also write the full JSON output to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the chunk command.
#[derive(Debug, Parser)]
pub struct ChunkArgs {
    /// Document to chunk
    pub file: PathBuf,

    /// Show full chunk texts instead of a preview
    #[arg(long)]
    pub full: bool,
}
