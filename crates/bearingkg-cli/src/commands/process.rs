//! Process command implementation.

use crate::cli::ProcessArgs;
use crate::error::{CliError, Result};
use crate::output::{outcome_json, Formatter};
use bearingkg_domain::ExtractionClient;
use bearingkg_extractor::{DocumentOutcome, DocumentProcessor, ExtractorConfig};
use bearingkg_llm::{OpenAiProvider, ThrottledClient};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Execute the process command against the provider configured in the environment.
pub async fn execute_process(args: ProcessArgs, config: ExtractorConfig, formatter: &Formatter) -> Result<()> {
    let provider = OpenAiProvider::from_env()?;
    info!("Using model {}", provider.model());
    let client = ThrottledClient::new(provider, args.max_concurrent_requests.max(1));

    run(args, config, Arc::new(client), formatter).await
}

/// Process the documents with `client` and report every outcome.
///
/// Fails with `CliError::DocumentsAborted` if any document hit a fatal error.
pub async fn run(
    args: ProcessArgs,
    config: ExtractorConfig,
    client: Arc<dyn ExtractionClient>,
    formatter: &Formatter,
) -> Result<()> {
    let processor = DocumentProcessor::new(client, config)?;
    let outcomes = processor.process_many(&args.files, args.jobs).await;

    for outcome in &outcomes {
        println!("{}", formatter.format_outcome(outcome)?);
    }

    if let Some(path) = &args.output {
        write_json(path, &outcomes)?;
        println!("{}", formatter.success(&format!("Wrote {}", path.display())));
    }

    let aborted = outcomes.iter().filter(|o| o.is_err()).count();
    if aborted > 0 {
        return Err(CliError::DocumentsAborted(aborted, outcomes.len()));
    }
    Ok(())
}

fn write_json(path: &std::path::Path, outcomes: &[DocumentOutcome]) -> Result<()> {
    let documents = outcomes.iter().map(outcome_json).collect::<Result<Vec<Value>>>()?;
    std::fs::write(path, serde_json::to_string_pretty(&documents)?)?;
    Ok(())
}
