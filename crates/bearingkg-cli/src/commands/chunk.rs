//! Chunk command implementation.

use crate::cli::ChunkArgs;
use crate::error::Result;
use crate::output::Formatter;
use bearingkg_extractor::{Chunker, ExtractorConfig, ParserRegistry, TextNormalizer};

/// Execute the chunk command.
pub async fn execute_chunk(args: ChunkArgs, config: &ExtractorConfig, formatter: &Formatter) -> Result<()> {
    let bytes = tokio::fs::read(&args.file).await?;
    let name = args.file.display().to_string();

    let parsed = ParserRegistry::with_defaults()?.parse(&name, &bytes)?;
    let normalized = TextNormalizer::new(config.max_text_length).normalize(&parsed.text)?;
    let chunks = Chunker::from_config(config).chunk(&normalized);

    println!("{}", formatter.format_chunks(&chunks, args.full)?);
    if formatter.format() == crate::cli::CliFormat::Table {
        println!(
            "{}",
            formatter.info(&format!(
                "{} chars, {} paragraphs, {} chunks (max {} chars, {:?})",
                normalized.char_len(),
                normalized.paragraphs.len(),
                chunks.len(),
                config.max_chunk_size,
                config.chunk_strategy
            ))
        );
    }
    Ok(())
}
