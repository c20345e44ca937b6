//! LLM prompt engineering for knowledge-graph extraction

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::summarizer::ContextDigest;
use bearingkg_domain::EntityType;
use tracing::debug;

/// Builds size-bounded extraction prompts for single chunks
///
/// The instructions and format contract are fixed per configuration. The
/// chunk text is always included verbatim; only the context digest shrinks
/// when the prompt would exceed `max_prompt_size`.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    header: String,
    budget: usize,
}

impl PromptBuilder {
    /// Create a prompt builder for the given configuration
    pub fn new(config: &ExtractorConfig) -> Self {
        let mut header = String::new();

        // 1. Task instructions
        header.push_str(EXTRACTION_INSTRUCTIONS);
        header.push_str("\n\n");

        // 2. Recognized vocabulary
        header.push_str("Entity types:\n");
        for entity_type in &config.recognized_entity_types {
            header.push_str(&format!("- {}: {}\n", entity_type, describe(entity_type)));
        }
        let relations: Vec<&str> = config
            .recognized_relation_types
            .iter()
            .map(|r| r.as_str())
            .collect();
        header.push_str(&format!("\nRelation types: {}\n\n", relations.join(", ")));

        // 3. Output contract
        header.push_str(OUTPUT_FORMAT);

        Self {
            header,
            budget: config.max_prompt_size,
        }
    }

    /// Characters used by everything except the chunk text and the digest
    pub fn overhead(&self) -> usize {
        self.base_len(0)
    }

    /// Build the prompt for one chunk
    ///
    /// Fails with `ExtractorError::Config` if the chunk does not fit the
    /// budget even without any context.
    pub fn build(&self, chunk_text: &str, digest: &ContextDigest) -> Result<String, ExtractorError> {
        let chunk_chars = chunk_text.chars().count();
        let base = self.base_len(chunk_chars);
        if base > self.budget {
            return Err(ExtractorError::Config(format!(
                "prompt for a {}-char chunk needs {} chars, exceeding max_prompt_size {}",
                chunk_chars, base, self.budget
            )));
        }

        let framing = CONTEXT_INTRO.len() + 3;
        let room = self.budget - base;
        let context = if digest.is_empty() || room <= framing {
            ContextDigest::empty()
        } else if base + framing + digest.char_len() <= self.budget {
            digest.clone()
        } else {
            let fitted = digest.fit(room - framing);
            debug!(
                "Context digest shrunk from {} to {} items to fit prompt budget",
                digest.len(),
                fitted.len()
            );
            fitted
        };

        let mut prompt = String::with_capacity(self.header.len() + chunk_text.len() + context.text().len() + 256);
        prompt.push_str(&self.header);
        prompt.push_str("\n\n");

        // Prior context, if any
        if !context.is_empty() {
            prompt.push_str(CONTEXT_INTRO);
            prompt.push('\n');
            prompt.push_str(context.text());
            prompt.push_str("\n\n");
        }

        // The text to analyze
        prompt.push_str(TEXT_INTRO);
        prompt.push_str(chunk_text);
        prompt.push_str(TEXT_OUTRO);

        // Output format reminder
        prompt.push_str(OUTPUT_FORMAT_REMINDER);

        Ok(prompt)
    }

    fn base_len(&self, chunk_chars: usize) -> usize {
        self.header.chars().count()
            + 2
            + TEXT_INTRO.len()
            + chunk_chars
            + TEXT_OUTRO.len()
            + OUTPUT_FORMAT_REMINDER.len()
    }
}

fn describe(entity_type: &EntityType) -> &'static str {
    match entity_type {
        EntityType::FaultType => "a bearing fault, with optional severity (mild, moderate, severe)",
        EntityType::Cause => "a root cause of a fault, e.g. poor lubrication or misalignment",
        EntityType::SignalFeature => "how a fault shows up in a signal, with optional frequency_band",
        EntityType::CharacteristicFrequency => "a defect frequency such as BPFO, with optional formula",
        EntityType::DiagnosisMethod => "a diagnosis technique, with optional advantage and limitation",
        EntityType::InfluencingFactor => "a factor that disturbs signals or diagnosis, e.g. load or speed",
        EntityType::Custom(_) => "domain-specific type",
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"Extract a knowledge graph about rolling-bearing fault diagnosis from the text below.

Rules:
- Extract only what the text states; do not add outside knowledge
- When the text mentions a known entity, reuse its exact name and type
- Do not repeat known entities unless the text adds facts about them or a new relation uses them
- Every relation endpoint must also be listed in "entities" of your answer
- Put short scalar properties (severity, frequency_band, formula, advantage, limitation) in "attributes"
- Put any other explanation in "description"
- Relations are directed: "source" acts on or leads to "target""#;

const OUTPUT_FORMAT: &str = r#"Output format:
{
  "entities": [
    {"name": "...", "type": "<entity type>", "attributes": {"field": "value"}, "description": "..."}
  ],
  "relations": [
    {"source": "...", "source_type": "<entity type>", "relation": "<relation type>", "target": "...", "target_type": "<entity type>"}
  ]
}"#;

const CONTEXT_INTRO: &str = "Already extracted from earlier parts of this document:";

const TEXT_INTRO: &str = "Text to analyze:\n---\n";

const TEXT_OUTRO: &str = "\n---\n\n";

const OUTPUT_FORMAT_REMINDER: &str =
    "Remember: Return ONLY one valid JSON object in the format above, no markdown code blocks, no explanations.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::ContextSummarizer;
    use bearingkg_domain::{ChunkExtraction, ConflictPolicy, EntityDraft, KnowledgeGraph};

    fn digest(names: &[&str]) -> ContextDigest {
        let mut graph = KnowledgeGraph::new();
        let extraction = ChunkExtraction {
            entities: names.iter().map(|n| EntityDraft::new(*n, EntityType::FaultType)).collect(),
            relations: vec![],
        };
        graph.merge(0, &extraction, ConflictPolicy::LastWriteWins);
        ContextSummarizer::new(10_000).summarize(&graph)
    }

    #[test]
    fn test_prompt_includes_chunk_and_vocabulary() {
        let builder = PromptBuilder::new(&ExtractorConfig::default());
        let prompt = builder.build("The outer race shows spalling.", &ContextDigest::empty()).unwrap();

        assert!(prompt.contains("---\nThe outer race shows spalling.\n---"));
        assert!(prompt.contains("- CharacteristicFrequency:"));
        assert!(prompt.contains("has_feature_frequency"));
        assert!(!prompt.contains(CONTEXT_INTRO));
        assert!(prompt.ends_with(OUTPUT_FORMAT_REMINDER));
    }

    #[test]
    fn test_prompt_includes_context() {
        let builder = PromptBuilder::new(&ExtractorConfig::default());
        let prompt = builder.build("chunk", &digest(&["spalling"])).unwrap();

        assert!(prompt.contains(CONTEXT_INTRO));
        assert!(prompt.contains("- spalling (FaultType)"));
        assert!(prompt.find(CONTEXT_INTRO).unwrap() < prompt.find(TEXT_INTRO).unwrap());
    }

    #[test]
    fn test_overhead_matches_empty_prompt() {
        let builder = PromptBuilder::new(&ExtractorConfig::default());
        let prompt = builder.build("", &ContextDigest::empty()).unwrap();
        assert_eq!(prompt.chars().count(), builder.overhead());
    }

    #[test]
    fn test_digest_shrinks_but_chunk_survives() {
        let config = ExtractorConfig::default();
        let overhead = PromptBuilder::new(&config).overhead();
        let chunk = "x".repeat(100);
        let full = digest(&["spalling", "pitting", "smearing", "brinelling", "fretting"]);

        // Room for the chunk and roughly half the digest
        let budget = overhead + 100 + CONTEXT_INTRO.len() + 3 + full.char_len() / 2;
        let builder = PromptBuilder::new(&ExtractorConfig {
            max_prompt_size: budget,
            ..config
        });
        let prompt = builder.build(&chunk, &full).unwrap();

        assert!(prompt.chars().count() <= budget);
        assert!(prompt.contains(&chunk));
        assert!(prompt.contains(CONTEXT_INTRO));
        assert!(!prompt.contains(full.text()));
    }

    #[test]
    fn test_context_dropped_when_no_room() {
        let config = ExtractorConfig::default();
        let overhead = PromptBuilder::new(&config).overhead();
        let builder = PromptBuilder::new(&ExtractorConfig {
            max_prompt_size: overhead + 10,
            ..config
        });

        let prompt = builder.build("0123456789", &digest(&["spalling"])).unwrap();
        assert!(!prompt.contains(CONTEXT_INTRO));
        assert_eq!(prompt.chars().count(), overhead + 10);
    }

    #[test]
    fn test_oversized_chunk_is_config_error() {
        let config = ExtractorConfig::default();
        let overhead = PromptBuilder::new(&config).overhead();
        let builder = PromptBuilder::new(&ExtractorConfig {
            max_prompt_size: overhead + 5,
            ..config
        });

        let result = builder.build("too long for the budget", &ContextDigest::empty());
        assert!(matches!(result, Err(ExtractorError::Config(_))));
    }
}
