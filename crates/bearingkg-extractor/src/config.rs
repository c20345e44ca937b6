//! Configuration for the document pipeline

use crate::error::ExtractorError;
use crate::prompt::PromptBuilder;
use bearingkg_domain::{ConflictPolicy, EntityType, ExtractionSettings, RelationType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How paragraph units are grouped into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Pack consecutive paragraphs greedily up to the size limit
    #[default]
    Packed,
    /// Pack greedily, but every markdown heading starts a new chunk
    BySection,
    /// One paragraph per chunk
    ByParagraph,
}

/// Relation types recognized out of the box
pub const DEFAULT_RELATION_TYPES: [&str; 12] = [
    "causes",
    "caused_by",
    "produces",
    "manifests_as",
    "indicated_by",
    "has_feature_frequency",
    "associated_with",
    "depends_on",
    "detects",
    "detected_by",
    "influences",
    "influenced_by",
];

/// Configuration for the document pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum normalized text length (characters)
    pub max_text_length: usize,

    /// Maximum chunk size (characters)
    pub max_chunk_size: usize,

    /// Maximum prompt size sent to the model (characters)
    pub max_prompt_size: usize,

    /// Maximum size of the carried-over context digest (characters)
    pub context_digest_cap: usize,

    /// Chunking strategy
    pub chunk_strategy: ChunkStrategy,

    /// Entity types the model may emit
    pub recognized_entity_types: Vec<EntityType>,

    /// Relation types the model may emit
    pub recognized_relation_types: Vec<RelationType>,

    /// Resolution of conflicting attribute values
    pub conflict_policy: ConflictPolicy,

    /// Maximum time for a single extraction call (seconds)
    pub extraction_timeout_secs: u64,

    /// Model name passed to the client; empty lets the client choose
    pub model_name: String,

    /// Completion token limit per call
    pub max_tokens: u32,

    /// Characters of raw model output kept in failure records
    pub raw_snippet_len: usize,
}

impl ExtractorConfig {
    /// Get the extraction timeout as a Duration
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    /// Settings handed to the extraction client on every call
    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            model_name: self.model_name.clone(),
            max_tokens: self.max_tokens,
            timeout: self.extraction_timeout(),
        }
    }

    /// The configured spelling of `entity_type`, if it may appear in model output
    ///
    /// Custom types match leniently, so a reply of `"sensor"` resolves to a
    /// configured `"Sensor"` and both land under one graph key.
    pub fn recognized_entity(&self, entity_type: &EntityType) -> Option<&EntityType> {
        self.recognized_entity_types.iter().find(|t| t.matches(entity_type))
    }

    /// True if `relation` may appear in model output
    pub fn recognizes_relation(&self, relation: &RelationType) -> bool {
        self.recognized_relation_types.contains(relation)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_text_length == 0 {
            return Err("max_text_length must be greater than 0".to_string());
        }
        if self.max_chunk_size == 0 {
            return Err("max_chunk_size must be greater than 0".to_string());
        }
        if self.max_chunk_size > self.max_text_length {
            return Err("max_chunk_size cannot exceed max_text_length".to_string());
        }
        if self.extraction_timeout_secs == 0 {
            return Err("extraction_timeout_secs must be greater than 0".to_string());
        }
        if self.max_tokens == 0 {
            return Err("max_tokens must be greater than 0".to_string());
        }
        if self.recognized_entity_types.is_empty() {
            return Err("recognized_entity_types must not be empty".to_string());
        }
        if self.recognized_relation_types.is_empty() {
            return Err("recognized_relation_types must not be empty".to_string());
        }
        if self.recognized_relation_types.iter().any(|r| r.as_str().is_empty()) {
            return Err("recognized_relation_types contains an empty name".to_string());
        }

        let overhead = PromptBuilder::new(self).overhead();
        if self.max_chunk_size + overhead > self.max_prompt_size {
            return Err(format!(
                "max_chunk_size ({}) plus prompt overhead ({}) exceeds max_prompt_size ({})",
                self.max_chunk_size, overhead, self.max_prompt_size
            ));
        }
        Ok(())
    }

    /// Aggressive preset: small chunks and short timeouts
    pub fn aggressive() -> Self {
        Self {
            max_text_length: 50_000,
            max_chunk_size: 1_500,
            max_prompt_size: 4_500,
            context_digest_cap: 300,
            extraction_timeout_secs: 60,
            max_tokens: 2_048,
            ..Self::default()
        }
    }

    /// Lenient preset: large chunks, section-aligned, long timeouts
    pub fn lenient() -> Self {
        Self {
            max_text_length: 1_000_000,
            max_chunk_size: 6_000,
            max_prompt_size: 16_000,
            context_digest_cap: 1_200,
            chunk_strategy: ChunkStrategy::BySection,
            extraction_timeout_secs: 300,
            max_tokens: 8_192,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ExtractorError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml(&content).map_err(ExtractorError::Config)?;
        config.validate().map_err(ExtractorError::Config)?;
        Ok(config)
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_text_length: 200_000,
            max_chunk_size: 3_000,
            max_prompt_size: 8_000,
            context_digest_cap: 500,
            chunk_strategy: ChunkStrategy::Packed,
            recognized_entity_types: EntityType::BUILTIN.to_vec(),
            recognized_relation_types: DEFAULT_RELATION_TYPES
                .iter()
                .map(|name| RelationType::new(name))
                .collect(),
            conflict_policy: ConflictPolicy::LastWriteWins,
            extraction_timeout_secs: 120,
            model_name: String::new(),
            max_tokens: 4_096,
            raw_snippet_len: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractorConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_aggressive_config_is_valid() {
        let config = ExtractorConfig::aggressive();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lenient_config_is_valid() {
        let config = ExtractorConfig::lenient();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_max_text_length() {
        let config = ExtractorConfig {
            max_text_length: 0,
            ..ExtractorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_chunk_size_too_large() {
        let mut config = ExtractorConfig::default();
        config.max_chunk_size = config.max_text_length + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_must_fit_prompt_budget() {
        let config = ExtractorConfig {
            max_chunk_size: 3_000,
            max_prompt_size: 3_000,
            ..ExtractorConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("max_prompt_size"));
    }

    #[test]
    fn test_empty_type_lists_rejected() {
        let config = ExtractorConfig {
            recognized_entity_types: vec![],
            ..ExtractorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ExtractorConfig {
            recognized_relation_types: vec![],
            ..ExtractorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_recognizes_normalized_relation() {
        let config = ExtractorConfig::default();
        assert!(config.recognizes_relation(&RelationType::new("Indicated-By")));
        assert!(!config.recognizes_relation(&RelationType::new("cures")));
        assert_eq!(
            config.recognized_entity(&EntityType::parse("fault type")),
            Some(&EntityType::FaultType)
        );
        assert_eq!(config.recognized_entity(&EntityType::parse("Sensor")), None);
    }

    #[test]
    fn test_custom_entity_resolves_to_configured_spelling() {
        let config = ExtractorConfig {
            recognized_entity_types: vec![EntityType::FaultType, EntityType::parse("Sensor")],
            ..ExtractorConfig::default()
        };
        assert_eq!(
            config.recognized_entity(&EntityType::parse("sensor")),
            Some(&EntityType::Custom("Sensor".to_string()))
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ExtractorConfig::lenient();
        let toml_str = config.to_toml().unwrap();
        let parsed = ExtractorConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = ExtractorConfig::from_toml(
            r#"
            max_chunk_size = 1000
            chunk_strategy = "by_paragraph"
            recognized_entity_types = ["FaultType", "Sensor"]
            "#,
        )
        .unwrap();

        assert_eq!(parsed.max_chunk_size, 1000);
        assert_eq!(parsed.chunk_strategy, ChunkStrategy::ByParagraph);
        assert_eq!(
            parsed.recognized_entity_types,
            vec![EntityType::FaultType, EntityType::Custom("Sensor".to_string())]
        );
        assert_eq!(parsed.context_digest_cap, 500);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bearingkg.toml");
        std::fs::write(&path, "max_chunk_size = 2000\n").unwrap();

        let config = ExtractorConfig::from_file(&path).unwrap();
        assert_eq!(config.max_chunk_size, 2000);

        let missing = ExtractorConfig::from_file(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ExtractorError::Io(_))));
    }
}
