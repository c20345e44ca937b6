//! Entity module - typed nodes of the knowledge graph

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::extraction::EntityDraft;
use crate::graph::ConflictPolicy;

/// Type of an entity
///
/// The six built-in variants cover the bearing-fault domain. Anything else the
/// configuration recognizes is carried as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    /// A bearing fault, e.g. "outer-race defect", "spalling"
    FaultType,

    /// Root cause of a fault, e.g. "poor lubrication"
    Cause,

    /// How a fault shows up in a measured signal, e.g. "periodic impacts"
    SignalFeature,

    /// Characteristic defect frequency, e.g. "BPFO"
    CharacteristicFrequency,

    /// Diagnosis technique, e.g. "envelope analysis"
    DiagnosisMethod,

    /// Factor disturbing the signal or the diagnosis, e.g. "shaft speed"
    InfluencingFactor,

    /// Any other configured type
    Custom(String),
}

impl EntityType {
    /// All built-in types, in display order
    pub const BUILTIN: [EntityType; 6] = [
        EntityType::FaultType,
        EntityType::Cause,
        EntityType::SignalFeature,
        EntityType::CharacteristicFrequency,
        EntityType::DiagnosisMethod,
        EntityType::InfluencingFactor,
    ];

    /// Parse a type name leniently
    ///
    /// Case, underscores, hyphens and spaces are ignored when matching the
    /// built-in names, so `"fault_type"`, `"Fault Type"` and `"FaultType"` are
    /// the same type.
    ///
    /// # Examples
    ///
    /// ```
    /// use bearingkg_domain::EntityType;
    ///
    /// assert_eq!(EntityType::parse("signal-feature"), EntityType::SignalFeature);
    /// assert_eq!(EntityType::parse("Sensor"), EntityType::Custom("Sensor".to_string()));
    /// ```
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        match fold(trimmed).as_str() {
            "faulttype" | "bearingfaulttype" | "fault" => EntityType::FaultType,
            "cause" | "faultcause" => EntityType::Cause,
            "signalfeature" | "feature" => EntityType::SignalFeature,
            "characteristicfrequency" | "frequency" => EntityType::CharacteristicFrequency,
            "diagnosismethod" | "method" => EntityType::DiagnosisMethod,
            "influencingfactor" | "factor" => EntityType::InfluencingFactor,
            _ => EntityType::Custom(trimmed.to_string()),
        }
    }

    /// True if both types name the same type under the lenient folding
    ///
    /// Built-ins compare by variant; `Custom` names ignore case, underscores,
    /// hyphens and spaces, so `Custom("Sensor")` matches `Custom("sensor")`.
    pub fn matches(&self, other: &EntityType) -> bool {
        match (self, other) {
            (EntityType::Custom(a), EntityType::Custom(b)) => fold(a) == fold(b),
            _ => self == other,
        }
    }

    /// Canonical name of the type
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::FaultType => "FaultType",
            EntityType::Cause => "Cause",
            EntityType::SignalFeature => "SignalFeature",
            EntityType::CharacteristicFrequency => "CharacteristicFrequency",
            EntityType::DiagnosisMethod => "DiagnosisMethod",
            EntityType::InfluencingFactor => "InfluencingFactor",
            EntityType::Custom(name) => name,
        }
    }
}

fn fold(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl From<String> for EntityType {
    fn from(value: String) -> Self {
        EntityType::parse(&value)
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize an entity name for keying
///
/// Trims, collapses internal whitespace and lowercases, so that
/// "Outer-race  defect" and "outer-race defect" share a key.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Unique key of an entity: normalized name plus type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Normalized name
    pub name: String,

    /// Entity type
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

impl EntityKey {
    /// Build a key, normalizing the name
    pub fn new(name: &str, entity_type: EntityType) -> Self {
        Self {
            name: normalize_name(name),
            entity_type,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.entity_type)
    }
}

/// An entity accumulated in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Deduplication key
    pub key: EntityKey,

    /// Display name, as first spelled by the model
    pub name: String,

    /// Scalar attributes (severity, frequency band, formula, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Free-text notes, without exact duplicates
    #[serde(default)]
    pub notes: Vec<String>,

    /// Indices of the chunks that emitted this entity
    #[serde(default)]
    pub chunks: BTreeSet<usize>,

    /// Insertion order within the graph
    pub ordinal: usize,
}

impl Entity {
    pub(crate) fn from_draft(key: EntityKey, draft: &EntityDraft, chunk: usize, ordinal: usize) -> Self {
        let mut notes = Vec::with_capacity(draft.notes.len());
        for note in &draft.notes {
            if !notes.contains(note) {
                notes.push(note.clone());
            }
        }

        Self {
            key,
            name: draft.name.trim().to_string(),
            attributes: draft.attributes.clone(),
            notes,
            chunks: BTreeSet::from([chunk]),
            ordinal,
        }
    }

    /// Fold a newer occurrence of the same entity into this one
    ///
    /// Returns `true` if anything changed.
    pub(crate) fn absorb(&mut self, draft: &EntityDraft, chunk: usize, policy: ConflictPolicy) -> bool {
        let mut changed = self.chunks.insert(chunk);

        for (field, value) in &draft.attributes {
            match self.attributes.get(field) {
                Some(existing) if existing == value => {}
                Some(_) if policy == ConflictPolicy::FirstWriteWins => {}
                _ => {
                    self.attributes.insert(field.clone(), value.clone());
                    changed = true;
                }
            }
        }

        for note in &draft.notes {
            if !self.notes.contains(note) {
                self.notes.push(note.clone());
                changed = true;
            }
        }

        changed
    }

    /// Entity type
    pub fn entity_type(&self) -> &EntityType {
        &self.key.entity_type
    }

    /// Highest chunk index that emitted this entity
    pub fn last_chunk(&self) -> Option<usize> {
        self.chunks.iter().next_back().copied()
    }

    /// Number of chunks that emitted this entity
    pub fn mentions(&self) -> usize {
        self.chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builtin_types() {
        assert_eq!(EntityType::parse("FaultType"), EntityType::FaultType);
        assert_eq!(EntityType::parse("fault_type"), EntityType::FaultType);
        assert_eq!(EntityType::parse(" Cause "), EntityType::Cause);
        assert_eq!(EntityType::parse("Signal Feature"), EntityType::SignalFeature);
        assert_eq!(
            EntityType::parse("characteristic-frequency"),
            EntityType::CharacteristicFrequency
        );
        assert_eq!(EntityType::parse("DiagnosisMethod"), EntityType::DiagnosisMethod);
        assert_eq!(EntityType::parse("influencing_factor"), EntityType::InfluencingFactor);
    }

    #[test]
    fn test_parse_custom_type_keeps_spelling() {
        assert_eq!(
            EntityType::parse("  Lubricant "),
            EntityType::Custom("Lubricant".to_string())
        );
    }

    #[test]
    fn test_custom_types_match_leniently() {
        let sensor = EntityType::parse("Sensor");
        assert!(sensor.matches(&EntityType::parse("sensor")));
        assert!(EntityType::parse("Bearing Housing").matches(&EntityType::parse("bearing_housing")));
        assert!(!sensor.matches(&EntityType::parse("Lubricant")));
        assert!(!sensor.matches(&EntityType::FaultType));
        assert!(EntityType::FaultType.matches(&EntityType::parse("fault type")));
    }

    #[test]
    fn test_type_serializes_as_string() {
        let json = serde_json::to_string(&EntityType::SignalFeature).unwrap();
        assert_eq!(json, "\"SignalFeature\"");

        let parsed: EntityType = serde_json::from_str("\"cause\"").unwrap();
        assert_eq!(parsed, EntityType::Cause);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Outer-Race   Defect "), "outer-race defect");
        assert_eq!(normalize_name("外圈故障"), "外圈故障");
    }

    #[test]
    fn test_key_equality_ignores_spelling() {
        let a = EntityKey::new("Outer-race defect", EntityType::FaultType);
        let b = EntityKey::new("outer-race   DEFECT", EntityType::FaultType);
        let c = EntityKey::new("outer-race defect", EntityType::SignalFeature);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_absorb_last_write_wins() {
        let draft = EntityDraft::new("spalling", EntityType::FaultType)
            .with_attribute("severity", "mild");
        let mut entity = Entity::from_draft(draft.key(), &draft, 0, 0);

        let newer = EntityDraft::new("Spalling", EntityType::FaultType)
            .with_attribute("severity", "severe")
            .with_attribute("location", "outer race");
        assert!(entity.absorb(&newer, 1, ConflictPolicy::LastWriteWins));

        assert_eq!(entity.name, "spalling");
        assert_eq!(entity.attributes["severity"], "severe");
        assert_eq!(entity.attributes["location"], "outer race");
        assert_eq!(entity.last_chunk(), Some(1));
        assert_eq!(entity.mentions(), 2);
    }

    #[test]
    fn test_absorb_first_write_wins() {
        let draft = EntityDraft::new("spalling", EntityType::FaultType)
            .with_attribute("severity", "mild");
        let mut entity = Entity::from_draft(draft.key(), &draft, 0, 0);

        let newer = EntityDraft::new("spalling", EntityType::FaultType)
            .with_attribute("severity", "severe");
        entity.absorb(&newer, 1, ConflictPolicy::FirstWriteWins);

        assert_eq!(entity.attributes["severity"], "mild");
    }

    #[test]
    fn test_absorb_deduplicates_notes() {
        let draft = EntityDraft::new("poor lubrication", EntityType::Cause)
            .with_note("raises friction");
        let mut entity = Entity::from_draft(draft.key(), &draft, 0, 0);

        let again = EntityDraft::new("poor lubrication", EntityType::Cause)
            .with_note("raises friction")
            .with_note("leads to overheating");
        entity.absorb(&again, 2, ConflictPolicy::LastWriteWins);

        assert_eq!(entity.notes, vec!["raises friction", "leads to overheating"]);
    }

    #[test]
    fn test_absorb_same_chunk_twice_is_noop() {
        let draft = EntityDraft::new("spalling", EntityType::FaultType)
            .with_attribute("severity", "mild")
            .with_note("surface fatigue");
        let mut entity = Entity::from_draft(draft.key(), &draft, 3, 0);
        assert!(!entity.absorb(&draft, 3, ConflictPolicy::LastWriteWins));
    }
}
