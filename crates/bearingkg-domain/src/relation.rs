//! Relation module - typed, directed edges between entities

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::entity::EntityKey;

/// Relation type name, normalized
///
/// Lowercased, with hyphens and spaces folded to underscores, so that
/// `"indicated-by"` and `"Indicated by"` are the same relation type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RelationType(String);

impl RelationType {
    /// Create a normalized relation type
    ///
    /// # Examples
    ///
    /// ```
    /// use bearingkg_domain::RelationType;
    ///
    /// assert_eq!(RelationType::new("Indicated-By").as_str(), "indicated_by");
    /// ```
    pub fn new(name: &str) -> Self {
        let normalized = name
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();
        Self(normalized)
    }

    /// Normalized name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RelationType {
    fn from(value: String) -> Self {
        RelationType::new(&value)
    }
}

impl From<RelationType> for String {
    fn from(value: RelationType) -> Self {
        value.0
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a relation: the ordered triple (source, type, target)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationKey {
    /// Source entity
    pub source: EntityKey,

    /// Relation type
    pub relation: RelationType,

    /// Target entity
    pub target: EntityKey,
}

/// A relation accumulated in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Source entity
    pub source: EntityKey,

    /// Relation type
    pub relation: RelationType,

    /// Target entity
    pub target: EntityKey,

    /// Indices of the chunks that emitted this relation
    #[serde(default)]
    pub chunks: BTreeSet<usize>,

    /// Insertion order within the graph
    pub ordinal: usize,
}

impl Relation {
    /// Deduplication key
    pub fn key(&self) -> RelationKey {
        RelationKey {
            source: self.source.clone(),
            relation: self.relation.clone(),
            target: self.target.clone(),
        }
    }

    /// Highest chunk index that emitted this relation
    pub fn last_chunk(&self) -> Option<usize> {
        self.chunks.iter().next_back().copied()
    }

    /// Number of chunks that emitted this relation
    pub fn mentions(&self) -> usize {
        self.chunks.len()
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --{}--> {}", self.source.name, self.relation, self.target.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;

    #[test]
    fn test_relation_type_normalization() {
        assert_eq!(RelationType::new("causes").as_str(), "causes");
        assert_eq!(RelationType::new("indicated-by"), RelationType::new("Indicated by"));
        assert_eq!(RelationType::new("  has__feature-frequency ").as_str(), "has_feature_frequency");
    }

    #[test]
    fn test_direction_is_part_of_key() {
        let a = EntityKey::new("outer-race defect", EntityType::FaultType);
        let b = EntityKey::new("high-frequency vibration", EntityType::SignalFeature);

        let forward = RelationKey {
            source: a.clone(),
            relation: RelationType::new("causes"),
            target: b.clone(),
        };
        let backward = RelationKey {
            source: b,
            relation: RelationType::new("causes"),
            target: a,
        };
        assert_ne!(forward, backward);
    }

    #[test]
    fn test_display() {
        let relation = Relation {
            source: EntityKey::new("Poor Lubrication", EntityType::Cause),
            relation: RelationType::new("produces"),
            target: EntityKey::new("Wear", EntityType::FaultType),
            chunks: BTreeSet::from([0]),
            ordinal: 0,
        };
        assert_eq!(relation.to_string(), "poor lubrication --produces--> wear");
    }
}
