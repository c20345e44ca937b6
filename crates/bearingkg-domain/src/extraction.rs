//! Parsed output of a single extraction call, before merging

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entity::{EntityKey, EntityType};
use crate::relation::RelationType;

/// An entity as emitted by one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDraft {
    /// Name as spelled by the model
    pub name: String,

    /// Entity type
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// Scalar attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Free-text notes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl EntityDraft {
    /// Create a draft with no attributes
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            attributes: BTreeMap::new(),
            notes: Vec::new(),
        }
    }

    /// Add a scalar attribute
    pub fn with_attribute(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// Add a free-text note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Key this draft merges under
    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.name, self.entity_type.clone())
    }
}

/// A relation as emitted by one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDraft {
    /// Source entity
    pub source: EntityKey,

    /// Relation type
    pub relation: RelationType,

    /// Target entity
    pub target: EntityKey,
}

impl RelationDraft {
    /// Create a relation draft
    pub fn new(source: EntityKey, relation: &str, target: EntityKey) -> Self {
        Self {
            source,
            relation: RelationType::new(relation),
            target,
        }
    }
}

/// Entities and relations parsed from one chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkExtraction {
    /// Extracted entities
    pub entities: Vec<EntityDraft>,

    /// Extracted relations
    pub relations: Vec<RelationDraft>,
}

impl ChunkExtraction {
    /// True if nothing was extracted
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}
