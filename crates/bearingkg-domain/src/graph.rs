//! Knowledge graph and the merge rules that build it

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::entity::{Entity, EntityKey, EntityType};
use crate::extraction::ChunkExtraction;
use crate::relation::{Relation, RelationKey};

/// How conflicting scalar attributes are resolved on merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The value from the later chunk replaces the earlier one
    #[default]
    LastWriteWins,

    /// The first value seen is kept
    FirstWriteWins,
}

/// Counts describing what a single merge did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Entities inserted for the first time
    pub new_entities: usize,

    /// Existing entities that absorbed new data
    pub updated_entities: usize,

    /// Relations inserted for the first time
    pub new_relations: usize,

    /// Relations that collapsed into an existing edge
    pub duplicate_relations: usize,

    /// Relations whose endpoints are not in the graph
    pub dangling_relations: usize,
}

/// The entity/relation graph accumulated from one document
///
/// Entities are keyed by `(normalized name, type)` and relations by the
/// ordered triple `(source, type, target)`, so neither can hold duplicates.
/// The graph grows monotonically: merging never removes anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "GraphSnapshot", from = "GraphSnapshot")]
pub struct KnowledgeGraph {
    entities: BTreeMap<EntityKey, Entity>,
    relations: BTreeMap<RelationKey, Relation>,
}

impl KnowledgeGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk's extraction into the graph
    ///
    /// Merging the same extraction again for the same chunk index leaves the
    /// graph unchanged. Under a different index the content stays the same
    /// but the new index is added to every touched entity's and relation's
    /// `chunks`, so the graphs differ in provenance only.
    ///
    /// # Examples
    ///
    /// ```
    /// use bearingkg_domain::{ChunkExtraction, ConflictPolicy, EntityDraft, EntityType, KnowledgeGraph};
    ///
    /// let mut graph = KnowledgeGraph::new();
    /// let extraction = ChunkExtraction {
    ///     entities: vec![EntityDraft::new("outer-race defect", EntityType::FaultType)],
    ///     relations: vec![],
    /// };
    ///
    /// graph.merge(0, &extraction, ConflictPolicy::LastWriteWins);
    /// graph.merge(1, &extraction, ConflictPolicy::LastWriteWins);
    /// assert_eq!(graph.entity_count(), 1);
    /// ```
    pub fn merge(
        &mut self,
        chunk: usize,
        extraction: &ChunkExtraction,
        policy: ConflictPolicy,
    ) -> MergeStats {
        let mut stats = MergeStats::default();

        for draft in &extraction.entities {
            let ordinal = self.entities.len();
            match self.entities.entry(draft.key()) {
                Entry::Occupied(mut slot) => {
                    if slot.get_mut().absorb(draft, chunk, policy) {
                        stats.updated_entities += 1;
                    }
                }
                Entry::Vacant(slot) => {
                    let key = slot.key().clone();
                    slot.insert(Entity::from_draft(key, draft, chunk, ordinal));
                    stats.new_entities += 1;
                }
            }
        }

        for draft in &extraction.relations {
            if !self.entities.contains_key(&draft.source) || !self.entities.contains_key(&draft.target) {
                stats.dangling_relations += 1;
                continue;
            }

            let key = RelationKey {
                source: draft.source.clone(),
                relation: draft.relation.clone(),
                target: draft.target.clone(),
            };
            let ordinal = self.relations.len();
            match self.relations.entry(key) {
                Entry::Occupied(mut slot) => {
                    slot.get_mut().chunks.insert(chunk);
                    stats.duplicate_relations += 1;
                }
                Entry::Vacant(slot) => {
                    slot.insert(Relation {
                        source: draft.source.clone(),
                        relation: draft.relation.clone(),
                        target: draft.target.clone(),
                        chunks: BTreeSet::from([chunk]),
                        ordinal,
                    });
                    stats.new_relations += 1;
                }
            }
        }

        stats
    }

    /// Number of entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of relations
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// True if the graph holds nothing
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    /// Look up an entity by key
    pub fn entity(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// True if an entity with this key exists
    pub fn contains_entity(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Entities in insertion order
    pub fn entities(&self) -> Vec<&Entity> {
        let mut entities: Vec<&Entity> = self.entities.values().collect();
        entities.sort_by_key(|e| e.ordinal);
        entities
    }

    /// Relations in insertion order
    pub fn relations(&self) -> Vec<&Relation> {
        let mut relations: Vec<&Relation> = self.relations.values().collect();
        relations.sort_by_key(|r| r.ordinal);
        relations
    }

    /// Entities of one type, in insertion order
    pub fn entities_of_type(&self, entity_type: &EntityType) -> Vec<&Entity> {
        self.entities()
            .into_iter()
            .filter(|e| e.entity_type() == entity_type)
            .collect()
    }
}

/// Serialized form of a graph: plain entity and relation lists
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphSnapshot {
    entities: Vec<Entity>,
    relations: Vec<Relation>,
}

impl From<KnowledgeGraph> for GraphSnapshot {
    fn from(graph: KnowledgeGraph) -> Self {
        let mut entities: Vec<Entity> = graph.entities.into_values().collect();
        entities.sort_by_key(|e| e.ordinal);
        let mut relations: Vec<Relation> = graph.relations.into_values().collect();
        relations.sort_by_key(|r| r.ordinal);
        Self { entities, relations }
    }
}

impl From<GraphSnapshot> for KnowledgeGraph {
    fn from(snapshot: GraphSnapshot) -> Self {
        let entities = snapshot
            .entities
            .into_iter()
            .map(|e| (e.key.clone(), e))
            .collect();
        let relations = snapshot
            .relations
            .into_iter()
            .map(|r| (r.key(), r))
            .collect();
        Self { entities, relations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{EntityDraft, RelationDraft};
    use proptest::prelude::*;

    fn outer_race() -> EntityDraft {
        EntityDraft::new("outer-race defect", EntityType::FaultType)
    }

    fn vibration() -> EntityDraft {
        EntityDraft::new("high-frequency vibration", EntityType::SignalFeature)
    }

    #[test]
    fn test_merge_into_empty_graph() {
        let mut graph = KnowledgeGraph::new();
        let stats = graph.merge(
            0,
            &ChunkExtraction {
                entities: vec![outer_race(), vibration()],
                relations: vec![RelationDraft::new(outer_race().key(), "causes", vibration().key())],
            },
            ConflictPolicy::LastWriteWins,
        );

        assert_eq!(stats.new_entities, 2);
        assert_eq!(stats.new_relations, 1);
        assert_eq!(graph.entity_count(), 2);
        assert_eq!(graph.relation_count(), 1);
    }

    #[test]
    fn test_outer_race_example_across_chunks() {
        let mut graph = KnowledgeGraph::new();

        let first = ChunkExtraction {
            entities: vec![outer_race()],
            relations: vec![],
        };
        let second = ChunkExtraction {
            entities: vec![outer_race(), vibration()],
            relations: vec![RelationDraft::new(outer_race().key(), "causes", vibration().key())],
        };

        graph.merge(0, &first, ConflictPolicy::LastWriteWins);
        graph.merge(1, &second, ConflictPolicy::LastWriteWins);

        assert_eq!(graph.entities_of_type(&EntityType::FaultType).len(), 1);
        assert_eq!(graph.relation_count(), 1);

        let fault = graph.entity(&outer_race().key()).unwrap();
        assert_eq!(fault.chunks, BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_duplicate_relations_collapse() {
        let mut graph = KnowledgeGraph::new();
        let relation = RelationDraft::new(outer_race().key(), "indicated-by", vibration().key());
        let extraction = ChunkExtraction {
            entities: vec![outer_race(), vibration()],
            relations: vec![relation.clone(), relation],
        };

        let stats = graph.merge(0, &extraction, ConflictPolicy::LastWriteWins);
        assert_eq!(stats.new_relations, 1);
        assert_eq!(stats.duplicate_relations, 1);
        assert_eq!(graph.relation_count(), 1);
    }

    #[test]
    fn test_dangling_relation_is_not_inserted() {
        let mut graph = KnowledgeGraph::new();
        let extraction = ChunkExtraction {
            entities: vec![outer_race()],
            relations: vec![RelationDraft::new(outer_race().key(), "causes", vibration().key())],
        };

        let stats = graph.merge(0, &extraction, ConflictPolicy::LastWriteWins);
        assert_eq!(stats.dangling_relations, 1);
        assert_eq!(graph.relation_count(), 0);
    }

    #[test]
    fn test_remerge_is_idempotent() {
        let extraction = ChunkExtraction {
            entities: vec![
                outer_race().with_attribute("severity", "moderate").with_note("seen on the drive end"),
                vibration(),
            ],
            relations: vec![RelationDraft::new(outer_race().key(), "causes", vibration().key())],
        };

        let mut once = KnowledgeGraph::new();
        once.merge(4, &extraction, ConflictPolicy::LastWriteWins);

        let mut twice = once.clone();
        let stats = twice.merge(4, &extraction, ConflictPolicy::LastWriteWins);

        assert_eq!(once, twice);
        assert_eq!(stats.new_entities, 0);
        assert_eq!(stats.updated_entities, 0);
        assert_eq!(stats.new_relations, 0);
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let mut graph = KnowledgeGraph::new();
        graph.merge(
            0,
            &ChunkExtraction {
                entities: vec![vibration(), outer_race()],
                relations: vec![],
            },
            ConflictPolicy::LastWriteWins,
        );

        let names: Vec<&str> = graph.entities().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["high-frequency vibration", "outer-race defect"]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut graph = KnowledgeGraph::new();
        graph.merge(
            0,
            &ChunkExtraction {
                entities: vec![outer_race().with_attribute("severity", "severe"), vibration()],
                relations: vec![RelationDraft::new(outer_race().key(), "causes", vibration().key())],
            },
            ConflictPolicy::LastWriteWins,
        );

        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["entities"].as_array().unwrap().len(), 2);
        assert_eq!(json["relations"][0]["relation"], "causes");
        assert_eq!(json["entities"][0]["key"]["type"], "FaultType");

        let back: KnowledgeGraph = serde_json::from_value(json).unwrap();
        assert_eq!(back, graph);
    }

    fn arb_type() -> impl Strategy<Value = EntityType> {
        prop_oneof![
            Just(EntityType::FaultType),
            Just(EntityType::Cause),
            Just(EntityType::SignalFeature),
        ]
    }

    fn arb_extraction() -> impl Strategy<Value = ChunkExtraction> {
        let entity = ("[a-d]", arb_type(), proptest::option::of("[xyz]")).prop_map(|(name, ty, severity)| {
            let draft = EntityDraft::new(name, ty);
            match severity {
                Some(value) => draft.with_attribute("severity", value),
                None => draft,
            }
        });

        proptest::collection::vec(entity, 0..6).prop_flat_map(|entities| {
            let keys: Vec<EntityKey> = entities.iter().map(EntityDraft::key).collect();
            let relation = if keys.is_empty() {
                Just(Vec::new()).boxed()
            } else {
                let n = keys.len();
                proptest::collection::vec((0..n, "causes|produces", 0..n), 0..4)
                    .prop_map(move |triples| {
                        triples
                            .into_iter()
                            .map(|(s, rel, t)| RelationDraft::new(keys[s].clone(), &rel, keys[t].clone()))
                            .collect()
                    })
                    .boxed()
            };
            relation.prop_map(move |relations| ChunkExtraction {
                entities: entities.clone(),
                relations,
            })
        })
    }

    proptest! {
        #[test]
        fn prop_merge_is_monotonic(extractions in proptest::collection::vec(arb_extraction(), 1..8)) {
            let mut graph = KnowledgeGraph::new();
            let mut entities = 0;
            let mut relations = 0;
            for (chunk, extraction) in extractions.iter().enumerate() {
                graph.merge(chunk, extraction, ConflictPolicy::LastWriteWins);
                prop_assert!(graph.entity_count() >= entities);
                prop_assert!(graph.relation_count() >= relations);
                entities = graph.entity_count();
                relations = graph.relation_count();
            }
        }

        #[test]
        fn prop_remerge_same_chunk_is_idempotent(extraction in arb_extraction(), chunk in 0usize..10) {
            let mut once = KnowledgeGraph::new();
            once.merge(chunk, &extraction, ConflictPolicy::LastWriteWins);
            let mut twice = once.clone();
            twice.merge(chunk, &extraction, ConflictPolicy::LastWriteWins);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_remerge_other_chunk_changes_provenance_only(
            extraction in arb_extraction(),
            first in 0usize..10,
            second in 10usize..20,
        ) {
            let mut once = KnowledgeGraph::new();
            once.merge(first, &extraction, ConflictPolicy::LastWriteWins);
            let mut twice = once.clone();
            twice.merge(second, &extraction, ConflictPolicy::LastWriteWins);

            prop_assert_eq!(content(&once), content(&twice));
            for entity in twice.entities() {
                prop_assert!(entity.chunks.contains(&second));
            }
        }
    }

    type Content = (
        Vec<(EntityKey, String, BTreeMap<String, String>, Vec<String>, usize)>,
        Vec<(RelationKey, usize)>,
    );

    /// Graph content with chunk provenance left out
    fn content(graph: &KnowledgeGraph) -> Content {
        let entities = graph
            .entities()
            .into_iter()
            .map(|e| (e.key.clone(), e.name.clone(), e.attributes.clone(), e.notes.clone(), e.ordinal))
            .collect();
        let relations = graph.relations().into_iter().map(|r| (r.key(), r.ordinal)).collect();
        (entities, relations)
    }
}
