//! bearingkg Domain Layer
//!
//! Core model for the bearing-fault knowledge graph and the trait boundary
//! towards the language model that extracts it.
//!
//! ## Key Concepts
//!
//! - **Entity**: a typed node (fault type, cause, signal feature, ...) keyed by
//!   its normalized name and type
//! - **Relation**: a typed, directed edge between two entity keys
//! - **KnowledgeGraph**: the deduplicated set of entities and relations built
//!   from one document; it only ever grows
//! - **ChunkExtraction**: the parsed output of one LLM call, ready to be merged
//!
//! ## Architecture
//!
//! - Pure data and merge logic, no I/O
//! - Infrastructure (HTTP providers, parsers) lives in other crates
//! - The `ExtractionClient` trait is the only seam towards the model

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod extraction;
pub mod graph;
pub mod relation;
pub mod traits;

// Re-exports for convenience
pub use entity::{normalize_name, Entity, EntityKey, EntityType};
pub use extraction::{ChunkExtraction, EntityDraft, RelationDraft};
pub use graph::{ConflictPolicy, KnowledgeGraph, MergeStats};
pub use relation::{Relation, RelationKey, RelationType};
pub use traits::{ClientError, ExtractionClient, ExtractionSettings};
