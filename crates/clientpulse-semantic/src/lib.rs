//! Semantic layer and relationship inference
//!
//! The semantic layer maps business entities and attributes onto catalog
//! tables and columns through explicit, validated mappings, and declares
//! cross-entity relations. The relationship inference engine proposes
//! additional join edges between tables from naming and value-overlap
//! heuristics; its proposals are advisory, confidence-tagged, and never
//! override a declared mapping or relation.

pub mod inference;
pub mod model;

pub use inference::{Confidence, InferredEdge, RelationshipInference};
pub use model::{
    Attribute, EntityDefinition, Mapping, Relation, RelationKind, SemanticModel, ValidationError,
};
