//! Graph data model
//!
//! Entities and relations are owned by the graph store; everything else in
//! graphmind refers to them by id or holds read-only copies.

mod entity;
mod path;
mod relation;

pub use entity::{Entity, ScoredEntity, NAME_PROPERTY};
pub use path::Path;
pub use relation::{Relation, RelationFilter};
