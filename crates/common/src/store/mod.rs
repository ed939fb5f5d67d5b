//! Graph store contract
//!
//! The storage engine itself (persistence, vector index, SQL backends) lives
//! outside graphmind. Reasoning code consumes it only through [`GraphStore`].

mod memory;

pub use memory::MemoryGraphStore;

use crate::errors::Result;
use crate::models::{Entity, Relation, RelationFilter, ScoredEntity};
use async_trait::async_trait;

/// Narrow interface to an entity/relation store.
///
/// All calls may fail with store-specific errors, which implementations map
/// onto `GraphError::Store` or `GraphError::StoreUnavailable`.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert or replace an entity, returning its id
    async fn add_entity(&self, entity: Entity) -> Result<String>;

    /// Fetch a single entity
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>>;

    /// Insert or replace a relation, returning its id
    async fn add_relation(&self, relation: Relation) -> Result<String>;

    /// Fetch relations matching a filter
    async fn get_relations(&self, filter: &RelationFilter) -> Result<Vec<Relation>>;

    /// Rank entities by embedding similarity, best first
    async fn vector_search(
        &self,
        embedding: &[f32],
        entity_type: Option<&str>,
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredEntity>>;

    /// Entities reachable from `start_id` within `max_depth` hops
    async fn traverse(
        &self,
        start_id: &str,
        relation_type: Option<&str>,
        max_depth: usize,
        max_results: usize,
    ) -> Result<Vec<Entity>>;

    /// Entities whose `property` equals `value`
    async fn find_entities(
        &self,
        entity_type: Option<&str>,
        property: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<Entity>>;
}
