//! In-memory graph store
//!
//! Reference implementation of [`GraphStore`] for tests and local
//! experimentation. Not durable; ordering is deterministic (entities by id,
//! relations by insertion).

use super::GraphStore;
use crate::errors::{GraphError, Result};
use crate::models::{Entity, Relation, RelationFilter, ScoredEntity};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    entities: BTreeMap<String, Entity>,
    relations: Vec<Relation>,
}

/// Graph store backed by process memory
#[derive(Default)]
pub struct MemoryGraphStore {
    inner: RwLock<Inner>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entity_count(&self) -> usize {
        self.inner.read().await.entities.len()
    }

    pub async fn relation_count(&self) -> usize {
        self.inner.read().await.relations.len()
    }
}

/// Cosine similarity mapped into [0, 1]
fn similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    ((dot / (norm_a * norm_b) + 1.0) / 2.0).clamp(0.0, 1.0)
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn add_entity(&self, mut entity: Entity) -> Result<String> {
        if entity.id.is_empty() {
            entity.id = Uuid::new_v4().to_string();
        }

        let id = entity.id.clone();
        self.inner.write().await.entities.insert(id.clone(), entity);
        Ok(id)
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.inner.read().await.entities.get(id).cloned())
    }

    async fn add_relation(&self, mut relation: Relation) -> Result<String> {
        let mut inner = self.inner.write().await;

        for endpoint in [&relation.source_id, &relation.target_id] {
            if !inner.entities.contains_key(endpoint) {
                return Err(GraphError::EntityNotFound { id: endpoint.clone() });
            }
        }

        if relation.id.is_empty() {
            relation.id = Uuid::new_v4().to_string();
        }

        let id = relation.id.clone();
        match inner.relations.iter_mut().find(|r| r.id == id) {
            Some(existing) => *existing = relation,
            None => inner.relations.push(relation),
        }

        Ok(id)
    }

    async fn get_relations(&self, filter: &RelationFilter) -> Result<Vec<Relation>> {
        let inner = self.inner.read().await;
        let limit = filter.limit.unwrap_or(usize::MAX);

        Ok(inner
            .relations
            .iter()
            .filter(|r| filter.matches(r))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn vector_search(
        &self,
        embedding: &[f32],
        entity_type: Option<&str>,
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredEntity>> {
        let inner = self.inner.read().await;

        let mut scored: Vec<ScoredEntity> = inner
            .entities
            .values()
            .filter(|e| entity_type.map_or(true, |t| e.entity_type == t))
            .filter_map(|e| {
                let vector = e.embedding.as_ref()?;
                let score = similarity(embedding, vector);
                (score >= score_threshold).then(|| ScoredEntity { entity: e.clone(), score })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        debug!(results = scored.len(), top_k, "Vector search");
        Ok(scored)
    }

    async fn traverse(
        &self,
        start_id: &str,
        relation_type: Option<&str>,
        max_depth: usize,
        max_results: usize,
    ) -> Result<Vec<Entity>> {
        let inner = self.inner.read().await;

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        let mut result = Vec::new();

        visited.insert(start_id);
        queue.push_back((start_id, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }

            let neighbors = inner
                .relations
                .iter()
                .filter(|r| r.source_id == current)
                .filter(|r| relation_type.map_or(true, |t| r.relation_type == t));

            for rel in neighbors {
                if !visited.insert(rel.target_id.as_str()) {
                    continue;
                }

                if let Some(entity) = inner.entities.get(&rel.target_id) {
                    result.push(entity.clone());
                    if result.len() >= max_results {
                        return Ok(result);
                    }
                }

                queue.push_back((rel.target_id.as_str(), depth + 1));
            }
        }

        Ok(result)
    }

    async fn find_entities(
        &self,
        entity_type: Option<&str>,
        property: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        let inner = self.inner.read().await;

        Ok(inner
            .entities
            .values()
            .filter(|e| entity_type.map_or(true, |t| e.entity_type == t))
            .filter(|e| e.property_matches(property, value))
            .take(limit)
            .cloned()
            .collect())
    }
}
