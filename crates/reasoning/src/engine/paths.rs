//! Bounded multi-hop path search and path scoring

use crate::evidence::Evidence;
use graphmind_common::errors::Result;
use graphmind_common::models::{Entity, Path, Relation, RelationFilter};
use graphmind_common::GraphStore;
use std::collections::HashMap;
use tracing::debug;

/// Memoizes store reads for the duration of one search
struct GraphCursor<'a> {
    store: &'a dyn GraphStore,
    entities: HashMap<String, Option<Entity>>,
    outgoing: HashMap<String, Vec<Relation>>,
}

impl<'a> GraphCursor<'a> {
    fn new(store: &'a dyn GraphStore) -> Self {
        Self {
            store,
            entities: HashMap::new(),
            outgoing: HashMap::new(),
        }
    }

    async fn entity(&mut self, id: &str) -> Result<Option<Entity>> {
        if let Some(cached) = self.entities.get(id) {
            return Ok(cached.clone());
        }
        let entity = self.store.get_entity(id).await?;
        self.entities.insert(id.to_string(), entity.clone());
        Ok(entity)
    }

    async fn outgoing(&mut self, id: &str, relation_types: &[String]) -> Result<Vec<Relation>> {
        if let Some(cached) = self.outgoing.get(id) {
            return Ok(cached.clone());
        }

        let relations = if relation_types.is_empty() {
            self.store
                .get_relations(&RelationFilter::new().from_source(id))
                .await?
        } else {
            let mut relations = Vec::new();
            for relation_type in relation_types {
                let filter = RelationFilter::new().from_source(id).of_type(relation_type.clone());
                relations.extend(self.store.get_relations(&filter).await?);
            }
            relations
        };

        self.outgoing.insert(id.to_string(), relations.clone());
        Ok(relations)
    }
}

/// Breadth-first search for simple paths of 1..=`max_hops` edges.
///
/// With `target_id`, only paths ending at the target count and they are not
/// extended further. Without it, every explored path is a result. Stops once
/// `max_paths` results exist. A missing start entity yields no paths;
/// relations pointing at missing entities are skipped.
pub async fn find_paths(
    store: &dyn GraphStore,
    start_id: &str,
    target_id: Option<&str>,
    max_hops: usize,
    relation_types: &[String],
    max_paths: usize,
) -> Result<Vec<Path>> {
    let mut results: Vec<Path> = Vec::new();
    if max_hops == 0 || max_paths == 0 {
        return Ok(results);
    }

    let mut cursor = GraphCursor::new(store);
    let start = match cursor.entity(start_id).await? {
        Some(entity) => entity,
        None => {
            debug!(start_id = %start_id, "Path search start entity not found");
            return Ok(results);
        }
    };

    let mut frontier = vec![Path::start(start)];

    for hop in 1..=max_hops {
        let mut next = Vec::new();

        for path in &frontier {
            let end_id = path.end().id.clone();
            for relation in cursor.outgoing(&end_id, relation_types).await? {
                let node = match cursor.entity(&relation.target_id).await? {
                    Some(node) => node,
                    None => continue,
                };
                // Rejects revisits, keeping paths simple
                let extended = match path.extend(relation, node) {
                    Some(extended) => extended,
                    None => continue,
                };

                match target_id {
                    Some(target) if extended.end().id == target => results.push(extended),
                    Some(_) => next.push(extended),
                    None => {
                        results.push(extended.clone());
                        next.push(extended);
                    }
                }

                if results.len() >= max_paths {
                    debug!(hop, paths = results.len(), "Path limit reached");
                    return Ok(results);
                }
            }
        }

        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    debug!(start_id = %start_id, paths = results.len(), "Path search complete");
    Ok(results)
}

/// Mean edge weight; 1.0 for a path without edges
pub fn calculate_path_confidence(path: &Path) -> f32 {
    let edges = path.edges();
    if edges.is_empty() {
        return 1.0;
    }
    edges.iter().map(|e| e.weight).sum::<f32>() / edges.len() as f32
}

/// "A --[REL]--> B --[REL]--> C"
pub fn create_path_explanation(path: &Path) -> String {
    let mut text = path.start_node().display_name();
    for (edge, node) in path.edges().iter().zip(path.nodes().iter().skip(1)) {
        text.push_str(&format!(" --[{}]--> {}", edge.relation_type, node.display_name()));
    }
    text
}

/// Non-increasing in hop count, within [0, 1]
pub fn path_relevance(hops: usize, hop_decay: f32) -> f32 {
    (1.0 - hop_decay * hops.saturating_sub(1) as f32).clamp(0.0, 1.0)
}

/// One PATH evidence item per path
pub fn collect_evidence_from_paths(paths: Vec<Path>, source: &str, hop_decay: f32) -> Vec<Evidence> {
    paths
        .into_iter()
        .map(|path| {
            let confidence = calculate_path_confidence(&path);
            let relevance = path_relevance(path.hop_count(), hop_decay);
            let explanation = create_path_explanation(&path);
            Evidence::from_path(path, confidence, relevance, source, explanation)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceType;
    use graphmind_common::store::MemoryGraphStore;

    /// a -> b -> c -> d, a -> c, b -> a, plus a dangling-free diamond
    async fn store() -> MemoryGraphStore {
        let store = MemoryGraphStore::new();
        for id in ["a", "b", "c", "d"] {
            store
                .add_entity(Entity::new(id, "node").with_name(id.to_uppercase()))
                .await
                .unwrap();
        }
        let edges = [
            ("r1", "a", "b", 0.9),
            ("r2", "b", "c", 0.8),
            ("r3", "c", "d", 0.7),
            ("r4", "a", "c", 0.5),
            ("r5", "b", "a", 0.6),
        ];
        for (id, s, t, w) in edges {
            store.add_relation(Relation::new(id, "LINKS", s, t, w)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_paths_respect_hop_limit() {
        let store = store().await;
        for max_hops in 1..=4 {
            let paths = find_paths(&store, "a", None, max_hops, &[], 100).await.unwrap();
            assert!(!paths.is_empty());
            assert!(paths.iter().all(|p| p.hop_count() <= max_hops && p.hop_count() >= 1));
        }
    }

    #[tokio::test]
    async fn test_paths_respect_path_limit() {
        let store = store().await;
        let paths = find_paths(&store, "a", None, 4, &[], 2).await.unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[tokio::test]
    async fn test_target_paths_end_at_target() {
        let store = store().await;
        let paths = find_paths(&store, "a", Some("d"), 3, &[], 10).await.unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.end().id == "d"));
        // BFS discovery order: a->c->d before a->b->c->d
        assert_eq!(paths[0].node_ids(), vec!["a", "c", "d"]);
        assert_eq!(paths[1].node_ids(), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_paths_are_simple() {
        let store = store().await;
        let paths = find_paths(&store, "a", None, 4, &[], 100).await.unwrap();

        for path in &paths {
            let ids = path.node_ids();
            let unique: std::collections::HashSet<_> = ids.iter().collect();
            assert_eq!(unique.len(), ids.len());
        }
    }

    #[tokio::test]
    async fn test_relation_type_filter_and_missing_start() {
        let store = store().await;
        let none = find_paths(&store, "a", None, 2, &["OTHER".to_string()], 10).await.unwrap();
        assert!(none.is_empty());

        let missing = find_paths(&store, "zzz", None, 2, &[], 10).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_path_scoring_and_explanation() {
        let store = store().await;
        let paths = find_paths(&store, "a", Some("c"), 2, &[], 10).await.unwrap();
        let two_hop = paths.iter().find(|p| p.hop_count() == 2).unwrap();

        assert!((calculate_path_confidence(two_hop) - 0.85).abs() < 1e-6);
        assert_eq!(create_path_explanation(two_hop), "A --[LINKS]--> B --[LINKS]--> C");

        let lone = Path::start(Entity::new("x", "thing"));
        assert_eq!(calculate_path_confidence(&lone), 1.0);
        assert_eq!(create_path_explanation(&lone), "thing:x");
    }

    #[test]
    fn test_relevance_is_non_increasing() {
        let values: Vec<f32> = (0..20).map(|h| path_relevance(h, 0.1)).collect();
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(path_relevance(1, 0.1), 1.0);
    }

    #[tokio::test]
    async fn test_collect_evidence_from_paths() {
        let store = store().await;
        let paths = find_paths(&store, "a", Some("d"), 3, &[], 10).await.unwrap();
        let evidence = collect_evidence_from_paths(paths, "step_1", 0.1);

        assert_eq!(evidence.len(), 2);
        assert!(evidence.iter().all(|e| e.evidence_type == EvidenceType::Path && e.source == "step_1"));
        assert!(evidence[0].relevance_score > evidence[1].relevance_score);
    }
}
