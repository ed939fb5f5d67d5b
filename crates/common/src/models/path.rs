//! Simple paths through the graph

use super::{Entity, Relation};
use serde::{Deserialize, Serialize};

/// Alternating node/edge sequence.
///
/// Invariants: `edges.len() == nodes.len() - 1` and no node id repeats.
/// Both are upheld by [`Path::start`] and [`Path::extend`]; the fields are
/// read-only from outside this module. Deserialization replays the edges
/// through `extend`, so malformed input is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPath")]
pub struct Path {
    nodes: Vec<Entity>,
    edges: Vec<Relation>,
}

/// Unchecked wire form of [`Path`]
#[derive(Deserialize)]
struct RawPath {
    nodes: Vec<Entity>,
    edges: Vec<Relation>,
}

impl TryFrom<RawPath> for Path {
    type Error = String;

    fn try_from(raw: RawPath) -> Result<Self, Self::Error> {
        if raw.edges.len() + 1 != raw.nodes.len() {
            return Err(format!(
                "path with {} node(s) must have {} edge(s), found {}",
                raw.nodes.len(),
                raw.nodes.len().saturating_sub(1),
                raw.edges.len()
            ));
        }

        let mut nodes = raw.nodes.into_iter();
        let start = nodes.next().ok_or_else(|| "path must have at least one node".to_string())?;

        let mut path = Path::start(start);
        for (edge, node) in raw.edges.into_iter().zip(nodes) {
            let edge_id = edge.id.clone();
            path = path
                .extend(edge, node)
                .ok_or_else(|| format!("edge '{}' does not continue the path or revisits a node", edge_id))?;
        }
        Ok(path)
    }
}

impl Path {
    /// Zero-hop path holding a single node
    pub fn start(node: Entity) -> Self {
        Self {
            nodes: vec![node],
            edges: Vec::new(),
        }
    }

    /// Extend by one edge and node.
    ///
    /// Returns `None` when the edge does not leave the current end node or
    /// the new node is already on the path.
    pub fn extend(&self, edge: Relation, node: Entity) -> Option<Self> {
        if edge.source_id != self.end().id || edge.target_id != node.id || self.contains(&node.id) {
            return None;
        }

        let mut next = self.clone();
        next.edges.push(edge);
        next.nodes.push(node);
        Some(next)
    }

    /// Append another path that starts where this one ends
    pub fn concat(&self, tail: &Path) -> Option<Self> {
        if tail.start_node().id != self.end().id {
            return None;
        }

        let mut joined = self.clone();
        for (edge, node) in tail.edges.iter().zip(tail.nodes.iter().skip(1)) {
            joined = joined.extend(edge.clone(), node.clone())?;
        }
        Some(joined)
    }

    pub fn nodes(&self) -> &[Entity] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Relation] {
        &self.edges
    }

    pub fn start_node(&self) -> &Entity {
        // nodes is never empty by construction
        &self.nodes[0]
    }

    pub fn end(&self) -> &Entity {
        &self.nodes[self.nodes.len() - 1]
    }

    /// Number of edges
    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == entity_id)
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> Entity {
        Entity::new(id, "person")
    }

    #[test]
    fn test_extend_keeps_invariant() {
        let path = Path::start(node("a"))
            .extend(Relation::new("r1", "KNOWS", "a", "b", 0.9), node("b"))
            .and_then(|p| p.extend(Relation::new("r2", "KNOWS", "b", "c", 0.8), node("c")))
            .unwrap();

        assert_eq!(path.hop_count(), 2);
        assert_eq!(path.edges().len(), path.nodes().len() - 1);
        assert_eq!(path.node_ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_extend_rejects_cycles_and_mismatched_edges() {
        let path = Path::start(node("a"))
            .extend(Relation::new("r1", "KNOWS", "a", "b", 0.9), node("b"))
            .unwrap();

        assert!(path.extend(Relation::new("r2", "KNOWS", "b", "a", 0.9), node("a")).is_none());
        assert!(path.extend(Relation::new("r3", "KNOWS", "x", "c", 0.9), node("c")).is_none());
    }

    #[test]
    fn test_concat() {
        let head = Path::start(node("a"))
            .extend(Relation::new("r1", "KNOWS", "a", "b", 0.9), node("b"))
            .unwrap();
        let tail = Path::start(node("b"))
            .extend(Relation::new("r2", "WORKS_AT", "b", "x", 1.0), node("x"))
            .unwrap();

        let joined = head.concat(&tail).unwrap();
        assert_eq!(joined.node_ids(), vec!["a", "b", "x"]);

        let looping = Path::start(node("b"))
            .extend(Relation::new("r3", "KNOWS", "b", "a", 1.0), node("a"))
            .unwrap();
        assert!(head.concat(&looping).is_none());
    }

    #[test]
    fn test_deserialize_round_trip() {
        let path = Path::start(node("a"))
            .extend(Relation::new("r1", "KNOWS", "a", "b", 0.9), node("b"))
            .unwrap();
        let json = serde_json::to_string(&path).unwrap();

        let parsed: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, path);
    }

    #[test]
    fn test_deserialize_rejects_broken_paths() {
        assert!(serde_json::from_str::<Path>(r#"{"nodes":[],"edges":[]}"#).is_err());

        let a = serde_json::to_value(node("a")).unwrap();
        let b = serde_json::to_value(node("b")).unwrap();
        let ab = serde_json::to_value(Relation::new("r1", "KNOWS", "a", "b", 0.9)).unwrap();
        let ba = serde_json::to_value(Relation::new("r2", "KNOWS", "b", "a", 0.9)).unwrap();

        // Edge count must be one less than node count
        let missing_edge = serde_json::json!({ "nodes": [a.clone(), b.clone()], "edges": [] });
        assert!(serde_json::from_value::<Path>(missing_edge).is_err());

        // Edges must chain from node to node
        let wrong_direction = serde_json::json!({ "nodes": [a.clone(), b.clone()], "edges": [ba.clone()] });
        assert!(serde_json::from_value::<Path>(wrong_direction).is_err());

        let cyclic = serde_json::json!({ "nodes": [a.clone(), b, a], "edges": [ab, ba] });
        assert!(serde_json::from_value::<Path>(cyclic).is_err());
    }
}
