//! Answer text and confidence from ranked evidence

use crate::evidence::{Evidence, EvidenceType};
use graphmind_common::models::Entity;
use tracing::debug;

/// Answer used when no evidence survived execution
pub const NO_EVIDENCE_ANSWER: &str = "No evidence was found in the graph to answer this query.";

/// Build the answer from evidence that is already ranked best-first.
///
/// Confidence is the mean combined score of the top `top_n` items, so better
/// evidence never lowers it.
pub fn generate_answer(query: &str, evidence: &[Evidence], top_n: usize) -> (String, f32) {
    if evidence.is_empty() {
        return (NO_EVIDENCE_ANSWER.to_string(), 0.0);
    }

    let top = &evidence[..top_n.max(1).min(evidence.len())];
    let confidence = top.iter().map(Evidence::combined_score).sum::<f32>() / top.len() as f32;

    let answer = path_answer(evidence)
        .or_else(|| entity_answer(evidence))
        .unwrap_or_else(|| evidence[0].explanation.clone());

    debug!(query = %query, confidence, "Generated answer");
    (answer, confidence.clamp(0.0, 1.0))
}

/// Narrative connecting the best path's start to every reachable endpoint
fn path_answer(evidence: &[Evidence]) -> Option<String> {
    let best = evidence
        .iter()
        .filter(|e| e.evidence_type == EvidenceType::Path)
        .find_map(|e| e.paths.first().map(|p| (e, p)))?;
    let (best_evidence, best_path) = best;
    let start = best_path.start_node();

    let mut endpoints: Vec<&Entity> = Vec::new();
    for path in evidence.iter().flat_map(|e| e.paths.iter()) {
        let end = path.end();
        if path.start_node().id == start.id && end.id != start.id && !endpoints.iter().any(|e| e.id == end.id) {
            endpoints.push(end);
        }
    }

    let names: Vec<String> = endpoints.iter().map(|e| e.display_name()).collect();
    Some(format!(
        "{} is connected to {}. Strongest connection: {}.",
        start.display_name(),
        join_names(&names),
        best_evidence.explanation
    ))
}

fn entity_answer(evidence: &[Evidence]) -> Option<String> {
    let mut entities: Vec<&Entity> = Vec::new();
    for entity in evidence.iter().flat_map(|e| e.entities.iter()) {
        if !entities.iter().any(|e| e.id == entity.id) {
            entities.push(entity);
        }
    }

    match entities.as_slice() {
        [] => None,
        [only] => Some(format!("{} ({}) matches the query.", only.display_name(), only.entity_type)),
        many => {
            let names: Vec<String> = many.iter().map(|e| e.display_name()).collect();
            Some(format!("Relevant entities: {}.", join_names(&names)))
        }
    }
}

/// "A", "A and B", "A, B and C"
fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmind_common::models::{Path, Relation};

    fn person(id: &str, name: &str) -> Entity {
        Entity::new(id, "person").with_name(name)
    }

    #[test]
    fn test_no_evidence() {
        let (answer, confidence) = generate_answer("q", &[], 3);
        assert_eq!(answer, NO_EVIDENCE_ANSWER);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_single_entity() {
        let evidence = vec![Evidence::from_entity(person("alice", "Alice"), 1.0, 0.5, "s1")];
        let (answer, confidence) = generate_answer("who", &evidence, 3);

        assert_eq!(answer, "Alice (person) matches the query.");
        assert!((confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_multiple_entities() {
        let evidence = vec![
            Evidence::from_entity(person("a", "Ann"), 1.0, 1.0, "s1"),
            Evidence::from_entity(person("b", "Ben"), 1.0, 1.0, "s1"),
            Evidence::from_entity(person("c", "Cat"), 1.0, 1.0, "s1"),
        ];
        let (answer, _) = generate_answer("who", &evidence, 3);
        assert_eq!(answer, "Relevant entities: Ann, Ben and Cat.");
    }

    #[test]
    fn test_path_narrative() {
        let alice = person("alice", "Alice");
        let bob = person("bob", "Bob");
        let path = Path::start(alice)
            .extend(Relation::new("r1", "KNOWS", "alice", "bob", 0.9), bob)
            .unwrap();
        let evidence = vec![Evidence::from_path(path, 0.9, 1.0, "s1", "Alice --[KNOWS]--> Bob")];

        let (answer, _) = generate_answer("who", &evidence, 3);
        assert_eq!(answer, "Alice is connected to Bob. Strongest connection: Alice --[KNOWS]--> Bob.");
    }

    #[test]
    fn test_evidence_with_empty_path_is_rejected() {
        let alice = person("alice", "Alice");
        let bob = person("bob", "Bob");
        let path = Path::start(alice)
            .extend(Relation::new("r1", "KNOWS", "alice", "bob", 0.9), bob)
            .unwrap();
        let mut json = serde_json::to_value(Evidence::from_path(path, 0.9, 1.0, "s1", "x")).unwrap();
        json["paths"] = serde_json::json!([{ "nodes": [], "edges": [] }]);

        assert!(serde_json::from_value::<Evidence>(json).is_err());
    }

    #[test]
    fn test_confidence_monotonic_in_quality() {
        let weak = vec![Evidence::from_entity(person("a", "Ann"), 0.4, 1.0, "s1")];
        let strong = vec![Evidence::from_entity(person("a", "Ann"), 0.9, 1.0, "s1")];

        let (_, low) = generate_answer("q", &weak, 3);
        let (_, high) = generate_answer("q", &strong, 3);
        assert!(high > low);
    }
}
