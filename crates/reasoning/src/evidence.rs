//! Evidence - scored, sourced support units for an answer
//!
//! Provides:
//! - The [`Evidence`] value type and its builders
//! - Ranking by combined score, confidence, or relevance
//! - [`ReasoningResult`], the output of a reasoning run

use graphmind_common::models::{Entity, Path, Relation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

/// Source tag for evidence produced by merging other evidence
pub const SYNTHESIS_SOURCE: &str = "synthesis";

/// Source tag for evidence produced by rule inference
pub const INFERENCE_SOURCE: &str = "inference";

/// Kind of graph structure backing a piece of evidence
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceType {
    Entity,
    Relation,
    Path,
}

/// Scored support for an answer.
///
/// Evidence is a value: nothing in graphmind modifies it after creation, and
/// synthesis always produces new evidence. The combined score is derived on
/// demand so it can never disagree with the two scores it is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub evidence_id: String,

    pub evidence_type: EvidenceType,

    pub entities: Vec<Entity>,

    pub relations: Vec<Relation>,

    pub paths: Vec<Path>,

    /// How much the evidence can be trusted (0.0 - 1.0)
    pub confidence: f32,

    /// How relevant the evidence is to the query (0.0 - 1.0)
    pub relevance_score: f32,

    /// Producer tag (plan step id, "inference", "synthesis", ...)
    pub source: String,

    pub explanation: String,
}

impl Evidence {
    /// Start empty evidence of the given type
    pub fn new(evidence_type: EvidenceType, source: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            evidence_id: Uuid::new_v4().to_string(),
            evidence_type,
            entities: Vec::new(),
            relations: Vec::new(),
            paths: Vec::new(),
            confidence: 0.0,
            relevance_score: 0.0,
            source: source.into(),
            explanation: explanation.into(),
        }
    }

    /// Evidence for a single entity
    pub fn from_entity(entity: Entity, confidence: f32, relevance: f32, source: impl Into<String>) -> Self {
        let explanation = format!("Entity {} ({})", entity.display_name(), entity.entity_type);
        Self::new(EvidenceType::Entity, source, explanation)
            .with_entities(vec![entity])
            .with_scores(confidence, relevance)
    }

    /// Evidence for a relation and whichever endpoints are known
    pub fn from_relation(
        relation: Relation,
        endpoints: Vec<Entity>,
        confidence: f32,
        relevance: f32,
        source: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self::new(EvidenceType::Relation, source, explanation)
            .with_entities(endpoints)
            .with_relations(vec![relation])
            .with_scores(confidence, relevance)
    }

    /// Evidence for a path; its nodes and edges are copied alongside
    pub fn from_path(
        path: Path,
        confidence: f32,
        relevance: f32,
        source: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self::new(EvidenceType::Path, source, explanation)
            .with_entities(path.nodes().to_vec())
            .with_relations(path.edges().to_vec())
            .with_paths(vec![path])
            .with_scores(confidence, relevance)
    }

    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_relations(mut self, relations: Vec<Relation>) -> Self {
        self.relations = relations;
        self
    }

    pub fn with_paths(mut self, paths: Vec<Path>) -> Self {
        self.paths = paths;
        self
    }

    /// Set both scores, clamped into [0, 1]
    pub fn with_scores(mut self, confidence: f32, relevance: f32) -> Self {
        self.confidence = clamp_unit(confidence);
        self.relevance_score = clamp_unit(relevance);
        self
    }

    /// confidence × relevance_score
    pub fn combined_score(&self) -> f32 {
        self.confidence * self.relevance_score
    }

    /// Distinct entity ids referenced by this evidence, in first-seen order
    pub fn entity_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entities
            .iter()
            .map(|e| e.id.as_str())
            .chain(self.paths.iter().flat_map(|p| p.nodes().iter().map(|n| n.id.as_str())))
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Ordering key for evidence ranking
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RankMethod {
    #[default]
    CombinedScore,
    Confidence,
    Relevance,
}

impl RankMethod {
    fn key(&self, evidence: &Evidence) -> f32 {
        match self {
            RankMethod::CombinedScore => evidence.combined_score(),
            RankMethod::Confidence => evidence.confidence,
            RankMethod::Relevance => evidence.relevance_score,
        }
    }
}

impl FromStr for RankMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "combined" | "combined_score" | "score" => Ok(RankMethod::CombinedScore),
            "confidence" => Ok(RankMethod::Confidence),
            "relevance" => Ok(RankMethod::Relevance),
            other => Err(format!("unknown rank method '{}'", other)),
        }
    }
}

/// Stable descending sort by the chosen key
pub fn rank_evidence(mut evidence: Vec<Evidence>, method: RankMethod) -> Vec<Evidence> {
    evidence.sort_by(|a, b| {
        method
            .key(b)
            .partial_cmp(&method.key(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    evidence
}

/// Output of a reasoning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningResult {
    /// Original query
    pub query: String,

    /// Ranked evidence, best first
    pub evidence: Vec<Evidence>,

    /// Generated answer text
    pub answer: Option<String>,

    /// Aggregate confidence (0.0 - 1.0)
    pub confidence: f32,

    /// Ordered, human-readable log of each stage
    pub reasoning_trace: Vec<String>,

    /// Wall-clock execution time
    pub execution_time_ms: u64,
}

impl ReasoningResult {
    pub fn evidence_count(&self) -> usize {
        self.evidence.len()
    }

    /// True when an answer is backed by at least one piece of evidence
    pub fn has_answer(&self) -> bool {
        !self.evidence.is_empty() && self.answer.as_deref().map_or(false, |a| !a.is_empty())
    }

    pub fn get_top_evidence(&self, n: usize) -> &[Evidence] {
        &self.evidence[..n.min(self.evidence.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(confidence: f32, relevance: f32) -> Evidence {
        Evidence::new(EvidenceType::Entity, "test", "scored").with_scores(confidence, relevance)
    }

    #[test]
    fn test_combined_score_is_derived() {
        let evidence = scored(0.8, 0.5);
        assert!((evidence.combined_score() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_scores_clamped() {
        let evidence = scored(1.4, -0.3);
        assert_eq!(evidence.confidence, 1.0);
        assert_eq!(evidence.relevance_score, 0.0);
        assert_eq!(scored(f32::NAN, 0.5).confidence, 0.0);
    }

    #[test]
    fn test_rank_by_confidence_is_non_increasing() {
        let ranked = rank_evidence(
            vec![scored(0.3, 1.0), scored(0.9, 0.1), scored(0.6, 0.5)],
            RankMethod::Confidence,
        );
        let confidences: Vec<f32> = ranked.iter().map(|e| e.confidence).collect();
        assert!(confidences.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let first = scored(0.5, 0.5);
        let second = scored(0.5, 0.5);
        let first_id = first.evidence_id.clone();

        let ranked = rank_evidence(vec![first, second], RankMethod::CombinedScore);
        assert_eq!(ranked[0].evidence_id, first_id);
    }

    #[test]
    fn test_entity_ids_deduplicated() {
        let alice = Entity::new("alice", "person");
        let bob = Entity::new("bob", "person");
        let path = Path::start(alice.clone())
            .extend(Relation::new("r1", "KNOWS", "alice", "bob", 0.9), bob)
            .unwrap();

        let evidence = Evidence::from_path(path, 0.9, 1.0, "s1", "alice knows bob");
        assert_eq!(evidence.entity_ids(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_rank_method_parsing() {
        assert_eq!("confidence".parse::<RankMethod>().unwrap(), RankMethod::Confidence);
        assert_eq!("combined_score".parse::<RankMethod>().unwrap(), RankMethod::CombinedScore);
        assert!("bogus".parse::<RankMethod>().is_err());
    }

    #[test]
    fn test_top_evidence_bounds() {
        let result = ReasoningResult {
            query: "q".to_string(),
            evidence: vec![scored(0.9, 0.9)],
            answer: Some("a".to_string()),
            confidence: 0.81,
            reasoning_trace: vec![],
            execution_time_ms: 0,
        };
        assert_eq!(result.get_top_evidence(5).len(), 1);
        assert!(result.has_answer());
    }
}
