//! Inference rules
//!
//! Provides:
//! - [`InferenceRule`] definitions (transitive, symmetric)
//! - Single-round rule application over a relation set

use graphmind_common::models::Relation;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Rule schema
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    /// A–R→B and B–R→C ⇒ A–R→C
    Transitive,
    /// A–R→B ⇒ B–R→A
    Symmetric,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Transitive => "transitive",
            RuleType::Symmetric => "symmetric",
        }
    }
}

/// A rule deriving new relations of one type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceRule {
    pub rule_id: String,

    pub rule_type: RuleType,

    /// Relation type the rule reads and produces
    pub relation_type: String,

    /// Subtracted from every inferred confidence
    pub confidence_decay: f32,
}

impl InferenceRule {
    pub fn new(
        rule_id: impl Into<String>,
        rule_type: RuleType,
        relation_type: impl Into<String>,
        confidence_decay: f32,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            rule_type,
            relation_type: relation_type.into(),
            confidence_decay: confidence_decay.max(0.0),
        }
    }

    /// Transitive rule with id `transitive_<type>`
    pub fn transitive(relation_type: impl Into<String>, confidence_decay: f32) -> Self {
        let relation_type = relation_type.into();
        let rule_id = format!("transitive_{}", relation_type.to_lowercase());
        Self::new(rule_id, RuleType::Transitive, relation_type, confidence_decay)
    }

    /// Symmetric rule with id `symmetric_<type>`
    pub fn symmetric(relation_type: impl Into<String>, confidence_decay: f32) -> Self {
        let relation_type = relation_type.into();
        let rule_id = format!("symmetric_{}", relation_type.to_lowercase());
        Self::new(rule_id, RuleType::Symmetric, relation_type, confidence_decay)
    }

    /// Candidates derivable in one round.
    ///
    /// `all` holds every relation known so far and `delta` the ids of those
    /// added in the previous round; each candidate uses at least one delta
    /// relation, so a round never rediscovers what earlier rounds produced.
    /// Pairs already in `known` are skipped.
    pub fn apply(
        &self,
        all: &[Relation],
        delta: &HashSet<String>,
        known: &HashSet<(String, String)>,
    ) -> Vec<Candidate> {
        match self.rule_type {
            RuleType::Transitive => self.apply_transitive(all, delta, known),
            RuleType::Symmetric => self.apply_symmetric(all, delta, known),
        }
    }

    fn apply_transitive(
        &self,
        all: &[Relation],
        delta: &HashSet<String>,
        known: &HashSet<(String, String)>,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for first in all {
            for second in all.iter().filter(|r| r.source_id == first.target_id) {
                if !delta.contains(&first.id) && !delta.contains(&second.id) {
                    continue;
                }
                if first.source_id == second.target_id {
                    continue;
                }
                let pair = (first.source_id.clone(), second.target_id.clone());
                if known.contains(&pair) {
                    continue;
                }

                let confidence = decayed(first.weight * second.weight, self.confidence_decay);
                let explanation = format!(
                    "{} {} {} and {} {} {}, so {} {} {}",
                    first.source_id,
                    self.relation_type,
                    first.target_id,
                    second.source_id,
                    self.relation_type,
                    second.target_id,
                    pair.0,
                    self.relation_type,
                    pair.1,
                );

                candidates.push(Candidate {
                    source_id: pair.0,
                    target_id: pair.1,
                    confidence,
                    premises: vec![first.clone(), second.clone()],
                    explanation,
                });
            }
        }

        candidates
    }

    fn apply_symmetric(
        &self,
        all: &[Relation],
        delta: &HashSet<String>,
        known: &HashSet<(String, String)>,
    ) -> Vec<Candidate> {
        all.iter()
            .filter(|r| delta.contains(&r.id) && r.source_id != r.target_id)
            .filter(|r| !known.contains(&(r.target_id.clone(), r.source_id.clone())))
            .map(|r| Candidate {
                source_id: r.target_id.clone(),
                target_id: r.source_id.clone(),
                confidence: decayed(r.weight, self.confidence_decay),
                premises: vec![r.clone()],
                explanation: format!(
                    "{} {} {} is symmetric, so {} {} {}",
                    r.source_id, self.relation_type, r.target_id, r.target_id, self.relation_type, r.source_id
                ),
            })
            .collect()
    }
}

/// Relation a rule could infer, before deduplication
#[derive(Debug, Clone)]
pub struct Candidate {
    pub source_id: String,
    pub target_id: String,
    pub confidence: f32,
    pub premises: Vec<Relation>,
    pub explanation: String,
}

/// Negative results clamp to 0
fn decayed(confidence: f32, decay: f32) -> f32 {
    (confidence - decay).clamp(0.0, 1.0)
}
