//! Evidence Synthesizer - Merges, filters, and ranks evidence
//!
//! Provides:
//! - Grouping of evidence that shares entities, and per-group combination
//! - Confidence filtering
//! - Contradiction detection
//! - Overall confidence estimation
//! - Reliability ranking

use crate::evidence::{Evidence, EvidenceType, SYNTHESIS_SOURCE};
use graphmind_common::config::SynthesisConfig;
use graphmind_common::models::{Entity, Path, Relation};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tracing::debug;

/// How a group of corroborating evidence becomes one item
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMethod {
    /// Mean member confidence plus agreement boost
    #[default]
    WeightedAverage,
    /// Highest member confidence plus agreement boost
    Max,
    /// Share of confident members, blended with mean relevance
    Voting,
}

impl FromStr for SynthesisMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weighted_average" | "average" | "mean" => Ok(SynthesisMethod::WeightedAverage),
            "max" => Ok(SynthesisMethod::Max),
            "voting" | "vote" => Ok(SynthesisMethod::Voting),
            other => Err(format!("unknown synthesis method '{}'", other)),
        }
    }
}

/// Entity whose supporting evidence disagrees on confidence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contradiction {
    pub entity_id: String,

    /// Confidence of each evidence item referencing the entity
    pub confidences: Vec<f32>,

    /// max - min of `confidences`
    pub spread: f32,
}

pub struct EvidenceSynthesizer {
    config: SynthesisConfig,
}

impl EvidenceSynthesizer {
    pub fn new(config: SynthesisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Merge evidence whose entity sets overlap, directly or through other items.
    ///
    /// Groups keep the position of their first member. Singletons are returned as-is.
    pub fn synthesize_evidence(&self, evidence: Vec<Evidence>, method: SynthesisMethod) -> Vec<Evidence> {
        let groups = group_by_shared_entities(&evidence);
        debug!(input = evidence.len(), groups = groups.len(), method = ?method, "Synthesizing evidence");

        let mut slots: Vec<Option<Evidence>> = evidence.into_iter().map(Some).collect();
        groups
            .into_iter()
            .filter_map(|members| {
                let group: Vec<Evidence> = members.iter().filter_map(|&i| slots[i].take()).collect();
                match group.len() {
                    0 => None,
                    1 => group.into_iter().next(),
                    _ => Some(self.combine(group, method)),
                }
            })
            .collect()
    }

    fn combine(&self, group: Vec<Evidence>, method: SynthesisMethod) -> Evidence {
        let n = group.len() as f32;
        let mean_confidence = group.iter().map(|e| e.confidence).sum::<f32>() / n;
        let mean_relevance = group.iter().map(|e| e.relevance_score).sum::<f32>() / n;
        let boost = self.config.agreement_boost * shared_entity_fraction(&group);

        let confidence = match method {
            SynthesisMethod::WeightedAverage => (mean_confidence + boost).min(1.0),
            SynthesisMethod::Max => {
                let max = group.iter().map(|e| e.confidence).fold(0.0_f32, f32::max);
                (max + boost).min(1.0)
            }
            SynthesisMethod::Voting => {
                let votes = group
                    .iter()
                    .filter(|e| e.confidence > self.config.confidence_threshold)
                    .count() as f32;
                (votes / n + mean_relevance) / 2.0
            }
        };

        let evidence_type = if group.iter().any(|e| !e.paths.is_empty()) {
            EvidenceType::Path
        } else if group.iter().any(|e| !e.relations.is_empty()) {
            EvidenceType::Relation
        } else {
            EvidenceType::Entity
        };

        let explanation = format!(
            "Combined from {} sources: {}",
            group.len(),
            group.iter().map(|e| e.explanation.as_str()).collect::<Vec<_>>().join("; ")
        );

        let mut entities: Vec<Entity> = Vec::new();
        let mut relations: Vec<Relation> = Vec::new();
        let mut paths: Vec<Path> = Vec::new();
        for member in group {
            for entity in member.entities {
                if !entities.iter().any(|e| e.id == entity.id) {
                    entities.push(entity);
                }
            }
            for relation in member.relations {
                if !relations.iter().any(|r| r.id == relation.id) {
                    relations.push(relation);
                }
            }
            for path in member.paths {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }

        Evidence::new(evidence_type, SYNTHESIS_SOURCE, explanation)
            .with_entities(entities)
            .with_relations(relations)
            .with_paths(paths)
            .with_scores(confidence, mean_relevance)
    }

    /// Keep items with confidence >= threshold
    pub fn filter_by_confidence(&self, evidence: Vec<Evidence>, threshold: f32) -> Vec<Evidence> {
        evidence.into_iter().filter(|e| e.confidence >= threshold).collect()
    }

    /// Entities referenced by two or more items whose confidences disagree
    pub fn detect_contradictions(&self, evidence: &[Evidence]) -> Vec<Contradiction> {
        let mut order: Vec<&str> = Vec::new();
        let mut confidences: HashMap<&str, Vec<f32>> = HashMap::new();

        for item in evidence {
            for id in item.entity_ids() {
                let entry = confidences.entry(id).or_insert_with(|| {
                    order.push(id);
                    Vec::new()
                });
                entry.push(item.confidence);
            }
        }

        order
            .into_iter()
            .filter_map(|id| {
                let values = confidences.remove(id)?;
                if values.len() < 2 {
                    return None;
                }
                let max = values.iter().copied().fold(f32::MIN, f32::max);
                let min = values.iter().copied().fold(f32::MAX, f32::min);
                let spread = max - min;
                (spread > self.config.contradiction_threshold).then(|| Contradiction {
                    entity_id: id.to_string(),
                    confidences: values,
                    spread,
                })
            })
            .collect()
    }

    /// Mean confidence with small bonuses for entity coverage and agreement, in [0, 1]
    pub fn estimate_overall_confidence(&self, evidence: &[Evidence]) -> f32 {
        if evidence.is_empty() {
            return 0.0;
        }

        let n = evidence.len() as f32;
        let mean = evidence.iter().map(|e| e.confidence).sum::<f32>() / n;

        let distinct: HashSet<&str> = evidence.iter().flat_map(|e| e.entity_ids()).collect();
        let coverage = self.config.coverage_bonus * (distinct.len().min(10) as f32 / 10.0);

        // Variance of values in [0, 1] is at most 0.25
        let agreement = if evidence.len() >= 2 {
            let variance = evidence.iter().map(|e| (e.confidence - mean).powi(2)).sum::<f32>() / n;
            self.config.agreement_bonus * (1.0 - (variance * 4.0).min(1.0))
        } else {
            0.0
        };

        (mean + coverage + agreement).clamp(0.0, 1.0)
    }

    /// Descending by combined score, with synthesized items boosted
    pub fn rank_by_reliability(&self, mut evidence: Vec<Evidence>) -> Vec<Evidence> {
        let score = |e: &Evidence| {
            let boost = if e.source == SYNTHESIS_SOURCE {
                self.config.synthesis_rank_boost
            } else {
                0.0
            };
            e.combined_score() + boost
        };

        evidence.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
        evidence
    }
}

impl Default for EvidenceSynthesizer {
    fn default() -> Self {
        Self::new(SynthesisConfig::default())
    }
}

/// Union-find over evidence indices joined by shared entity ids
fn group_by_shared_entities(evidence: &[Evidence]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..evidence.len()).collect();
    let mut owner: HashMap<&str, usize> = HashMap::new();

    for (i, item) in evidence.iter().enumerate() {
        for id in item.entity_ids() {
            match owner.get(id) {
                Some(&j) => union(&mut parent, i, j),
                None => {
                    owner.insert(id, i);
                }
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    for i in 0..evidence.len() {
        let root = find(&mut parent, i);
        match group_of_root.get(&root) {
            Some(&g) => groups[g].push(i),
            None => {
                group_of_root.insert(root, groups.len());
                groups.push(vec![i]);
            }
        }
    }
    groups
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        parent[ra.max(rb)] = ra.min(rb);
    }
}

/// Share of a group's distinct entities referenced by at least two members
fn shared_entity_fraction(group: &[Evidence]) -> f32 {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for item in group {
        for id in item.entity_ids() {
            *counts.entry(id).or_insert(0) += 1;
        }
    }
    if counts.is_empty() {
        return 0.0;
    }
    counts.values().filter(|&&c| c >= 2).count() as f32 / counts.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn about(ids: &[&str], confidence: f32, relevance: f32) -> Evidence {
        let entities = ids.iter().map(|id| Entity::new(*id, "person")).collect();
        Evidence::new(EvidenceType::Entity, "step_1", format!("about {}", ids.join(",")))
            .with_entities(entities)
            .with_scores(confidence, relevance)
    }

    fn synthesizer() -> EvidenceSynthesizer {
        EvidenceSynthesizer::default()
    }

    #[test]
    fn test_shared_entity_yields_one_combined_item() {
        let merged = synthesizer().synthesize_evidence(
            vec![about(&["alice", "bob"], 0.8, 1.0), about(&["bob"], 0.6, 0.5)],
            SynthesisMethod::WeightedAverage,
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, SYNTHESIS_SOURCE);
        assert!(merged[0].explanation.starts_with("Combined from 2 sources"));
        assert_eq!(merged[0].entity_ids(), vec!["alice", "bob"]);
        // mean 0.7 plus half the 0.1 boost (1 of 2 entities shared)
        assert!((merged[0].confidence - 0.75).abs() < 1e-5);
        assert!((merged[0].relevance_score - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_grouping_is_transitive_and_keeps_singletons() {
        let lone = about(&["zoe"], 0.4, 0.4);
        let lone_id = lone.evidence_id.clone();

        let merged = synthesizer().synthesize_evidence(
            vec![about(&["a", "b"], 0.5, 1.0), lone, about(&["b", "c"], 0.5, 1.0), about(&["c"], 0.5, 1.0)],
            SynthesisMethod::Max,
        );

        assert_eq!(merged.len(), 2);
        assert!(merged[0].explanation.starts_with("Combined from 3 sources"));
        assert_eq!(merged[1].evidence_id, lone_id);
    }

    #[test]
    fn test_max_and_voting() {
        let group = || vec![about(&["x"], 0.9, 1.0), about(&["x"], 0.3, 0.5)];
        let synth = synthesizer();

        let max = synth.synthesize_evidence(group(), SynthesisMethod::Max);
        assert!((max[0].confidence - 1.0).abs() < 1e-5);

        let voting = synth.synthesize_evidence(group(), SynthesisMethod::Voting);
        // one of two above 0.5, mean relevance 0.75
        assert!((voting[0].confidence - 0.625).abs() < 1e-5);
    }

    #[test]
    fn test_filter_by_confidence() {
        let kept = synthesizer().filter_by_confidence(
            vec![about(&["a"], 0.4, 1.0), about(&["b"], 0.6, 1.0), about(&["c"], 0.8, 1.0)],
            0.6,
        );
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_detect_contradictions() {
        let evidence = vec![
            about(&["wide"], 0.3, 1.0),
            about(&["wide"], 0.9, 1.0),
            about(&["narrow"], 0.7, 1.0),
            about(&["narrow"], 0.8, 1.0),
        ];

        let found = synthesizer().detect_contradictions(&evidence);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity_id, "wide");
        assert!((found[0].spread - 0.6).abs() < 1e-5);
        assert_eq!(found[0].confidences.len(), 2);
    }

    #[test]
    fn test_overall_confidence_bounds() {
        let synth = synthesizer();
        assert_eq!(synth.estimate_overall_confidence(&[]), 0.0);

        let high = synth.estimate_overall_confidence(&[about(&["a"], 1.0, 1.0), about(&["b"], 1.0, 1.0)]);
        assert!(high <= 1.0);

        let agreeing = synth.estimate_overall_confidence(&[about(&["a"], 0.6, 1.0), about(&["b"], 0.6, 1.0)]);
        let disagreeing = synth.estimate_overall_confidence(&[about(&["a"], 0.2, 1.0), about(&["b"], 1.0, 1.0)]);
        assert!(agreeing > 0.6);
        assert!(agreeing > disagreeing);
    }

    #[test]
    fn test_rank_by_reliability_boosts_synthesis() {
        let plain = about(&["a"], 0.7, 1.0);
        let mut synthesized = about(&["b"], 0.65, 1.0);
        synthesized.source = SYNTHESIS_SOURCE.to_string();

        let ranked = synthesizer().rank_by_reliability(vec![plain, synthesized]);
        assert_eq!(ranked[0].source, SYNTHESIS_SOURCE);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("voting".parse::<SynthesisMethod>().unwrap(), SynthesisMethod::Voting);
        assert_eq!("weighted_average".parse::<SynthesisMethod>().unwrap(), SynthesisMethod::WeightedAverage);
        assert!("median".parse::<SynthesisMethod>().is_err());
    }
}
