//! Inference Engine - Derives new relations from rules
//!
//! Provides:
//! - A rule registry shared across requests
//! - Bounded fixed-point closure over transitive and symmetric rules
//! - Result caching with LRU eviction and TTL
//! - Human-readable inference traces

mod cache;
mod rules;

pub use cache::{CacheStats, InferenceCache};
pub use rules::{Candidate, InferenceRule, RuleType};

use chrono::{DateTime, Utc};
use graphmind_common::config::InferenceConfig;
use graphmind_common::errors::Result;
use graphmind_common::metrics;
use graphmind_common::models::{Relation, RelationFilter};
use graphmind_common::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Property set on every inferred relation
pub const INFERRED_PROPERTY: &str = "inferred";

/// One rule application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceStep {
    pub step_id: String,

    pub inferred_relation: Relation,

    /// Relations the rule combined
    pub source_relations: Vec<Relation>,

    pub rule_id: String,

    pub confidence: f32,

    pub explanation: String,
}

/// Outcome of one `infer_relations` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResult {
    pub relation_type: String,

    pub inferred_relations: Vec<Relation>,

    pub inference_steps: Vec<InferenceStep>,

    pub total_steps: usize,

    /// Closure rounds that produced something
    pub rounds: usize,

    /// Mean confidence of inferred relations, 0.0 when none
    pub confidence: f32,

    pub explanation: String,

    pub computed_at: DateTime<Utc>,
}

/// Rule-based relation inference over a graph store
pub struct InferenceEngine {
    store: Arc<dyn GraphStore>,
    rules: RwLock<Vec<InferenceRule>>,
    cache: InferenceCache,
    config: InferenceConfig,
}

impl InferenceEngine {
    pub fn new(store: Arc<dyn GraphStore>, config: InferenceConfig) -> Self {
        let cache = InferenceCache::new(config.cache_max_size, config.cache_ttl());
        Self {
            store,
            rules: RwLock::new(Vec::new()),
            cache,
            config,
        }
    }

    /// Register a rule. A rule with the same id is replaced.
    pub async fn add_rule(&self, rule: InferenceRule) {
        let mut rules = self.rules.write().await;
        rules.retain(|r| r.rule_id != rule.rule_id);
        info!(rule_id = %rule.rule_id, rule_type = rule.rule_type.as_str(), relation_type = %rule.relation_type, "Added inference rule");
        rules.push(rule);
        drop(rules);

        // Cached results may predate the rule
        self.cache.clear().await;
    }

    /// Returns whether a rule was removed
    pub async fn remove_rule(&self, rule_id: &str) -> bool {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|r| r.rule_id != rule_id);
        let removed = rules.len() != before;
        drop(rules);

        if removed {
            self.cache.clear().await;
        }
        removed
    }

    /// All rules, or those for one relation type, in registration order
    pub async fn get_rules(&self, relation_type: Option<&str>) -> Vec<InferenceRule> {
        self.rules
            .read()
            .await
            .iter()
            .filter(|r| relation_type.map_or(true, |t| r.relation_type == t))
            .cloned()
            .collect()
    }

    /// Relation types with at least one rule
    pub async fn rule_relation_types(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rules
            .read()
            .await
            .iter()
            .filter(|r| seen.insert(r.relation_type.clone()))
            .map(|r| r.relation_type.clone())
            .collect()
    }

    /// Apply every rule for `relation_type` until nothing new appears or
    /// `max_steps` rounds have run.
    ///
    /// The closure runs over all relations of the type; `source_id` and
    /// `target_id` only filter which inferred relations are returned.
    #[instrument(skip(self))]
    pub async fn infer_relations(
        &self,
        relation_type: &str,
        max_steps: Option<usize>,
        source_id: Option<&str>,
        target_id: Option<&str>,
        use_cache: bool,
    ) -> Result<InferenceResult> {
        let started = Instant::now();
        let key = InferenceCache::key(relation_type, source_id, target_id);
        let max_steps = max_steps.unwrap_or(self.config.default_max_steps);

        if use_cache {
            if let Some(cached) = self.cache.get(&key, max_steps).await {
                metrics::record_inference(
                    started.elapsed().as_secs_f64(),
                    cached.inferred_relations.len(),
                    true,
                );
                return Ok(cached);
            }
        }

        let rules = self.get_rules(Some(relation_type)).await;

        let result = if rules.is_empty() {
            empty_result(relation_type, format!("No inference rules for {}", relation_type))
        } else {
            let base = self
                .store
                .get_relations(&RelationFilter::new().of_type(relation_type))
                .await?;
            let closure = self.closure(relation_type, &rules, base, max_steps);
            filter_endpoints(closure, source_id, target_id)
        };

        debug!(
            inferred = result.inferred_relations.len(),
            rounds = result.rounds,
            "Inference complete"
        );
        metrics::record_inference(
            started.elapsed().as_secs_f64(),
            result.inferred_relations.len(),
            false,
        );

        if use_cache {
            self.cache.put(key, result.clone(), max_steps).await;
        }
        Ok(result)
    }

    /// Semi-naive fixed point: each round only combines with last round's output
    fn closure(
        &self,
        relation_type: &str,
        rules: &[InferenceRule],
        base: Vec<Relation>,
        max_steps: usize,
    ) -> InferenceResult {
        let mut known: HashSet<(String, String)> = base
            .iter()
            .map(|r| (r.source_id.clone(), r.target_id.clone()))
            .collect();
        let mut delta: HashSet<String> = base.iter().map(|r| r.id.clone()).collect();
        let mut all = base;

        let mut steps: Vec<InferenceStep> = Vec::new();
        let mut rounds = 0;

        for _ in 0..max_steps {
            // Strongest derivation per pair wins within a round
            let mut round: Vec<(&InferenceRule, Candidate)> = Vec::new();
            let mut slots: HashMap<(String, String), usize> = HashMap::new();

            for rule in rules {
                for candidate in rule.apply(&all, &delta, &known) {
                    if candidate.confidence < self.config.min_confidence {
                        continue;
                    }
                    let pair = (candidate.source_id.clone(), candidate.target_id.clone());
                    match slots.get(&pair) {
                        Some(&slot) if round[slot].1.confidence >= candidate.confidence => {}
                        Some(&slot) => round[slot] = (rule, candidate),
                        None => {
                            slots.insert(pair, round.len());
                            round.push((rule, candidate));
                        }
                    }
                }
            }

            let mut produced = Vec::new();
            for (rule, candidate) in round {
                known.insert((candidate.source_id.clone(), candidate.target_id.clone()));

                let relation = inferred_relation(relation_type, rule, &candidate);
                steps.push(InferenceStep {
                    step_id: format!("inference_{}", steps.len() + 1),
                    inferred_relation: relation.clone(),
                    source_relations: candidate.premises,
                    rule_id: rule.rule_id.clone(),
                    confidence: candidate.confidence,
                    explanation: candidate.explanation,
                });
                produced.push(relation);
            }

            if produced.is_empty() {
                break;
            }
            rounds += 1;
            delta = produced.iter().map(|r| r.id.clone()).collect();
            all.extend(produced);
        }

        let inferred = steps.iter().map(|s| s.inferred_relation.clone()).collect();
        InferenceResult {
            relation_type: relation_type.to_string(),
            inferred_relations: inferred,
            total_steps: steps.len(),
            inference_steps: steps,
            rounds,
            confidence: 0.0,
            explanation: String::new(),
            computed_at: Utc::now(),
        }
    }

    /// Flatten a result into ordered, readable lines
    pub fn get_inference_trace(&self, result: &InferenceResult) -> Vec<String> {
        let mut trace = vec![format!(
            "Inferred {} {} relation(s) in {} round(s), confidence {:.2}",
            result.inferred_relations.len(),
            result.relation_type,
            result.rounds,
            result.confidence
        )];

        if result.inference_steps.is_empty() {
            trace.push(result.explanation.clone());
        }

        for (i, step) in result.inference_steps.iter().enumerate() {
            trace.push(format!(
                "Step {}: {} [rule {}, confidence {:.2}]",
                i + 1,
                step.explanation,
                step.rule_id,
                step.confidence
            ));
        }

        trace
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.get_stats().await
    }
}

fn inferred_relation(relation_type: &str, rule: &InferenceRule, candidate: &Candidate) -> Relation {
    Relation::new(
        format!("inferred:{}:{}:{}", relation_type, candidate.source_id, candidate.target_id),
        relation_type,
        candidate.source_id.clone(),
        candidate.target_id.clone(),
        candidate.confidence,
    )
    .with_property(INFERRED_PROPERTY, true)
    .with_property("rule_id", rule.rule_id.clone())
}

fn empty_result(relation_type: &str, explanation: String) -> InferenceResult {
    InferenceResult {
        relation_type: relation_type.to_string(),
        inferred_relations: Vec::new(),
        inference_steps: Vec::new(),
        total_steps: 0,
        rounds: 0,
        confidence: 0.0,
        explanation,
        computed_at: Utc::now(),
    }
}

/// Keep inferences touching the requested endpoints and fill in the summary
fn filter_endpoints(mut result: InferenceResult, source_id: Option<&str>, target_id: Option<&str>) -> InferenceResult {
    let keep = |r: &Relation| {
        source_id.map_or(true, |s| r.source_id == s) && target_id.map_or(true, |t| r.target_id == t)
    };

    result.inference_steps.retain(|s| keep(&s.inferred_relation));
    result.inferred_relations.retain(|r| keep(r));
    result.total_steps = result.inference_steps.len();

    result.confidence = if result.inferred_relations.is_empty() {
        0.0
    } else {
        result.inferred_relations.iter().map(|r| r.weight).sum::<f32>() / result.inferred_relations.len() as f32
    };
    result.explanation = if result.inferred_relations.is_empty() {
        format!("No new {} relations could be inferred", result.relation_type)
    } else {
        format!(
            "Inferred {} {} relation(s) with mean confidence {:.2}",
            result.inferred_relations.len(),
            result.relation_type,
            result.confidence
        )
    };

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmind_common::models::Entity;
    use graphmind_common::store::MemoryGraphStore;

    async fn chain_store() -> Arc<MemoryGraphStore> {
        let store = Arc::new(MemoryGraphStore::new());
        for id in ["a", "b", "c", "d"] {
            store.add_entity(Entity::new(id, "person")).await.unwrap();
        }
        store.add_relation(Relation::new("r1", "KNOWS", "a", "b", 0.9)).await.unwrap();
        store.add_relation(Relation::new("r2", "KNOWS", "b", "c", 0.8)).await.unwrap();
        store
    }

    fn engine(store: Arc<MemoryGraphStore>) -> InferenceEngine {
        InferenceEngine::new(store, InferenceConfig::default())
    }

    #[tokio::test]
    async fn test_transitive_inference() {
        let engine = engine(chain_store().await);
        engine.add_rule(InferenceRule::transitive("KNOWS", 0.0)).await;

        let result = engine.infer_relations("KNOWS", None, None, None, false).await.unwrap();

        assert_eq!(result.inferred_relations.len(), 1);
        let inferred = &result.inferred_relations[0];
        assert_eq!((inferred.source_id.as_str(), inferred.target_id.as_str()), ("a", "c"));
        assert!(inferred.weight <= 0.8);
        assert!((result.confidence - inferred.weight).abs() < 1e-6);
        assert_eq!(result.total_steps, 1);
        assert_eq!(result.inference_steps[0].source_relations.len(), 2);
    }

    #[tokio::test]
    async fn test_existing_relation_not_duplicated() {
        let store = chain_store().await;
        store.add_relation(Relation::new("r3", "KNOWS", "a", "c", 0.4)).await.unwrap();
        let engine = engine(store);
        engine.add_rule(InferenceRule::transitive("KNOWS", 0.0)).await;

        let result = engine.infer_relations("KNOWS", None, None, None, false).await.unwrap();
        assert!(result.inferred_relations.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_closure_is_bounded_by_rounds() {
        let store = chain_store().await;
        store.add_relation(Relation::new("r3", "KNOWS", "c", "d", 0.9)).await.unwrap();
        let engine = engine(store);
        engine.add_rule(InferenceRule::transitive("KNOWS", 0.0)).await;

        // One round: a->c and b->d only
        let one = engine.infer_relations("KNOWS", Some(1), None, None, false).await.unwrap();
        assert_eq!(one.inferred_relations.len(), 2);
        assert_eq!(one.rounds, 1);

        // Second round closes a->d
        let two = engine.infer_relations("KNOWS", Some(2), None, None, false).await.unwrap();
        assert_eq!(two.inferred_relations.len(), 3);
        assert_eq!(two.rounds, 2);

        let pairs: HashSet<(String, String)> = two
            .inferred_relations
            .iter()
            .map(|r| (r.source_id.clone(), r.target_id.clone()))
            .collect();
        assert_eq!(pairs.len(), two.inferred_relations.len());
    }

    #[tokio::test]
    async fn test_symmetric_and_transitive_together() {
        let engine = engine(chain_store().await);
        engine.add_rule(InferenceRule::symmetric("KNOWS", 0.1)).await;
        engine.add_rule(InferenceRule::transitive("KNOWS", 0.1)).await;

        let result = engine.infer_relations("KNOWS", Some(3), None, None, false).await.unwrap();
        let pairs: HashSet<(String, String)> = result
            .inferred_relations
            .iter()
            .map(|r| (r.source_id.clone(), r.target_id.clone()))
            .collect();

        assert!(pairs.contains(&("b".to_string(), "a".to_string())));
        assert!(pairs.contains(&("a".to_string(), "c".to_string())));
        assert!(pairs.contains(&("c".to_string(), "a".to_string())));
        assert!(!pairs.iter().any(|(s, t)| s == t));
        assert!(result.inferred_relations.iter().all(|r| (0.0..=1.0).contains(&r.weight)));
    }

    #[tokio::test]
    async fn test_endpoint_filter() {
        let engine = engine(chain_store().await);
        engine.add_rule(InferenceRule::symmetric("KNOWS", 0.0)).await;

        let result = engine.infer_relations("KNOWS", None, Some("c"), None, false).await.unwrap();
        assert_eq!(result.inferred_relations.len(), 1);
        assert_eq!(result.inferred_relations[0].target_id, "b");
    }

    #[tokio::test]
    async fn test_no_rules_yields_empty_result() {
        let engine = engine(chain_store().await);
        let result = engine.infer_relations("KNOWS", None, None, None, true).await.unwrap();

        assert!(result.inferred_relations.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_cached_result_reused_until_rules_change() {
        let store = chain_store().await;
        let engine = engine(store.clone());
        engine.add_rule(InferenceRule::transitive("KNOWS", 0.0)).await;

        let first = engine.infer_relations("KNOWS", None, None, None, true).await.unwrap();
        // New data is invisible while the cached result lives
        store.add_relation(Relation::new("r3", "KNOWS", "c", "d", 0.9)).await.unwrap();
        let second = engine.infer_relations("KNOWS", None, None, None, true).await.unwrap();
        assert_eq!(first.computed_at, second.computed_at);
        assert_eq!(engine.cache_stats().await.hits, 1);

        engine.add_rule(InferenceRule::symmetric("KNOWS", 0.0)).await;
        let third = engine.infer_relations("KNOWS", None, None, None, true).await.unwrap();
        assert!(third.inferred_relations.len() > first.inferred_relations.len());
    }

    #[tokio::test]
    async fn test_cache_respects_round_limit() {
        let store = chain_store().await;
        store.add_relation(Relation::new("r3", "KNOWS", "c", "d", 0.9)).await.unwrap();
        let engine = engine(store);
        engine.add_rule(InferenceRule::transitive("KNOWS", 0.0)).await;

        let one = engine.infer_relations("KNOWS", Some(1), None, None, true).await.unwrap();
        assert_eq!(one.inferred_relations.len(), 2);

        // A larger limit must not reuse the truncated closure
        let three = engine.infer_relations("KNOWS", Some(3), None, None, true).await.unwrap();
        assert_eq!(three.inferred_relations.len(), 3);
        assert_eq!(engine.cache_stats().await.hits, 0);

        // Converged after 2 rounds, so any limit from 2 up reuses it
        let again = engine.infer_relations("KNOWS", Some(5), None, None, true).await.unwrap();
        assert_eq!(again.computed_at, three.computed_at);
        assert_eq!(engine.cache_stats().await.hits, 1);
    }

    #[tokio::test]
    async fn test_strongest_derivation_kept_per_round() {
        let store = Arc::new(MemoryGraphStore::new());
        for id in ["a", "b", "m", "c"] {
            store.add_entity(Entity::new(id, "person")).await.unwrap();
        }
        // a->b->c is weak, a->m->c is strong; both found in the same round
        store.add_relation(Relation::new("r1", "KNOWS", "a", "b", 0.5)).await.unwrap();
        store.add_relation(Relation::new("r2", "KNOWS", "b", "c", 0.5)).await.unwrap();
        store.add_relation(Relation::new("r3", "KNOWS", "a", "m", 0.9)).await.unwrap();
        store.add_relation(Relation::new("r4", "KNOWS", "m", "c", 0.9)).await.unwrap();
        let engine = engine(store);
        engine.add_rule(InferenceRule::transitive("KNOWS", 0.0)).await;

        let result = engine.infer_relations("KNOWS", Some(1), Some("a"), Some("c"), false).await.unwrap();

        assert_eq!(result.inferred_relations.len(), 1);
        assert!((result.inferred_relations[0].weight - 0.81).abs() < 1e-6);
        let premises: Vec<&str> = result.inference_steps[0].source_relations.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(premises, vec!["r3", "r4"]);
    }

    #[tokio::test]
    async fn test_rule_registry() {
        let engine = engine(chain_store().await);
        engine.add_rule(InferenceRule::transitive("KNOWS", 0.0)).await;
        engine.add_rule(InferenceRule::symmetric("KNOWS", 0.0)).await;
        engine.add_rule(InferenceRule::transitive("PART_OF", 0.0)).await;
        // Same id replaces
        engine.add_rule(InferenceRule::transitive("KNOWS", 0.2)).await;

        assert_eq!(engine.get_rules(None).await.len(), 3);
        assert_eq!(engine.get_rules(Some("KNOWS")).await.len(), 2);
        assert_eq!(engine.rule_relation_types().await, vec!["KNOWS".to_string(), "PART_OF".to_string()]);

        assert!(engine.remove_rule("transitive_part_of").await);
        assert!(!engine.remove_rule("transitive_part_of").await);
        assert!(engine.get_rules(Some("PART_OF")).await.is_empty());
    }

    #[tokio::test]
    async fn test_inference_trace() {
        let engine = engine(chain_store().await);
        engine.add_rule(InferenceRule::transitive("KNOWS", 0.0)).await;

        let result = engine.infer_relations("KNOWS", None, None, None, false).await.unwrap();
        let trace = engine.get_inference_trace(&result);

        assert_eq!(trace.len(), 2);
        assert!(trace[0].starts_with("Inferred 1 KNOWS"));
        assert!(trace[1].starts_with("Step 1: a KNOWS b and b KNOWS c"));
    }
}
