//! Query Planner - Turns natural-language queries into executable plans
//!
//! Provides:
//! - Heuristic query analysis over an ordered pattern table
//! - Decomposition into dependency-annotated primitive graph operations
//! - Plan optimization by dependency level
//! - A single-operation shortcut for simple queries

mod optimizer;
mod patterns;
pub mod types;

pub use optimizer::{get_dependency_levels, unresolved_steps};
pub use patterns::{PatternKind, PatternTable};
pub use types::*;

use chrono::Utc;
use graphmind_common::config::PlannerConfig;
use graphmind_common::errors::{GraphError, Result};
use patterns::{estimate_complexity, extract_entity_candidates, normalize_entity_id};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Upper bound on hops for any planned traversal
const MAX_PLANNED_HOPS: usize = 10;

/// Plans natural-language queries into [`QueryPlan`]s
pub struct QueryPlanner {
    config: PlannerConfig,
    patterns: PatternTable,
}

impl QueryPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            patterns: PatternTable::new(),
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Heuristic reading of a query: first matching pattern, flags, complexity
    pub fn analyze_query(&self, query: &str) -> QueryAnalysis {
        let matched = self.patterns.classify(query);
        let lower = query.to_lowercase();

        QueryAnalysis {
            pattern: matched.as_ref().map(|m| m.kind),
            captures: matched.map(|m| m.captures).unwrap_or_default(),
            is_multi_hop: self.patterns.matches_kind(PatternKind::MultiHopQuery, query),
            has_vector_search: self.patterns.matches_kind(PatternKind::VectorSearch, query),
            has_path_finding: self.patterns.matches_kind(PatternKind::PathFinding, query)
                || lower.contains("path"),
            complexity: estimate_complexity(query),
            entity_candidates: extract_entity_candidates(query),
        }
    }

    /// Decompose a query into a plan. Always yields at least one step.
    pub fn plan_query(&self, query: &str, context: &QueryContext) -> QueryPlan {
        let analysis = self.analyze_query(query);

        let decomposed = match analysis.pattern {
            Some(kind) => self
                .decompose(kind, query, context, &analysis)
                .map(|steps| (steps, format!("Matched pattern '{}'", kind.name()))),
            None => Err(GraphError::validation("no query pattern matched")),
        };

        let mut metadata = analysis_metadata(&analysis);
        let (steps, explanation) = match decomposed {
            Ok(planned) => planned,
            Err(e) => {
                debug!(error = %e, "Falling back to generic plan");
                metadata.insert("fallback_reason".to_string(), json!(e.to_string()));
                (self.fallback_steps(query, context), "Generic fallback plan".to_string())
            }
        };

        let plan = QueryPlan {
            plan_id: Uuid::new_v4().to_string(),
            original_query: query.to_string(),
            explanation: format!("{}; {} step(s)", explanation, steps.len()),
            steps,
            optimized: false,
            metadata,
            created_at: Utc::now(),
        };

        debug!(
            plan_id = %plan.plan_id,
            steps = plan.steps.len(),
            cost = plan.total_estimated_cost(),
            "Planned query"
        );

        plan
    }

    /// Reorder steps within dependency levels. Already-optimized plans come back unchanged.
    pub fn optimize_plan(&self, plan: &QueryPlan, strategy: OptimizationStrategy) -> QueryPlan {
        if plan.optimized {
            return plan.clone();
        }

        let (steps, unresolved) =
            optimizer::reorder_steps(&plan.steps, strategy, self.config.balance_threshold);

        let mut metadata = plan.metadata.clone();
        metadata.insert("strategy".to_string(), json!(strategy.as_str()));
        if !unresolved.is_empty() {
            warn!(plan_id = %plan.plan_id, unresolved = ?unresolved, "Plan has unresolvable dependencies");
            metadata.insert("unresolved_steps".to_string(), json!(unresolved));
        }

        QueryPlan {
            plan_id: format!("{}_opt", plan.plan_id),
            original_query: plan.original_query.clone(),
            steps,
            optimized: true,
            explanation: format!("{} (optimized: {})", plan.explanation, strategy.as_str()),
            metadata,
            created_at: plan.created_at,
        }
    }

    /// Map a simple query straight to one graph operation
    pub fn translate_to_graph_query(&self, query: &str, context: &QueryContext) -> GraphQuery {
        let lower = query.to_lowercase();
        let analysis = self.analyze_query(query);

        let params = if lower.contains("similar") || lower.contains("related") {
            StepQuery::VectorSearch(self.vector_params(query, context))
        } else if let Some(params) = lower
            .contains("path")
            .then(|| self.path_endpoints(context, &analysis))
            .flatten()
            .map(|(source_id, target_id)| PathFindingParams {
                source_id,
                target_id,
                max_depth: self.hops(context),
                max_paths: self.config.default_max_results,
            })
        {
            StepQuery::PathFinding(params)
        } else if let Some(start_id) = (lower.contains("neighbor") || lower.contains("connected to"))
            .then(|| self.resolve_entity(context, None, &analysis))
            .flatten()
        {
            StepQuery::Traversal(TraversalParams {
                start_id: Some(start_id),
                target_id: None,
                relation_types: context.relation_types.clone(),
                max_depth: 1,
                max_results: self.config.default_max_results,
            })
        } else {
            StepQuery::EntityLookup(EntityLookupParams {
                entity_id: self.resolve_entity(context, None, &analysis),
                entity_type: context.entity_type.clone(),
            })
        };

        GraphQuery {
            original_query: query.to_string(),
            params,
        }
    }

    fn decompose(
        &self,
        kind: PatternKind,
        query: &str,
        context: &QueryContext,
        analysis: &QueryAnalysis,
    ) -> Result<Vec<QueryStep>> {
        let capture = |i: usize| analysis.captures.get(i).map(String::as_str);

        match kind {
            PatternKind::EntityLookupByProperty => {
                let (property, value) = match (capture(0), capture(1)) {
                    (Some(p), Some(v)) => (p.to_lowercase(), v.to_string()),
                    _ => return Err(GraphError::validation("property pattern without captures")),
                };
                let params = FilterParams {
                    entity_type: context.entity_type.clone(),
                    property,
                    value,
                    limit: self.config.default_max_results,
                };
                let description = format!("Filter entities where {} = {}", params.property, params.value);
                Ok(vec![QueryStep::new(
                    "step_1",
                    StepQuery::Filter(params),
                    self.config.filter_cost,
                    description,
                )?])
            }
            PatternKind::RelationTraversal => {
                let entity_id = self.require_entity(context, capture(0), analysis)?;
                let relation = capture(1).unwrap_or("related");
                Ok(vec![
                    self.lookup_step("step_1", &entity_id, context)?,
                    self.traversal_step("step_2", 1, context, self.config.traversal_cost)?
                        .with_dependencies(["step_1"])
                        .with_description(format!("Follow '{}' relations from {}", relation, entity_id)),
                ])
            }
            PatternKind::MultiHopQuery => {
                let entity_id = self.require_entity(context, None, analysis)?;
                let hops = self.hops(context);

                let mut steps = vec![self.lookup_step("step_1", &entity_id, context)?];
                for hop in 1..=hops {
                    // Each additional hop widens the search space
                    let cost = self.config.traversal_cost + self.config.hop_cost_increment * (hop - 1) as f32;
                    let step = self
                        .traversal_step(&format!("step_{}", hop + 1), 1, context, cost)?
                        .with_dependencies([format!("step_{}", hop)])
                        .with_description(format!("Hop {} of {} from {}", hop, hops, entity_id));
                    steps.push(step);
                }
                Ok(steps)
            }
            PatternKind::VectorSearch => Ok(vec![self.vector_step(query, context)?]),
            PatternKind::PathFinding => {
                let (source_id, target_id) = self
                    .path_endpoints(context, analysis)
                    .ok_or_else(|| GraphError::validation("path query without both endpoints"))?;
                let description = format!("Find paths from {} to {}", source_id, target_id);
                let params = TraversalParams {
                    start_id: Some(source_id),
                    target_id: Some(target_id),
                    relation_types: context.relation_types.clone(),
                    max_depth: self.hops(context),
                    max_results: self.config.default_max_results,
                };
                Ok(vec![QueryStep::new(
                    "step_1",
                    StepQuery::Traversal(params),
                    self.config.path_finding_cost,
                    description,
                )?])
            }
            PatternKind::NeighborQuery => {
                let entity_id = self.require_entity(context, capture(0), analysis)?;
                Ok(vec![
                    self.lookup_step("step_1", &entity_id, context)?,
                    self.traversal_step("step_2", 1, context, self.config.traversal_cost)?
                        .with_dependencies(["step_1"])
                        .with_description(format!("Neighbors of {}", entity_id)),
                ])
            }
        }
    }

    /// Vector search over the raw query, or a lone RANK step when even that is invalid
    fn fallback_steps(&self, query: &str, context: &QueryContext) -> Vec<QueryStep> {
        if let Ok(step) = self.vector_step(query, context) {
            return vec![step];
        }

        let rank = QueryStep {
            step_id: "step_1".to_string(),
            query: StepQuery::Rank(RankParams::default()),
            depends_on: Default::default(),
            estimated_cost: 0.0,
            description: "Nothing to search for".to_string(),
        };
        vec![rank]
    }

    fn lookup_step(&self, step_id: &str, entity_id: &str, context: &QueryContext) -> Result<QueryStep> {
        let params = EntityLookupParams {
            entity_id: Some(entity_id.to_string()),
            entity_type: context.entity_type.clone(),
        };
        QueryStep::new(
            step_id,
            StepQuery::EntityLookup(params),
            self.config.lookup_cost,
            format!("Look up {}", entity_id),
        )
    }

    /// Traversal continuing from upstream paths
    fn traversal_step(&self, step_id: &str, depth: usize, context: &QueryContext, cost: f32) -> Result<QueryStep> {
        let params = TraversalParams {
            start_id: None,
            target_id: None,
            relation_types: context.relation_types.clone(),
            max_depth: depth,
            max_results: self.config.default_max_results,
        };
        QueryStep::new(step_id, StepQuery::Traversal(params), cost, "Traverse")
    }

    fn vector_step(&self, query: &str, context: &QueryContext) -> Result<QueryStep> {
        QueryStep::new(
            "step_1",
            StepQuery::VectorSearch(self.vector_params(query, context)),
            self.config.vector_search_cost,
            "Semantic search over entity embeddings",
        )
    }

    fn vector_params(&self, query: &str, context: &QueryContext) -> VectorSearchParams {
        VectorSearchParams {
            query_text: query.trim().to_string(),
            embedding: context.query_embedding.clone(),
            entity_type: context.entity_type.clone(),
            top_k: self.config.default_top_k,
            score_threshold: self.config.default_score_threshold,
        }
    }

    fn hops(&self, context: &QueryContext) -> usize {
        context
            .max_hops
            .unwrap_or(self.config.default_max_hops)
            .clamp(1, MAX_PLANNED_HOPS)
    }

    /// Context start entity, then the pattern capture, then the first candidate
    fn resolve_entity(&self, context: &QueryContext, capture: Option<&str>, analysis: &QueryAnalysis) -> Option<String> {
        context
            .start_entity_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| capture.map(normalize_entity_id))
            .or_else(|| analysis.entity_candidates.first().map(|c| normalize_entity_id(c)))
            .filter(|id| !id.is_empty())
    }

    fn require_entity(&self, context: &QueryContext, capture: Option<&str>, analysis: &QueryAnalysis) -> Result<String> {
        self.resolve_entity(context, capture, analysis)
            .ok_or_else(|| GraphError::validation("query names no start entity"))
    }

    fn path_endpoints(&self, context: &QueryContext, analysis: &QueryAnalysis) -> Option<(String, String)> {
        let from_pattern = analysis.pattern == Some(PatternKind::PathFinding);
        let capture = |i: usize| {
            from_pattern
                .then(|| analysis.captures.get(i))
                .flatten()
                .map(|c| normalize_entity_id(c))
        };

        let source = context.start_entity_id.clone().or_else(|| capture(0))?;
        let target = context.target_entity_id.clone().or_else(|| capture(1))?;
        Some((source, target))
    }
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

fn analysis_metadata(analysis: &QueryAnalysis) -> BTreeMap<String, Value> {
    let mut metadata = BTreeMap::new();
    metadata.insert("pattern".to_string(), json!(analysis.pattern.map(|kind| kind.name())));
    metadata.insert("complexity".to_string(), json!(analysis.complexity));
    metadata.insert("is_multi_hop".to_string(), json!(analysis.is_multi_hop));
    metadata.insert("has_vector_search".to_string(), json!(analysis.has_vector_search));
    metadata.insert("has_path_finding".to_string(), json!(analysis.has_path_finding));
    metadata.insert("entity_candidates".to_string(), json!(analysis.entity_candidates));
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERIES: &[&str] = &[
        "What companies does Alice know people at?",
        "Who does Alice know?",
        "Find people with name Alice",
        "Papers similar to graph reasoning",
        "Find a path from alice to carol",
        "How is alice connected to carol?",
        "Show the neighbors of bob",
        "Tell me something",
        "",
        "   ",
        "???",
        "Qui connaît Émilie ?",
    ];

    fn planner() -> QueryPlanner {
        QueryPlanner::default()
    }

    fn operations(plan: &QueryPlan) -> Vec<QueryOperation> {
        plan.steps.iter().map(QueryStep::operation).collect()
    }

    #[test]
    fn test_every_query_gets_a_costed_plan() {
        let planner = planner();
        for query in QUERIES {
            for context in [QueryContext::new(), QueryContext::new().with_start_entity("alice")] {
                let plan = planner.plan_query(query, &context);
                assert!(!plan.steps.is_empty(), "empty plan for {:?}", query);

                let sum: f32 = plan.steps.iter().map(|s| s.estimated_cost).sum();
                assert!((plan.total_estimated_cost() - sum).abs() < 1e-6);
                assert!(plan.validate().is_ok());
            }
        }
    }

    #[test]
    fn test_multi_hop_decomposition() {
        let context = QueryContext::new().with_start_entity("alice").with_max_hops(2);
        let plan = planner().plan_query("What companies does Alice know people at?", &context);

        assert_eq!(
            operations(&plan),
            vec![QueryOperation::EntityLookup, QueryOperation::Traversal, QueryOperation::Traversal]
        );
        assert!(plan.steps[2].depends_on.contains("step_2"));
        assert!(plan.steps[2].estimated_cost > plan.steps[1].estimated_cost);
        assert_eq!(plan.metadata["pattern"], json!("multi_hop_query"));
    }

    #[test]
    fn test_relation_traversal_uses_captured_entity() {
        let plan = planner().plan_query("Who does Alice know?", &QueryContext::new());

        assert_eq!(operations(&plan), vec![QueryOperation::EntityLookup, QueryOperation::Traversal]);
        match &plan.steps[0].query {
            StepQuery::EntityLookup(p) => assert_eq!(p.entity_id.as_deref(), Some("alice")),
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_property_lookup_is_single_filter() {
        let plan = planner().plan_query("Find people with name Alice", &QueryContext::new());
        assert_eq!(operations(&plan), vec![QueryOperation::Filter]);
    }

    #[test]
    fn test_path_finding_carries_endpoints() {
        let plan = planner().plan_query("Find a path from alice to carol", &QueryContext::new());

        assert_eq!(plan.steps.len(), 1);
        match &plan.steps[0].query {
            StepQuery::Traversal(p) => {
                assert_eq!(p.start_id.as_deref(), Some("alice"));
                assert_eq!(p.target_id.as_deref(), Some("carol"));
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_unmatched_query_falls_back_to_vector_search() {
        let plan = planner().plan_query("Tell me something", &QueryContext::new());
        assert_eq!(operations(&plan), vec![QueryOperation::VectorSearch]);
        assert!(plan.metadata.contains_key("fallback_reason"));
    }

    #[test]
    fn test_missing_entity_falls_back() {
        // Multi-hop phrasing but nothing names a start entity
        let plan = planner().plan_query("which friends of mine work there", &QueryContext::new());
        assert_eq!(operations(&plan), vec![QueryOperation::VectorSearch]);
    }

    #[test]
    fn test_blank_query_still_plans() {
        let plan = planner().plan_query("", &QueryContext::new());
        assert_eq!(operations(&plan), vec![QueryOperation::Rank]);
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let planner = planner();
        let context = QueryContext::new().with_start_entity("alice");
        let plan = planner.plan_query("What companies does Alice know people at?", &context);

        let once = planner.optimize_plan(&plan, OptimizationStrategy::Balanced);
        let twice = planner.optimize_plan(&once, OptimizationStrategy::MinimizeCost);

        assert!(once.optimized);
        assert!(once.plan_id.ends_with("_opt"));
        assert_eq!(once.plan_id, twice.plan_id);
        let ids = |p: &QueryPlan| p.steps.iter().map(|s| s.step_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&once), ids(&twice));
        assert!((once.total_estimated_cost() - plan.total_estimated_cost()).abs() < 1e-6);
    }

    #[test]
    fn test_optimize_flags_cyclic_steps() {
        let planner = planner();
        let mut plan = planner.plan_query("Who does Alice know?", &QueryContext::new());
        plan.steps[0].depends_on.insert("step_2".to_string());

        let optimized = planner.optimize_plan(&plan, OptimizationStrategy::MinimizeCost);
        assert_eq!(optimized.steps.len(), plan.steps.len());
        assert!(optimized.metadata.contains_key("unresolved_steps"));
    }

    #[test]
    fn test_dependency_levels_partition_planned_steps() {
        let context = QueryContext::new().with_start_entity("alice").with_max_hops(3);
        let plan = planner().plan_query("Who are Alice's friends of friends?", &context);

        let levels = get_dependency_levels(&plan.steps);
        let total: usize = levels.iter().map(Vec::len).sum();
        assert_eq!(total, plan.steps.len());
        assert_eq!(levels.len(), 4);
    }

    #[test]
    fn test_translate_to_graph_query() {
        let planner = planner();
        let ctx = QueryContext::new();

        assert_eq!(
            planner.translate_to_graph_query("papers related to transformers", &ctx).operation(),
            QueryOperation::VectorSearch
        );
        assert_eq!(
            planner.translate_to_graph_query("shortest path from alice to carol", &ctx).operation(),
            QueryOperation::PathFinding
        );
        assert_eq!(
            planner.translate_to_graph_query("neighbors of bob", &QueryContext::new().with_start_entity("bob")).operation(),
            QueryOperation::Traversal
        );
        assert_eq!(
            planner.translate_to_graph_query("Tell me about Alice", &ctx).operation(),
            QueryOperation::EntityLookup
        );
    }

    #[test]
    fn test_translate_path_without_endpoints_degrades() {
        let query = planner().translate_to_graph_query("what is a path", &QueryContext::new());
        assert_eq!(query.operation(), QueryOperation::EntityLookup);
    }

    #[test]
    fn test_analysis_flags() {
        let analysis = planner().analyze_query("How is alice connected to carol through Bob?");
        assert!(analysis.is_multi_hop);
        assert!(analysis.has_path_finding);
        assert_eq!(analysis.complexity, Complexity::Medium);
        assert_eq!(analysis.pattern, Some(PatternKind::MultiHopQuery));

        // Serialized analyses and plan metadata carry the pattern name
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["pattern"], "multi_hop_query");
        let plan = planner().plan_query("How is alice connected to carol through Bob?", &QueryContext::new());
        assert_eq!(plan.metadata["pattern"], "multi_hop_query");
    }
}
