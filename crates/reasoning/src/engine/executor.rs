//! Plan execution
//!
//! Steps run level by level. Each operation maps to one handler through an
//! exhaustive match on the step payload. A failing step is recorded in the
//! trace and execution moves on.

use super::paths::{collect_evidence_from_paths, find_paths};
use super::ReasoningEngine;
use crate::evidence::{rank_evidence, Evidence};
use crate::planner::{
    get_dependency_levels, unresolved_steps, EntityLookupParams, FilterParams, PathFindingParams, QueryContext,
    QueryPlan, QueryStep, RankParams, StepQuery, TraversalParams, VectorSearchParams,
};
use graphmind_common::errors::Result;
use graphmind_common::metrics;
use graphmind_common::models::Path;
use std::collections::HashMap;
use tracing::{debug, warn};

/// What one step produced
#[derive(Default)]
struct StepOutput {
    evidence: Vec<Evidence>,

    /// Paths downstream steps continue from
    frontier: Vec<Path>,

    /// Extra trace lines
    notes: Vec<String>,
}

impl StepOutput {
    fn note(message: impl Into<String>) -> Self {
        Self {
            notes: vec![message.into()],
            ..Default::default()
        }
    }
}

pub(super) struct PlanExecutor<'a> {
    engine: &'a ReasoningEngine,
    context: &'a QueryContext,
}

impl<'a> PlanExecutor<'a> {
    pub(super) fn new(engine: &'a ReasoningEngine, context: &'a QueryContext) -> Self {
        Self { engine, context }
    }

    /// Run every resolvable step and return the evidence in production order
    pub(super) async fn execute(&self, plan: &QueryPlan, trace: &mut Vec<String>) -> Vec<Evidence> {
        let levels = get_dependency_levels(&plan.steps);
        let unresolved = unresolved_steps(&plan.steps, &levels);

        let mut frontiers: HashMap<&str, Vec<Path>> = HashMap::new();
        let mut collected: Vec<Evidence> = Vec::new();
        let mut executed = 0;
        let mut failed = 0;

        for level in &levels {
            for step in level {
                let upstream: Vec<Path> = step
                    .depends_on
                    .iter()
                    .filter_map(|dep| frontiers.get(dep.as_str()))
                    .flatten()
                    .cloned()
                    .collect();
                let operation = step.operation().as_str();
                executed += 1;

                match self.run_step(step, &upstream, &mut collected).await {
                    Ok(output) => {
                        metrics::record_step(operation, true);
                        trace.push(format!(
                            "Step {} ({}): {} evidence item(s), {} path(s)",
                            step.step_id,
                            operation,
                            output.evidence.len(),
                            output.frontier.len()
                        ));
                        trace.extend(output.notes);
                        collected.extend(output.evidence);
                        frontiers.insert(step.step_id.as_str(), output.frontier);
                    }
                    Err(e) => {
                        failed += 1;
                        metrics::record_step(operation, false);
                        warn!(step_id = %step.step_id, operation, error = %e, "Plan step failed");
                        trace.push(format!("Step {} ({}) failed: {}", step.step_id, operation, e));
                        frontiers.insert(step.step_id.as_str(), Vec::new());
                    }
                }
            }
        }

        if !unresolved.is_empty() {
            let ids: Vec<&str> = unresolved.iter().map(|s| s.step_id.as_str()).collect();
            warn!(plan_id = %plan.plan_id, unresolved = ?ids, "Plan has unresolved steps");
            trace.push(format!(
                "Skipped {} step(s) with unresolved dependencies: {}",
                ids.len(),
                ids.join(", ")
            ));
        }

        if failed > 0 && collected.is_empty() {
            trace.push(format!(
                "No evidence collected; {} of {} executed step(s) failed",
                failed, executed
            ));
        }

        collected
    }

    async fn run_step(&self, step: &QueryStep, upstream: &[Path], collected: &mut Vec<Evidence>) -> Result<StepOutput> {
        debug!(step_id = %step.step_id, operation = step.operation().as_str(), upstream = upstream.len(), "Executing step");

        match &step.query {
            StepQuery::EntityLookup(params) => self.entity_lookup(&step.step_id, params).await,
            StepQuery::Traversal(params) => {
                self.traversal(&step.step_id, params, upstream, step.depends_on.is_empty())
                    .await
            }
            StepQuery::VectorSearch(params) => self.vector_search(&step.step_id, params).await,
            StepQuery::PathFinding(params) => self.path_finding(&step.step_id, params).await,
            StepQuery::Filter(params) => self.filter(&step.step_id, params, upstream).await,
            StepQuery::Rank(params) => Ok(self.rank(params, upstream, collected)),
        }
    }

    async fn entity_lookup(&self, step_id: &str, params: &EntityLookupParams) -> Result<StepOutput> {
        let entity_id = match params.entity_id.as_ref().or(self.context.start_entity_id.as_ref()) {
            Some(id) => id,
            None => return Ok(StepOutput::note(format!("Step {}: no entity id to look up", step_id))),
        };

        let entity = match self.engine.store.get_entity(entity_id).await? {
            Some(entity) => entity,
            None => return Ok(StepOutput::note(format!("Step {}: entity '{}' not found", step_id, entity_id))),
        };

        if let Some(expected) = &params.entity_type {
            if &entity.entity_type != expected {
                return Ok(StepOutput::note(format!(
                    "Step {}: entity '{}' is a {}, not a {}",
                    step_id, entity_id, entity.entity_type, expected
                )));
            }
        }

        let relevance = self.engine.config.lookup_relevance;
        Ok(StepOutput {
            frontier: vec![Path::start(entity.clone())],
            evidence: vec![Evidence::from_entity(entity, 1.0, relevance, step_id)],
            notes: Vec::new(),
        })
    }

    /// From an explicit start, or else onward from every upstream path.
    /// Independent steps without a start fall back to the context's start entity.
    async fn traversal(
        &self,
        step_id: &str,
        params: &TraversalParams,
        upstream: &[Path],
        independent: bool,
    ) -> Result<StepOutput> {
        let target = params.target_id.as_deref();
        let store = self.engine.store.as_ref();

        let start = params
            .start_id
            .as_ref()
            .or_else(|| independent.then_some(self.context.start_entity_id.as_ref()).flatten());

        let paths = match start {
            Some(start_id) => {
                find_paths(store, start_id, target, params.max_depth, &params.relation_types, params.max_results)
                    .await?
            }
            None if upstream.is_empty() => {
                return Ok(StepOutput::note(format!("Step {}: nothing to traverse from", step_id)));
            }
            None => {
                let mut paths = Vec::new();
                for head in upstream {
                    let remaining = params.max_results - paths.len();
                    let tails = find_paths(
                        store,
                        &head.end().id,
                        target,
                        params.max_depth,
                        &params.relation_types,
                        remaining,
                    )
                    .await?;
                    paths.extend(tails.iter().filter_map(|tail| head.concat(tail)));
                    if paths.len() >= params.max_results {
                        paths.truncate(params.max_results);
                        break;
                    }
                }
                paths
            }
        };

        Ok(StepOutput {
            evidence: collect_evidence_from_paths(paths.clone(), step_id, self.engine.config.hop_decay),
            frontier: paths,
            notes: Vec::new(),
        })
    }

    async fn path_finding(&self, step_id: &str, params: &PathFindingParams) -> Result<StepOutput> {
        let paths = find_paths(
            self.engine.store.as_ref(),
            &params.source_id,
            Some(params.target_id.as_str()),
            params.max_depth,
            &self.context.relation_types,
            params.max_paths,
        )
        .await?;

        let mut output = StepOutput {
            evidence: collect_evidence_from_paths(paths.clone(), step_id, self.engine.config.hop_decay),
            frontier: paths,
            notes: Vec::new(),
        };
        if output.frontier.is_empty() {
            output.notes.push(format!(
                "Step {}: no path from {} to {} within {} hop(s)",
                step_id, params.source_id, params.target_id, params.max_depth
            ));
        }
        Ok(output)
    }

    async fn vector_search(&self, step_id: &str, params: &VectorSearchParams) -> Result<StepOutput> {
        let provided = params
            .embedding
            .clone()
            .or_else(|| self.context.query_embedding.clone())
            .filter(|e| !e.is_empty());

        let embedding = match (provided, &self.engine.embedder) {
            (Some(embedding), _) => embedding,
            (None, Some(embedder)) => embedder.embed(&params.query_text).await?,
            (None, None) => {
                return Ok(StepOutput::note(format!(
                    "Step {}: no query embedding or embedder available, vector search skipped",
                    step_id
                )));
            }
        };

        let hits = self
            .engine
            .store
            .vector_search(&embedding, params.entity_type.as_deref(), params.top_k, params.score_threshold)
            .await?;

        let relevance = self.engine.config.lookup_relevance;
        let mut output = StepOutput::default();
        for hit in hits {
            output.frontier.push(Path::start(hit.entity.clone()));
            output.evidence.push(Evidence::from_entity(hit.entity, hit.score, relevance, step_id));
        }
        Ok(output)
    }

    /// Narrow upstream endpoints when there are any, otherwise ask the store
    async fn filter(&self, step_id: &str, params: &FilterParams, upstream: &[Path]) -> Result<StepOutput> {
        let relevance = self.engine.config.lookup_relevance;
        let type_matches = |entity_type: &str| params.entity_type.as_deref().map_or(true, |t| t == entity_type);

        let frontier: Vec<Path> = if upstream.is_empty() {
            self.engine
                .store
                .find_entities(params.entity_type.as_deref(), &params.property, &params.value, params.limit)
                .await?
                .into_iter()
                .map(Path::start)
                .collect()
        } else {
            upstream
                .iter()
                .filter(|p| type_matches(&p.end().entity_type) && p.end().property_matches(&params.property, &params.value))
                .take(params.limit)
                .cloned()
                .collect()
        };

        let evidence = frontier
            .iter()
            .map(|p| Evidence::from_entity(p.end().clone(), 1.0, relevance, step_id))
            .collect();
        Ok(StepOutput {
            evidence,
            frontier,
            notes: Vec::new(),
        })
    }

    fn rank(&self, params: &RankParams, upstream: &[Path], collected: &mut Vec<Evidence>) -> StepOutput {
        let mut ranked = rank_evidence(std::mem::take(collected), params.method);
        if let Some(limit) = params.limit {
            ranked.truncate(limit);
        }
        let note = format!("Re-ranked evidence, {} item(s) kept", ranked.len());
        *collected = ranked;

        StepOutput {
            frontier: upstream.to_vec(),
            ..StepOutput::note(note)
        }
    }
}
