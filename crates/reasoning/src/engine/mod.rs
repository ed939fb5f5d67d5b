//! Reasoning Engine - Executes plans against the graph and builds answers
//!
//! Provides:
//! - Plan-then-execute reasoning over a [`GraphStore`]
//! - Bounded multi-hop path search
//! - Path evidence, ranking, and answer generation
//! - Optional inference augmentation and evidence synthesis
//! - An ordered reasoning trace for every run

mod answer;
mod executor;
mod paths;

pub use answer::{generate_answer, NO_EVIDENCE_ANSWER};
pub use paths::{calculate_path_confidence, create_path_explanation, path_relevance};

use crate::evidence::{rank_evidence, Evidence, RankMethod, ReasoningResult, INFERENCE_SOURCE};
use crate::inference::InferenceEngine;
use crate::planner::{OptimizationStrategy, QueryContext, QueryPlan, QueryPlanner};
use crate::synthesis::{EvidenceSynthesizer, SynthesisMethod};
use executor::PlanExecutor;
use graphmind_common::config::{AppConfig, ReasoningConfig};
use graphmind_common::errors::Result;
use graphmind_common::metrics;
use graphmind_common::models::{Entity, Path, Relation};
use graphmind_common::{Embedder, GraphStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Plans, executes, and explains graph queries
pub struct ReasoningEngine {
    store: Arc<dyn GraphStore>,
    planner: QueryPlanner,
    config: ReasoningConfig,
    embedder: Option<Arc<dyn Embedder>>,
    inference: Option<Arc<InferenceEngine>>,
    synthesizer: EvidenceSynthesizer,
}

impl ReasoningEngine {
    pub fn new(store: Arc<dyn GraphStore>, planner: QueryPlanner, config: ReasoningConfig) -> Self {
        Self {
            store,
            planner,
            config,
            embedder: None,
            inference: None,
            synthesizer: EvidenceSynthesizer::default(),
        }
    }

    /// Engine with planner and synthesizer configured from one [`AppConfig`]
    pub fn from_config(store: Arc<dyn GraphStore>, config: &AppConfig) -> Self {
        Self::new(store, QueryPlanner::new(config.planner.clone()), config.reasoning.clone())
            .with_synthesizer(EvidenceSynthesizer::new(config.synthesis.clone()))
    }

    /// Used by vector search steps when the context carries no embedding
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Source of inferred relations when `enable_inference` is set
    pub fn with_inference(mut self, inference: Arc<InferenceEngine>) -> Self {
        self.inference = Some(inference);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: EvidenceSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    /// Answer a natural-language query.
    ///
    /// Never fails: store errors are recorded in the trace and the result
    /// degrades to whatever evidence the remaining steps produced.
    ///
    /// Hop limit: `max_hops`, else the context's, else `ReasoningConfig::max_hops`.
    /// The planner's own default never applies here.
    #[instrument(skip(self, context))]
    pub async fn reason(
        &self,
        query: &str,
        context: &QueryContext,
        max_hops: Option<usize>,
        max_evidence: Option<usize>,
    ) -> ReasoningResult {
        let started = Instant::now();
        let mut context = context.clone();
        context.max_hops = max_hops.or(context.max_hops).or(Some(self.config.max_hops));

        let mut trace = vec![format!("Query: {}", query)];

        // Step 1: Plan
        let plan = self.planner.plan_query(query, &context);
        trace.push(format!("Planned {} step(s): {}", plan.steps.len(), plan.explanation));

        let plan = self.planner.optimize_plan(&plan, OptimizationStrategy::Balanced);
        trace.push(format!(
            "Optimized plan {} (estimated cost {:.2})",
            plan.plan_id,
            plan.total_estimated_cost()
        ));

        // Steps 2-5: Execute, rank, answer
        self.run(&plan, &context, max_evidence, trace, started).await
    }

    /// Execute an externally built plan
    pub async fn execute_plan(
        &self,
        plan: &QueryPlan,
        context: &QueryContext,
        max_evidence: Option<usize>,
    ) -> ReasoningResult {
        let trace = vec![format!("Executing plan {} ({} step(s))", plan.plan_id, plan.steps.len())];
        self.run(plan, context, max_evidence, trace, Instant::now()).await
    }

    async fn run(
        &self,
        plan: &QueryPlan,
        context: &QueryContext,
        max_evidence: Option<usize>,
        mut trace: Vec<String>,
        started: Instant,
    ) -> ReasoningResult {
        let max_evidence = max_evidence.unwrap_or(self.config.max_evidence);

        let mut evidence = PlanExecutor::new(self, context).execute(plan, &mut trace).await;

        if self.config.enable_inference {
            let inferred = self.inferred_evidence(context, &mut trace).await;
            evidence.extend(inferred);
        }

        let collected = evidence.len();
        let mut evidence = if self.config.synthesize {
            let method = self.config.synthesis_method.parse::<SynthesisMethod>().unwrap_or_else(|e: String| {
                warn!(error = %e, "Using default synthesis method");
                SynthesisMethod::default()
            });
            let synthesized = self.synthesizer.synthesize_evidence(evidence, method);
            trace.push(format!(
                "Synthesized {} evidence item(s) into {} ({:?})",
                collected,
                synthesized.len(),
                method
            ));
            self.synthesizer.rank_by_reliability(synthesized)
        } else {
            rank_evidence(evidence, RankMethod::CombinedScore)
        };

        evidence.truncate(max_evidence);
        trace.push(format!(
            "Ranked {} evidence item(s), kept top {}",
            collected,
            evidence.len()
        ));

        let (answer, confidence) = generate_answer(&plan.original_query, &evidence, self.config.answer_evidence);
        trace.push(format!("Answer confidence {:.2}", confidence));

        let result = ReasoningResult {
            query: plan.original_query.clone(),
            evidence,
            answer: Some(answer),
            confidence,
            reasoning_trace: trace,
            execution_time_ms: started.elapsed().as_millis() as u64,
        };

        metrics::record_reasoning(
            started.elapsed().as_secs_f64(),
            result.evidence_count(),
            result.has_answer(),
        );
        info!(
            evidence = result.evidence_count(),
            confidence = result.confidence,
            elapsed_ms = result.execution_time_ms,
            "Reasoning complete"
        );

        result
    }

    /// RELATION evidence for every rule-derived relation leaving the start entity
    async fn inferred_evidence(&self, context: &QueryContext, trace: &mut Vec<String>) -> Vec<Evidence> {
        let inference = match &self.inference {
            Some(inference) => inference,
            None => {
                trace.push("Inference enabled but no inference engine attached".to_string());
                return Vec::new();
            }
        };

        let source = context.start_entity_id.as_deref();
        let mut evidence = Vec::new();

        for relation_type in inference.rule_relation_types().await {
            let result = match inference.infer_relations(&relation_type, None, source, None, true).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(relation_type = %relation_type, error = %e, "Inference failed");
                    trace.push(format!("Inference for {} failed: {}", relation_type, e));
                    continue;
                }
            };

            trace.extend(inference.get_inference_trace(&result));
            for step in result.inference_steps {
                let endpoints = self.endpoints(&step.inferred_relation).await;
                evidence.push(Evidence::from_relation(
                    step.inferred_relation,
                    endpoints,
                    step.confidence,
                    self.config.inferred_relevance,
                    INFERENCE_SOURCE,
                    step.explanation,
                ));
            }
        }

        evidence
    }

    /// Whichever endpoints of a relation the store can still provide
    async fn endpoints(&self, relation: &Relation) -> Vec<Entity> {
        let mut endpoints = Vec::new();
        for id in [&relation.source_id, &relation.target_id] {
            if let Ok(Some(entity)) = self.store.get_entity(id).await {
                endpoints.push(entity);
            }
        }
        endpoints
    }

    /// Simple paths from `start_id` of at most `max_hops` edges, at most `max_paths` of them
    pub async fn find_multi_hop_paths(
        &self,
        start_id: &str,
        target_id: Option<&str>,
        max_hops: usize,
        relation_types: &[String],
        max_paths: Option<usize>,
    ) -> Result<Vec<Path>> {
        paths::find_paths(
            self.store.as_ref(),
            start_id,
            target_id,
            max_hops,
            relation_types,
            max_paths.unwrap_or(self.config.max_paths),
        )
        .await
    }

    /// One PATH evidence item per path, scored by edge weights and hop count
    pub fn collect_evidence_from_paths(&self, paths: Vec<Path>, source: &str) -> Vec<Evidence> {
        paths::collect_evidence_from_paths(paths, source, self.config.hop_decay)
    }

    pub fn rank_evidence(&self, evidence: Vec<Evidence>, method: RankMethod) -> Vec<Evidence> {
        rank_evidence(evidence, method)
    }
}
