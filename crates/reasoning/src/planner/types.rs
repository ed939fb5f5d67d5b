//! Query plan data types
//!
//! Step payloads are typed per operation and validated when a [`QueryStep`]
//! is constructed, so the executor never has to second-guess its input.

use super::PatternKind;
use crate::evidence::RankMethod;
use chrono::{DateTime, Utc};
use graphmind_common::errors::{GraphError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use validator::{Validate, ValidationError, ValidationErrors};

/// Primitive graph operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryOperation {
    EntityLookup,
    Traversal,
    VectorSearch,
    PathFinding,
    Filter,
    Rank,
}

impl QueryOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOperation::EntityLookup => "entity_lookup",
            QueryOperation::Traversal => "traversal",
            QueryOperation::VectorSearch => "vector_search",
            QueryOperation::PathFinding => "path_finding",
            QueryOperation::Filter => "filter",
            QueryOperation::Rank => "rank",
        }
    }
}

/// Fetch one entity by id
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct EntityLookupParams {
    #[validate(length(min = 1))]
    pub entity_id: Option<String>,

    pub entity_type: Option<String>,
}

/// Expand paths outward from a start entity.
///
/// Without `start_id` the traversal continues from the paths produced by the
/// step's dependencies. With `target_id` only paths ending there count.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TraversalParams {
    #[validate(length(min = 1))]
    pub start_id: Option<String>,

    #[validate(length(min = 1))]
    pub target_id: Option<String>,

    /// Empty means every relation type
    #[serde(default)]
    pub relation_types: Vec<String>,

    #[validate(range(min = 1, max = 10))]
    pub max_depth: usize,

    #[validate(range(min = 1))]
    pub max_results: usize,
}

/// Similarity search over entity embeddings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_vector_query"))]
pub struct VectorSearchParams {
    pub query_text: String,

    pub embedding: Option<Vec<f32>>,

    pub entity_type: Option<String>,

    #[validate(range(min = 1))]
    pub top_k: usize,

    #[validate(range(min = 0.0, max = 1.0))]
    pub score_threshold: f32,
}

fn validate_vector_query(params: &VectorSearchParams) -> std::result::Result<(), ValidationError> {
    let has_text = !params.query_text.trim().is_empty();
    let has_embedding = params.embedding.as_ref().map_or(false, |e| !e.is_empty());

    if has_text || has_embedding {
        Ok(())
    } else {
        Err(ValidationError::new("vector_search_needs_text_or_embedding"))
    }
}

/// Paths between two known entities
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PathFindingParams {
    #[validate(length(min = 1))]
    pub source_id: String,

    #[validate(length(min = 1))]
    pub target_id: String,

    #[validate(range(min = 1, max = 10))]
    pub max_depth: usize,

    #[validate(range(min = 1))]
    pub max_paths: usize,
}

/// Entities whose property equals a value
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FilterParams {
    pub entity_type: Option<String>,

    #[validate(length(min = 1))]
    pub property: String,

    #[validate(length(min = 1))]
    pub value: String,

    #[validate(range(min = 1))]
    pub limit: usize,
}

/// Re-rank evidence collected so far
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RankParams {
    pub method: RankMethod,

    #[validate(range(min = 1))]
    pub limit: Option<usize>,
}

/// Typed payload of a plan step; the variant determines the operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepQuery {
    EntityLookup(EntityLookupParams),
    Traversal(TraversalParams),
    VectorSearch(VectorSearchParams),
    PathFinding(PathFindingParams),
    Filter(FilterParams),
    Rank(RankParams),
}

impl StepQuery {
    pub fn operation(&self) -> QueryOperation {
        match self {
            StepQuery::EntityLookup(_) => QueryOperation::EntityLookup,
            StepQuery::Traversal(_) => QueryOperation::Traversal,
            StepQuery::VectorSearch(_) => QueryOperation::VectorSearch,
            StepQuery::PathFinding(_) => QueryOperation::PathFinding,
            StepQuery::Filter(_) => QueryOperation::Filter,
            StepQuery::Rank(_) => QueryOperation::Rank,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        match self {
            StepQuery::EntityLookup(p) => p.validate(),
            StepQuery::Traversal(p) => p.validate(),
            StepQuery::VectorSearch(p) => p.validate(),
            StepQuery::PathFinding(p) => p.validate(),
            StepQuery::Filter(p) => p.validate(),
            StepQuery::Rank(p) => p.validate(),
        }
    }
}

/// One primitive operation in a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStep {
    /// Unique within the plan
    pub step_id: String,

    pub query: StepQuery,

    /// Steps that must run first
    pub depends_on: BTreeSet<String>,

    pub estimated_cost: f32,

    pub description: String,
}

impl QueryStep {
    /// Build a step, validating its payload. Negative costs become 0.
    pub fn new(
        step_id: impl Into<String>,
        query: StepQuery,
        estimated_cost: f32,
        description: impl Into<String>,
    ) -> Result<Self> {
        query.validate()?;

        Ok(Self {
            step_id: step_id.into(),
            query,
            depends_on: BTreeSet::new(),
            estimated_cost: estimated_cost.max(0.0),
            description: description.into(),
        })
    }

    pub fn with_dependencies<I, S>(mut self, step_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(step_ids.into_iter().map(Into::into));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn operation(&self) -> QueryOperation {
        self.query.operation()
    }
}

/// Ordered, dependency-annotated decomposition of a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    pub plan_id: String,

    pub original_query: String,

    pub steps: Vec<QueryStep>,

    pub optimized: bool,

    pub explanation: String,

    pub metadata: BTreeMap<String, Value>,

    pub created_at: DateTime<Utc>,
}

impl QueryPlan {
    /// Sum of step costs, recomputed on every call
    pub fn total_estimated_cost(&self) -> f32 {
        self.steps.iter().map(|s| s.estimated_cost).sum()
    }

    /// Strict structural check: unique ids, known dependencies, no cycles.
    ///
    /// Execution never calls this as a gate; it is for callers that build
    /// plans by hand and want a hard error.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for step in &self.steps {
            if !ids.insert(step.step_id.as_str()) {
                return Err(GraphError::InvalidPlan {
                    message: format!("duplicate step id '{}'", step.step_id),
                });
            }
        }

        for step in &self.steps {
            if let Some(missing) = step.depends_on.iter().find(|d| !ids.contains(d.as_str())) {
                return Err(GraphError::InvalidPlan {
                    message: format!("step '{}' depends on unknown step '{}'", step.step_id, missing),
                });
            }
        }

        let resolved: usize = super::get_dependency_levels(&self.steps).iter().map(Vec::len).sum();
        if resolved != self.steps.len() {
            return Err(GraphError::InvalidPlan {
                message: format!(
                    "{} of {} steps are part of a dependency cycle",
                    self.steps.len() - resolved,
                    self.steps.len()
                ),
            });
        }

        Ok(())
    }
}

/// Typed replacement for a loosely-keyed request context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryContext {
    pub start_entity_id: Option<String>,

    pub target_entity_id: Option<String>,

    pub entity_type: Option<String>,

    pub query_embedding: Option<Vec<f32>>,

    /// Restrict traversals to these relation types
    #[serde(default)]
    pub relation_types: Vec<String>,

    /// Hop count for multi-hop plans
    pub max_hops: Option<usize>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_entity(mut self, id: impl Into<String>) -> Self {
        self.start_entity_id = Some(id.into());
        self
    }

    pub fn with_target_entity(mut self, id: impl Into<String>) -> Self {
        self.target_entity_id = Some(id.into());
        self
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.query_embedding = Some(embedding);
        self
    }

    pub fn with_relation_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relation_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_hops(mut self, hops: usize) -> Self {
        self.max_hops = Some(hops);
        self
    }
}

/// Single-operation shortcut for simple queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQuery {
    pub original_query: String,

    pub params: StepQuery,
}

impl GraphQuery {
    pub fn operation(&self) -> QueryOperation {
        self.params.operation()
    }
}

/// How `optimize_plan` orders steps inside a dependency level
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStrategy {
    MinimizeCost,
    MinimizeLatency,
    #[default]
    Balanced,
}

impl OptimizationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationStrategy::MinimizeCost => "minimize_cost",
            OptimizationStrategy::MinimizeLatency => "minimize_latency",
            OptimizationStrategy::Balanced => "balanced",
        }
    }
}

/// Rough query complexity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// Heuristic reading of a natural-language query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    /// First matching pattern
    pub pattern: Option<PatternKind>,

    /// Capture groups of that pattern
    pub captures: Vec<String>,

    pub is_multi_hop: bool,

    pub has_vector_search: bool,

    pub has_path_finding: bool,

    pub complexity: Complexity,

    /// Capitalized or quoted terms that look like entity names
    pub entity_candidates: Vec<String>,
}
