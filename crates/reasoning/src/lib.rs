//! graphmind Reasoning Library
//!
//! Graph reasoning over a [`graphmind_common::GraphStore`]:
//! - Query planning from natural language into dependency-ordered graph operations
//! - Plan execution, bounded multi-hop path search, and answer generation
//! - Rule-based relation inference with an LRU/TTL result cache
//! - Evidence synthesis, filtering, and contradiction detection

pub mod engine;
pub mod evidence;
pub mod inference;
pub mod planner;
pub mod synthesis;

// Re-export commonly used types
pub use engine::ReasoningEngine;
pub use evidence::{rank_evidence, Evidence, EvidenceType, RankMethod, ReasoningResult};
pub use inference::{InferenceCache, InferenceEngine, InferenceResult, InferenceRule, RuleType};
pub use planner::{OptimizationStrategy, QueryContext, QueryPlan, QueryPlanner, QueryStep};
pub use synthesis::{Contradiction, EvidenceSynthesizer, SynthesisMethod};
