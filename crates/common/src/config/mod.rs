//! Configuration management for graphmind
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with GRAPHMIND__)
//! - Configuration files (config/default.toml, config/{env}.toml)
//! - Default values
//!
//! Every tuning constant used by the planner, engine, inference engine, and
//! synthesizer is a named field here rather than a literal in the code.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Query planner configuration
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Reasoning engine configuration
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Inference engine configuration
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Evidence synthesis configuration
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    /// Hops planned for multi-hop queries when the context gives none.
    ///
    /// `ReasoningEngine::reason` always fills the context hop limit from
    /// `ReasoningConfig::max_hops`, so this only applies to direct planner calls.
    #[serde(default = "default_planner_max_hops")]
    pub default_max_hops: usize,

    /// Extra cost per additional traversal hop
    #[serde(default = "default_hop_cost_increment")]
    pub hop_cost_increment: f32,

    /// Steps above this cost are deprioritized by the balanced strategy
    #[serde(default = "default_balance_threshold")]
    pub balance_threshold: f32,

    /// Base cost of an entity lookup
    #[serde(default = "default_lookup_cost")]
    pub lookup_cost: f32,

    /// Base cost of a traversal
    #[serde(default = "default_traversal_cost")]
    pub traversal_cost: f32,

    /// Base cost of a vector search
    #[serde(default = "default_vector_search_cost")]
    pub vector_search_cost: f32,

    /// Base cost of a property filter
    #[serde(default = "default_filter_cost")]
    pub filter_cost: f32,

    /// Base cost of a source-to-target path search
    #[serde(default = "default_path_finding_cost")]
    pub path_finding_cost: f32,

    /// Top-k for vector search steps
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Minimum similarity for vector search steps
    #[serde(default = "default_score_threshold")]
    pub default_score_threshold: f32,

    /// Result cap for traversal and filter steps
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReasoningConfig {
    /// Hop limit for reasoning when neither the call nor the context sets one.
    /// Takes precedence over `PlannerConfig::default_max_hops`.
    #[serde(default = "default_reasoning_max_hops")]
    pub max_hops: usize,

    /// Default number of evidence items kept per result
    #[serde(default = "default_max_evidence")]
    pub max_evidence: usize,

    /// Maximum paths returned by a single path search
    #[serde(default = "default_max_paths")]
    pub max_paths: usize,

    /// Relevance lost per hop beyond the first
    #[serde(default = "default_hop_decay")]
    pub hop_decay: f32,

    /// Evidence items aggregated into the answer confidence
    #[serde(default = "default_answer_evidence")]
    pub answer_evidence: usize,

    /// Relevance assigned to directly looked-up entities
    #[serde(default = "default_lookup_relevance")]
    pub lookup_relevance: f32,

    /// Relevance assigned to relations produced by inference
    #[serde(default = "default_inferred_relevance")]
    pub inferred_relevance: f32,

    /// Augment evidence with inferred relations
    #[serde(default)]
    pub enable_inference: bool,

    /// Run evidence synthesis before truncation
    #[serde(default)]
    pub synthesize: bool,

    /// Synthesis method: weighted_average, max, voting
    #[serde(default = "default_synthesis_method")]
    pub synthesis_method: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InferenceConfig {
    /// Maximum cached inference results
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,

    /// Time-to-live of cached results in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Closure rounds when the caller gives no limit
    #[serde(default = "default_max_steps")]
    pub default_max_steps: usize,

    /// Inferences below this confidence are discarded
    #[serde(default)]
    pub min_confidence: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SynthesisConfig {
    /// Threshold used by the voting method
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Confidence spread above which evidence is contradictory
    #[serde(default = "default_contradiction_threshold")]
    pub contradiction_threshold: f32,

    /// Maximum boost for corroborating evidence
    #[serde(default = "default_agreement_boost")]
    pub agreement_boost: f32,

    /// Ranking boost for synthesized evidence
    #[serde(default = "default_synthesis_rank_boost")]
    pub synthesis_rank_boost: f32,

    /// Maximum bonus for broad entity coverage
    #[serde(default = "default_coverage_bonus")]
    pub coverage_bonus: f32,

    /// Maximum bonus for low confidence variance
    #[serde(default = "default_agreement_bonus")]
    pub agreement_bonus: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Service name attached to log output
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_planner_max_hops() -> usize { 2 }
fn default_hop_cost_increment() -> f32 { 0.1 }
fn default_balance_threshold() -> f32 { 0.7 }
fn default_lookup_cost() -> f32 { 0.1 }
fn default_traversal_cost() -> f32 { 0.5 }
fn default_vector_search_cost() -> f32 { 0.6 }
fn default_filter_cost() -> f32 { 0.3 }
fn default_path_finding_cost() -> f32 { 0.8 }
fn default_top_k() -> usize { 10 }
fn default_score_threshold() -> f32 { 0.5 }
fn default_max_results() -> usize { 50 }
fn default_reasoning_max_hops() -> usize { 3 }
fn default_max_evidence() -> usize { 10 }
fn default_max_paths() -> usize { 20 }
fn default_hop_decay() -> f32 { 0.1 }
fn default_answer_evidence() -> usize { 3 }
fn default_lookup_relevance() -> f32 { 1.0 }
fn default_inferred_relevance() -> f32 { 0.8 }
fn default_synthesis_method() -> String { "weighted_average".to_string() }
fn default_cache_max_size() -> usize { 1000 }
fn default_cache_ttl() -> u64 { 3600 }
fn default_max_steps() -> usize { 3 }
fn default_confidence_threshold() -> f32 { 0.5 }
fn default_contradiction_threshold() -> f32 { 0.3 }
fn default_agreement_boost() -> f32 { 0.1 }
fn default_synthesis_rank_boost() -> f32 { 0.1 }
fn default_coverage_bonus() -> f32 { 0.05 }
fn default_agreement_bonus() -> f32 { 0.05 }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "graphmind".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("GRAPHMIND_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with GRAPHMIND__ prefix
            // e.g., GRAPHMIND__REASONING__MAX_HOPS=4
            .add_source(
                Environment::with_prefix("GRAPHMIND")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("GRAPHMIND")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get inference cache TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        self.inference.cache_ttl()
    }
}

impl InferenceConfig {
    /// Get cache TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_max_hops: default_planner_max_hops(),
            hop_cost_increment: default_hop_cost_increment(),
            balance_threshold: default_balance_threshold(),
            lookup_cost: default_lookup_cost(),
            traversal_cost: default_traversal_cost(),
            vector_search_cost: default_vector_search_cost(),
            filter_cost: default_filter_cost(),
            path_finding_cost: default_path_finding_cost(),
            default_top_k: default_top_k(),
            default_score_threshold: default_score_threshold(),
            default_max_results: default_max_results(),
        }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_hops: default_reasoning_max_hops(),
            max_evidence: default_max_evidence(),
            max_paths: default_max_paths(),
            hop_decay: default_hop_decay(),
            answer_evidence: default_answer_evidence(),
            lookup_relevance: default_lookup_relevance(),
            inferred_relevance: default_inferred_relevance(),
            enable_inference: false,
            synthesize: false,
            synthesis_method: default_synthesis_method(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            cache_max_size: default_cache_max_size(),
            cache_ttl_secs: default_cache_ttl(),
            default_max_steps: default_max_steps(),
            min_confidence: 0.0,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            contradiction_threshold: default_contradiction_threshold(),
            agreement_boost: default_agreement_boost(),
            synthesis_rank_boost: default_synthesis_rank_boost(),
            coverage_bonus: default_coverage_bonus(),
            agreement_bonus: default_agreement_bonus(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            service_name: default_service_name(),
        }
    }
}
