//! graphmind Common Library
//!
//! Shared code for the graphmind reasoning crates including:
//! - Graph data model (entities, relations, paths)
//! - The graph store contract and an in-memory reference store
//! - Embedding abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and tracing setup

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{GraphError, Result};
pub use models::{Entity, Path, Relation, RelationFilter, ScoredEntity};
pub use store::GraphStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
