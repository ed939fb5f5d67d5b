//! Error types for graphmind
//!
//! Provides a single error enum for the reasoning subsystem with:
//! - Distinct variants for store, planning, cache, and configuration failures
//! - Machine-readable error codes
//! - Retry classification for store-boundary errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidPlan,

    // Resource errors (4xxx)
    EntityNotFound,

    // Store errors (7xxx)
    StoreError,
    StoreUnavailable,

    // Auxiliary service errors (8xxx)
    EmbeddingError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
    TelemetryError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidPlan => 1002,

            // Resources (4xxx)
            ErrorCode::EntityNotFound => 4001,

            // Store (7xxx)
            ErrorCode::StoreError => 7001,
            ErrorCode::StoreUnavailable => 7002,

            // Auxiliary (8xxx)
            ErrorCode::EmbeddingError => 8002,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::TelemetryError => 9004,
        }
    }
}

/// graphmind error types
#[derive(Error, Debug)]
pub enum GraphError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>
    },

    #[error("Invalid query plan: {message}")]
    InvalidPlan { message: String },

    // Resource errors
    #[error("Entity not found: {id}")]
    EntityNotFound { id: String },

    // Graph store errors
    #[error("Graph store error: {message}")]
    Store { message: String },

    #[error("Graph store unavailable: {message}")]
    StoreUnavailable { message: String },

    // Auxiliary errors
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    #[error("Telemetry error: {message}")]
    Telemetry { message: String },

    // Internal errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GraphError {
    /// Validation failure not tied to a single field
    pub fn validation(message: impl Into<String>) -> Self {
        GraphError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            GraphError::Validation { .. } => ErrorCode::ValidationError,
            GraphError::InvalidPlan { .. } => ErrorCode::InvalidPlan,
            GraphError::EntityNotFound { .. } => ErrorCode::EntityNotFound,
            GraphError::Store { .. } => ErrorCode::StoreError,
            GraphError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            GraphError::Embedding { .. } => ErrorCode::EmbeddingError,
            GraphError::Telemetry { .. } => ErrorCode::TelemetryError,
            GraphError::Configuration(_) => ErrorCode::ConfigurationError,
            GraphError::Serialization(_) => ErrorCode::SerializationError,
            GraphError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the failed operation may succeed if retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, GraphError::StoreUnavailable { .. })
    }

    /// Whether this error originated at the graph store boundary
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            GraphError::Store { .. } | GraphError::StoreUnavailable { .. } | GraphError::EntityNotFound { .. }
        )
    }
}

impl From<validator::ValidationErrors> for GraphError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors.field_errors().keys().next().map(|f| f.to_string());
        GraphError::Validation {
            message: errors.to_string(),
            field,
        }
    }
}
