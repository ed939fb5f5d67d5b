//! Directed, typed, weighted edge between entities

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,

    /// Relation type (KNOWS, WORKS_AT, ...)
    pub relation_type: String,

    pub source_id: String,

    pub target_id: String,

    /// Edge weight (0.0 - 1.0)
    pub weight: f32,

    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

impl Relation {
    /// Create a relation; the weight is clamped into [0, 1]
    pub fn new(
        id: impl Into<String>,
        relation_type: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        weight: f32,
    ) -> Self {
        Self {
            id: id.into(),
            relation_type: relation_type.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            weight: weight.clamp(0.0, 1.0),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Filter for `GraphStore::get_relations`. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationFilter {
    pub source_id: Option<String>,
    pub target_id: Option<String>,
    pub relation_type: Option<String>,
    pub limit: Option<usize>,
}

impl RelationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn to_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn of_type(mut self, relation_type: impl Into<String>) -> Self {
        self.relation_type = Some(relation_type.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a relation passes this filter (limit is not considered)
    pub fn matches(&self, relation: &Relation) -> bool {
        self.source_id.as_deref().map_or(true, |s| relation.source_id == s)
            && self.target_id.as_deref().map_or(true, |t| relation.target_id == t)
            && self.relation_type.as_deref().map_or(true, |r| relation.relation_type == r)
    }
}
