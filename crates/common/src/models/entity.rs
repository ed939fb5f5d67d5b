//! Graph node model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Property key used for display names
pub const NAME_PROPERTY: &str = "name";

/// A typed graph node owned by the graph store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Store-assigned identifier
    pub id: String,

    /// Entity type (person, company, ...)
    pub entity_type: String,

    /// Arbitrary key/value properties
    #[serde(default)]
    pub properties: HashMap<String, Value>,

    /// Optional embedding used by vector search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Entity {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            properties: HashMap::new(),
            embedding: None,
        }
    }

    /// Add a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Shorthand for the `name` property
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_property(NAME_PROPERTY, name.into())
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// The `name` property, if it is a string
    pub fn name(&self) -> Option<&str> {
        self.properties.get(NAME_PROPERTY).and_then(Value::as_str)
    }

    /// Name when present, otherwise `entity_type:id`
    pub fn display_name(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("{}:{}", self.entity_type, self.id),
        }
    }

    /// Compare a property against a textual value.
    ///
    /// Strings compare case-insensitively; other JSON values compare by their
    /// rendered form.
    pub fn property_matches(&self, key: &str, expected: &str) -> bool {
        match self.properties.get(key) {
            Some(Value::String(s)) => s.eq_ignore_ascii_case(expected),
            Some(other) => other.to_string() == expected,
            None => false,
        }
    }
}

/// Entity returned from a similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEntity {
    pub entity: Entity,

    /// Similarity score (0.0 - 1.0)
    pub score: f32,
}
