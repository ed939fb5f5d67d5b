//! Ordered query pattern table
//!
//! Classification is first-match-wins over a fixed table. The order is part of
//! the planner's observable behavior: a query matching several patterns is
//! always decomposed by the earliest one.

use super::types::Complexity;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Decomposition template selected by a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    EntityLookupByProperty,
    RelationTraversal,
    MultiHopQuery,
    VectorSearch,
    PathFinding,
    NeighborQuery,
}

impl PatternKind {
    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::EntityLookupByProperty => "entity_lookup_by_property",
            PatternKind::RelationTraversal => "relation_traversal",
            PatternKind::MultiHopQuery => "multi_hop_query",
            PatternKind::VectorSearch => "vector_search",
            PatternKind::PathFinding => "path_finding",
            PatternKind::NeighborQuery => "neighbor_query",
        }
    }
}

/// Table rows in precedence order
const PATTERN_TABLE: &[(PatternKind, &str)] = &[
    (
        PatternKind::EntityLookupByProperty,
        r#"(?i)\b(?:find|get|show|list)\b.*?\b(?:with|where|whose|having)\s+(?:the\s+)?(\w+)\s+(?:=\s*|is\s+|equals\s+|of\s+)?['"]?([\w .@-]+?)['"]?\s*\??\s*$"#,
    ),
    (
        PatternKind::RelationTraversal,
        r"(?i)^\s*(?:who|what)\s+(?:does|do|did)\s+(\w+)\s+(\w+)\s*\??\s*$",
    ),
    (
        PatternKind::MultiHopQuery,
        r"(?i)\b(?:through|via|indirectly|friends?\s+of|colleagues?\s+of|people\s+(?:at|in|who)|(?:two|three|2|3)\s+hops?)\b",
    ),
    (
        PatternKind::VectorSearch,
        r"(?i)\b(?:similar|like|resembl\w*|related\s+to|semantically)\b",
    ),
    (
        PatternKind::PathFinding,
        r"(?i)\b(?:path|paths|route|connection|link)\s+(?:from|between)\s+(\w+)\s+(?:to|and)\s+(\w+)",
    ),
    (
        PatternKind::PathFinding,
        r"(?i)\bhow\s+(?:is|are)\s+(\w+)\s+(?:connected|linked)\s+to\s+(\w+)",
    ),
    (
        PatternKind::NeighborQuery,
        r"(?i)\b(?:neighbou?rs?\s+of|connected\s+to|linked\s+to|adjacent\s+to)\s+(\w+)",
    ),
];

const QUESTION_WORDS: &[&str] = &["who", "what", "where", "when", "why", "how", "which"];

/// A compiled pattern row
struct QueryPattern {
    kind: PatternKind,
    regex: Regex,
}

/// Result of matching a query against the table
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub kind: PatternKind,
    pub captures: Vec<String>,
}

/// Compiled, ordered pattern table
pub struct PatternTable {
    patterns: Vec<QueryPattern>,
}

impl PatternTable {
    /// Compile the built-in table. Rows that fail to compile are skipped.
    pub fn new() -> Self {
        let patterns = PATTERN_TABLE
            .iter()
            .filter_map(|(kind, source)| match Regex::new(source) {
                Ok(regex) => Some(QueryPattern { kind: *kind, regex }),
                Err(e) => {
                    warn!(pattern = kind.name(), error = %e, "Skipping query pattern that failed to compile");
                    None
                }
            })
            .collect();

        Self { patterns }
    }

    /// First matching row, with its capture groups
    pub fn classify(&self, query: &str) -> Option<PatternMatch> {
        self.patterns.iter().find_map(|pattern| {
            let caps = pattern.regex.captures(query)?;
            let captures = caps
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str().trim().to_string())
                .collect();
            Some(PatternMatch {
                kind: pattern.kind,
                captures,
            })
        })
    }

    /// Whether any row of the given kind matches
    pub fn matches_kind(&self, kind: PatternKind, query: &str) -> bool {
        self.patterns
            .iter()
            .filter(|p| p.kind == kind)
            .any(|p| p.regex.is_match(query))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::new()
    }
}

fn words(query: &str) -> impl Iterator<Item = String> + '_ {
    query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '-'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
}

/// Low/medium/high from question-word count and the word "through"
pub fn estimate_complexity(query: &str) -> Complexity {
    let lower = query.to_lowercase();
    let question_words = words(&lower)
        .filter(|w| QUESTION_WORDS.contains(&w.as_str()))
        .count();
    let has_through = words(&lower).any(|w| w == "through");

    if question_words >= 3 || (has_through && question_words >= 2) {
        Complexity::High
    } else if question_words == 2 || has_through {
        Complexity::Medium
    } else {
        Complexity::Low
    }
}

/// Quoted phrases and capitalized words past the first token.
///
/// The first word is skipped because sentence case capitalizes it anyway.
pub fn extract_entity_candidates(query: &str) -> Vec<String> {
    let segments: Vec<&str> = query.split('"').collect();

    let mut candidates: Vec<String> = segments
        .iter()
        .skip(1)
        .step_by(2)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let unquoted = segments.iter().step_by(2).copied().collect::<Vec<_>>().join(" ");
    for word in words(&unquoted).skip(1) {
        let capitalized = word.chars().next().map_or(false, char::is_uppercase);
        if capitalized
            && !QUESTION_WORDS.contains(&word.to_lowercase().as_str())
            && !candidates.contains(&word)
        {
            candidates.push(word);
        }
    }

    candidates
}

/// Turn a display name into the id form stores conventionally use
pub fn normalize_entity_id(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}
