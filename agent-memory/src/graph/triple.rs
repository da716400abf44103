//! Triple ingestion: normalization and validation.

use serde::{Deserialize, Serialize};

use crate::{MemoryError, MemoryResult};

/// Normalizes an entity label into a node id.
#[must_use]
pub fn normalize_id(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Normalizes a predicate: upper-case, with whitespace and dash runs joined by `_`.
#[must_use]
pub fn normalize_relation(relation: &str) -> String {
    relation
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}

/// Unvalidated triple as submitted by a caller. Missing fields are allowed
/// here and rejected by [`Triple::parse_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripleInput {
    /// Subject label.
    #[serde(default, alias = "subject")]
    pub source: Option<String>,
    /// Predicate.
    #[serde(default, alias = "predicate")]
    pub relation: Option<String>,
    /// Object label.
    #[serde(default, alias = "object")]
    pub target: Option<String>,
    /// Optional type tag for the subject node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// Optional type tag for the object node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
}

impl TripleInput {
    /// Creates an input with all three required fields set.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        relation: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            relation: Some(relation.into()),
            target: Some(target.into()),
            source_type: None,
            target_type: None,
        }
    }
}

/// A validated, normalized fact ready to be merged into the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    source_id: String,
    source_label: String,
    relation: String,
    target_id: String,
    target_label: String,
    source_type: Option<String>,
    target_type: Option<String>,
}

impl Triple {
    /// Validates and normalizes a single fact.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidTriple`] (index `0`) when a field is blank.
    pub fn new(
        source: impl Into<String>,
        relation: impl Into<String>,
        target: impl Into<String>,
    ) -> MemoryResult<Self> {
        Self::parse(TripleInput::new(source, relation, target))
            .map_err(|reason| MemoryError::InvalidTriple { index: 0, reason })
    }

    /// Validates a whole batch. Either every triple is returned or the first
    /// failure is reported with its position.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidTriple`] for the first malformed input.
    pub fn parse_batch<I>(inputs: I) -> MemoryResult<Vec<Self>>
    where
        I: IntoIterator<Item = TripleInput>,
    {
        inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| {
                Self::parse(input).map_err(|reason| MemoryError::InvalidTriple { index, reason })
            })
            .collect()
    }

    fn parse(input: TripleInput) -> Result<Self, &'static str> {
        let source_label = required(input.source, "source is missing or blank")?;
        let relation = required(input.relation, "relation is missing or blank")?;
        let target_label = required(input.target, "target is missing or blank")?;

        let relation = normalize_relation(&relation);
        if relation.is_empty() {
            return Err("relation is missing or blank");
        }

        Ok(Self {
            source_id: normalize_id(&source_label),
            source_label,
            relation,
            target_id: normalize_id(&target_label),
            target_label,
            source_type: optional(input.source_type),
            target_type: optional(input.target_type),
        })
    }

    /// Sets the subject node type.
    #[must_use]
    pub fn with_source_type(mut self, kind: impl Into<String>) -> Self {
        self.source_type = optional(Some(kind.into()));
        self
    }

    /// Sets the object node type.
    #[must_use]
    pub fn with_target_type(mut self, kind: impl Into<String>) -> Self {
        self.target_type = optional(Some(kind.into()));
        self
    }

    /// Normalized subject id.
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Subject label as submitted (trimmed).
    #[must_use]
    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    /// Normalized predicate.
    #[must_use]
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Normalized object id.
    #[must_use]
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Object label as submitted (trimmed).
    #[must_use]
    pub fn target_label(&self) -> &str {
        &self.target_label
    }

    /// Subject node type, if one was given.
    #[must_use]
    pub fn source_type(&self) -> Option<&str> {
        self.source_type.as_deref()
    }

    /// Object node type, if one was given.
    #[must_use]
    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }
}

fn required(value: Option<String>, reason: &'static str) -> Result<String, &'static str> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => Err(reason),
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
