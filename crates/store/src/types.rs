//! Vector store type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A scalar metadata value.
///
/// Serialized as a plain JSON scalar. Variant order matters for untagged
/// deserialization: integers must be tried before floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    /// Parse a command-line style value, preferring the narrowest scalar.
    ///
    /// `"true"` becomes a bool, `"42"` an integer, `"0.5"` a float, and
    /// anything else is kept as a string.
    pub fn parse_loose(raw: &str) -> Self {
        if let Ok(b) = raw.parse::<bool>() {
            return MetadataValue::Bool(b);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return MetadataValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return MetadataValue::Float(f);
            }
        }
        MetadataValue::Str(raw.to_string())
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Int(i) => write!(f, "{}", i),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Str(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Opaque per-record metadata. The store never interprets it.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// One embedded text chunk, as held by the corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Caller-supplied identifier
    pub id: String,

    /// Chunk text, stored verbatim
    pub text: String,

    /// Caller metadata
    pub metadata: Metadata,

    /// Embedding vector of the store's dimension
    pub embedding: Vec<f32>,
}

/// Ranked results of a similarity search.
///
/// All sequences are parallel and ordered best match first. `distances`
/// keeps the legacy shape: one inner sequence per query, and the store only
/// ever runs a single query, so it holds at most one inner sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Matched record ids
    pub ids: Vec<String>,

    /// Matched texts
    pub documents: Vec<String>,

    /// Matched metadata
    pub metadatas: Vec<Metadata>,

    /// `1 - cosine_similarity` per match, wrapped in one outer sequence
    pub distances: Vec<Vec<f32>>,
}

impl SearchResults {
    /// Number of matches.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Distances of the single query, flattened.
    pub fn flat_distances(&self) -> &[f32] {
        self.distances.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Confidence signal used by answer generation: `max(0, 1 - min(distance))`.
    ///
    /// Returns `0.0` when there are no matches.
    pub fn confidence(&self) -> f32 {
        let best = self
            .flat_distances()
            .iter()
            .copied()
            .fold(f32::INFINITY, f32::min);
        if best.is_finite() {
            (1.0 - best).max(0.0)
        } else {
            0.0
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of records in the corpus
    pub document_count: usize,

    /// Embedding dimension fixed for the store's lifetime
    pub dimensions: usize,
}
