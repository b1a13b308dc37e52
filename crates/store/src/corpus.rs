//! Append-only corpus of embedded records, held as parallel columns.

use crate::types::{Metadata, Record};
use datalens_core::{AppError, AppResult};
use std::collections::HashSet;

/// The in-memory corpus.
///
/// The four columns always have equal length; position `i` in each column
/// describes the same record. Records are only ever appended, and an append
/// may be rolled back with [`Corpus::truncate`] until it is persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    ids: Vec<String>,
    documents: Vec<String>,
    metadatas: Vec<Metadata>,
    embeddings: Vec<Vec<f32>>,
}

impl Corpus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a corpus from already-validated columns.
    pub fn from_columns(
        ids: Vec<String>,
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
        embeddings: Vec<Vec<f32>>,
    ) -> AppResult<Self> {
        let n = ids.len();
        if documents.len() != n || metadatas.len() != n || embeddings.len() != n {
            return Err(AppError::CorruptState(format!(
                "Column lengths differ: ids={}, documents={}, metadatas={}, embeddings={}",
                n,
                documents.len(),
                metadatas.len(),
                embeddings.len()
            )));
        }
        Ok(Self {
            ids,
            documents,
            metadatas,
            embeddings,
        })
    }

    /// Append records in order.
    pub fn append(&mut self, records: Vec<Record>) {
        self.ids.reserve(records.len());
        self.documents.reserve(records.len());
        self.metadatas.reserve(records.len());
        self.embeddings.reserve(records.len());

        for record in records {
            self.ids.push(record.id);
            self.documents.push(record.text);
            self.metadatas.push(record.metadata);
            self.embeddings.push(record.embedding);
        }
    }

    /// Drop every record at or beyond `len`.
    pub fn truncate(&mut self, len: usize) {
        self.ids.truncate(len);
        self.documents.truncate(len);
        self.metadatas.truncate(len);
        self.embeddings.truncate(len);
    }

    /// Ids among `candidates` that already exist in the corpus or repeat
    /// within `candidates` itself, in first-seen order.
    #[must_use]
    pub fn duplicate_ids<'a>(&self, candidates: &'a [String]) -> Vec<&'a str> {
        let existing: HashSet<&str> = self.ids.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for id in candidates {
            if existing.contains(id.as_str()) || !seen.insert(id.as_str()) {
                duplicates.push(id.as_str());
            }
        }
        duplicates
    }

    /// Materialise the record at `position`.
    #[must_use]
    pub fn record(&self, position: usize) -> Option<Record> {
        Some(Record {
            id: self.ids.get(position)?.clone(),
            text: self.documents.get(position)?.clone(),
            metadata: self.metadatas.get(position)?.clone(),
            embedding: self.embeddings.get(position)?.clone(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    #[must_use]
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    #[must_use]
    pub fn metadatas(&self) -> &[Metadata] {
        &self.metadatas
    }

    #[must_use]
    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, text: &str) -> Record {
        let mut metadata = Metadata::new();
        metadata.insert("file_id".to_string(), "report.csv".into());
        Record {
            id: id.to_string(),
            text: text.to_string(),
            metadata,
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn test_append_keeps_columns_parallel() {
        let mut corpus = Corpus::new();
        corpus.append(vec![record("a", "alpha"), record("b", "beta")]);

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.ids(), ["a", "b"]);
        assert_eq!(corpus.documents(), ["alpha", "beta"]);
        assert_eq!(corpus.metadatas().len(), 2);
        assert_eq!(corpus.embeddings().len(), 2);
        assert_eq!(corpus.record(1), Some(record("b", "beta")));
        assert_eq!(corpus.record(2), None);
    }

    #[test]
    fn test_truncate_rolls_back_append() {
        let mut corpus = Corpus::new();
        corpus.append(vec![record("a", "alpha")]);
        let before = corpus.clone();

        corpus.append(vec![record("b", "beta"), record("c", "gamma")]);
        corpus.truncate(before.len());
        assert_eq!(corpus, before);
    }

    #[test]
    fn test_duplicate_ids() {
        let mut corpus = Corpus::new();
        corpus.append(vec![record("a", "alpha")]);

        let batch = vec!["a".to_string(), "b".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(corpus.duplicate_ids(&batch), vec!["a", "b"]);
        assert!(corpus.duplicate_ids(&["z".to_string()]).is_empty());
    }

    #[test]
    fn test_from_columns_rejects_ragged() {
        let result = Corpus::from_columns(
            vec!["a".to_string()],
            vec!["alpha".to_string()],
            vec![],
            vec![vec![1.0]],
        );
        assert!(matches!(result, Err(AppError::CorruptState(_))));
    }
}
