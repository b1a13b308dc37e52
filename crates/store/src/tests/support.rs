//! Deterministic encoders for store tests.

use crate::encoder::Encoder;
use datalens_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Looks every text up in a fixed table; unknown text is an encoding error.
#[derive(Debug)]
pub struct TableEncoder {
    dimensions: usize,
    table: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl TableEncoder {
    pub fn new(dimensions: usize, entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            dimensions,
            table: entries
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Encoder for TableEncoder {
    fn provider_name(&self) -> &str {
        "table"
    }

    fn model_name(&self) -> &str {
        "table-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts
            .iter()
            .map(|text| {
                self.table
                    .get(text)
                    .cloned()
                    .ok_or_else(|| AppError::Encoding(format!("no vector for {:?}", text)))
            })
            .collect()
    }
}

/// Simulates an unreachable encoder.
#[derive(Debug)]
pub struct FailingEncoder {
    pub dimensions: usize,
}

#[async_trait::async_trait]
impl Encoder for FailingEncoder {
    fn provider_name(&self) -> &str {
        "table"
    }

    fn model_name(&self) -> &str {
        "table-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::Encoding("connection refused".to_string()))
    }
}

/// Returns one vector too few, as a misbehaving remote model might.
#[derive(Debug)]
pub struct ShortEncoder {
    pub dimensions: usize,
}

#[async_trait::async_trait]
impl Encoder for ShortEncoder {
    fn provider_name(&self) -> &str {
        "table"
    }

    fn model_name(&self) -> &str {
        "table-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(vec![vec![1.0; self.dimensions]; texts.len().saturating_sub(1)])
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn file_metadata(file_id: &str, chunk: i64) -> crate::types::Metadata {
    let mut metadata = crate::types::Metadata::new();
    metadata.insert("file_id".to_string(), file_id.into());
    metadata.insert("chunk".to_string(), chunk.into());
    metadata
}
