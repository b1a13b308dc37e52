//! Nearest-neighbour ranking over corpus embeddings.
//!
//! The store owns the embeddings; an index only ranks positions in that
//! column. [`LinearScanIndex`] is exact and keeps no state of its own.
//! Stateful approximate indexes observe appends and rollbacks through
//! `extend` / `truncate`.

use std::cmp::Ordering;

/// One ranked match: corpus position and cosine similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub similarity: f32,
}

impl Neighbor {
    /// Distance as reported to callers: `1 - similarity`.
    pub fn distance(&self) -> f32 {
        1.0 - self.similarity
    }
}

/// Ranks corpus positions by similarity to a query vector.
pub trait NearestNeighborIndex: Send + Sync + std::fmt::Debug {
    /// Short identifier used in logs.
    fn kind(&self) -> &'static str;

    /// Observe embeddings appended at positions `start..start + embeddings.len()`.
    fn extend(&mut self, _start: usize, _embeddings: &[Vec<f32>]) {}

    /// Forget every position at or beyond `len`.
    fn truncate(&mut self, _len: usize) {}

    /// Return at most `k` neighbours, best first.
    ///
    /// Equal similarities must keep scan order (lower position first).
    fn nearest(&self, embeddings: &[Vec<f32>], query: &[f32], k: usize) -> Vec<Neighbor>;
}

/// Exact brute-force scan, O(N·D) per query.
#[derive(Debug, Clone, Default)]
pub struct LinearScanIndex;

impl LinearScanIndex {
    pub fn new() -> Self {
        Self
    }
}

impl NearestNeighborIndex for LinearScanIndex {
    fn kind(&self) -> &'static str {
        "linear-scan"
    }

    fn nearest(&self, embeddings: &[Vec<f32>], query: &[f32], k: usize) -> Vec<Neighbor> {
        if k == 0 || embeddings.is_empty() {
            return Vec::new();
        }

        let query_norm = norm(query);
        let mut scored: Vec<Neighbor> = embeddings
            .iter()
            .enumerate()
            .map(|(position, embedding)| Neighbor {
                position,
                similarity: cosine_with_norm(query, query_norm, embedding),
            })
            .collect();

        // sort_by is stable, so ties stay in scan order
        scored.sort_by(|a, b| descending(a.similarity, b.similarity));
        scored.truncate(k);
        scored
    }
}

/// NaN sorts last; everything else descends.
fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_with_norm(a: &[f32], norm_a: f32, b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

/// Cosine similarity in `[-1, 1]`; `0.0` if either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_with_norm(a, norm(a), b)
}
