//! Offline encoder built from hashed character trigrams.

use crate::encoder::provider::Encoder;
use datalens_core::AppResult;
use std::collections::HashMap;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Deterministic feature-hashing encoder for local, offline operation.
///
/// Each significant word contributes its character trigrams and the whole
/// word to hashed buckets; the result is scaled to unit length. Text with no
/// significant words (including the empty string) encodes to the zero vector.
#[derive(Debug, Clone)]
pub struct TrigramEncoder {
    dimensions: usize,
}

impl TrigramEncoder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn encode_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        let lower = text.to_lowercase();
        let mut frequencies: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        {
            *frequencies.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &frequencies {
            let weight = *freq as f32;
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let bucket = bucket(window.iter().copied(), 37, self.dimensions);
                vector[bucket] += weight.sqrt();
            }
            vector[bucket(word.chars(), 31, self.dimensions)] += weight;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

fn bucket(chars: impl Iterator<Item = char>, multiplier: u64, dimensions: usize) -> usize {
    let hash = chars.fold(0u64, |acc, c| {
        acc.wrapping_mul(multiplier).wrapping_add(c as u64)
    });
    (hash % dimensions as u64) as usize
}

#[async_trait::async_trait]
impl Encoder for TrigramEncoder {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.encode_text(text)).collect())
    }
}
