//! Encoder trait and factory.

use datalens_core::{AppError, AppResult, EncoderConfig};
use std::sync::Arc;

/// Maps text to fixed-dimension embedding vectors.
///
/// Implementations must be deterministic for a given model and return
/// exactly one vector of `dimensions()` floats per input text, in order.
#[async_trait::async_trait]
pub trait Encoder: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Encode multiple texts in a batch.
    async fn encode(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Encode a single text (convenience method).
    async fn encode_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.encode(&[text.to_string()]).await?;
        if results.len() != 1 {
            return Err(AppError::Encoding(format!(
                "Expected 1 embedding, encoder returned {}",
                results.len()
            )));
        }
        results
            .pop()
            .ok_or_else(|| AppError::Encoding("No embedding returned".to_string()))
    }
}

/// Create an encoder based on configuration.
pub fn create_encoder(config: &EncoderConfig) -> AppResult<Arc<dyn Encoder>> {
    config.validate()?;

    match config.provider.as_str() {
        "trigram" => {
            let encoder = super::providers::trigram::TrigramEncoder::new(config.dimensions);
            Ok(Arc::new(encoder))
        }

        "ollama" => {
            let encoder = super::providers::ollama::OllamaEncoder::new(config)?;
            Ok(Arc::new(encoder))
        }

        _ => Err(AppError::Config(format!(
            "Unknown encoder provider: '{}'. Supported providers: trigram, ollama",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_encoder() {
        let config = EncoderConfig {
            dimensions: 128,
            ..Default::default()
        };

        let encoder = create_encoder(&config).unwrap();
        assert_eq!(encoder.provider_name(), "trigram");
        assert_eq!(encoder.model_name(), "trigram-v1");
        assert_eq!(encoder.dimensions(), 128);
    }

    #[test]
    fn test_create_ollama_encoder_is_lazy() {
        // Construction must not contact the server
        let config = EncoderConfig {
            provider: "ollama".to_string(),
            model: "all-minilm".to_string(),
            endpoint: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };

        let encoder = create_encoder(&config).unwrap();
        assert_eq!(encoder.provider_name(), "ollama");
        assert_eq!(encoder.model_name(), "all-minilm");
    }

    #[test]
    fn test_create_unknown_encoder() {
        let config = EncoderConfig {
            provider: "unknown".to_string(),
            ..Default::default()
        };

        let result = create_encoder(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown encoder provider"));
    }

    #[tokio::test]
    async fn test_encode_one() {
        let encoder = create_encoder(&EncoderConfig::default()).unwrap();
        let embedding = encoder.encode_one("quarterly revenue").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
