//! Ollama Encoder
//!
//! Embeds text through a local Ollama server's batched `/api/embed` endpoint,
//! e.g. with `all-minilm` (384 dimensions) or `nomic-embed-text` (768).
//!
//! Failures are reported once and never retried here: timeouts, transport
//! errors, non-success statuses and malformed payloads all surface as
//! `AppError::Encoding` so the caller decides whether to try again.
//!
//! # Example
//! ```no_run
//! use datalens_core::EncoderConfig;
//! use datalens_store::encoder::providers::ollama::OllamaEncoder;
//! use datalens_store::Encoder;
//!
//! # async fn run() -> datalens_core::AppResult<()> {
//! let config = EncoderConfig {
//!     provider: "ollama".to_string(),
//!     model: "all-minilm".to_string(),
//!     dimensions: 384,
//!     ..Default::default()
//! };
//!
//! let encoder = OllamaEncoder::new(&config)?;
//! let embedding = encoder.encode_one("Quarterly revenue by region").await?;
//! assert_eq!(embedding.len(), 384);
//! # Ok(())
//! # }
//! ```

use crate::encoder::provider::Encoder;
use async_trait::async_trait;
use datalens_core::{AppError, AppResult, EncoderConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const EMBED_ENDPOINT: &str = "/api/embed";

/// Ollama encoder using the local HTTP API
#[derive(Debug, Clone)]
pub struct OllamaEncoder {
    client: Client,
    /// Full URL of the embed endpoint
    url: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaEncoder {
    /// Build the encoder. No request is made until the first `encode` call.
    pub fn new(config: &EncoderConfig) -> AppResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::Encoding(format!("Failed to create HTTP client for Ollama: {}", e))
        })?;

        Ok(Self {
            client,
            url: format!("{}{}", config.endpoint.trim_end_matches('/'), EMBED_ENDPOINT),
            model: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
            timeout,
        })
    }

    #[instrument(skip(self, texts), fields(batch = texts.len(), model = %self.model))]
    async fn embed_request(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Encoding(format!(
                        "Ollama request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    AppError::Encoding(format!("Failed to reach Ollama at {}: {}", self.url, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|r| r.error)
                .unwrap_or(body);
            return Err(AppError::Encoding(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::Encoding(format!("Failed to parse Ollama response: {}", e)))?;

        check_shape(&body.embeddings, texts.len(), self.dimensions)?;
        Ok(body.embeddings)
    }
}

/// Verify one vector per input, each of the configured dimension.
fn check_shape(embeddings: &[Vec<f32>], expected: usize, dimensions: usize) -> AppResult<()> {
    if embeddings.len() != expected {
        return Err(AppError::Encoding(format!(
            "Ollama returned {} embeddings for {} inputs",
            embeddings.len(),
            expected
        )));
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
        return Err(AppError::Encoding(format!(
            "Unexpected embedding dimensions: got {}, expected {}",
            bad.len(),
            dimensions
        )));
    }
    Ok(())
}

#[async_trait]
impl Encoder for OllamaEncoder {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_request(batch).await?);
        }

        debug!(
            "Encoded {} texts into {}-dimensional vectors",
            embeddings.len(),
            self.dimensions
        );
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(endpoint: &str) -> EncoderConfig {
        EncoderConfig {
            provider: "ollama".to_string(),
            model: "all-minilm".to_string(),
            dimensions: 384,
            endpoint: endpoint.to_string(),
            timeout_secs: 2,
            batch_size: 16,
        }
    }

    #[test]
    fn test_url_join() {
        let encoder = OllamaEncoder::new(&test_config("http://localhost:11434/")).unwrap();
        assert_eq!(encoder.url, "http://localhost:11434/api/embed");
    }

    #[test]
    fn test_check_shape() {
        assert!(check_shape(&[vec![0.0; 4], vec![0.0; 4]], 2, 4).is_ok());

        let err = check_shape(&[vec![0.0; 4]], 2, 4).unwrap_err();
        assert!(matches!(err, AppError::Encoding(_)));

        let err = check_shape(&[vec![0.0; 3]], 1, 4).unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_encoding_error() {
        // Port 9 (discard) is not an HTTP server
        let encoder = OllamaEncoder::new(&test_config("http://127.0.0.1:9")).unwrap();
        let result = encoder.encode(&["hello".to_string()]).await;
        assert!(matches!(result, Err(AppError::Encoding(_))));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let encoder = OllamaEncoder::new(&test_config("http://127.0.0.1:9")).unwrap();
        let embeddings = encoder.encode(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[tokio::test]
    async fn test_live_server() {
        let endpoint = match std::env::var("OLLAMA_URL") {
            Ok(url) => url,
            Err(_) => {
                println!("Skipping test: OLLAMA_URL not set");
                return;
            }
        };

        let encoder = OllamaEncoder::new(&test_config(&endpoint)).unwrap();
        let texts = vec!["First text".to_string(), "Second text".to_string()];
        let embeddings = encoder.encode(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert!(embeddings[0].iter().any(|&x| x != 0.0));
    }
}
