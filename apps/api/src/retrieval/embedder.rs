//! Embedder — maps text to fixed-dimension vectors through an external provider.
//!
//! `EmbeddingProvider` is the seam: `OpenAiEmbedder` talks to an OpenAI-compatible
//! `/embeddings` endpoint, tests plug in deterministic stubs. `Embedder` wraps any provider
//! with batching, a per-call timeout and shape checks. Errors are never swallowed here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding provider error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("embedding provider timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("embedding provider returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding provider returned an empty vector")]
    EmptyVector,

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl EmbeddingError {
    pub fn is_timeout(&self) -> bool {
        match self {
            EmbeddingError::Timeout { .. } => true,
            EmbeddingError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// `text -> vector`. Must be deterministic for a fixed model version and input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds every input, returning vectors in input order.
    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn provider_name(&self) -> &str;
}

/// Provider wrapper used by the rest of the crate.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
    batch_size: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration, batch_size: usize) -> Self {
        Self {
            provider,
            timeout,
            batch_size: batch_size.max(1),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            got: 0,
        })
    }

    /// Embeds `inputs` in provider batches. All returned vectors share one dimension.
    pub async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out: Vec<Vec<f32>> = Vec::with_capacity(inputs.len());

        for batch in inputs.chunks(self.batch_size) {
            let vectors = tokio::time::timeout(self.timeout, self.provider.embed_batch(batch))
                .await
                .map_err(|_| EmbeddingError::Timeout {
                    after: self.timeout,
                })??;

            if vectors.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    got: vectors.len(),
                });
            }

            for vector in vectors {
                if vector.is_empty() {
                    return Err(EmbeddingError::EmptyVector);
                }
                if let Some(first) = out.first() {
                    if first.len() != vector.len() {
                        return Err(EmbeddingError::DimensionMismatch {
                            expected: first.len(),
                            got: vector.len(),
                        });
                    }
                }
                out.push(vector);
            }
        }

        debug!(
            "Embedded {} inputs via {}",
            inputs.len(),
            self.provider.provider_name()
        );
        Ok(out)
    }
}

/// Embeddings client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing embedding API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build embedding HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.trim())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        parsed.data.sort_by_key(|entry| entry.index);
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn provider_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        dim: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(inputs
                .iter()
                .map(|t| vec![t.len() as f32; self.dim])
                .collect())
        }

        fn provider_name(&self) -> &str {
            "counting"
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(inputs.iter().map(|_| vec![1.0]).collect())
        }

        fn provider_name(&self) -> &str {
            "slow"
        }
    }

    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        async fn embed_batch(&self, _inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(vec![vec![1.0, 2.0]])
        }

        fn provider_name(&self) -> &str {
            "short"
        }
    }

    #[tokio::test]
    async fn test_embed_batch_splits_into_provider_batches() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            dim: 4,
        });
        let embedder = Embedder::new(provider.clone(), Duration::from_secs(5), 2);
        let vectors = embedder
            .embed_batch(&["a", "bb", "ccc", "dddd", "eeeee"])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 5);
        assert_eq!(vectors[2], vec![3.0; 4]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinct_error() {
        let embedder = Embedder::new(Arc::new(SlowProvider), Duration::from_secs(1), 8);
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, EmbeddingError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_count_mismatch_detected() {
        let embedder = Embedder::new(Arc::new(ShortProvider), Duration::from_secs(1), 8);
        let err = embedder.embed_batch(&["a", "b"]).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::CountMismatch {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn test_embedding_response_is_reordered_by_index() {
        let json = r#"{"data": [
            {"embedding": [0.2], "index": 1},
            {"embedding": [0.1], "index": 0}
        ]}"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        parsed.data.sort_by_key(|e| e.index);
        assert_eq!(parsed.data[0].embedding, vec![0.1]);
    }
}
