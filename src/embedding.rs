//! Embedding provider client.
//!
//! Defines the [`Embedder`] trait and the [`HttpEmbedder`] implementation,
//! which calls an external model-serving API (`POST {base}/embeddings` with
//! `{model, prompt}`) and validates the returned vector's dimensionality.
//!
//! No retries are attempted here: an embedding failure surfaces immediately
//! to the caller.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Trait for embedding backends.
///
/// Kept as an object-safe seam so the importer and search merger can be
/// exercised against a scripted embedder in tests.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;

    /// Embed a single text. The returned vector always has exactly
    /// [`dims`](Embedder::dims) elements.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedding client for an HTTP model-serving endpoint.
pub struct HttpEmbedder {
    url: String,
    model: String,
    dims: usize,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dims,
            client,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "embedding",
                status: status.as_u16(),
                message: body_text,
            });
        }

        let json: serde_json::Value = response.json().await?;
        let vector = parse_embedding(&json)?;
        check_dims(self.dims, &vector)?;
        Ok(vector)
    }
}

/// Extract the `embedding` array from a provider response.
fn parse_embedding(json: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::Provider {
            provider: "embedding",
            status: 200,
            message: "response is missing the embedding array".to_string(),
        })?;

    Ok(values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

fn check_dims(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedding() {
        let json = serde_json::json!({"embedding": [0.25, -1.5, 3.0]});
        let vec = parse_embedding(&json).unwrap();
        assert_eq!(vec, vec![0.25f32, -1.5, 3.0]);
    }

    #[test]
    fn test_parse_missing_embedding() {
        let json = serde_json::json!({"data": []});
        let err = parse_embedding(&json).unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }

    #[test]
    fn test_dims_match() {
        assert!(check_dims(3, &[1.0, 2.0, 3.0]).is_ok());
    }

    #[test]
    fn test_dims_mismatch() {
        let err = check_dims(4, &[1.0, 2.0, 3.0]).unwrap_err();
        match err {
            Error::DimensionMismatch { expected, actual } => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
