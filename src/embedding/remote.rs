//! Remote embedding provider speaking the OpenAI embeddings shape.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbeddingError, EmbeddingProvider};

/// HTTP embedding provider.
pub struct RemoteEmbedding {
    api_key: Option<String>,
    base_url: String,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl RemoteEmbedding {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url: base_url.into(),
            model: model.into(),
            dimensions,
            client,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/embeddings") {
            base.to_string()
        } else {
            format!("{base}/embeddings")
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for RemoteEmbedding {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(EmbeddingError::Request(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.chars().take(500).collect::<String>()
            )));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        // Responses may arrive out of order
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        if data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} vectors, got {}",
                texts.len(),
                data.len()
            )));
        }

        for item in &data {
            if item.embedding.len() != self.dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: item.embedding.len(),
                });
            }
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_resolution() {
        let provider =
            RemoteEmbedding::new("http://localhost:8080/v1/", None, "embedder", 384).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/embeddings");

        let provider =
            RemoteEmbedding::new("http://localhost:8080/v1/embeddings", None, "embedder", 384)
                .unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/embeddings");
    }

    #[test]
    fn test_dimensions() {
        let provider = RemoteEmbedding::new("http://localhost", None, "embedder", 384).unwrap();
        assert_eq!(provider.dimensions(), 384);
    }
}
