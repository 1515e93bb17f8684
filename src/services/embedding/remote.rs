//! Hosted feature-extraction endpoint.

use async_trait::async_trait;
use ndarray::Array2;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Embedder, check_dimension, l2_normalize, mean_pool};
use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;

#[derive(Debug, Serialize)]
struct FeatureRequest<'a> {
    inputs: &'a [String],
    options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

/// Endpoints answer with either one vector per input or one vector per token.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureResponse {
    Pooled(Vec<Vec<f32>>),
    Tokens(Vec<Vec<Vec<f32>>>),
}

/// Client for a Hugging Face style feature-extraction endpoint.
#[derive(Debug, Clone)]
pub struct RemoteEmbedder {
    client: Client,
    url: String,
    api_token: Option<String>,
    model_id: String,
    dimension: usize,
    batch_size: usize,
}

impl RemoteEmbedder {
    pub fn new(config: &EmbeddingConfig, api_token: Option<String>) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            api_token,
            model_id: config.model_id.clone(),
            dimension: config.dimension as usize,
            batch_size: (config.batch_size as usize).max(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = FeatureRequest {
            inputs: texts,
            options: RequestOptions {
                wait_for_model: true,
            },
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status { status, body });
        }

        let parsed: FeatureResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let vectors = match parsed {
            FeatureResponse::Pooled(vectors) => vectors,
            FeatureResponse::Tokens(per_input) => per_input
                .into_iter()
                .map(pool_tokens)
                .collect::<Result<Vec<_>, _>>()?,
        };

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        vectors
            .into_iter()
            .map(|v| {
                check_dimension(&v, self.dimension)?;
                Ok(l2_normalize(v))
            })
            .collect()
    }
}

/// Mean-pool per-token vectors; every token counts.
fn pool_tokens(tokens: Vec<Vec<f32>>) -> Result<Vec<f32>, EmbeddingError> {
    let rows = tokens.len();
    let cols = tokens.first().map(|t| t.len()).unwrap_or(0);
    let flat: Vec<f32> = tokens.into_iter().flatten().collect();
    let matrix = Array2::from_shape_vec((rows, cols), flat)
        .map_err(|e| EmbeddingError::InvalidResponse(format!("ragged token vectors: {}", e)))?;
    Ok(mean_pool(matrix.view(), &vec![1; rows]))
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            all_embeddings.extend(self.embed_batch(batch).await?);
        }
        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
