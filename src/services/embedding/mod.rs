//! Text embedding providers.
//!
//! Both providers produce one L2-normalized vector per input, mean-pooled
//! over the attention mask when the model yields per-token outputs.

mod local;
mod remote;

pub use local::LocalEmbedder;
pub use remote::RemoteEmbedder;

use std::sync::Arc;

use async_trait::async_trait;
use ndarray::{Array1, ArrayView2};

use crate::error::EmbeddingError;
use crate::models::{EmbeddingConfig, EmbeddingProvider, Secrets};

/// Maps text to fixed-dimension vectors.
///
/// Documents and queries go through the same model so their vectors are
/// comparable.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed document chunks, one vector per input, in input order.
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;
}

/// Build the configured embedding provider.
pub fn create_embedder(
    config: &EmbeddingConfig,
    secrets: &Secrets,
) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match config.provider {
        EmbeddingProvider::Local => {
            let embedder = LocalEmbedder::load(config, &config.model_dir())?;
            Ok(Arc::new(embedder))
        }
        EmbeddingProvider::Remote => {
            let embedder = RemoteEmbedder::new(config, secrets.embedding_api_token.clone())?;
            Ok(Arc::new(embedder))
        }
    }
}

/// Average the token rows whose mask entry is set.
pub(crate) fn mean_pool(tokens: ArrayView2<'_, f32>, mask: &[i64]) -> Vec<f32> {
    let mut sum = Array1::<f32>::zeros(tokens.ncols());
    let mut count = 0usize;

    for (row, &m) in tokens.rows().into_iter().zip(mask) {
        if m > 0 {
            sum += &row;
            count += 1;
        }
    }

    if count > 0 {
        sum /= count as f32;
    }
    sum.to_vec()
}

pub(crate) fn l2_normalize(v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.into_iter().map(|x| x / norm).collect()
    } else {
        v
    }
}

pub(crate) fn check_dimension(vector: &[f32], expected: usize) -> Result<(), EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {}-dimensional vectors, got {}",
            expected,
            vector.len()
        )));
    }
    Ok(())
}
