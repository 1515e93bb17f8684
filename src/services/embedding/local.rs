//! In-process ONNX sentence embedding model.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::{Axis, Ix2};
use ort::session::{Session, SessionInputValue, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams, TruncationStrategy};

use super::{Embedder, check_dimension, l2_normalize, mean_pool};
use crate::error::{EmbeddingError, ModelError};
use crate::models::EmbeddingConfig;

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    uses_token_type_ids: bool,
    dimension: usize,
}

/// Sentence-transformers model exported to ONNX, run on a blocking thread.
///
/// `model_dir` must contain `model.onnx` and `tokenizer.json`.
#[derive(Clone)]
pub struct LocalEmbedder {
    model: Arc<OnnxModel>,
    model_id: String,
    batch_size: usize,
}

impl LocalEmbedder {
    pub fn load(config: &EmbeddingConfig, model_dir: &Path) -> Result<Self, ModelError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(ModelError::NotFound(model_path.display().to_string()));
        }
        if !tokenizer_path.exists() {
            return Err(ModelError::NotFound(tokenizer_path.display().to_string()));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .with_intra_threads(num_cpus())
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?;

        let uses_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        // Truncate long chunks to the model's window
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_tokens as usize,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(
            model = %config.model_id,
            path = %model_dir.display(),
            "loaded local embedding model"
        );

        Ok(Self {
            model: Arc::new(OnnxModel {
                session: Mutex::new(session),
                tokenizer,
                uses_token_type_ids,
                dimension: config.dimension as usize,
            }),
            model_id: config.model_id.clone(),
            batch_size: (config.batch_size as usize).max(1),
        })
    }

    async fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let model = Arc::clone(&self.model);
        let vectors = tokio::task::spawn_blocking(move || model.embed(texts))
            .await
            .map_err(|e| ModelError::InferenceError(format!("embedding task failed: {}", e)))??;
        Ok(vectors)
    }
}

impl OnnxModel {
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let batch_size = encodings.len();

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();
            for j in 0..ids.len() {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                token_type_ids[i * max_len + j] = types[j] as i64;
            }
        }

        let masks: Vec<Vec<i64>> = attention_mask
            .chunks(max_len.max(1))
            .map(|row| row.to_vec())
            .collect();

        let input_ids_tensor = Tensor::from_array(([batch_size, max_len], input_ids))
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;
        let attention_mask_tensor = Tensor::from_array(([batch_size, max_len], attention_mask))
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        let mut inputs = ort::inputs![
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
        ];
        if self.uses_token_type_ids {
            let token_type_tensor = Tensor::from_array(([batch_size, max_len], token_type_ids))
                .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;
            inputs.push((
                "token_type_ids".into(),
                SessionInputValue::from(token_type_tensor),
            ));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::InferenceError("session lock poisoned".to_string()))?;

        let outputs = session
            .run(inputs)
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        let output_array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        let embeddings: Vec<Vec<f32>> = match output_array.ndim() {
            // [batch, seq, hidden]: token embeddings
            3 => (0..batch_size)
                .map(|i| {
                    let tokens = output_array
                        .index_axis(Axis(0), i)
                        .into_dimensionality::<Ix2>()
                        .map_err(|e| ModelError::InferenceError(e.to_string()))?;
                    Ok(l2_normalize(mean_pool(tokens, &masks[i])))
                })
                .collect::<Result<_, ModelError>>()?,
            // [batch, hidden]: already pooled
            2 => (0..batch_size)
                .map(|i| l2_normalize(output_array.index_axis(Axis(0), i).iter().copied().collect()))
                .collect(),
            _ => {
                return Err(ModelError::InferenceError(format!(
                    "unexpected output shape: {:?}",
                    output_array.shape()
                )));
            }
        };

        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embed_blocking(batch.to_vec()).await?;
            for v in &vectors {
                check_dimension(v, self.model.dimension)?;
            }
            all_embeddings.extend(vectors);
        }
        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self
            .embed_blocking(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding output".to_string()))?;
        check_dimension(&vector, self.model.dimension)?;
        Ok(vector)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.model.dimension
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
