//! In-process doubles for pipeline tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::completion::ChatCompletion;
use super::embedding::{Embedder, l2_normalize};
use crate::error::{CompletionError, EmbeddingError};

pub(crate) const FAKE_DIMENSION: usize = 16;

/// Bag-of-words embedder: texts sharing words get close vectors.
#[derive(Default)]
pub(crate) struct FakeEmbedder {
    pub calls: AtomicUsize,
}

pub(crate) fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; FAKE_DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        vector[bucket % FAKE_DIMENSION] += 1.0;
    }
    l2_normalize(vector)
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(text))
    }

    fn model_id(&self) -> &str {
        "fake-bag-of-words"
    }

    fn dimension(&self) -> usize {
        FAKE_DIMENSION
    }
}

/// Embedder whose endpoint is always down.
pub(crate) struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_documents(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }

    fn model_id(&self) -> &str {
        "failing"
    }

    fn dimension(&self) -> usize {
        FAKE_DIMENSION
    }
}

/// Completion that records prompts and answers with a fixed reply.
pub(crate) struct RecordingCompletion {
    pub reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingCompletion {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for RecordingCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn model(&self) -> &str {
        "recording"
    }
}
