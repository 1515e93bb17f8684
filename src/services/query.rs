//! Question answering over the vector store.

use std::sync::Arc;

use super::completion::ChatCompletion;
use super::embedding::Embedder;
use super::prompt::{NO_DOCUMENTS_ANSWER, NO_RELEVANT_ANSWER, build_context, build_prompt};
use super::vector_store::VectorStore;
use crate::error::QueryError;
use crate::models::{Answer, AnswerKind, QueryStage, RetrievalConfig};

pub struct QueryPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    completion: Arc<dyn ChatCompletion>,
    top_k: usize,
    min_score: Option<f32>,
}

impl QueryPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        completion: Arc<dyn ChatCompletion>,
        retrieval: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            completion,
            top_k: retrieval.top_k as usize,
            min_score: retrieval.min_score,
        }
    }

    /// Answer `question` from the stored documents.
    ///
    /// An empty store or an empty search result yields a canned answer
    /// without calling the completion provider.
    pub async fn ask(&self, question: &str) -> Result<Answer, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::InvalidQuestion(
                "question must not be empty".to_string(),
            ));
        }

        if self.store.chunk_count().await? == 0 {
            tracing::info!("store is empty");
            return Ok(Answer::canned(NO_DOCUMENTS_ANSWER, AnswerKind::NoDocuments));
        }

        enter(QueryStage::EmbeddingQuery);
        let vector = self.embedder.embed_query(question).await?;

        enter(QueryStage::Searching);
        let mut results = self.store.query(&vector, self.top_k).await?;
        if let Some(min_score) = self.min_score {
            results.retain(|r| r.score() >= min_score);
        }
        tracing::debug!(results = results.len(), "search finished");
        if results.is_empty() {
            enter(QueryStage::Idle);
            return Ok(Answer::canned(NO_RELEVANT_ANSWER, AnswerKind::NoRelevant));
        }

        enter(QueryStage::AssemblingPrompt);
        let context = build_context(&results);
        let prompt = build_prompt(&context, question);

        enter(QueryStage::Completing);
        let answer = self.completion.complete(&prompt).await?;

        enter(QueryStage::Idle);
        Ok(Answer::generated(answer, &results))
    }
}

fn enter(stage: QueryStage) {
    tracing::debug!(stage = %stage, "query stage");
}
