//! Vector store abstraction layer.
//!
//! Chunks and their embeddings live next to a registry of ingested files.
//! The embedded SQLite backend needs no setup; PostgreSQL with pgvector is
//! selected through `vector_store.driver`.

mod pgvector;
mod sqlite;

pub use pgvector::PgVectorStore;
pub use sqlite::SqliteStore;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{
    DocumentChunk, DocumentRecord, NewDocument, RetrievedChunk, Secrets, VectorDriver,
    VectorStoreConfig,
};

/// Result of [`VectorStore::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted { document_id: i64, chunks: usize },
    /// A document with the same filename is already registered; nothing was written.
    AlreadyPresent,
}

/// Abstract trait for vector store operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is healthy and accessible.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    async fn document_count(&self) -> Result<u64, VectorStoreError>;

    async fn chunk_count(&self) -> Result<u64, VectorStoreError>;

    async fn contains_document(&self, filename: &str) -> Result<bool, VectorStoreError>;

    /// Register a document and append its embedded chunks in one transaction.
    async fn add(
        &self,
        document: NewDocument,
        chunks: Vec<DocumentChunk>,
    ) -> Result<AddOutcome, VectorStoreError>;

    /// Up to `k` chunks nearest to `vector` by cosine distance, closest first.
    /// Equal distances keep storage order.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, VectorStoreError>;

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, VectorStoreError>;

    fn driver(&self) -> VectorDriver;
}

/// Create the configured vector store backend.
///
/// `sqlite_path` is only used by the embedded backend.
pub async fn create_store(
    config: &VectorStoreConfig,
    sqlite_path: &Path,
    dimension: usize,
    secrets: &Secrets,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Sqlite => {
            let store = SqliteStore::open(sqlite_path, dimension)?;
            Ok(Arc::new(store))
        }
        VectorDriver::Postgres => {
            let url = secrets.database_url.as_deref().ok_or_else(|| {
                VectorStoreError::ConnectionError(format!(
                    "no database URL configured; set vector_store.url or {}",
                    config.url_env
                ))
            })?;
            let store = PgVectorStore::connect(config, url, dimension).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Cosine distance in `[0, 2]`; a zero vector is treated as orthogonal.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

pub(crate) fn check_dimension(vector: &[f32], expected: usize) -> Result<(), VectorStoreError> {
    if vector.len() != expected {
        return Err(VectorStoreError::DimensionMismatch {
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
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert!((cosine_distance(&[0.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_postgres_without_url_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectorStoreConfig {
            driver: VectorDriver::Postgres,
            ..Default::default()
        };
        let result = create_store(
            &config,
            &dir.path().join("index.sqlite3"),
            3,
            &Secrets::default(),
        )
        .await;
        assert!(matches!(result, Err(VectorStoreError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_create_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_store(
            &VectorStoreConfig::default(),
            &dir.path().join("index.sqlite3"),
            3,
            &Secrets::default(),
        )
        .await
        .unwrap();
        assert_eq!(store.driver(), VectorDriver::Sqlite);
        assert!(store.health_check().await.unwrap());
    }
}
