use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;

use super::{AddOutcome, VectorStore, check_dimension};
use crate::error::VectorStoreError;
use crate::models::{
    DocumentChunk, DocumentRecord, NewDocument, RetrievedChunk, VectorDriver, VectorStoreConfig,
};

pub struct PgVectorStore {
    pool: PgPool,
    dimension: usize,
}

impl PgVectorStore {
    pub async fn connect(
        config: &VectorStoreConfig,
        url: &str,
        dimension: usize,
    ) -> Result<Self, VectorStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect(url)
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool, dimension };

        store.check_pgvector_extension().await?;
        store.ensure_tables().await?;

        Ok(store)
    }

    async fn check_pgvector_extension(&self) -> Result<(), VectorStoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        if result.is_none() {
            return Err(VectorStoreError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    async fn ensure_tables(&self) -> Result<(), VectorStoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id BIGSERIAL PRIMARY KEY,
                filename TEXT NOT NULL UNIQUE,
                checksum TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#
            .to_string(),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS document_chunks (
                    id BIGSERIAL PRIMARY KEY,
                    chunk_id UUID NOT NULL UNIQUE,
                    document_id BIGINT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                    chunk_index INTEGER NOT NULL,
                    page INTEGER,
                    content TEXT NOT NULL,
                    embedding vector({}) NOT NULL
                )
                "#,
                self.dimension
            ),
            "CREATE INDEX IF NOT EXISTS document_chunks_embedding_idx ON document_chunks USING hnsw (embedding vector_cosine_ops)"
                .to_string(),
            "CREATE INDEX IF NOT EXISTS document_chunks_document_id_idx ON document_chunks (document_id)"
                .to_string(),
        ];

        for sql in &statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::SchemaError(e.to_string()))?;
        }

        Ok(())
    }

    async fn count(&self, table: &str) -> Result<u64, VectorStoreError> {
        let query = format!("SELECT COUNT(*) FROM {}", table);
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;
        Ok(row.0 as u64)
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn document_count(&self) -> Result<u64, VectorStoreError> {
        self.count("documents").await
    }

    async fn chunk_count(&self) -> Result<u64, VectorStoreError> {
        self.count("document_chunks").await
    }

    async fn contains_document(&self, filename: &str) -> Result<bool, VectorStoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM documents WHERE filename = $1")
            .bind(filename)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn add(
        &self,
        document: NewDocument,
        chunks: Vec<DocumentChunk>,
    ) -> Result<AddOutcome, VectorStoreError> {
        for chunk in &chunks {
            check_dimension(&chunk.dense_vector, self.dimension)?;
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::InsertError(e.to_string()))?;

        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO documents (filename, checksum, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (filename) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&document.filename)
        .bind(&document.checksum)
        .bind(chrono::Utc::now().to_rfc3339())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| VectorStoreError::InsertError(e.to_string()))?;

        // Dropping the transaction rolls it back
        let Some((document_id,)) = inserted else {
            return Ok(AddOutcome::AlreadyPresent);
        };

        for chunk in &chunks {
            let chunk_id = uuid::Uuid::parse_str(&chunk.id)
                .map_err(|e| VectorStoreError::InsertError(format!("Invalid UUID: {}", e)))?;

            sqlx::query(
                r#"
                INSERT INTO document_chunks (chunk_id, document_id, chunk_index, page, content, embedding)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(chunk_id)
            .bind(document_id)
            .bind(chunk.chunk_index as i32)
            .bind(chunk.page.map(|p| p as i32))
            .bind(&chunk.content)
            .bind(Vector::from(chunk.dense_vector.clone()))
            .execute(&mut *tx)
            .await
            .map_err(|e| VectorStoreError::InsertError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| VectorStoreError::InsertError(e.to_string()))?;

        Ok(AddOutcome::Inserted {
            document_id,
            chunks: chunks.len(),
        })
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        check_dimension(vector, self.dimension)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = Vector::from(vector.to_vec());

        let rows = sqlx::query(
            r#"
            SELECT
                c.chunk_id::text AS chunk_id,
                c.content,
                d.filename,
                c.page,
                (c.embedding <=> $1)::float8 AS distance
            FROM document_chunks c
            JOIN documents d ON d.id = c.document_id
            ORDER BY c.embedding <=> $1, c.id
            LIMIT $2
            "#,
        )
        .bind(&embedding)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        let results = rows
            .into_iter()
            .map(|row: PgRow| {
                let page: Option<i32> = row.get("page");
                let distance: f64 = row.get("distance");
                RetrievedChunk {
                    chunk_id: row.get("chunk_id"),
                    content: row.get("content"),
                    filename: row.get("filename"),
                    page: page.map(|p| p as u32),
                    distance: distance as f32,
                }
            })
            .collect();

        Ok(results)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, VectorStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.filename, d.checksum, d.created_at, COUNT(c.id) AS chunk_count
            FROM documents d
            LEFT JOIN document_chunks c ON c.document_id = d.id
            GROUP BY d.id
            ORDER BY d.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        let records = rows
            .into_iter()
            .map(|row: PgRow| {
                let chunk_count: i64 = row.get("chunk_count");
                DocumentRecord {
                    id: row.get("id"),
                    filename: row.get("filename"),
                    checksum: row.get("checksum"),
                    created_at: row.get("created_at"),
                    chunk_count: chunk_count as u64,
                }
            })
            .collect();

        Ok(records)
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Postgres
    }
}
