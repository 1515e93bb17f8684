//! Embedded, file-backed vector store.
//!
//! Vectors are stored as little-endian `f32` blobs and searched by brute
//! force, which is plenty for a personal document collection.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use super::{AddOutcome, VectorStore, check_dimension, cosine_distance};
use crate::error::VectorStoreError;
use crate::models::{DocumentChunk, DocumentRecord, NewDocument, RetrievedChunk, VectorDriver};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL UNIQUE,
    checksum TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS document_chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chunk_id TEXT NOT NULL UNIQUE,
    document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    chunk_index INTEGER NOT NULL,
    page INTEGER,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS document_chunks_document_idx ON document_chunks (document_id);
"#;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    dimension: usize,
}

impl SqliteStore {
    /// Open or create the store at `path`.
    ///
    /// A file that cannot be opened or fails the integrity check is deleted
    /// and recreated empty.
    pub fn open(path: &Path, dimension: usize) -> Result<Self, VectorStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                VectorStoreError::ConnectionError(format!("{}: {}", parent.display(), e))
            })?;
        }

        let conn = match open_checked(path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "vector index is unreadable, recreating it"
                );
                remove_store_files(path)?;
                open_checked(path)?
            }
        };

        conn.execute_batch(SCHEMA)
            .map_err(|e| VectorStoreError::SchemaError(e.to_string()))?;
        check_stored_dimension(&conn, dimension)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimension,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T, VectorStoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, VectorStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| VectorStoreError::ConnectionError("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| VectorStoreError::ConnectionError(format!("store task failed: {}", e)))?
    }
}

fn open_checked(path: &Path) -> Result<Connection, VectorStoreError> {
    let conn = Connection::open(path)?;
    let status: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    if status != "ok" {
        return Err(VectorStoreError::SchemaError(format!(
            "integrity check failed: {}",
            status
        )));
    }
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

fn remove_store_files(path: &Path) -> Result<(), VectorStoreError> {
    let journal = PathBuf::from(format!("{}-journal", path.display()));
    for file in [path, journal.as_path()] {
        match std::fs::remove_file(file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(VectorStoreError::ConnectionError(format!(
                    "failed to remove {}: {}",
                    file.display(),
                    e
                )));
            }
        }
    }
    Ok(())
}

/// Record the dimension on first use and refuse to reopen with another one.
fn check_stored_dimension(conn: &Connection, dimension: usize) -> Result<(), VectorStoreError> {
    let stored: Option<String> = conn
        .query_row("SELECT value FROM meta WHERE key = 'dimension'", [], |row| {
            row.get(0)
        })
        .optional()?;

    match stored {
        Some(value) => {
            let expected: usize = value
                .parse()
                .map_err(|_| VectorStoreError::SchemaError(format!("bad stored dimension: {}", value)))?;
            if expected != dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    actual: dimension,
                });
            }
        }
        None => {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES ('dimension', ?1)",
                params![dimension.to_string()],
            )?;
        }
    }
    Ok(())
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(true)
        })
        .await
    }

    async fn document_count(&self) -> Result<u64, VectorStoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn chunk_count(&self) -> Result<u64, VectorStoreError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM document_chunks", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn contains_document(&self, filename: &str) -> Result<bool, VectorStoreError> {
        let filename = filename.to_string();
        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT id FROM documents WHERE filename = ?1",
                    params![filename],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn add(
        &self,
        document: NewDocument,
        chunks: Vec<DocumentChunk>,
    ) -> Result<AddOutcome, VectorStoreError> {
        for chunk in &chunks {
            check_dimension(&chunk.dense_vector, self.dimension)?;
        }

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM documents WHERE filename = ?1",
                    params![document.filename],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Ok(AddOutcome::AlreadyPresent);
            }

            tx.execute(
                "INSERT INTO documents (filename, checksum, created_at) VALUES (?1, ?2, ?3)",
                params![
                    document.filename,
                    document.checksum,
                    chrono::Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| VectorStoreError::InsertError(e.to_string()))?;
            let document_id = tx.last_insert_rowid();

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO document_chunks (chunk_id, document_id, chunk_index, page, content, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for chunk in &chunks {
                    stmt.execute(params![
                        chunk.id,
                        document_id,
                        chunk.chunk_index,
                        chunk.page,
                        chunk.content,
                        encode_vector(&chunk.dense_vector),
                    ])
                    .map_err(|e| VectorStoreError::InsertError(e.to_string()))?;
                }
            }

            tx.commit()?;
            Ok(AddOutcome::Inserted {
                document_id,
                chunks: chunks.len(),
            })
        })
        .await
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        check_dimension(vector, self.dimension)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = vector.to_vec();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.chunk_id, c.content, d.filename, c.page, c.embedding
                 FROM document_chunks c
                 JOIN documents d ON d.id = c.document_id
                 ORDER BY c.id",
            )?;

            let rows = stmt.query_map([], |row| {
                let embedding: Vec<u8> = row.get(4)?;
                Ok(RetrievedChunk {
                    chunk_id: row.get(0)?,
                    content: row.get(1)?,
                    filename: row.get(2)?,
                    page: row.get(3)?,
                    distance: cosine_distance(&query, &decode_vector(&embedding)),
                })
            })?;

            let mut results = rows
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

            // Stable sort keeps storage order for equal distances
            results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
            results.truncate(k);
            Ok(results)
        })
        .await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, VectorStoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.id, d.filename, d.checksum, d.created_at, COUNT(c.id)
                 FROM documents d
                 LEFT JOIN document_chunks c ON c.document_id = d.id
                 GROUP BY d.id
                 ORDER BY d.id",
            )?;
            let records = stmt
                .query_map([], |row| {
                    Ok(DocumentRecord {
                        id: row.get(0)?,
                        filename: row.get(1)?,
                        checksum: row.get(2)?,
                        created_at: row.get(3)?,
                        chunk_count: row.get::<_, i64>(4)? as u64,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Sqlite
    }
}
