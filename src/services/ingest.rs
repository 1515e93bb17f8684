//! Upload directory ingestion: scan, load, split, embed, persist.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::chunker::TextChunker;
use super::embedding::Embedder;
use super::vector_store::{AddOutcome, VectorStore};
use crate::error::IngestError;
use crate::models::{
    Document, DocumentChunk, FileFailure, IngestOutcome, IngestReport, IngestStage, NewDocument,
};
use crate::sources::{LocalSource, load_documents};
use crate::utils::file_name_of;

/// A file whose chunks are ready to embed.
struct PendingFile {
    filename: String,
    checksum: String,
    chunks: Vec<DocumentChunk>,
}

pub struct IngestionPipeline {
    source: LocalSource,
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    /// One run at a time; uploads may trigger runs concurrently.
    run_lock: Mutex<()>,
}

impl IngestionPipeline {
    pub fn new(
        source: LocalSource,
        chunker: TextChunker,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            source,
            chunker,
            embedder,
            store,
            run_lock: Mutex::new(()),
        }
    }

    /// Ingest every file in the upload directory that is not registered yet.
    ///
    /// Files that fail to load are reported and skipped. Embedding and store
    /// failures abort the run without writing the affected files.
    pub async fn run(&self) -> Result<IngestOutcome, IngestError> {
        let _guard = self.run_lock.lock().await;
        let mut report = IngestReport::default();

        enter(IngestStage::Scanning);
        let files = self.source.collect_files()?;
        let mut fresh: Vec<(PathBuf, String)> = Vec::new();
        for path in &files {
            let filename = file_name_of(path);
            if self.store.contains_document(&filename).await? {
                report.skipped.push(filename);
            } else {
                fresh.push((path.clone(), filename));
            }
        }
        if fresh.is_empty() {
            let reason = if files.is_empty() {
                format!("no files found in {}", self.source.root().display())
            } else {
                "all files are already ingested".to_string()
            };
            return Ok(nothing_to_ingest(IngestStage::Scanning, reason, report));
        }

        enter(IngestStage::Loading);
        let mut loaded: Vec<(String, Vec<Document>)> = Vec::new();
        for (path, filename) in fresh {
            match load_documents(&path) {
                Ok(documents) => {
                    tracing::debug!(file = %filename, documents = documents.len(), "loaded file");
                    report.documents += documents.len();
                    loaded.push((filename, documents));
                }
                Err(e) => {
                    tracing::warn!(file = %filename, error = %e, "failed to load file");
                    report.failures.push(FileFailure {
                        filename,
                        error: e.to_string(),
                    });
                }
            }
        }
        if loaded.is_empty() {
            return Ok(nothing_to_ingest(
                IngestStage::Loading,
                "no file could be loaded".to_string(),
                report,
            ));
        }

        enter(IngestStage::Splitting);
        let mut pending: Vec<PendingFile> = Vec::new();
        for (filename, documents) in loaded {
            let chunks = self.chunker.chunk_all(&documents);
            match documents.first() {
                Some(first) if !chunks.is_empty() => pending.push(PendingFile {
                    checksum: first.metadata.checksum.clone(),
                    filename,
                    chunks,
                }),
                _ => {
                    tracing::warn!(file = %filename, "no extractable text");
                    report.failures.push(FileFailure {
                        filename,
                        error: "no extractable text".to_string(),
                    });
                }
            }
        }
        if pending.is_empty() {
            return Ok(nothing_to_ingest(
                IngestStage::Splitting,
                "no text found in the loaded files".to_string(),
                report,
            ));
        }

        enter(IngestStage::Embedding);
        let texts: Vec<String> = pending
            .iter()
            .flat_map(|file| file.chunks.iter().map(|c| c.content.clone()))
            .collect();
        let expected = texts.len();
        let vectors = self.embedder.embed_documents(texts).await?;
        if vectors.len() != expected {
            return Err(IngestError::VectorCountMismatch {
                expected,
                actual: vectors.len(),
            });
        }
        let mut vectors = vectors.into_iter();
        for file in &mut pending {
            for (chunk, vector) in file.chunks.iter_mut().zip(vectors.by_ref()) {
                chunk.dense_vector = vector;
            }
        }

        enter(IngestStage::Persisting);
        for file in pending {
            let document = NewDocument {
                filename: file.filename.clone(),
                checksum: file.checksum,
            };
            match self.store.add(document, file.chunks).await? {
                AddOutcome::Inserted { chunks, .. } => {
                    tracing::info!(file = %file.filename, chunks, "stored document");
                    report.chunks += chunks;
                    report.ingested.push(file.filename);
                }
                AddOutcome::AlreadyPresent => {
                    report.skipped.push(file.filename);
                }
            }
        }

        enter(IngestStage::Idle);
        Ok(IngestOutcome::Ingested { report })
    }
}

fn enter(stage: IngestStage) {
    tracing::info!(stage = %stage, "ingest stage");
}

fn nothing_to_ingest(stage: IngestStage, reason: String, report: IngestReport) -> IngestOutcome {
    tracing::info!(stage = %stage, reason = %reason, "nothing to ingest");
    enter(IngestStage::Idle);
    IngestOutcome::NothingToIngest {
        stage,
        reason,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::services::testing::{FAKE_DIMENSION, FailingEmbedder, FakeEmbedder};
    use crate::services::vector_store::SqliteStore;
    use std::path::Path;

    fn pipeline(
        upload_dir: &Path,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> IngestionPipeline {
        let source = LocalSource::new(
            upload_dir.to_path_buf(),
            &["pdf".to_string(), "txt".to_string()],
        );
        IngestionPipeline::new(source, TextChunker::with_defaults(), embedder, store)
    }

    fn store_in(dir: &Path) -> Arc<dyn VectorStore> {
        Arc::new(SqliteStore::open(&dir.join("index.sqlite3"), FAKE_DIMENSION).unwrap())
    }

    #[tokio::test]
    async fn test_missing_upload_dir_is_nothing_to_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let ingest = pipeline(
            &dir.path().join("uploads"),
            store.clone(),
            Arc::new(FakeEmbedder::default()),
        );

        let outcome = ingest.run().await.unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::NothingToIngest {
                stage: IngestStage::Scanning,
                ..
            }
        ));
        assert_eq!(store.chunk_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingests_text_and_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir(&uploads).unwrap();
        std::fs::write(uploads.join("sky.txt"), "The sky is blue.").unwrap();
        crate::sources::pdf_tests::write_pdf(&uploads.join("grass.pdf"), &["Grass is green", "Snow is white"]);

        let store = store_in(dir.path());
        let ingest = pipeline(&uploads, store.clone(), Arc::new(FakeEmbedder::default()));

        let outcome = ingest.run().await.unwrap();
        let IngestOutcome::Ingested { report } = outcome else {
            panic!("expected ingested outcome");
        };
        assert_eq!(report.ingested, vec!["grass.pdf", "sky.txt"]);
        assert_eq!(report.documents, 3);
        assert_eq!(report.chunks, 3);
        assert!(!report.is_partial());
        assert_eq!(store.document_count().await.unwrap(), 2);
        assert_eq!(store.chunk_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_second_run_skips_registered_files() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir(&uploads).unwrap();
        std::fs::write(uploads.join("sky.txt"), "The sky is blue.").unwrap();

        let store = store_in(dir.path());
        let ingest = pipeline(&uploads, store.clone(), Arc::new(FakeEmbedder::default()));
        ingest.run().await.unwrap();

        let outcome = ingest.run().await.unwrap();
        match outcome {
            IngestOutcome::NothingToIngest { stage, report, .. } => {
                assert_eq!(stage, IngestStage::Scanning);
                assert_eq!(report.skipped, vec!["sky.txt"]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(store.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bad_file_is_reported_and_others_ingested() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir(&uploads).unwrap();
        std::fs::write(uploads.join("broken.pdf"), b"not a pdf").unwrap();
        std::fs::write(uploads.join("empty.txt"), "   \n").unwrap();
        std::fs::write(uploads.join("sky.txt"), "The sky is blue.").unwrap();

        let store = store_in(dir.path());
        let ingest = pipeline(&uploads, store.clone(), Arc::new(FakeEmbedder::default()));

        let IngestOutcome::Ingested { report } = ingest.run().await.unwrap() else {
            panic!("expected ingested outcome");
        };
        assert_eq!(report.ingested, vec!["sky.txt"]);
        let failed: Vec<&str> = report.failures.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(failed, vec!["broken.pdf", "empty.txt"]);
        assert!(report.is_partial());
        assert!(!store.contains_document("broken.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_only_unloadable_files_stop_at_loading() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir(&uploads).unwrap();
        std::fs::write(uploads.join("broken.pdf"), b"not a pdf").unwrap();

        let ingest = pipeline(
            &uploads,
            store_in(dir.path()),
            Arc::new(FakeEmbedder::default()),
        );
        let outcome = ingest.run().await.unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::NothingToIngest {
                stage: IngestStage::Loading,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_embedding_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir(&uploads).unwrap();
        std::fs::write(uploads.join("sky.txt"), "The sky is blue.").unwrap();

        let store = store_in(dir.path());
        let ingest = pipeline(&uploads, store.clone(), Arc::new(FailingEmbedder));

        let result = ingest.run().await;
        assert!(matches!(
            result,
            Err(IngestError::Embedding(EmbeddingError::Status { status: 503, .. }))
        ));
        assert_eq!(store.document_count().await.unwrap(), 0);
    }
}
