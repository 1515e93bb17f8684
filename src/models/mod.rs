mod config;
mod document;
mod ingest;
mod search;

pub use config::{
    ChunkingConfig, CompletionConfig, Config, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_COMPLETION_MODEL, DEFAULT_COMPLETION_URL, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_TOP_K, EmbeddingConfig, EmbeddingProvider, LoggingConfig,
    RetrievalConfig, Secrets, ServerConfig, StorageConfig, VectorDriver, VectorStoreConfig,
};
pub use document::{Document, DocumentChunk, DocumentMetadata, DocumentRecord, NewDocument};
pub use ingest::{FileFailure, IngestOutcome, IngestReport, IngestStage};
pub use search::{Answer, AnswerKind, OutputFormat, QueryStage, RetrievedChunk, SourceRef};
