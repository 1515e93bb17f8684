//! Error types for the RAG service.

use thiserror::Error;

/// Errors related to configuration and startup secrets.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("missing environment variable: {0}")]
    MissingEnv(String),
}

/// Errors raised while scanning the upload directory.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("directory walk error: {0}")]
    WalkError(String),
}

/// Errors raised while loading a single file into documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8: {message}")]
    Decode { path: String, message: String },

    #[error("failed to parse PDF {path}: {message}")]
    Pdf { path: String, message: String },

    #[error("unsupported file type: {0}")]
    Unsupported(String),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("embedding server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding model error: {0}")]
    Model(#[from] ModelError),
}

/// Errors raised by the in-process ONNX embedding model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model not found: {0}")]
    NotFound(String),

    #[error("failed to load model: {0}")]
    LoadError(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("inference error: {0}")]
    InferenceError(String),
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("schema error: {0}")]
    SchemaError(String),

    #[error("insert error: {0}")]
    InsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("PostgreSQL error: {0}")]
    PostgresError(String),

    #[error("pgvector extension error: {0}")]
    PgVectorExtensionError(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors related to the chat completion provider.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("scan error: {0}")]
    Source(#[from] SourceError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("embedder returned {actual} vectors for {expected} chunks")]
    VectorCountMismatch { expected: usize, actual: usize },
}

/// Errors that abort a question.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid question: {0}")]
    InvalidQuestion(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),
}

/// Errors related to storing an uploaded file.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("file type not allowed: {0}")]
    NotAllowed(String),

    #[error("failed to write upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),

    #[error("upload error: {0}")]
    Upload(#[from] UploadError),
}
