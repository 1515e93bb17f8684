mod chunker;
mod completion;
pub mod embedding;
mod ingest;
mod prompt;
mod query;
mod upload;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::TextChunker;
pub use completion::{ChatCompletion, CompletionClient};
pub use embedding::{Embedder, LocalEmbedder, RemoteEmbedder, create_embedder};
pub use ingest::IngestionPipeline;
pub use prompt::{NO_DOCUMENTS_ANSWER, NO_RELEVANT_ANSWER, build_context, build_prompt};
pub use query::QueryPipeline;
pub use upload::{UploadOutcome, save_upload};
pub use vector_store::{AddOutcome, PgVectorStore, SqliteStore, VectorStore, create_store};
