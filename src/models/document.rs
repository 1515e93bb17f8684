use serde::{Deserialize, Serialize};

/// Text loaded from one file, or one page of a PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// File name within the upload directory; the registry key
    pub filename: String,
    pub path: String,
    /// 1-based page number for PDFs
    pub page: Option<u32>,
    /// SHA-256 of the source file bytes
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub content: String,
    pub chunk_index: u32,
    /// Character offsets into the owning document
    pub start_offset: u64,
    pub end_offset: u64,
    pub filename: String,
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dense_vector: Vec<f32>,
}

/// Registry entry written alongside a file's chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub filename: String,
    pub checksum: String,
}

/// Registry entry as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub filename: String,
    pub checksum: String,
    pub chunk_count: u64,
    pub created_at: String,
}

impl Document {
    pub fn new(content: String, metadata: DocumentMetadata) -> Self {
        Self { content, metadata }
    }
}

impl DocumentChunk {
    pub fn generate_id(filename: &str, page: Option<u32>, chunk_index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}:{}", filename, page.unwrap_or(0), chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn from_document(
        document: &Document,
        content: String,
        chunk_index: u32,
        start_offset: u64,
        end_offset: u64,
    ) -> Self {
        let metadata = &document.metadata;
        Self {
            id: Self::generate_id(&metadata.filename, metadata.page, chunk_index),
            content,
            chunk_index,
            start_offset,
            end_offset,
            filename: metadata.filename.clone(),
            page: metadata.page,
            dense_vector: Vec::new(),
        }
    }
}
