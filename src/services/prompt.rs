//! Prompt assembly for grounded answers.

use crate::models::RetrievedChunk;

/// Answer returned when the store holds no documents.
pub const NO_DOCUMENTS_ANSWER: &str = "No documents uploaded yet. Please upload a PDF first.";

/// Answer returned when search finds nothing usable.
pub const NO_RELEVANT_ANSWER: &str = "No relevant information found in the uploaded documents.";

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Join chunk texts in retrieval order.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful assistant.\n\
         Answer the question using ONLY the context below.\n\
         If the answer is not in the context, say \"I don't know\".\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question:\n\
         {question}\n"
    )
}
