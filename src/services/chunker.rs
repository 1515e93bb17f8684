//! Text chunking with overlap for embedding.

use crate::models::{ChunkingConfig, Document, DocumentChunk};
use crate::utils::has_content;

/// Text chunker that splits documents into overlapping chunks.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk length in characters
    chunk_size: usize,
    /// Characters repeated at the start of the following chunk
    overlap: usize,
}

impl TextChunker {
    /// Create a new text chunker with the given configuration.
    pub fn new(config: &ChunkingConfig) -> Self {
        let chunk_size = (config.chunk_size as usize).max(1);
        let overlap = (config.chunk_overlap as usize).min(chunk_size - 1);
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Create a chunker with default settings.
    pub fn with_defaults() -> Self {
        Self::new(&ChunkingConfig::default())
    }

    /// Chunk every document, keeping document order.
    pub fn chunk_all(&self, documents: &[Document]) -> Vec<DocumentChunk> {
        documents.iter().flat_map(|doc| self.chunk(doc)).collect()
    }

    /// Chunk a document into overlapping segments.
    pub fn chunk(&self, document: &Document) -> Vec<DocumentChunk> {
        self.split_with_overlap(&document.content)
            .into_iter()
            .filter(|(content, _, _)| has_content(content))
            .enumerate()
            .map(|(idx, (content, start_offset, end_offset))| {
                DocumentChunk::from_document(
                    document,
                    content,
                    idx as u32,
                    start_offset as u64,
                    end_offset as u64,
                )
            })
            .collect()
    }

    /// Split content into overlapping windows with character offsets.
    ///
    /// Windows are contiguous or overlapping, so every character lands in at
    /// least one of them.
    fn split_with_overlap(&self, content: &str) -> Vec<(String, usize, usize)> {
        let chars: Vec<char> = content.chars().collect();
        let total_chars = chars.len();
        let mut chunks = Vec::new();

        if total_chars == 0 {
            return chunks;
        }

        let mut start = 0;
        loop {
            let target_end = (start + self.chunk_size).min(total_chars);
            let end = self.find_break_point(&chars, start, target_end, total_chars);

            chunks.push((chars[start..end].iter().collect(), start, end));

            if end >= total_chars {
                break;
            }
            start = self.next_start(&chars, start, end);
        }

        chunks
    }

    /// Find a natural break point near the target end position.
    fn find_break_point(
        &self,
        chars: &[char],
        start: usize,
        target_end: usize,
        total: usize,
    ) -> usize {
        if target_end >= total {
            return total;
        }

        // Look for a natural break point within the last 20% of the window
        let search_start = target_end
            .saturating_sub(self.chunk_size / 5)
            .max(start + 1);
        if search_start >= target_end {
            return target_end;
        }
        let search_range = &chars[search_start..target_end];

        // Priority: double newline > single newline > sentence end > space
        let mut best_break = None;
        let mut last_newline = None;
        let mut last_sentence = None;
        let mut last_space = None;

        for (i, c) in search_range.iter().enumerate() {
            let pos = search_start + i;
            match c {
                '\n' => {
                    if i > 0 && search_range[i - 1] == '\n' {
                        best_break = Some(pos + 1);
                    }
                    last_newline = Some(pos + 1);
                }
                '.' | '!' | '?' => {
                    if chars.get(pos + 1).is_some_and(|c| c.is_whitespace()) {
                        last_sentence = Some(pos + 1);
                    }
                }
                ' ' | '\t' => {
                    last_space = Some(pos + 1);
                }
                _ => {}
            }
        }

        best_break
            .or(last_newline)
            .or(last_sentence)
            .or(last_space)
            .unwrap_or(target_end)
    }

    /// Start of the next window: `overlap` characters back from `end`,
    /// moved forward to a word start when one exists before `end`.
    fn next_start(&self, chars: &[char], start: usize, end: usize) -> usize {
        if self.overlap == 0 {
            return end;
        }

        let overlap_start = end.saturating_sub(self.overlap).max(start + 1);
        (overlap_start..end)
            .find(|&i| i > 0 && chars[i - 1].is_whitespace() && !chars[i].is_whitespace())
            .unwrap_or(overlap_start)
    }
}
