//! File utilities for uploads and ingestion.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Calculate SHA-256 checksum of raw bytes.
pub fn calculate_checksum(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    hex::encode(hash)
}

/// Lowercased extension of a path, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Final path component as a string.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Sanitize an uploaded filename.
///
/// Keeps only the last path component, then replaces characters that are not
/// allowed in filenames on common operating systems with hyphens.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect::<String>()
        .trim_matches(|c: char| c == '-' || c == '.' || c.is_whitespace())
        .to_string()
}
