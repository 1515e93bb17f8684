//! Upload directory scanning and plain-text loading.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{DocumentError, SourceError};
use crate::models::{Document, DocumentMetadata};
use crate::utils::file::{calculate_checksum, extension_of, file_name_of};

/// Flat directory of uploaded files.
#[derive(Debug, Clone)]
pub struct LocalSource {
    /// Directory to scan
    root: PathBuf,

    /// Lowercased extensions to keep, without the dot
    extensions: Vec<String>,
}

impl LocalSource {
    pub fn new(root: PathBuf, extensions: &[String]) -> Self {
        Self {
            root,
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collect matching regular files directly inside the root, sorted by path.
    ///
    /// A missing root yields no files.
    pub fn collect_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let entry = entry.map_err(|e| SourceError::WalkError(e.to_string()))?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if extension_of(path).is_some_and(|ext| self.extensions.contains(&ext)) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Load a UTF-8 text file as a single document.
pub fn load_text(path: &Path) -> Result<Document, DocumentError> {
    let bytes = std::fs::read(path).map_err(|source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let checksum = calculate_checksum(&bytes);

    let content = String::from_utf8(bytes).map_err(|e| DocumentError::Decode {
        path: path.display().to_string(),
        message: e.utf8_error().to_string(),
    })?;

    let metadata = DocumentMetadata {
        filename: file_name_of(path),
        path: path.to_string_lossy().to_string(),
        page: None,
        checksum,
    };

    Ok(Document::new(content, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extensions() -> Vec<String> {
        vec!["pdf".to_string(), "txt".to_string()]
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalSource::new(dir.path().join("absent"), &extensions());
        assert!(source.collect_files().unwrap().is_empty());
    }

    #[test]
    fn test_collect_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.PDF"), "a").unwrap();
        std::fs::write(dir.path().join("c.png"), "c").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("d.txt"), "d").unwrap();

        let source = LocalSource::new(dir.path().to_path_buf(), &extensions());
        let names: Vec<String> = source
            .collect_files()
            .unwrap()
            .iter()
            .map(|p| file_name_of(p))
            .collect();

        assert_eq!(names, vec!["a.PDF", "b.txt"]);
    }

    #[test]
    fn test_load_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "The sky is blue.").unwrap();

        let doc = load_text(&path).unwrap();
        assert_eq!(doc.content, "The sky is blue.");
        assert_eq!(doc.metadata.filename, "notes.txt");
        assert_eq!(doc.metadata.page, None);
        assert_eq!(doc.metadata.checksum.len(), 64);
    }

    #[test]
    fn test_load_text_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, [0x63, 0x61, 0x66, 0xe9]).unwrap();

        assert!(matches!(
            load_text(&path),
            Err(DocumentError::Decode { .. })
        ));
    }
}
