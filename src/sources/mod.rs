//! Document sources.
//!
//! Uploaded files are listed from a flat directory and turned into
//! [`Document`]s: one per text file, one per PDF page.

mod local;
mod pdf;

pub use local::{LocalSource, load_text};
pub use pdf::load_pdf;

#[cfg(test)]
pub(crate) use pdf::tests as pdf_tests;

use std::path::Path;

use crate::error::DocumentError;
use crate::models::Document;
use crate::utils::file::extension_of;

/// Load a scanned file into documents according to its extension.
pub fn load_documents(path: &Path) -> Result<Vec<Document>, DocumentError> {
    match extension_of(path).as_deref() {
        Some("txt") => Ok(vec![load_text(path)?]),
        Some("pdf") => load_pdf(path),
        _ => Err(DocumentError::Unsupported(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_documents_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("a.TXT");
        std::fs::write(&txt, "plain text").unwrap();
        let docs = load_documents(&txt).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "plain text");

        let pdf = dir.path().join("b.pdf");
        pdf::tests::write_pdf(&pdf, &["Only page"]);
        assert_eq!(load_documents(&pdf).unwrap().len(), 1);
    }

    #[test]
    fn test_load_documents_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(&path, [0u8; 4]).unwrap();
        assert!(matches!(
            load_documents(&path),
            Err(DocumentError::Unsupported(_))
        ));
    }
}
