//! PDF loading, one document per page.

use std::path::Path;

use crate::error::DocumentError;
use crate::models::{Document, DocumentMetadata};
use crate::utils::file::{calculate_checksum, file_name_of};
use crate::utils::text::normalize_whitespace;

pub fn load_pdf(path: &Path) -> Result<Vec<Document>, DocumentError> {
    let bytes = std::fs::read(path).map_err(|source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let checksum = calculate_checksum(&bytes);

    let pdf = lopdf::Document::load_mem(&bytes).map_err(|e| DocumentError::Pdf {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let filename = file_name_of(path);
    let path_str = path.to_string_lossy().to_string();

    let mut documents = Vec::new();
    for page_number in pdf.get_pages().into_keys() {
        let text = pdf
            .extract_text(&[page_number])
            .map_err(|e| DocumentError::Pdf {
                path: path.display().to_string(),
                message: format!("page {}: {}", page_number, e),
            })?;

        documents.push(Document::new(
            normalize_whitespace(&text),
            DocumentMetadata {
                filename: filename.clone(),
                path: path_str.clone(),
                page: Some(page_number),
                checksum: checksum.clone(),
            },
        ));
    }

    Ok(documents)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    /// Write a PDF with one line of Courier text per page.
    pub(crate) fn write_pdf(path: &Path, pages: &[&str]) {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_load_pdf_one_document_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        write_pdf(&path, &["Hello World", "Second page"]);

        let docs = load_pdf(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.page, Some(1));
        assert_eq!(docs[1].metadata.page, Some(2));
        assert!(docs[0].content.contains("Hello World"));
        assert!(docs[1].content.contains("Second page"));
        assert_eq!(docs[0].metadata.filename, "report.pdf");
        assert_eq!(docs[0].metadata.checksum, docs[1].metadata.checksum);
    }

    #[test]
    fn test_load_pdf_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"definitely not a pdf").unwrap();

        assert!(matches!(load_pdf(&path), Err(DocumentError::Pdf { .. })));
    }
}
