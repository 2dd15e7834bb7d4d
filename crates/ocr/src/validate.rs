use std::path::Path;

use lopdf::Document;
use slipscan_core::ValidationResult;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    #[error("document has no pages")]
    NoPages,
}

/// What a successful open learned about the document. The parsed handle
/// itself is released before this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedDocument {
    pub page_count: usize,
}

/// Opens a source document far enough to know it is well-formed.
pub trait DocumentOpener: Send + Sync {
    fn open_bytes(&self, bytes: &[u8]) -> Result<OpenedDocument, OpenError>;

    fn open(&self, path: &Path) -> Result<OpenedDocument, OpenError> {
        let bytes = std::fs::read(path)?;
        self.open_bytes(&bytes)
    }
}

/// Parses the whole file with lopdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfOpener;

impl DocumentOpener for LopdfOpener {
    fn open_bytes(&self, bytes: &[u8]) -> Result<OpenedDocument, OpenError> {
        let doc = Document::load_mem(bytes).map_err(|e| OpenError::Parse(e.to_string()))?;
        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(OpenError::NoPages);
        }
        Ok(OpenedDocument { page_count })
    }
}

/// Gate in front of rasterization: reports failures as data, never as errors.
#[derive(Debug, Clone, Default)]
pub struct DocumentValidator<O: DocumentOpener = LopdfOpener> {
    opener: O,
}

impl<O: DocumentOpener> DocumentValidator<O> {
    pub fn new(opener: O) -> Self {
        Self { opener }
    }

    pub fn validate(&self, path: &Path) -> ValidationResult {
        report(path, self.opener.open(path))
    }

    /// Validate contents already read from `path`.
    pub fn validate_bytes(&self, path: &Path, bytes: &[u8]) -> ValidationResult {
        report(path, self.opener.open_bytes(bytes))
    }
}

fn report(path: &Path, opened: Result<OpenedDocument, OpenError>) -> ValidationResult {
    match opened {
        Ok(opened) => {
            tracing::debug!(path = %path.display(), pages = opened.page_count, "Document is valid");
            ValidationResult::valid()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Document failed validation: {e}");
            ValidationResult::invalid(e.to_string())
        }
    }
}

/// Validate with the default lopdf opener.
pub fn validate_document(path: &Path) -> ValidationResult {
    DocumentValidator::<LopdfOpener>::default().validate(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scanned_pdf, write_file, TestPage};

    #[test]
    fn generated_pdf_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = scanned_pdf(&[TestPage::Scan { width: 20, height: 30 }], 612);
        let path = write_file(dir.path(), "receipt.pdf", &pdf);

        assert_eq!(validate_document(&path), ValidationResult::valid());
    }

    #[test]
    fn opener_reports_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = scanned_pdf(&[TestPage::Blank, TestPage::Blank], 612);
        let path = write_file(dir.path(), "two.pdf", &pdf);

        assert_eq!(LopdfOpener.open(&path).unwrap(), OpenedDocument { page_count: 2 });
    }

    #[test]
    fn garbage_bytes_are_invalid_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "receipt.pdf", b"this is not a pdf at all");

        let result = validate_document(&path);
        assert!(!result.is_valid);
        assert!(result.reason.unwrap().starts_with("failed to parse PDF"));
    }

    #[test]
    fn missing_file_is_invalid_with_reason() {
        let result = validate_document(Path::new("/nonexistent/receipt.pdf"));
        assert!(!result.is_valid);
        assert!(result.reason.unwrap().starts_with("failed to read document"));
    }

    #[test]
    fn zero_page_document_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "empty.pdf", &scanned_pdf(&[], 612));

        let result = validate_document(&path);
        assert!(!result.is_valid);
        assert_eq!(result.reason.as_deref(), Some("document has no pages"));
    }

    struct RejectingOpener;

    impl DocumentOpener for RejectingOpener {
        fn open_bytes(&self, _bytes: &[u8]) -> Result<OpenedDocument, OpenError> {
            Err(OpenError::Parse("unsupported format".into()))
        }
    }

    #[test]
    fn custom_opener_failure_becomes_reason() {
        let validator = DocumentValidator::new(RejectingOpener);
        let result = validator.validate_bytes(Path::new("anything.tiff"), b"II*");
        assert_eq!(result, ValidationResult::invalid("failed to parse PDF: unsupported format"));
    }

    #[test]
    fn bytes_and_path_validation_agree() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = scanned_pdf(&[TestPage::Blank], 612);
        let path = write_file(dir.path(), "r.pdf", &pdf);
        let validator = DocumentValidator::<LopdfOpener>::default();

        assert_eq!(validator.validate_bytes(&path, &pdf), validator.validate(&path));
        assert!(!validator.validate_bytes(&path, b"%PDF-garbage").is_valid);
    }
}
