use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Recognized text of a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedPage {
    /// 0-based position of the page in the source document.
    pub page_index: usize,
    pub text: String,
}

impl RecognizedPage {
    pub fn new(page_index: usize, text: impl Into<String>) -> Self {
        Self { page_index, text: text.into() }
    }

    pub fn empty(page_index: usize) -> Self {
        Self { page_index, text: String::new() }
    }
}

/// The OCR text of a whole document, pages joined in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentText {
    pub full_text: String,
    pub line_count: usize,
    pub page_count: usize,
    /// Where the text came from, when it came from a file.
    pub source_path: Option<PathBuf>,
}

impl DocumentText {
    /// Wrap raw text that did not go through page aggregation.
    pub fn from_text(text: impl Into<String>) -> Self {
        let full_text = text.into();
        let page_count = usize::from(!full_text.is_empty());
        Self::new(full_text, page_count)
    }

    pub(crate) fn new(full_text: String, page_count: usize) -> Self {
        let line_count = count_lines(&full_text);
        Self { full_text, line_count, page_count, source_path: None }
    }

    pub fn with_source(mut self, path: impl AsRef<Path>) -> Self {
        self.source_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.full_text.is_empty()
    }
}

/// Builds a `DocumentText` from page texts that are already in page order.
pub fn join_pages<'a>(texts: impl IntoIterator<Item = &'a str>) -> DocumentText {
    let mut full_text = String::new();
    let mut page_count = 0usize;
    for text in texts {
        if page_count > 0 {
            full_text.push('\n');
        }
        full_text.push_str(text.trim());
        page_count += 1;
    }
    DocumentText::new(full_text, page_count)
}

fn count_lines(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.split('\n').count()
    }
}

/// Outcome of checking that a source document can be opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self { is_valid: true, reason: None }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self { is_valid: false, reason: Some(reason.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_pages_keeps_empty_pages_as_blank_lines() {
        let doc = join_pages(["  STORE  ", "", "TOTAL 1.00\n"]);
        assert_eq!(doc.full_text, "STORE\n\nTOTAL 1.00");
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.line_count, 3);
    }

    #[test]
    fn join_pages_empty_input() {
        let doc = join_pages(std::iter::empty());
        assert!(doc.is_empty());
        assert_eq!(doc.line_count, 0);
        assert_eq!(doc.page_count, 0);
    }

    #[test]
    fn from_text_counts_lines() {
        let doc = DocumentText::from_text("a\nb\nc");
        assert_eq!(doc.line_count, 3);
        assert_eq!(doc.page_count, 1);
        assert_eq!(DocumentText::from_text("").line_count, 0);
    }

    #[test]
    fn with_source_records_path() {
        let doc = DocumentText::from_text("x").with_source("/tmp/r.pdf");
        assert_eq!(doc.source_path, Some(PathBuf::from("/tmp/r.pdf")));
    }

    #[test]
    fn validation_result_constructors() {
        assert_eq!(ValidationResult::valid(), ValidationResult { is_valid: true, reason: None });
        let bad = ValidationResult::invalid("broken xref");
        assert!(!bad.is_valid);
        assert_eq!(bad.reason.as_deref(), Some("broken xref"));
    }
}
