use slipscan_core::{join_pages, DocumentText, RecognizedPage};

/// Joins recognized pages into one document, ordered by `page_index`.
///
/// Input order does not matter, so pages recognized concurrently can be
/// passed in completion order.
pub fn aggregate(mut pages: Vec<RecognizedPage>) -> DocumentText {
    pages.sort_by_key(|p| p.page_index);
    join_pages(pages.iter().map(|p| p.text.as_str()))
}
