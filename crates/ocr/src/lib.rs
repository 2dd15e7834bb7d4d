pub mod aggregate;
pub mod diagnostics;
pub mod extract;
pub mod hash;
pub mod pipeline;
pub mod preprocess;
pub mod rasterize;
pub mod recognizer;
pub mod validate;

#[cfg(test)]
mod testing;

pub use aggregate::aggregate;
pub use diagnostics::{DiagnosticsSink, DirectorySink, NoopSink};
pub use extract::{extract_merchant, extract_purchased_at, extract_total, FieldExtractor};
pub use hash::{sha256_bytes, to_hex};
pub use pipeline::{is_pdf, spawn_intake_watcher, PipelineError, ProcessedReceipt, ReceiptPipeline};
pub use preprocess::{prepare_for_ocr, PreprocessError};
pub use rasterize::{LopdfRasterizer, PageImage, PageRasterizer, RasterizeError};
pub use recognizer::{FnRecognizer, MockRecognizer, OcrBackend, OcrError};
pub use validate::{validate_document, DocumentOpener, DocumentValidator, LopdfOpener, OpenError, OpenedDocument};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;

#[cfg(feature = "pdfium")]
pub use rasterize::pdfium_backend::PdfiumRasterizer;
