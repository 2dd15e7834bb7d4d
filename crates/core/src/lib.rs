pub mod config;
pub mod document;
pub mod money;
pub mod receipt;

pub use config::{ConfigError, ExtractionConfig, OcrConfig, Renderer, SlipscanConfig};
pub use document::{join_pages, DocumentText, RecognizedPage, ValidationResult};
pub use money::Money;
pub use receipt::{
    ExtractedFields, PurchaseTime, ReceiptRecord, RecordError, TotalSource, CANONICAL_FORMAT,
};
