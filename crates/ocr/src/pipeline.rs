use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use slipscan_core::{
    DocumentText, ExtractedFields, OcrConfig, RecognizedPage, SlipscanConfig, ValidationResult,
};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::aggregate::aggregate;
use crate::diagnostics::{DiagnosticsSink, DirectorySink, NoopSink};
use crate::extract::FieldExtractor;
use crate::hash;
use crate::preprocess;
use crate::rasterize::{LopdfRasterizer, PageImage, PageRasterizer, RasterizeError};
use crate::recognizer::OcrBackend;
use crate::validate::DocumentValidator;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("Rasterization failed: {0}")]
    Rasterize(#[from] RasterizeError),
    #[error("Document worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// The result of a single receipt processing run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedReceipt {
    /// SHA-256 hex digest of the source file, when processed from disk.
    pub source_digest: Option<String>,
    /// Aggregated OCR text.
    pub document: DocumentText,
    /// Structured fields extracted from the OCR text.
    pub fields: ExtractedFields,
}

/// Orchestrates: validate → rasterize → preprocess → OCR per page → aggregate → extract.
pub struct ReceiptPipeline<R: OcrBackend, P: PageRasterizer = LopdfRasterizer> {
    recognizer: Arc<R>,
    rasterizer: Arc<P>,
    validator: DocumentValidator,
    extractor: FieldExtractor,
    ocr: OcrConfig,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl<R: OcrBackend + 'static> ReceiptPipeline<R> {
    pub fn new(recognizer: R, config: &SlipscanConfig) -> Self {
        let diagnostics: Arc<dyn DiagnosticsSink> = match &config.ocr.diagnostics_dir {
            Some(dir) => Arc::new(DirectorySink::new(dir)),
            None => Arc::new(NoopSink),
        };
        Self {
            recognizer: Arc::new(recognizer),
            rasterizer: Arc::new(LopdfRasterizer),
            validator: DocumentValidator::default(),
            extractor: FieldExtractor::new(config.extraction.clone()),
            ocr: config.ocr.clone(),
            diagnostics,
        }
    }
}

impl<R: OcrBackend + 'static, P: PageRasterizer + 'static> ReceiptPipeline<R, P> {
    pub fn with_rasterizer<Q: PageRasterizer>(self, rasterizer: Q) -> ReceiptPipeline<R, Q> {
        ReceiptPipeline {
            recognizer: self.recognizer,
            rasterizer: Arc::new(rasterizer),
            validator: self.validator,
            extractor: self.extractor,
            ocr: self.ocr,
            diagnostics: self.diagnostics,
        }
    }

    pub fn with_diagnostics(mut self, sink: impl DiagnosticsSink + 'static) -> Self {
        self.diagnostics = Arc::new(sink);
        self
    }

    pub fn validate(&self, path: &Path) -> ValidationResult {
        self.validator.validate(path)
    }

    /// Field extraction alone, for text recognized elsewhere.
    pub fn extract_text(&self, text: &str) -> ExtractedFields {
        self.extractor.extract_text(text)
    }

    /// Process a document on disk. The file is read once; validation,
    /// hashing and rasterization run on the blocking pool.
    pub async fn process_file(&self, path: &Path) -> Result<ProcessedReceipt, PipelineError> {
        let source = path.to_path_buf();
        let validator = self.validator.clone();
        let rasterizer = Arc::clone(&self.rasterizer);
        let dpi = self.ocr.dpi;

        let (digest, images) = tokio::task::spawn_blocking(move || -> Result<_, PipelineError> {
            let bytes = std::fs::read(&source)?;
            let validation = validator.validate_bytes(&source, &bytes);
            if !validation.is_valid {
                return Err(PipelineError::InvalidDocument(validation.reason.unwrap_or_default()));
            }
            let digest = hash::to_hex(&hash::sha256_bytes(&bytes));
            let images = rasterizer.rasterize_bytes(&bytes, dpi)?;
            Ok((digest, images))
        })
        .await??;
        tracing::debug!(path = %path.display(), pages = images.len(), dpi, "Rasterized document");

        let mut processed = self.process_images(images, Some(path)).await;
        tracing::info!(
            path = %path.display(),
            digest = %digest,
            merchant = %processed.fields.merchant_name,
            "Processed receipt"
        );
        processed.source_digest = Some(digest);
        Ok(processed)
    }

    /// Process pages that were rasterized elsewhere. Pages that cannot be
    /// recognized contribute empty text instead of failing the document.
    pub async fn process_images(&self, images: Vec<PageImage>, source: Option<&Path>) -> ProcessedReceipt {
        let source_name = source
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        for image in images.iter().filter(|i| !i.is_empty()) {
            self.diagnostics.page_image(&source_name, image.page_index, &image.bytes);
        }

        let pages = if self.ocr.parallel_pages {
            self.recognize_parallel(images).await
        } else {
            let limit = self.preprocess_limit();
            images
                .iter()
                .map(|image| {
                    panic::catch_unwind(AssertUnwindSafe(|| {
                        recognize_page(self.recognizer.as_ref(), image, limit)
                    }))
                    .unwrap_or_else(|_| {
                        tracing::warn!(page = image.page_index, "Recognition panicked, using empty text");
                        RecognizedPage::empty(image.page_index)
                    })
                })
                .collect()
        };

        let mut document = aggregate(pages);
        if let Some(path) = source {
            document = document.with_source(path);
        }
        let fields = self.extractor.extract(&document);

        ProcessedReceipt { source_digest: None, document, fields }
    }

    async fn recognize_parallel(&self, images: Vec<PageImage>) -> Vec<RecognizedPage> {
        let limit = self.preprocess_limit();
        let handles: Vec<_> = images
            .into_iter()
            .map(|image| {
                let page_index = image.page_index;
                let recognizer = Arc::clone(&self.recognizer);
                let handle = tokio::task::spawn_blocking(move || {
                    recognize_page(recognizer.as_ref(), &image, limit)
                });
                (page_index, handle)
            })
            .collect();

        let mut pages = Vec::with_capacity(handles.len());
        for (page_index, handle) in handles {
            match handle.await {
                Ok(page) => pages.push(page),
                Err(e) => {
                    tracing::warn!(page = page_index, "Recognition task failed: {e}");
                    pages.push(RecognizedPage::empty(page_index));
                }
            }
        }
        pages
    }

    fn preprocess_limit(&self) -> Option<u32> {
        self.ocr.preprocess.then_some(self.ocr.max_image_dimension)
    }
}

fn recognize_page<R: OcrBackend + ?Sized>(
    recognizer: &R,
    image: &PageImage,
    preprocess_limit: Option<u32>,
) -> RecognizedPage {
    if image.is_empty() {
        tracing::debug!(page = image.page_index, "Skipping page without image");
        return RecognizedPage::empty(image.page_index);
    }

    let bytes: Cow<'_, [u8]> = match preprocess_limit {
        Some(max_dimension) => match preprocess::prepare_for_ocr(&image.bytes, max_dimension) {
            Ok(png) => Cow::Owned(png),
            Err(e) => {
                tracing::warn!(page = image.page_index, "Page preprocessing failed: {e}");
                return RecognizedPage::empty(image.page_index);
            }
        },
        None => Cow::Borrowed(&image.bytes),
    };

    match recognizer.recognize(&bytes) {
        Ok(text) => {
            tracing::debug!(page = image.page_index, chars = text.len(), "Recognized page");
            RecognizedPage::new(image.page_index, text)
        }
        Err(e) => {
            tracing::warn!(page = image.page_index, "OCR failed, using empty text: {e}");
            RecognizedPage::empty(image.page_index)
        }
    }
}

// ── Watch-folder integration ──────────────────────────────────────────────────

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Spawn a notify watcher on `watch_dir` that sends new PDF paths to `tx`.
/// Returns the watcher; it must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        if let Ok(ev) = event {
            if matches!(ev.kind, EventKind::Create(_)) {
                for path in ev.paths.into_iter().filter(|p| is_pdf(p)) {
                    let _ = tx.try_send(path);
                }
            }
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
