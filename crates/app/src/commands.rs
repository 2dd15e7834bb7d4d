use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use serde::Serialize;
use slipscan_core::{OcrConfig, ReceiptRecord, Renderer, SlipscanConfig};
use slipscan_ocr::{
    spawn_intake_watcher, validate_document, FieldExtractor, LopdfRasterizer, OcrBackend,
    PageRasterizer, ReceiptPipeline,
};
use tokio::sync::mpsc;

pub fn default_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<SlipscanConfig> {
    match path {
        Some(path) => SlipscanConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SlipscanConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── validate ──────────────────────────────────────────────────────────────────

pub fn validate(pdf: &Path) -> anyhow::Result<ExitCode> {
    let result = validate_document(pdf);
    print_json(&result)?;
    Ok(if result.is_valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

// ── extract ───────────────────────────────────────────────────────────────────

pub fn extract(input: &Path, config: &SlipscanConfig) -> anyhow::Result<ExitCode> {
    let text = read_ocr_text(input)?;
    let fields = FieldExtractor::new(config.extraction.clone()).extract_text(&text);
    print_json(&fields)?;
    Ok(ExitCode::SUCCESS)
}

fn read_ocr_text(input: &Path) -> anyhow::Result<String> {
    if input == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
}

// ── process ───────────────────────────────────────────────────────────────────

pub async fn process(pdf: &Path, require_complete: bool, config: &SlipscanConfig) -> anyhow::Result<ExitCode> {
    let pipeline = ReceiptPipeline::new(recognizer(&config.ocr)?, config)
        .with_rasterizer(rasterizer(&config.ocr)?);
    let processed = pipeline
        .process_file(pdf)
        .await
        .with_context(|| format!("Failed to process {}", pdf.display()))?;

    if require_complete {
        ReceiptRecord::validate(processed.fields.clone())
            .with_context(|| format!("Incomplete receipt {}", pdf.display()))?;
    }
    print_json(&processed)?;
    Ok(ExitCode::SUCCESS)
}

// ── watch ─────────────────────────────────────────────────────────────────────

pub async fn watch(dir: &Path, config: &SlipscanConfig) -> anyhow::Result<ExitCode> {
    let pipeline = ReceiptPipeline::new(recognizer(&config.ocr)?, config)
        .with_rasterizer(rasterizer(&config.ocr)?);

    // The channel bridges the notify watcher thread and the async processor.
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = spawn_intake_watcher(dir, tx)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    tracing::info!("Watching intake folder: {}", dir.display());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(path) = rx.recv() => {
                tracing::info!("Processing receipt: {}", path.display());
                match pipeline.process_file(&path).await {
                    Ok(processed) => print_json(&processed)?,
                    Err(e) => tracing::warn!(path = %path.display(), "Receipt pipeline error: {e}"),
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Stopping watcher");
                break;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ── Recognizer selection ──────────────────────────────────────────────────────

#[cfg(feature = "tesseract")]
fn recognizer(ocr: &OcrConfig) -> anyhow::Result<Box<dyn OcrBackend>> {
    let data_path = ocr.tessdata_dir.as_ref().map(|p| p.to_string_lossy().into_owned());
    Ok(Box::new(slipscan_ocr::TesseractRecognizer::new(data_path, &ocr.language)))
}

#[cfg(not(feature = "tesseract"))]
fn recognizer(_ocr: &OcrConfig) -> anyhow::Result<Box<dyn OcrBackend>> {
    Err(slipscan_ocr::OcrError::NotAvailable)
        .context("This build has no OCR engine; rebuild with `--features tesseract`")
}

// ── Rasterizer selection ──────────────────────────────────────────────────────

fn rasterizer(ocr: &OcrConfig) -> anyhow::Result<Box<dyn PageRasterizer>> {
    match ocr.renderer {
        Renderer::Embedded => Ok(Box::new(LopdfRasterizer)),
        Renderer::Pdfium => pdfium_rasterizer(),
    }
}

#[cfg(feature = "pdfium")]
fn pdfium_rasterizer() -> anyhow::Result<Box<dyn PageRasterizer>> {
    let rasterizer = slipscan_ocr::PdfiumRasterizer::new()
        .context("Set PDFIUM_DYNAMIC_LIB_PATH or install the PDFium library")?;
    Ok(Box::new(rasterizer))
}

#[cfg(not(feature = "pdfium"))]
fn pdfium_rasterizer() -> anyhow::Result<Box<dyn PageRasterizer>> {
    anyhow::bail!("renderer = \"pdfium\" needs a build with `--features pdfium`")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(default_log_level(0), "warn");
        assert_eq!(default_log_level(1), "info");
        assert_eq!(default_log_level(2), "debug");
        assert_eq!(default_log_level(7), "trace");
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), SlipscanConfig::default());
    }

    #[test]
    fn config_file_is_loaded_and_validated() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[extraction]\nunknown_merchant = \"N/A\"\n").unwrap();
        assert_eq!(load_config(Some(&good)).unwrap().extraction.unknown_merchant, "N/A");

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[extraction]\nnumeric_line_ratio = 1.5\n").unwrap();
        let err = load_config(Some(&bad)).unwrap_err();
        assert!(format!("{err:#}").contains("numeric_line_ratio"));
    }

    #[test]
    fn ocr_text_is_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ocr.txt");
        std::fs::write(&path, "SHELL\nTOTAL 30.00\n").unwrap();
        assert_eq!(read_ocr_text(&path).unwrap(), "SHELL\nTOTAL 30.00\n");
        assert!(read_ocr_text(&dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn embedded_renderer_is_always_available() {
        assert!(rasterizer(&OcrConfig::default()).is_ok());
    }

    #[cfg(not(feature = "pdfium"))]
    #[test]
    fn pdfium_renderer_requires_feature() {
        let ocr = OcrConfig { renderer: Renderer::Pdfium, ..OcrConfig::default() };
        let err = rasterizer(&ocr).err().unwrap();
        assert!(err.to_string().contains("--features pdfium"));
    }

    #[cfg(not(feature = "tesseract"))]
    #[test]
    fn recognizer_requires_tesseract_feature() {
        let err = recognizer(&OcrConfig::default()).err().unwrap();
        assert!(format!("{err:#}").contains("--features tesseract"));
    }
}
