use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration, normally loaded from `slipscan.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlipscanConfig {
    pub extraction: ExtractionConfig,
    pub ocr: OcrConfig,
}

/// Tuning for the field-extraction heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// How many leading non-blank lines may hold the merchant name.
    pub merchant_scan_lines: usize,
    /// Share of digit characters at which a line counts as a numeric code.
    pub numeric_line_ratio: f64,
    /// Merchant name used when no line qualifies.
    pub unknown_merchant: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            merchant_scan_lines: 3,
            numeric_line_ratio: 0.70,
            unknown_merchant: "Unknown".to_string(),
        }
    }
}

/// How PDF pages become images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Renderer {
    /// Pull the scanned image embedded in each page.
    #[default]
    Embedded,
    /// Render whole pages with PDFium (`pdfium` build feature).
    Pdfium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub renderer: Renderer,
    /// Rasterization resolution. Lower is faster and less accurate.
    pub dpi: u32,
    /// Tesseract language code.
    pub language: String,
    pub tessdata_dir: Option<PathBuf>,
    /// Grayscale + contrast stretch before recognition.
    pub preprocess: bool,
    pub max_image_dimension: u32,
    /// Recognize pages concurrently on the blocking pool.
    pub parallel_pages: bool,
    /// When set, every page image is written here before recognition.
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            renderer: Renderer::Embedded,
            dpi: 180,
            language: "eng".to_string(),
            tessdata_dir: None,
            preprocess: true,
            max_image_dimension: 2800,
            parallel_pages: true,
            diagnostics_dir: None,
        }
    }
}

impl SlipscanConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: SlipscanConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ex = &self.extraction;
        if ex.merchant_scan_lines == 0 {
            return Err(ConfigError::Invalid("extraction.merchant_scan_lines must be at least 1".into()));
        }
        if !(ex.numeric_line_ratio > 0.0 && ex.numeric_line_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "extraction.numeric_line_ratio must be in (0, 1], got {}",
                ex.numeric_line_ratio
            )));
        }
        if ex.unknown_merchant.trim().is_empty() {
            return Err(ConfigError::Invalid("extraction.unknown_merchant must not be blank".into()));
        }
        if self.ocr.dpi == 0 {
            return Err(ConfigError::Invalid("ocr.dpi must be positive".into()));
        }
        if self.ocr.language.trim().is_empty() {
            return Err(ConfigError::Invalid("ocr.language must not be empty".into()));
        }
        Ok(())
    }
}
