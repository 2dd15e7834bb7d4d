use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available; build with the `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
/// Implementations accept encoded page image bytes and return the recognized
/// text with line breaks preserved. Blank pages may yield an empty string.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize(image_bytes)
    }
}

// ── Mock backends (always available, used for tests) ─────────────────────────

/// Returns a pre-set string for every page.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

/// Delegates to a closure, so tests can answer per page.
pub struct FnRecognizer<F>(pub F);

impl<F> OcrBackend for FnRecognizer<F>
where
    F: Fn(&[u8]) -> Result<String, OcrError> + Send + Sync,
{
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (self.0)(image_bytes)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            // LepTess is not Sync; one engine per call keeps pages independent.
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_preset_text() {
        let r = MockRecognizer::new("7-ELEVEN\nTOTAL: $5.42");
        assert_eq!(r.recognize(b"fake image data").unwrap(), "7-ELEVEN\nTOTAL: $5.42");
        assert_eq!(r.recognize(b"").unwrap(), "7-ELEVEN\nTOTAL: $5.42");
    }

    #[test]
    fn fn_recognizer_sees_image_bytes() {
        let r = FnRecognizer(|bytes: &[u8]| match bytes {
            b"blank" => Ok(String::new()),
            b"torn" => Err(OcrError::Engine("no text lines".into())),
            other => Ok(String::from_utf8_lossy(other).into_owned()),
        });
        assert_eq!(r.recognize(b"TOTAL 1.00").unwrap(), "TOTAL 1.00");
        assert_eq!(r.recognize(b"blank").unwrap(), "");
        assert!(r.recognize(b"torn").is_err());
    }

    #[test]
    fn boxed_backend_delegates() {
        let r: Box<dyn OcrBackend> = Box::new(MockRecognizer::new("hello"));
        assert_eq!(r.recognize(b"anything").unwrap(), "hello");
    }
}
