//! Page images from scanned PDFs.
//!
//! Receipt PDFs produced by scanners and phone apps hold one raster image per
//! page, so rasterizing them means pulling that image back out of the page's
//! `/XObject` resources rather than rendering vector content.

use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// PDF user-space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    #[error("document has no pages")]
    NoPages,
    #[error("PDF renderer unavailable: {0}")]
    Renderer(String),
}

/// One encoded page image. Empty `bytes` means the page had no raster content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub page_index: usize,
    pub bytes: Vec<u8>,
}

impl PageImage {
    pub fn new(page_index: usize, bytes: Vec<u8>) -> Self {
        Self { page_index, bytes }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Converts a source document into page images, in document page order.
pub trait PageRasterizer: Send + Sync {
    fn rasterize_bytes(&self, pdf_bytes: &[u8], dpi: u32) -> Result<Vec<PageImage>, RasterizeError>;

    fn rasterize(&self, path: &Path, dpi: u32) -> Result<Vec<PageImage>, RasterizeError> {
        let bytes = std::fs::read(path)?;
        self.rasterize_bytes(&bytes, dpi)
    }
}

impl<T: PageRasterizer + ?Sized> PageRasterizer for Box<T> {
    fn rasterize_bytes(&self, pdf_bytes: &[u8], dpi: u32) -> Result<Vec<PageImage>, RasterizeError> {
        (**self).rasterize_bytes(pdf_bytes, dpi)
    }
}

/// Extracts the largest embedded image of each page, downsampled to `dpi`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfRasterizer;

impl PageRasterizer for LopdfRasterizer {
    fn rasterize_bytes(&self, pdf_bytes: &[u8], dpi: u32) -> Result<Vec<PageImage>, RasterizeError> {
        let doc = Document::load_mem(pdf_bytes).map_err(|e| RasterizeError::Parse(e.to_string()))?;
        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(RasterizeError::NoPages);
        }

        Ok(pages
            .values()
            .enumerate()
            .map(|(page_index, &page_id)| {
                let bytes = match render_page(&doc, page_id, dpi) {
                    Ok(png) => png,
                    Err(reason) => {
                        tracing::warn!(page = page_index, "No raster content on page: {reason}");
                        Vec::new()
                    }
                };
                PageImage { page_index, bytes }
            })
            .collect())
    }
}

/// Pixels spanned by `points` of page space at `dpi`.
fn target_pixels(points: f32, dpi: u32) -> u32 {
    (points * dpi as f32 / POINTS_PER_INCH).round() as u32
}

fn render_page(doc: &Document, page_id: ObjectId, dpi: u32) -> Result<Vec<u8>, String> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| format!("page object error: {e}"))?;

    let xobjects = dict_entry(doc, page, b"Resources")
        .and_then(|resources| dict_entry(doc, resources, b"XObject"))
        .ok_or("page has no /XObject resources")?;

    let img = xobjects
        .iter()
        .filter_map(|(_, obj)| match resolve(doc, obj) {
            Object::Stream(s) if is_image(&s.dict) => decode_image(s),
            _ => None,
        })
        .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()))
        .ok_or("no decodable image XObject")?;

    let img = match media_width(doc, page) {
        Some(points) => downsample(img, points, dpi),
        None => img,
    };

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| format!("PNG encode failed: {e}"))?;

    tracing::debug!(
        page_object = page_id.0,
        width = img.width(),
        height = img.height(),
        "Extracted page image"
    );
    Ok(buf.into_inner())
}

/// Shrinks the scan so it is no wider than the page at `dpi`. Never upsamples.
fn downsample(img: DynamicImage, page_width_points: f32, dpi: u32) -> DynamicImage {
    let target = target_pixels(page_width_points, dpi);
    if target == 0 || img.width() <= target {
        return img;
    }
    let height = (u64::from(img.height()) * u64::from(target) / u64::from(img.width())).max(1) as u32;
    img.resize_exact(target, height, FilterType::Triangle)
}

fn is_image(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .map(|obj| matches!(obj, Object::Name(ref n) if n == b"Image"))
        .unwrap_or(false)
}

fn is_dct(dict: &Dictionary) -> bool {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => n == b"DCTDecode",
        Ok(Object::Array(arr)) => arr
            .iter()
            .any(|o| matches!(o, Object::Name(ref n) if n == b"DCTDecode")),
        _ => false,
    }
}

fn decode_image(stream: &Stream) -> Option<DynamicImage> {
    if is_dct(&stream.dict) {
        // DCTDecode content is a complete JPEG file.
        return image::load_from_memory(&stream.content).ok();
    }

    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    if let Ok(img) = image::load_from_memory(&content) {
        return Some(img);
    }
    raw_pixels(&stream.dict, content)
}

/// 8-bit DeviceGray / DeviceRGB samples with no further encoding.
fn raw_pixels(dict: &Dictionary, pixels: Vec<u8>) -> Option<DynamicImage> {
    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    let bpc = dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
    if bpc != 8 {
        return None;
    }

    match dict.get(b"ColorSpace") {
        Ok(Object::Name(n)) if n == b"DeviceGray" => {
            GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        Ok(Object::Name(n)) if n == b"DeviceRGB" => {
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        _ => None,
    }
}

fn media_width(doc: &Document, page: &Dictionary) -> Option<f32> {
    let bounds = resolve(doc, page.get(b"MediaBox").ok()?).as_array().ok()?;
    let x0 = number(bounds.first()?)?;
    let x1 = number(bounds.get(2)?)?;
    Some((x1 - x0).abs())
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    resolve(doc, dict.get(key).ok()?).as_dict().ok()
}

// ── PDFium backend (optional, gated behind `pdfium` feature) ─────────────────

/// Renders every page, vector content included. Needs the PDFium shared
/// library at runtime: `PDFIUM_DYNAMIC_LIB_PATH`, else the system search path.
#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::{target_pixels, PageImage, PageRasterizer, RasterizeError};
    use image::ImageFormat;
    use pdfium_render::prelude::*;
    use std::io::Cursor;

    #[derive(Debug, Clone, Copy, Default)]
    pub struct PdfiumRasterizer;

    impl PdfiumRasterizer {
        /// Fails when the PDFium library cannot be loaded.
        pub fn new() -> Result<Self, RasterizeError> {
            load_pdfium()?;
            Ok(Self)
        }
    }

    // `Pdfium` is not Send; bind per call. The OS caches the library load.
    fn load_pdfium() -> Result<Pdfium, RasterizeError> {
        let bindings = match std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
            Ok(path) => Pdfium::bind_to_library(&path),
            Err(_) => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| RasterizeError::Renderer(e.to_string()))?;
        Ok(Pdfium::new(bindings))
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn rasterize_bytes(&self, pdf_bytes: &[u8], dpi: u32) -> Result<Vec<PageImage>, RasterizeError> {
            let pdfium = load_pdfium()?;
            let document = pdfium
                .load_pdf_from_byte_slice(pdf_bytes, None)
                .map_err(|e| RasterizeError::Parse(e.to_string()))?;
            let pages = document.pages();
            if pages.len() == 0 {
                return Err(RasterizeError::NoPages);
            }

            Ok(pages
                .iter()
                .enumerate()
                .map(|(page_index, page)| {
                    let bytes = match render(&page, dpi) {
                        Ok(png) => png,
                        Err(reason) => {
                            tracing::warn!(page = page_index, "Page render failed: {reason}");
                            Vec::new()
                        }
                    };
                    PageImage { page_index, bytes }
                })
                .collect())
        }
    }

    fn render(page: &PdfPage<'_>, dpi: u32) -> Result<Vec<u8>, String> {
        let width = target_pixels(page.width().value, dpi).max(1);
        let height = target_pixels(page.height().value, dpi).max(1);
        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_maximum_height(height as i32);

        let bitmap = page.render_with_config(&config).map_err(|e| e.to_string())?;
        let mut buf = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| format!("PNG encode failed: {e}"))?;
        Ok(buf.into_inner())
    }
}
