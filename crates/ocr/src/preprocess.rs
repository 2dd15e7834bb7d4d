use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Decode a page image (PNG / JPEG / …), normalize it, and return PNG bytes ready for OCR.
pub fn prepare_for_ocr(data: &[u8], max_dimension: u32) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    encode_as_png(normalize(img, max_dimension))
}

/// Grayscale + contrast stretch, capped at `max_dimension` on the longer side.
fn normalize(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    // Tesseract works best around 300 DPI; very large scans only cost time.
    let img = if img.width() > max_dimension || img.height() > max_dimension {
        img.resize(max_dimension, max_dimension, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let gray: GrayImage = img.to_luma8();

    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px == min_px {
        // Uniform page (blank scan): nothing to stretch.
        return DynamicImage::ImageLuma8(gray);
    }

    let range = (max_px - min_px) as u32;
    let stretched: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        let v = ((p - min_px) as u32 * 255 / range) as u8;
        Luma([v])
    });

    DynamicImage::ImageLuma8(stretched)
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_gray(width: u32, height: u32) -> DynamicImage {
        let img: GrayImage = ImageBuffer::from_fn(width, height, |x, _| {
            Luma([(x * 255 / width) as u8])
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn blank_page_is_left_alone() {
        let img = DynamicImage::ImageLuma8(ImageBuffer::from_fn(10, 10, |_, _| Luma([255u8])));
        let result = normalize(img, 2800);
        assert_eq!((result.width(), result.height()), (10, 10));
        assert!(result.to_luma8().pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn faded_scan_is_stretched_to_full_range() {
        // Pale receipt paper: ink at 100, paper at 180.
        let img: GrayImage = ImageBuffer::from_fn(8, 1, |x, _| Luma([if x < 4 { 100u8 } else { 180 }]));
        let gray = normalize(DynamicImage::ImageLuma8(img), 2800).to_luma8();
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
        assert_eq!(gray.get_pixel(7, 0)[0], 255);
    }

    #[test]
    fn gradient_keeps_extremes() {
        let gray = normalize(gradient_gray(256, 1), 2800).to_luma8();
        let min = gray.pixels().map(|p| p[0]).min().unwrap();
        let max = gray.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!((min, max), (0, 255));
    }

    #[test]
    fn color_jpeg_becomes_gray_png() {
        let result = prepare_for_ocr(&crate::testing::jpeg(12, 8), 2800).unwrap();
        assert_eq!(&result[..4], b"\x89PNG");
        let img = image::load_from_memory(&result).unwrap();
        assert!(matches!(img, DynamicImage::ImageLuma8(_)));
        assert_eq!((img.width(), img.height()), (12, 8));
    }

    #[test]
    fn oversized_page_is_capped() {
        let result = normalize(gradient_gray(400, 100), 200);
        assert!(result.width() <= 200 && result.height() <= 200);
    }

    #[test]
    fn undecodable_bytes_are_load_error() {
        let err = prepare_for_ocr(b"not an image", 2800).unwrap_err();
        assert!(matches!(err, PreprocessError::Load(_)));
    }
}
