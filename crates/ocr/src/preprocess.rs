use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use ledgerline_core::Region;
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
    #[error("Region covers no pixels on a {width}x{height} page")]
    EmptyCrop { width: u32, height: u32 },
}

/// Cut the fractional `region` out of a decoded page.
pub fn crop_region(page: &DynamicImage, region: &Region) -> Result<DynamicImage, PreprocessError> {
    let (width, height) = (page.width(), page.height());
    let (x, y, w, h) = region.to_pixels(width, height);
    if w == 0 || h == 0 {
        return Err(PreprocessError::EmptyCrop { width, height });
    }
    Ok(page.crop_imm(x, y, w, h))
}

/// Crop, normalize and encode a region, returning PNG bytes ready for OCR.
pub fn prepare_region(
    page: &DynamicImage,
    region: &Region,
    max_side: u32,
) -> Result<Vec<u8>, PreprocessError> {
    encode_as_png(normalize(crop_region(page, region)?, max_side))
}

/// Grayscale + contrast stretch, scaled down to fit `max_side`.
pub fn normalize(img: DynamicImage, max_side: u32) -> DynamicImage {
    let img = if img.width() > max_side || img.height() > max_side {
        img.resize(max_side, max_side, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let gray: GrayImage = img.to_luma8();

    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px <= min_px {
        return DynamicImage::ImageLuma8(gray);
    }

    let range = (max_px - min_px) as u32;
    let stretched: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        Luma([((p - min_px) as u32 * 255 / range) as u8])
    });

    DynamicImage::ImageLuma8(stretched)
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
