use std::collections::HashMap;
use std::time::Duration;

use image::DynamicImage;
use ledgerline_core::RegionKind;
use thiserror::Error;

use crate::preprocess::{prepare_region, PreprocessError};
use crate::types::RegionRequest;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available, build with the `tesseract` feature")]
    NotAvailable,
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
}

/// Abstraction over an OCR backend.
/// Implementations accept raw PNG/JPEG image bytes and return the recognized text.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;

    /// Recognize the text inside one region of a decoded page.
    fn crop_and_recognize(
        &self,
        page: &DynamicImage,
        request: &RegionRequest,
        max_side: u32,
    ) -> Result<String, OcrError> {
        let png = prepare_region(page, &request.region, max_side)?;
        self.recognize(&png)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string for every region.
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

/// Canned behaviour for one (page, region) pair.
#[derive(Debug, Clone)]
pub enum Script {
    Text(String),
    /// Block the worker for the given time, then answer.
    Slow(Duration, String),
    Fail(String),
}

/// Answers per (page, region) so that tests can drive every column separately.
/// Unscripted regions recognize as empty text.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRecognizer {
    scripts: HashMap<(usize, RegionKind), Script>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, page: usize, kind: RegionKind, script: Script) -> Self {
        self.scripts.insert((page, kind), script);
        self
    }

    pub fn text(self, page: usize, kind: RegionKind, text: &str) -> Self {
        self.with(page, kind, Script::Text(text.to_string()))
    }
}

impl OcrBackend for ScriptedRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok(String::new())
    }

    fn crop_and_recognize(
        &self,
        page: &DynamicImage,
        request: &RegionRequest,
        max_side: u32,
    ) -> Result<String, OcrError> {
        // Geometry errors surface as with a real engine.
        prepare_region(page, &request.region, max_side)?;
        match self.scripts.get(&(request.page, request.kind)) {
            None => Ok(String::new()),
            Some(Script::Text(text)) => Ok(text.clone()),
            Some(Script::Slow(delay, text)) => {
                std::thread::sleep(*delay);
                Ok(text.clone())
            }
            Some(Script::Fail(message)) => Err(OcrError::Engine(message.clone())),
        }
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
    use image::{GrayImage, ImageBuffer, Luma};
    use ledgerline_core::Region;

    fn page() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(40, 40, |x, _| Luma([(x * 6) as u8])))
    }

    fn request(kind: RegionKind) -> RegionRequest {
        RegionRequest { page: 1, kind, region: Region::new(0.0, 0.0, 0.5, 1.0) }
    }

    #[test]
    fn mock_crops_then_returns_preset_text() {
        let r = MockRecognizer::new("2024-01-15\n2024-01-16");
        let text = r.crop_and_recognize(&page(), &request(RegionKind::Date), 2800).unwrap();
        assert_eq!(text, "2024-01-15\n2024-01-16");
    }

    #[test]
    fn degenerate_region_fails_before_recognition() {
        let r = MockRecognizer::new("never");
        let mut req = request(RegionKind::Date);
        req.region = Region::new(0.0, 0.0, 0.001, 1.0);
        let err = r.crop_and_recognize(&page(), &req, 2800).unwrap_err();
        assert!(matches!(err, OcrError::Preprocess(PreprocessError::EmptyCrop { .. })));
    }

    #[test]
    fn scripted_answers_per_region() {
        let r = ScriptedRecognizer::new()
            .text(1, RegionKind::Date, "2024-01-15")
            .with(1, RegionKind::Amount, Script::Fail("engine crashed".into()));
        let img = page();
        assert_eq!(r.crop_and_recognize(&img, &request(RegionKind::Date), 2800).unwrap(), "2024-01-15");
        assert_eq!(r.crop_and_recognize(&img, &request(RegionKind::Description), 2800).unwrap(), "");
        assert!(matches!(
            r.crop_and_recognize(&img, &request(RegionKind::Amount), 2800),
            Err(OcrError::Engine(_))
        ));
    }

    #[test]
    fn mock_ignores_image_content() {
        let r = MockRecognizer::new("hello");
        let blank: GrayImage = ImageBuffer::from_fn(1, 1, |_, _| Luma([0u8]));
        assert_eq!(r.recognize(blank.as_raw()).unwrap(), "hello");
        assert_eq!(r.recognize(b"").unwrap(), "hello");
    }
}
