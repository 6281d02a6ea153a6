use ledgerline_core::{PageRegionText, Region, RegionKind, Warning};
use serde::{Deserialize, Serialize};

/// One rendered statement page as encoded image bytes (PNG, JPEG, ...).
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number, matched against the layout's page keys.
    pub index: usize,
    pub bytes: Vec<u8>,
}

impl PageImage {
    pub fn new(index: usize, bytes: Vec<u8>) -> Self {
        Self { index, bytes }
    }
}

/// A single unit of OCR work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRequest {
    pub page: usize,
    pub kind: RegionKind,
    pub region: Region,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Upper bound for a single region's recognition.
    pub timeout_ms: u64,
    pub max_concurrent_regions: usize,
    /// Crops larger than this on either side are scaled down before recognition.
    pub max_image_side: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000, max_concurrent_regions: 4, max_image_side: 2800 }
    }
}

/// Recognized region text for every page plus the warnings raised on the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionOcrOutput {
    pub pages: Vec<PageRegionText>,
    pub warnings: Vec<Warning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: OcrConfig = serde_json::from_str(r#"{"timeout_ms": 500}"#).unwrap();
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.max_concurrent_regions, 4);
        assert_eq!(config.max_image_side, 2800);
    }
}
