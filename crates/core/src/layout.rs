//! Page/region geometry for OCR-based statement extraction.
//!
//! Regions are fractional rectangles of the page, so a single layout applies
//! regardless of the DPI the page was rendered at.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Fractional rectangle `{x, y, w, h}` in the range 0.0–1.0 of page size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Region {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    fn in_bounds(&self) -> bool {
        const EPS: f64 = 1e-9;
        let fields = [self.x, self.y, self.w, self.h];
        fields.iter().all(|v| v.is_finite())
            && self.x >= 0.0
            && self.y >= 0.0
            && self.w > 0.0
            && self.h > 0.0
            && self.x + self.w <= 1.0 + EPS
            && self.y + self.h <= 1.0 + EPS
    }

    /// Pixel rectangle `(x, y, width, height)` for a page of the given size,
    /// clamped to the page.
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let px = |frac: f64, total: u32| (frac.clamp(0.0, 1.0) * f64::from(total)).floor() as u32;
        let x = px(self.x, width).min(width);
        let y = px(self.y, height).min(height);
        let w = ((self.w.max(0.0) * f64::from(width)).round() as u32).min(width - x);
        let h = ((self.h.max(0.0) * f64::from(height)).round() as u32).min(height - y);
        (x, y, w, h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Date,
    Description,
    Amount,
    Debit,
    Credit,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::Date => write!(f, "date_region"),
            RegionKind::Description => write!(f, "description_region"),
            RegionKind::Amount => write!(f, "amount_region"),
            RegionKind::Debit => write!(f, "debit_region"),
            RegionKind::Credit => write!(f, "credit_region"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountType {
    #[default]
    Single,
    DebitCredit,
}

impl AmountType {
    /// Region kinds a page must provide, in row-token order.
    pub fn required_regions(self) -> &'static [RegionKind] {
        match self {
            AmountType::Single => &[RegionKind::Date, RegionKind::Description, RegionKind::Amount],
            AmountType::DebitCredit => &[
                RegionKind::Date,
                RegionKind::Description,
                RegionKind::Debit,
                RegionKind::Credit,
            ],
        }
    }
}

/// Named regions configured for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRegions {
    #[serde(default)]
    pub date_region: Option<Region>,
    #[serde(default)]
    pub description_region: Option<Region>,
    #[serde(default)]
    pub amount_region: Option<Region>,
    #[serde(default)]
    pub debit_region: Option<Region>,
    #[serde(default)]
    pub credit_region: Option<Region>,
}

impl PageRegions {
    pub fn get(&self, kind: RegionKind) -> Option<&Region> {
        match kind {
            RegionKind::Date => self.date_region.as_ref(),
            RegionKind::Description => self.description_region.as_ref(),
            RegionKind::Amount => self.amount_region.as_ref(),
            RegionKind::Debit => self.debit_region.as_ref(),
            RegionKind::Credit => self.credit_region.as_ref(),
        }
    }

    /// The regions OCR has to run over for `amount_type`. Missing kinds are skipped;
    /// `DocumentLayout::validate` reports them.
    pub fn regions(&self, amount_type: AmountType) -> Vec<(RegionKind, Region)> {
        amount_type
            .required_regions()
            .iter()
            .filter_map(|kind| self.get(*kind).map(|r| (*kind, *r)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("layout defines no page regions")]
    Empty,
    #[error("{scope}: required region `{kind}` is missing")]
    MissingRegion { scope: String, kind: RegionKind },
    #[error("{scope}: region `{kind}` lies outside the page")]
    OutOfBounds { scope: String, kind: RegionKind },
}

/// Region configuration for a whole document: per-page entries, plus an optional
/// default for pages without one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    #[serde(default)]
    pub amount_type: AmountType,
    #[serde(default)]
    pub default_regions: Option<PageRegions>,
    #[serde(default)]
    pub pages: BTreeMap<usize, PageRegions>,
}

impl DocumentLayout {
    pub fn regions_for_page(&self, page: usize) -> Option<&PageRegions> {
        self.pages.get(&page).or(self.default_regions.as_ref())
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.default_regions.is_none() && self.pages.is_empty() {
            return Err(LayoutError::Empty);
        }
        let scoped = self
            .default_regions
            .iter()
            .map(|r| ("default".to_string(), r))
            .chain(self.pages.iter().map(|(p, r)| (format!("page {p}"), r)));
        for (scope, regions) in scoped {
            for kind in self.amount_type.required_regions() {
                match regions.get(*kind) {
                    None => {
                        return Err(LayoutError::MissingRegion { scope, kind: *kind });
                    }
                    Some(region) if !region.in_bounds() => {
                        return Err(LayoutError::OutOfBounds { scope, kind: *kind });
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

/// OCR output for one page: the recognized text of each region that was run.
/// A kind absent from `fragments` means the region was never configured for the
/// page; an empty string means OCR ran and found nothing (or timed out).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRegionText {
    pub page: usize,
    pub fragments: BTreeMap<RegionKind, String>,
}

impl PageRegionText {
    pub fn new(page: usize) -> Self {
        Self { page, fragments: BTreeMap::new() }
    }

    pub fn with(mut self, kind: RegionKind, text: impl Into<String>) -> Self {
        self.fragments.insert(kind, text.into());
        self
    }

    pub fn fragment(&self, kind: RegionKind) -> Option<&str> {
        self.fragments.get(&kind).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(x: f64) -> Region {
        Region::new(x, 0.1, 0.2, 0.8)
    }

    fn single_page() -> PageRegions {
        PageRegions {
            date_region: Some(column(0.0)),
            description_region: Some(column(0.2)),
            amount_region: Some(column(0.7)),
            ..PageRegions::default()
        }
    }

    #[test]
    fn to_pixels_scales_and_clamps() {
        let r = Region::new(0.5, 0.25, 0.5, 0.5);
        assert_eq!(r.to_pixels(200, 400), (100, 100, 100, 200));
        let wide = Region::new(0.9, 0.0, 0.5, 1.0);
        let (x, _, w, _) = wide.to_pixels(100, 100);
        assert_eq!(x + w, 100);
    }

    #[test]
    fn validate_accepts_complete_default() {
        let layout = DocumentLayout {
            default_regions: Some(single_page()),
            ..DocumentLayout::default()
        };
        assert!(layout.validate().is_ok());
        assert!(layout.regions_for_page(7).is_some());
    }

    #[test]
    fn validate_rejects_missing_debit_region() {
        let layout = DocumentLayout {
            amount_type: AmountType::DebitCredit,
            pages: BTreeMap::from([(1, single_page())]),
            ..DocumentLayout::default()
        };
        assert_eq!(
            layout.validate(),
            Err(LayoutError::MissingRegion { scope: "page 1".into(), kind: RegionKind::Debit })
        );
    }

    #[test]
    fn validate_rejects_out_of_bounds() {
        let mut page = single_page();
        page.amount_region = Some(Region::new(0.9, 0.0, 0.3, 1.0));
        let layout = DocumentLayout { pages: BTreeMap::from([(0, page)]), ..DocumentLayout::default() };
        assert!(matches!(layout.validate(), Err(LayoutError::OutOfBounds { .. })));
    }

    #[test]
    fn validate_rejects_empty_layout() {
        assert_eq!(DocumentLayout::default().validate(), Err(LayoutError::Empty));
    }

    #[test]
    fn regions_follow_amount_type_order() {
        let kinds: Vec<RegionKind> =
            single_page().regions(AmountType::Single).into_iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![RegionKind::Date, RegionKind::Description, RegionKind::Amount]);
    }
}
