use serde::{Deserialize, Serialize};
use std::fmt;

use super::layout::RegionKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MissingDate,
    MissingAmount,
    NoTransactionalAmount,
    AmbiguousDebitCredit,
    SignConvention,
    RegionLineMismatch { dropped: usize },
    EmptyRegion { region: RegionKind },
    OcrTimeout { region: RegionKind },
    OcrFailed { region: RegionKind },
    PageWithoutRegions,
}

/// A non-fatal problem. Warnings are collected and returned next to the
/// transactions, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub page: Option<usize>,
    pub line: Option<usize>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self { kind, page: None, line: None, message: message.into() }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn on_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.page, self.line) {
            (Some(p), Some(l)) => write!(f, "page {p}, line {l}: {}", self.message),
            (Some(p), None) => write!(f, "page {p}: {}", self.message),
            (None, Some(l)) => write!(f, "line {l}: {}", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location() {
        let w = Warning::new(WarningKind::MissingDate, "no date").at_line(4);
        assert_eq!(w.to_string(), "line 4: no date");
        let w = Warning::new(WarningKind::RegionLineMismatch { dropped: 2 }, "short").on_page(1);
        assert_eq!(w.to_string(), "page 1: short");
    }

    #[test]
    fn kind_serializes_with_payload() {
        let w = Warning::new(WarningKind::EmptyRegion { region: RegionKind::Amount }, "empty");
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"]["empty_region"]["region"], "amount");
    }
}
