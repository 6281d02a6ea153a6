//! Row assembly from per-region OCR text.
//!
//! Each page contributes one text fragment per region. Rows are formed by
//! zipping the same-index non-empty line of every region, so a page whose
//! regions disagree on line count loses its trailing lines.

use std::collections::BTreeSet;

use crate::extract::{ExtractError, RawLine};
use ledgerline_core::{AmountType, PageRegionText, RegionKind, Warning, WarningKind};

pub(crate) struct RegionLines<'a> {
    pages: std::slice::Iter<'a, PageRegionText>,
    kinds: &'static [RegionKind],
    current: std::vec::IntoIter<RawLine>,
    with_text: BTreeSet<RegionKind>,
    warnings: Vec<Warning>,
    finished: bool,
}

impl<'a> RegionLines<'a> {
    pub(crate) fn new(
        pages: &'a [PageRegionText],
        amount_type: AmountType,
    ) -> Result<Self, ExtractError> {
        let kinds = amount_type.required_regions();
        if !pages.is_empty() {
            if let Some(kind) = kinds
                .iter()
                .find(|kind| pages.iter().all(|p| p.fragment(**kind).is_none()))
            {
                return Err(ExtractError::RegionAbsent(*kind));
            }
        }
        Ok(Self {
            pages: pages.iter(),
            kinds,
            current: Vec::new().into_iter(),
            with_text: BTreeSet::new(),
            warnings: Vec::new(),
            finished: false,
        })
    }

    pub(crate) fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    fn load_page(&mut self, page: &PageRegionText) -> Vec<RawLine> {
        let mut columns: Vec<Vec<&str>> = Vec::with_capacity(self.kinds.len());
        for kind in self.kinds {
            let Some(fragment) = page.fragment(*kind) else {
                self.warnings.push(
                    Warning::new(
                        WarningKind::PageWithoutRegions,
                        format!("page has no text for {kind}; skipped"),
                    )
                    .on_page(page.page),
                );
                return Vec::new();
            };
            let lines: Vec<&str> =
                fragment.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
            if !lines.is_empty() {
                self.with_text.insert(*kind);
            }
            columns.push(lines);
        }

        let shortest = columns.iter().map(Vec::len).min().unwrap_or(0);
        let dropped: usize = columns.iter().map(|c| c.len() - shortest).sum();
        if dropped > 0 {
            let counts = self
                .kinds
                .iter()
                .zip(&columns)
                .map(|(kind, lines)| format!("{kind}={}", lines.len()))
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(page = page.page, dropped, "region line counts differ");
            self.warnings.push(
                Warning::new(
                    WarningKind::RegionLineMismatch { dropped },
                    format!("region line counts differ ({counts}); {dropped} lines dropped"),
                )
                .on_page(page.page),
            );
        }

        (0..shortest)
            .map(|i| RawLine {
                line: i + 1,
                page: Some(page.page),
                tokens: columns.iter().map(|c| c[i].to_string()).collect(),
            })
            .collect()
    }

    fn finish(&mut self) {
        self.finished = true;
        for kind in self.kinds {
            if !self.with_text.contains(kind) {
                self.warnings.push(Warning::new(
                    WarningKind::EmptyRegion { region: *kind },
                    format!("{kind} produced no text on any page"),
                ));
            }
        }
    }
}

impl Iterator for RegionLines<'_> {
    type Item = RawLine;

    fn next(&mut self) -> Option<RawLine> {
        loop {
            if let Some(line) = self.current.next() {
                return Some(line);
            }
            match self.pages.next() {
                Some(page) => self.current = self.load_page(page).into_iter(),
                None => {
                    if !self.finished {
                        self.finish();
                    }
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extractor, RowKind, StatementSource};

    fn page(n: usize, date: &str, desc: &str, amount: &str) -> PageRegionText {
        PageRegionText::new(n)
            .with(RegionKind::Date, date)
            .with(RegionKind::Description, desc)
            .with(RegionKind::Amount, amount)
    }

    #[test]
    fn zips_same_index_lines() {
        let pages = vec![page(1, "2024-01-15\n2024-01-16\n", "SPAR\nSHELL\n", "-45.99\n-300.00\n")];
        let source = StatementSource::Regions { pages: &pages, amount_type: AmountType::Single };
        let mut rows = Extractor::default().rows(&source).unwrap();
        let collected: Vec<_> = rows.by_ref().collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[1].tokens, vec!["2024-01-16", "SHELL", "-300.00"]);
        assert_eq!(collected[1].page, Some(1));
        assert_eq!(collected[1].kind, RowKind::Data);
        assert!(rows.take_warnings().is_empty());
    }

    #[test]
    fn unequal_line_counts_truncate_and_warn() {
        let pages = vec![page(
            2,
            "2024-01-15\n2024-01-16\n2024-01-17\n",
            "SPAR\nSHELL\n",
            "-45.99\n-300.00\n-12.00\n",
        )];
        let mut lines = RegionLines::new(&pages, AmountType::Single).unwrap();
        assert_eq!(lines.by_ref().count(), 2);
        let warnings = lines.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::RegionLineMismatch { dropped: 2 });
        assert_eq!(warnings[0].page, Some(2));
    }

    #[test]
    fn empty_region_on_every_page_warns_once() {
        let pages = vec![page(1, "2024-01-15\n", "SPAR\n", "  \n"), page(2, "", "", "")];
        let mut lines = RegionLines::new(&pages, AmountType::Single).unwrap();
        assert_eq!(lines.by_ref().count(), 0);
        let warnings = lines.take_warnings();
        assert!(warnings
            .iter()
            .any(|w| w.kind == WarningKind::EmptyRegion { region: RegionKind::Amount }));
        assert_eq!(
            warnings.iter().filter(|w| matches!(w.kind, WarningKind::EmptyRegion { .. })).count(),
            1
        );
        assert!(warnings
            .iter()
            .any(|w| w.kind == WarningKind::RegionLineMismatch { dropped: 2 } && w.page == Some(1)));
    }

    #[test]
    fn region_absent_everywhere_is_fatal() {
        let pages = vec![PageRegionText::new(1)
            .with(RegionKind::Date, "2024-01-15")
            .with(RegionKind::Description, "SPAR")];
        assert_eq!(
            RegionLines::new(&pages, AmountType::Single).err(),
            Some(ExtractError::RegionAbsent(RegionKind::Amount))
        );
    }

    #[test]
    fn page_missing_fragment_is_skipped() {
        let pages = vec![
            PageRegionText::new(1).with(RegionKind::Date, "2024-01-15"),
            page(2, "2024-01-16\n", "SHELL\n", "-300.00\n"),
        ];
        let mut lines = RegionLines::new(&pages, AmountType::Single).unwrap();
        let rows: Vec<_> = lines.by_ref().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].page, Some(2));
        let warnings = lines.take_warnings();
        assert_eq!(warnings[0].kind, WarningKind::PageWithoutRegions);
        assert_eq!(warnings[0].page, Some(1));
    }

    #[test]
    fn debit_credit_rows_have_four_tokens() {
        let pages = vec![PageRegionText::new(1)
            .with(RegionKind::Date, "15/01/2024")
            .with(RegionKind::Description, "SPAR")
            .with(RegionKind::Debit, "45.99")
            .with(RegionKind::Credit, "0.00")];
        let rows: Vec<_> = RegionLines::new(&pages, AmountType::DebitCredit).unwrap().collect();
        assert_eq!(rows[0].tokens, vec!["15/01/2024", "SPAR", "45.99", "0.00"]);
    }
}
