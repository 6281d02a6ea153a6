//! Raw statement text to row candidates.
//!
//! Extraction is a single lazy pass: lines are pulled from the source one at a
//! time and at most one data row is held back, waiting for continuation lines.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::IngestConfig;
use crate::region::RegionLines;
use crate::tokens::{is_amount_token, is_blank, is_date_token, trailing_slot_start};
use crate::util::normalize_text;
use ledgerline_core::{AmountType, PageRegionText, RegionKind, Warning};

re!(re_column_gap, r"\s*\t\s*|\s{2,}");

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const SNIFF_LINES: usize = 5;

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("required region `{0}` is absent on every page")]
    RegionAbsent(RegionKind),
}

/// Where a statement's text comes from.
#[derive(Debug, Clone, Copy)]
pub enum StatementSource<'a> {
    /// Native text, split on column gaps.
    Text(&'a str),
    /// A delimited export. `None` sniffs the delimiter.
    Delimited { text: &'a str, delimiter: Option<u8> },
    /// OCR text per page region.
    Regions { pages: &'a [PageRegionText], amount_type: AmountType },
}

impl<'a> StatementSource<'a> {
    /// Delimited when a delimiter is given or one can be sniffed, plain text otherwise.
    pub fn infer(text: &'a str, delimiter: Option<u8>) -> Self {
        match delimiter.or_else(|| sniff_delimiter(text)) {
            Some(d) => StatementSource::Delimited { text, delimiter: Some(d) },
            None => StatementSource::Text(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    Header,
    Data,
    Continuation,
}

/// One physical (or merged) statement line as an ordered token list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowCandidate {
    /// 1-based line in the source text, or within the page for region rows.
    pub line: usize,
    pub page: Option<usize>,
    pub kind: RowKind,
    pub tokens: Vec<String>,
}

impl RowCandidate {
    pub fn is_data(&self) -> bool {
        self.kind == RowKind::Data
    }

    pub fn is_blank(&self) -> bool {
        self.tokens.iter().all(|t| is_blank(t))
    }

    /// Locate a warning on this row.
    pub fn locate(&self, warning: Warning) -> Warning {
        let warning = warning.at_line(self.line);
        match self.page {
            Some(p) => warning.on_page(p),
            None => warning,
        }
    }

    fn append_continuation(&mut self, text: &str, date_formats: &[String]) {
        let slot_start = trailing_slot_start(&self.tokens);
        let narrative = (0..slot_start)
            .rev()
            .find(|&i| !is_blank(&self.tokens[i]) && !is_date_token(&self.tokens[i], date_formats));
        match narrative {
            Some(i) => {
                let merged = format!("{} {}", self.tokens[i], text);
                self.tokens[i] = merged;
            }
            None => self.tokens.insert(slot_start, text.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub merge_continuations: bool,
    pub date_formats: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for ExtractOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            merge_continuations: config.merge_continuations,
            date_formats: config.generic.date_formats.clone(),
        }
    }
}

/// Split a plain-text line on column gaps (tabs or 2+ spaces). A line without
/// any gap falls back to single-whitespace splitting.
pub fn split_whitespace_columns(line: &str) -> Vec<String> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    if re_column_gap().is_match(line) {
        re_column_gap()
            .split(line)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        line.split_whitespace().map(str::to_string).collect()
    }
}

/// Guess the field delimiter of a delimited export. A candidate qualifies when it
/// appears the same non-zero number of times on each of the first non-empty
/// lines; the most frequent qualifying candidate wins.
pub fn sniff_delimiter(text: &str) -> Option<u8> {
    let sample: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if sample.len() < 2 {
        return None;
    }
    let mut best: Option<(u8, usize)> = None;
    for candidate in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = sample
            .iter()
            .map(|l| l.bytes().filter(|b| *b == candidate).count())
            .collect();
        let first = counts[0];
        if first == 0 || counts.iter().any(|c| *c != first) {
            continue;
        }
        if best.map_or(true, |(_, n)| first > n) {
            best = Some((candidate, first));
        }
    }
    best.map(|(d, _)| d)
}

/// A physical line before classification.
#[derive(Debug, Clone)]
pub(crate) struct RawLine {
    pub line: usize,
    pub page: Option<usize>,
    pub tokens: Vec<String>,
}

pub(crate) struct TextLines<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl Iterator for TextLines<'_> {
    type Item = RawLine;

    fn next(&mut self) -> Option<RawLine> {
        let (i, line) = self.lines.next()?;
        Some(RawLine { line: i + 1, page: None, tokens: split_whitespace_columns(line) })
    }
}

pub(crate) struct DelimitedLines<'a> {
    records: csv::StringRecordsIntoIter<&'a [u8]>,
    fallback_line: usize,
}

impl Iterator for DelimitedLines<'_> {
    type Item = RawLine;

    fn next(&mut self) -> Option<RawLine> {
        loop {
            self.fallback_line += 1;
            match self.records.next()? {
                Ok(record) => {
                    let line = record
                        .position()
                        .map(|p| p.line() as usize)
                        .unwrap_or(self.fallback_line);
                    let tokens = record.iter().map(str::to_string).collect();
                    return Some(RawLine { line, page: None, tokens });
                }
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable delimited record");
                }
            }
        }
    }
}

pub(crate) enum LineSource<'a> {
    Text(TextLines<'a>),
    Delimited(DelimitedLines<'a>),
    Regions(RegionLines<'a>),
}

impl Iterator for LineSource<'_> {
    type Item = RawLine;

    fn next(&mut self) -> Option<RawLine> {
        match self {
            LineSource::Text(lines) => lines.next(),
            LineSource::Delimited(lines) => lines.next(),
            LineSource::Regions(lines) => lines.next(),
        }
    }
}

impl LineSource<'_> {
    fn take_warnings(&mut self) -> Vec<Warning> {
        match self {
            LineSource::Regions(lines) => lines.take_warnings(),
            _ => Vec::new(),
        }
    }
}

/// Lazy row-candidate stream. Extraction warnings accumulate while rows are
/// consumed and are drained with [`Rows::take_warnings`].
pub struct Rows<'a> {
    lines: LineSource<'a>,
    options: ExtractOptions,
    pending: Option<RowCandidate>,
    queued: Option<RowCandidate>,
    seen_data: bool,
    header_lines: HashSet<String>,
}

impl<'a> Rows<'a> {
    fn new(lines: LineSource<'a>, options: ExtractOptions) -> Self {
        Self {
            lines,
            options,
            pending: None,
            queued: None,
            seen_data: false,
            header_lines: HashSet::new(),
        }
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.lines.take_warnings()
    }

    fn classify(&mut self, tokens: &[String]) -> RowKind {
        let formats = &self.options.date_formats;
        let is_data = tokens
            .iter()
            .any(|t| is_amount_token(t) || is_date_token(t, formats));
        if is_data {
            return RowKind::Data;
        }
        let signature = normalize_text(&tokens.join(" "));
        if !self.seen_data {
            self.header_lines.insert(signature);
            RowKind::Header
        } else if self.header_lines.contains(&signature) {
            // Header repeated at a page break.
            RowKind::Header
        } else {
            RowKind::Continuation
        }
    }

    /// Emit `row` after any held-back data row.
    fn release(&mut self, row: RowCandidate) -> RowCandidate {
        match self.pending.take() {
            Some(prev) => {
                self.queued = Some(row);
                prev
            }
            None => row,
        }
    }
}

impl Iterator for Rows<'_> {
    type Item = RowCandidate;

    fn next(&mut self) -> Option<RowCandidate> {
        if let Some(row) = self.queued.take() {
            return Some(row);
        }
        while let Some(raw) = self.lines.next() {
            if raw.tokens.iter().all(|t| is_blank(t)) {
                continue;
            }
            let kind = self.classify(&raw.tokens);
            let row = RowCandidate { line: raw.line, page: raw.page, kind, tokens: raw.tokens };
            match kind {
                RowKind::Data => {
                    self.seen_data = true;
                    if let Some(prev) = self.pending.replace(row) {
                        return Some(prev);
                    }
                }
                RowKind::Continuation if self.options.merge_continuations => {
                    let text = row
                        .tokens
                        .iter()
                        .map(|t| t.trim())
                        .filter(|t| !t.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ");
                    let formats = &self.options.date_formats;
                    match self.pending.as_mut() {
                        Some(prev) => prev.append_continuation(&text, formats),
                        None => return Some(row),
                    }
                }
                _ => return Some(self.release(row)),
            }
        }
        self.pending.take()
    }
}

/// Turns a [`StatementSource`] into row candidates. Knows nothing about banks.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn rows<'a>(&self, source: &StatementSource<'a>) -> Result<Rows<'a>, ExtractError> {
        let lines = match *source {
            StatementSource::Text(text) => {
                LineSource::Text(TextLines { lines: text.lines().enumerate() })
            }
            StatementSource::Delimited { text, delimiter } => {
                let delimiter = delimiter.or_else(|| sniff_delimiter(text)).unwrap_or(b',');
                let records = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .trim(csv::Trim::All)
                    .delimiter(delimiter)
                    .from_reader(text.as_bytes())
                    .into_records();
                LineSource::Delimited(DelimitedLines { records, fallback_line: 0 })
            }
            StatementSource::Regions { pages, amount_type } => {
                LineSource::Regions(RegionLines::new(pages, amount_type)?)
            }
        };
        Ok(Rows::new(lines, self.options.clone()))
    }
}
