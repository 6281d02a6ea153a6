//! Bank format detection by additive signature scoring.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::extract::{RowCandidate, RowKind};
use crate::tokens::{numeric_arity, DateShape};
use crate::util::normalize_text;
use ledgerline_core::BankFormatVariant;

const REQUIRED_HEADER_WEIGHT: u32 = 2;
const OPTIONAL_HEADER_WEIGHT: u32 = 1;
const ARITY_WEIGHT: u32 = 2;
const DATE_SHAPE_WEIGHT: u32 = 3;

/// What a specific bank export looks like.
#[derive(Debug, Clone, Copy)]
pub struct FormatSignature {
    pub variant: BankFormatVariant,
    pub required_headers: &'static [&'static str],
    pub optional_headers: &'static [&'static str],
    /// Trailing numeric columns per data row.
    pub arity: usize,
    pub date_shape: DateShape,
}

pub const SIGNATURES: [FormatSignature; 4] = [
    FormatSignature {
        variant: BankFormatVariant::StandardBankText,
        required_headers: &["service fee"],
        optional_headers: &["debits", "credits", "balance"],
        arity: 4,
        date_shape: DateShape::Compact8,
    },
    FormatSignature {
        variant: BankFormatVariant::AbsaDebitCredit,
        required_headers: &["debit", "credit"],
        optional_headers: &["description"],
        arity: 2,
        date_shape: DateShape::DaySlash,
    },
    FormatSignature {
        variant: BankFormatVariant::CapitecSimpleAmount,
        required_headers: &["amount"],
        optional_headers: &["description", "posting date"],
        arity: 1,
        date_shape: DateShape::IsoDash,
    },
    FormatSignature {
        variant: BankFormatVariant::CapitecMoneyInOut,
        required_headers: &["money in", "money out"],
        optional_headers: &["fee"],
        arity: 3,
        date_shape: DateShape::IsoDash,
    },
];

impl FormatSignature {
    pub fn for_variant(variant: BankFormatVariant) -> Option<&'static FormatSignature> {
        SIGNATURES.iter().find(|s| s.variant == variant)
    }

    pub fn max_points(&self) -> u32 {
        self.required_headers.len() as u32 * REQUIRED_HEADER_WEIGHT
            + self.optional_headers.len() as u32 * OPTIONAL_HEADER_WEIGHT
            + ARITY_WEIGHT
            + DATE_SHAPE_WEIGHT
    }

    pub fn score(&self, sample: &Sample) -> SignatureScore {
        let mut points = 0;
        let mut satisfied = 0;
        let headers = self
            .required_headers
            .iter()
            .map(|h| (h, REQUIRED_HEADER_WEIGHT))
            .chain(self.optional_headers.iter().map(|h| (h, OPTIONAL_HEADER_WEIGHT)));
        for (header, weight) in headers {
            if sample.header_text.contains(header) {
                points += weight;
                satisfied += 1;
            }
        }
        if sample.majority(|row| numeric_arity(row) == self.arity) {
            points += ARITY_WEIGHT;
            satisfied += 1;
        }
        if sample.majority(|row| first_date_shape(row) == Some(self.date_shape)) {
            points += DATE_SHAPE_WEIGHT;
            satisfied += 1;
        }
        SignatureScore { variant: self.variant, points, max_points: self.max_points(), satisfied }
    }
}

fn first_date_shape(row: &[String]) -> Option<DateShape> {
    row.iter().find_map(|t| DateShape::of(t))
}

/// Header text and data rows handed to the detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    header_text: String,
    rows: Vec<Vec<String>>,
}

impl Sample {
    pub fn new(headers: &[Vec<String>], rows: Vec<Vec<String>>) -> Self {
        let header_text = headers
            .iter()
            .map(|h| normalize_text(&h.join(" ")))
            .collect::<Vec<_>>()
            .join(" | ");
        Self { header_text, rows }
    }

    /// Header rows and data rows of `rows`; continuation rows are ignored.
    pub fn from_rows(rows: &[RowCandidate]) -> Self {
        let headers: Vec<Vec<String>> = rows
            .iter()
            .filter(|r| r.kind == RowKind::Header)
            .map(|r| r.tokens.clone())
            .collect();
        let data = rows.iter().filter(|r| r.is_data()).map(|r| r.tokens.clone()).collect();
        Self::new(&headers, data)
    }

    pub fn data_rows(&self) -> usize {
        self.rows.len()
    }

    fn majority(&self, predicate: impl Fn(&[String]) -> bool) -> bool {
        let hits = self.rows.iter().filter(|r| predicate(r)).count();
        hits * 2 > self.rows.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureScore {
    pub variant: BankFormatVariant,
    pub points: u32,
    pub max_points: u32,
    /// Number of predicates that contributed.
    pub satisfied: u32,
}

impl SignatureScore {
    pub fn confidence(&self) -> f64 {
        if self.max_points == 0 {
            0.0
        } else {
            f64::from(self.points) / f64::from(self.max_points)
        }
    }

    /// Compare normalized scores exactly.
    fn cmp_ratio(&self, other: &SignatureScore) -> Ordering {
        let lhs = u64::from(self.points) * u64::from(other.max_points);
        let rhs = u64::from(other.points) * u64::from(self.max_points);
        lhs.cmp(&rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub variant: BankFormatVariant,
    pub confidence: f64,
}

impl DetectionResult {
    pub fn generic(confidence: f64) -> Self {
        Self { variant: BankFormatVariant::Generic, confidence }
    }
}

/// Scores a sample against every known signature. Pure: the same sample always
/// yields the same result.
#[derive(Debug, Clone, Copy)]
pub struct BankFormatDetector {
    min_confidence: f64,
}

impl Default for BankFormatDetector {
    fn default() -> Self {
        Self { min_confidence: 0.5 }
    }
}

impl BankFormatDetector {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    pub fn score(&self, sample: &Sample) -> Vec<SignatureScore> {
        SIGNATURES.iter().map(|s| s.score(sample)).collect()
    }

    pub fn detect(&self, sample: &Sample) -> DetectionResult {
        let scores = self.score(sample);
        let result = resolve(&scores, self.min_confidence);
        tracing::info!(
            variant = %result.variant,
            confidence = result.confidence,
            data_rows = sample.data_rows(),
            "detected statement format"
        );
        result
    }
}

/// Pick the winner among `scores`. Ties on normalized score go to the variant
/// with more satisfied predicates; a remaining tie, or a best score below
/// `min_confidence`, selects Generic.
pub(crate) fn resolve(scores: &[SignatureScore], min_confidence: f64) -> DetectionResult {
    let Some(best) = scores.iter().max_by(|a, b| a.cmp_ratio(b)) else {
        return DetectionResult::generic(0.0);
    };
    let confidence = best.confidence();
    if best.points == 0 || confidence < min_confidence {
        return DetectionResult::generic(confidence);
    }
    let tied: Vec<&SignatureScore> =
        scores.iter().filter(|s| s.cmp_ratio(best) == Ordering::Equal).collect();
    let most_satisfied = tied.iter().map(|s| s.satisfied).max().unwrap_or(0);
    let mut leaders = tied.iter().filter(|s| s.satisfied == most_satisfied);
    match (leaders.next(), leaders.next()) {
        (Some(winner), None) => DetectionResult { variant: winner.variant, confidence },
        _ => DetectionResult::generic(confidence),
    }
}
