//! Token-level classification shared by the extractor, the detector and the adapters.

use std::str::FromStr;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

re!(re_compact_date, r"^\d{8}$");
re!(re_day_slash_date, r"^\d{1,2}/\d{1,2}/\d{4}$");
re!(re_iso_date, r"^\d{4}-\d{2}-\d{2}$");
re!(re_amount_body, r"^(?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2}$");

/// Ordered fallback formats for the Generic adapter.
pub const DEFAULT_GENERIC_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%Y%m%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// The date-token shapes the detector distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateShape {
    /// `YYYYMMDD`
    Compact8,
    /// `DD/MM/YYYY`
    DaySlash,
    /// `YYYY-MM-DD`
    IsoDash,
}

impl DateShape {
    pub const ALL: [DateShape; 3] = [DateShape::Compact8, DateShape::DaySlash, DateShape::IsoDash];

    fn pattern(self) -> &'static Regex {
        match self {
            DateShape::Compact8 => re_compact_date(),
            DateShape::DaySlash => re_day_slash_date(),
            DateShape::IsoDash => re_iso_date(),
        }
    }

    /// Parse `token` strictly in this shape.
    pub fn parse(self, token: &str) -> Option<NaiveDate> {
        let token = token.trim();
        if !self.pattern().is_match(token) {
            return None;
        }
        match self {
            DateShape::Compact8 => parse_compact(token),
            DateShape::DaySlash => NaiveDate::parse_from_str(token, "%d/%m/%Y").ok(),
            DateShape::IsoDash => NaiveDate::parse_from_str(token, "%Y-%m-%d").ok(),
        }
    }

    /// The shape of `token`, if it is a valid date in any known shape.
    pub fn of(token: &str) -> Option<DateShape> {
        Self::ALL.into_iter().find(|shape| shape.parse(token).is_some())
    }
}

fn parse_compact(token: &str) -> Option<NaiveDate> {
    let y: i32 = token.get(0..4)?.parse().ok()?;
    let m: u32 = token.get(4..6)?.parse().ok()?;
    let d: u32 = token.get(6..8)?.parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Parse a date with a chrono format string. `%Y%m%d` goes through the fixed-width
/// parser so an 8-digit token never splits ambiguously.
pub fn parse_date_with(token: &str, format: &str) -> Option<NaiveDate> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if format == "%Y%m%d" {
        return DateShape::Compact8.parse(token);
    }
    NaiveDate::parse_from_str(token, format).ok()
}

pub fn is_date_token(token: &str, formats: &[String]) -> bool {
    DateShape::of(token).is_some() || formats.iter().any(|f| parse_date_with(token, f).is_some())
}

/// Parse a statement amount. Accepts thousands commas, a leading `R` or `$`, a
/// leading sign, a trailing `-`, and accounting parentheses. Exactly two decimal
/// places are required, so bare integers (reference numbers, 8-digit dates) are
/// never amounts.
pub fn parse_amount(token: &str) -> Option<Decimal> {
    let mut s = token.trim();
    if s.is_empty() {
        return None;
    }
    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = true;
        s = inner.trim();
    }
    if let Some(rest) = s.strip_suffix('-') {
        negative = true;
        s = rest.trim_end();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest.trim_start();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.trim_start();
    }
    if let Some(rest) = s.strip_prefix('R').or_else(|| s.strip_prefix('$')) {
        s = rest.trim_start();
    }
    if !re_amount_body().is_match(s) {
        return None;
    }
    let value = Decimal::from_str(&s.replace(',', "")).ok()?;
    Some(if negative { -value } else { value })
}

pub fn is_amount_token(token: &str) -> bool {
    parse_amount(token).is_some()
}

pub fn is_blank(token: &str) -> bool {
    token.trim().is_empty()
}

/// Index where the trailing run of amount-or-blank tokens starts. Equal to
/// `tokens.len()` when the row ends in text.
pub fn trailing_slot_start<S: AsRef<str>>(tokens: &[S]) -> usize {
    let mut start = tokens.len();
    while start > 0 {
        let t = tokens[start - 1].as_ref();
        if is_blank(t) || is_amount_token(t) {
            start -= 1;
        } else {
            break;
        }
    }
    start
}

/// Number of trailing numeric columns in a row (blank cells count).
pub fn numeric_arity<S: AsRef<str>>(tokens: &[S]) -> usize {
    tokens.len() - trailing_slot_start(tokens)
}

/// Value of a numeric slot; a blank cell is zero.
pub fn slot_value(token: &str) -> Option<Decimal> {
    if is_blank(token) {
        Some(Decimal::ZERO)
    } else {
        parse_amount(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn date_shapes() {
        assert_eq!(DateShape::of("20240115"), Some(DateShape::Compact8));
        assert_eq!(DateShape::of("15/01/2024"), Some(DateShape::DaySlash));
        assert_eq!(DateShape::of("2024-01-15"), Some(DateShape::IsoDash));
        assert_eq!(DateShape::of("15 Jan 2024"), None);
    }

    #[test]
    fn compact_rejects_invalid_calendar_dates() {
        assert_eq!(DateShape::Compact8.parse("20241340"), None);
        assert_eq!(DateShape::of("12345678"), None);
    }

    #[test]
    fn day_slash_is_day_first() {
        assert_eq!(
            DateShape::DaySlash.parse("03/02/2024"),
            NaiveDate::from_ymd_opt(2024, 2, 3)
        );
    }

    #[test]
    fn generic_formats_parse_month_names() {
        let formats: Vec<String> = DEFAULT_GENERIC_DATE_FORMATS.iter().map(|s| s.to_string()).collect();
        assert!(is_date_token("15 Jan 2024", &formats));
        assert!(!is_date_token("WOOLWORTHS", &formats));
    }

    #[test]
    fn amounts_require_cents() {
        assert_eq!(parse_amount("150.00"), Some(dec("150.00")));
        assert_eq!(parse_amount("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("R1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("-45.99"), Some(dec("-45.99")));
        assert_eq!(parse_amount("(75.25)"), Some(dec("-75.25")));
        assert_eq!(parse_amount("150.00-"), Some(dec("-150.00")));
        assert_eq!(parse_amount("123"), None);
        assert_eq!(parse_amount("20240115"), None);
        assert_eq!(parse_amount("12.5"), None);
        assert_eq!(parse_amount("SPAR"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn trailing_slots_include_blank_cells() {
        let row = ["2024-01-15", "SPAR", "", "45.99", "1,000.00"];
        assert_eq!(trailing_slot_start(&row), 2);
        assert_eq!(numeric_arity(&row), 3);
        assert_eq!(numeric_arity(&["2024-01-15", "SPAR"]), 0);
    }

    #[test]
    fn slot_value_blank_is_zero() {
        assert_eq!(slot_value(""), Some(Decimal::ZERO));
        assert_eq!(slot_value("12.00"), Some(dec("12.00")));
        assert_eq!(slot_value("abc"), None);
    }
}
