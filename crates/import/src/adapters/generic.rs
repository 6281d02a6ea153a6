use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{debit_credit_amount, emit, outcome, AdapterOutput, BankAdapter, RowOutcome};
use crate::cancel::{CancellationToken, Cancelled};
use crate::extract::{RowCandidate, RowKind};
use crate::tokens::{
    is_amount_token, is_blank, numeric_arity, parse_date_with, slot_value, trailing_slot_start,
};
use crate::util::normalize_text;
use ledgerline_core::{BankFormatVariant, Warning, WarningKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmountMode {
    Single,
    DebitCredit,
}

/// Fallback adapter for exports no bank signature claims. The date format and
/// amount layout are inferred from the rows themselves, so the whole data set
/// is read before any row is converted.
#[derive(Debug, Clone)]
pub struct GenericAdapter {
    date_formats: Vec<String>,
}

impl GenericAdapter {
    pub fn new(date_formats: Vec<String>) -> Self {
        Self { date_formats }
    }

    /// The first format that parses a date on every row, else the one that
    /// parses the most rows.
    fn choose_date_format(&self, rows: &[RowCandidate]) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for format in &self.date_formats {
            let parsed = rows.iter().filter(|r| find_date(&r.tokens, format).is_some()).count();
            if parsed == rows.len() && parsed > 0 {
                return Some(format.as_str());
            }
            if best.map_or(true, |(_, n)| parsed > n) {
                best = Some((format.as_str(), parsed));
            }
        }
        best.map(|(f, _)| f)
    }

    /// Modal trailing slot count; ties go to the smaller count. A trailing
    /// balance column is not an amount slot.
    fn choose_amount_mode(rows: &[RowCandidate], trailing_balance: bool) -> AmountMode {
        let mut counts = std::collections::BTreeMap::new();
        for row in rows {
            let mut arity = numeric_arity(&row.tokens);
            if trailing_balance && arity >= 2 {
                arity -= 1;
            }
            if arity > 0 {
                *counts.entry(arity).or_insert(0usize) += 1;
            }
        }
        let modal = counts
            .iter()
            .max_by(|(a_arity, a_n), (b_arity, b_n)| a_n.cmp(b_n).then(b_arity.cmp(a_arity)))
            .map(|(arity, _)| *arity)
            .unwrap_or(1);
        if modal >= 2 {
            AmountMode::DebitCredit
        } else {
            AmountMode::Single
        }
    }

    fn read(
        &self,
        row: &RowCandidate,
        format: &str,
        mode: AmountMode,
        trailing_balance: bool,
    ) -> Result<RowOutcome, Warning> {
        let tokens = &row.tokens;
        let Some((date_index, date)) = find_date(tokens, format) else {
            return Err(Warning::new(
                WarningKind::MissingDate,
                format!("no date matching {format} on transaction line"),
            ));
        };

        let slot_start = trailing_slot_start(tokens);
        let (slots, narrative): (Vec<&str>, Vec<&str>) = if slot_start < tokens.len() {
            let mut slots: Vec<&str> = tokens[slot_start..].iter().map(String::as_str).collect();
            if trailing_balance && slots.len() >= 2 {
                slots.pop();
            }
            let narrative = tokens[..slot_start]
                .iter()
                .enumerate()
                .filter(|(i, t)| *i != date_index && !is_blank(t))
                .map(|(_, t)| t.trim())
                .collect();
            (slots, narrative)
        } else {
            // Amount column not at the end of the row.
            let (amounts, rest): (Vec<_>, Vec<_>) = tokens
                .iter()
                .enumerate()
                .filter(|(i, t)| *i != date_index && !is_blank(t))
                .partition(|(_, t)| is_amount_token(t));
            (
                amounts.into_iter().map(|(_, t)| t.as_str()).collect(),
                rest.into_iter().map(|(_, t)| t.trim()).collect(),
            )
        };
        if slots.is_empty() {
            return Err(Warning::new(WarningKind::MissingAmount, "no amount on transaction line"));
        }

        let value = |i: usize| -> Result<Decimal, Warning> {
            let token = slots.get(i).copied().unwrap_or_default();
            slot_value(token).ok_or_else(|| {
                Warning::new(WarningKind::MissingAmount, format!("unreadable amount '{token}'"))
            })
        };
        let amount = match mode {
            AmountMode::DebitCredit if slots.len() >= 2 => debit_credit_amount(value(0)?, value(1)?)?,
            _ => value(0)?,
        };
        Ok(emit(date, &narrative.join(" "), amount, BankFormatVariant::Generic))
    }
}

/// Whether the last named header column is a running balance.
fn ends_with_balance(tokens: &[String]) -> bool {
    tokens
        .iter()
        .rev()
        .find(|t| !is_blank(t))
        .is_some_and(|t| normalize_text(t).contains("balance"))
}

fn find_date(tokens: &[String], format: &str) -> Option<(usize, NaiveDate)> {
    tokens
        .iter()
        .enumerate()
        .find_map(|(i, t)| parse_date_with(t, format).map(|d| (i, d)))
}

impl BankAdapter for GenericAdapter {
    fn variant(&self) -> BankFormatVariant {
        BankFormatVariant::Generic
    }

    fn parse_row(&self, row: &RowCandidate) -> RowOutcome {
        let rows = std::slice::from_ref(row);
        match self.choose_date_format(rows) {
            Some(format) => {
                outcome(self.read(row, format, Self::choose_amount_mode(rows, false), false))
            }
            None => RowOutcome::Drop(Warning::new(WarningKind::MissingDate, "no date formats configured")),
        }
    }

    fn convert(
        &self,
        rows: &mut dyn Iterator<Item = RowCandidate>,
        cancel: &CancellationToken,
    ) -> Result<AdapterOutput, Cancelled> {
        let mut data = Vec::new();
        let mut trailing_balance = false;
        for row in rows {
            cancel.check()?;
            if row.kind == RowKind::Header {
                trailing_balance |= ends_with_balance(&row.tokens);
            } else if row.is_data() && !row.is_blank() {
                data.push(row);
            }
        }

        let mut output = AdapterOutput::default();
        let Some(format) = self.choose_date_format(&data) else {
            return Ok(output);
        };
        let mode = Self::choose_amount_mode(&data, trailing_balance);
        tracing::debug!(format, ?mode, trailing_balance, rows = data.len(), "generic layout chosen");

        for row in &data {
            cancel.check()?;
            let result = outcome(self.read(row, format, mode, trailing_balance));
            output.record(row, result);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::data_row;
    use crate::tokens::DEFAULT_GENERIC_DATE_FORMATS;
    use ledgerline_core::Money;

    fn adapter() -> GenericAdapter {
        GenericAdapter::new(DEFAULT_GENERIC_DATE_FORMATS.iter().map(|f| f.to_string()).collect())
    }

    fn convert(rows: Vec<RowCandidate>) -> AdapterOutput {
        adapter().convert(&mut rows.into_iter(), &CancellationToken::new()).unwrap()
    }

    #[test]
    fn single_amount_with_month_names() {
        let output = convert(vec![
            data_row(1, &["15 Jan 2024", "Coffee", "-30.00"]),
            data_row(2, &["16 Jan 2024", "Refund", "12.50"]),
        ]);
        assert_eq!(output.transactions.len(), 2);
        assert_eq!(output.transactions[0].amount, Money::from_cents(-3000));
        assert_eq!(output.transactions[0].bank_source, BankFormatVariant::Generic);
        assert_eq!(output.transactions[1].description, "Refund");
    }

    #[test]
    fn modal_two_slots_reads_debit_credit() {
        let output = convert(vec![
            data_row(1, &["2024/01/15", "SPAR", "45.99", ""]),
            data_row(2, &["2024/01/16", "SALARY", "", "1000.00"]),
            data_row(3, &["2024/01/17", "ODD ONE", "-5.00"]),
        ]);
        let amounts: Vec<Money> = output.transactions.iter().map(|t| t.amount).collect();
        assert_eq!(
            amounts,
            vec![Money::from_cents(-4599), Money::from_cents(100_000), Money::from_cents(-500)]
        );
    }

    #[test]
    fn two_slots_without_header_read_as_debit_credit() {
        // An amount plus a running balance is indistinguishable from debit and
        // credit by column count alone.
        let output = convert(vec![
            data_row(1, &["15 Jan 2024", "Coffee", "-30.00", "970.00"]),
            data_row(2, &["16 Jan 2024", "Refund", "12.50", "982.50"]),
        ]);
        assert!(output.transactions.is_empty());
        assert!(output.warnings.iter().all(|w| w.kind == WarningKind::AmbiguousDebitCredit));
    }

    #[test]
    fn balance_header_keeps_single_amount() {
        let header = RowCandidate {
            kind: RowKind::Header,
            ..data_row(1, &["Date", "Description", "Amount", "Balance"])
        };
        let output = convert(vec![
            header,
            data_row(2, &["15 Jan 2024", "Coffee", "-30.00", "970.00"]),
            data_row(3, &["16 Jan 2024", "Refund", "12.50", "982.50"]),
        ]);
        assert!(output.warnings.is_empty());
        let amounts: Vec<Money> = output.transactions.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![Money::from_cents(-3000), Money::from_cents(1250)]);
    }

    #[test]
    fn balance_header_after_debit_credit_columns() {
        let header = RowCandidate {
            kind: RowKind::Header,
            ..data_row(1, &["Date", "Description", "Debit", "Credit", "Balance"])
        };
        let output = convert(vec![
            header,
            data_row(2, &["15 Jan 2024", "Coffee", "30.00", "", "970.00"]),
            data_row(3, &["16 Jan 2024", "Refund", "", "12.50", "982.50"]),
        ]);
        let amounts: Vec<Money> = output.transactions.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![Money::from_cents(-3000), Money::from_cents(1250)]);
    }

    #[test]
    fn prefers_format_that_parses_every_row() {
        // 01/02/2024 parses under %d/%m/%Y; only that format parses all rows
        let output = convert(vec![
            data_row(1, &["01/02/2024", "A", "1.00"]),
            data_row(2, &["13/02/2024", "B", "2.00"]),
        ]);
        assert_eq!(output.transactions[0].date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn falls_back_to_format_parsing_most_rows() {
        let output = convert(vec![
            data_row(1, &["2024-01-15", "A", "1.00"]),
            data_row(2, &["2024-01-16", "B", "2.00"]),
            data_row(3, &["yesterday", "C", "3.00"]),
        ]);
        assert_eq!(output.transactions.len(), 2);
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].kind, WarningKind::MissingDate);
        assert_eq!(output.warnings[0].line, Some(3));
    }

    #[test]
    fn amount_before_description_is_found() {
        let output = convert(vec![data_row(1, &["2024-01-15", "-45.99", "SPAR"])]);
        assert_eq!(output.transactions[0].amount, Money::from_cents(-4599));
        assert_eq!(output.transactions[0].description, "SPAR");
    }

    #[test]
    fn row_without_amount_is_dropped() {
        let output = convert(vec![data_row(1, &["2024-01-15", "SPAR"])]);
        assert!(output.transactions.is_empty());
        assert_eq!(output.warnings[0].kind, WarningKind::MissingAmount);
    }
}
