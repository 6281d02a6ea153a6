//! Per-format conversion of row candidates into canonical transactions.

mod absa;
mod capitec;
mod generic;
mod standard_bank;

pub use absa::AbsaAdapter;
pub use capitec::{CapitecMoneyInOutAdapter, CapitecSimpleAdapter};
pub use generic::GenericAdapter;
pub use standard_bank::StandardBankAdapter;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cancel::{CancellationToken, Cancelled};
use crate::config::IngestConfig;
use crate::extract::RowCandidate;
use crate::tokens::{is_blank, slot_value};
use ledgerline_core::{BankFormatVariant, Money, Transaction, Warning, WarningKind};

/// What an adapter made of a single data row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Emit(Transaction),
    /// The row was a transaction line that could not be read.
    Drop(Warning),
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterOutput {
    pub transactions: Vec<Transaction>,
    pub warnings: Vec<Warning>,
}

impl AdapterOutput {
    pub fn dropped(&self) -> usize {
        self.warnings.len()
    }

    fn record(&mut self, row: &RowCandidate, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Emit(tx) => self.transactions.push(tx),
            RowOutcome::Drop(warning) => {
                let warning = row.locate(warning);
                tracing::debug!(%warning, "row dropped");
                self.warnings.push(warning);
            }
            RowOutcome::Skip => {}
        }
    }
}

/// Converts rows of one bank's export into transactions with resolved signs.
pub trait BankAdapter: Send + Sync {
    fn variant(&self) -> BankFormatVariant;

    /// Interpret one data row. Header, continuation and blank rows never reach here.
    fn parse_row(&self, row: &RowCandidate) -> RowOutcome;

    /// Convert a whole row stream, checking `cancel` between rows.
    fn convert(
        &self,
        rows: &mut dyn Iterator<Item = RowCandidate>,
        cancel: &CancellationToken,
    ) -> Result<AdapterOutput, Cancelled> {
        let mut output = AdapterOutput::default();
        for row in rows {
            cancel.check()?;
            if !row.is_data() || row.is_blank() {
                continue;
            }
            let outcome = self.parse_row(&row);
            output.record(&row, outcome);
        }
        Ok(output)
    }
}

pub fn adapter_for(variant: BankFormatVariant, config: &IngestConfig) -> Box<dyn BankAdapter> {
    match variant {
        BankFormatVariant::StandardBankText => {
            Box::new(StandardBankAdapter::new(config.standard_bank.clone()))
        }
        BankFormatVariant::AbsaDebitCredit => Box::new(AbsaAdapter),
        BankFormatVariant::CapitecSimpleAmount => Box::new(CapitecSimpleAdapter),
        BankFormatVariant::CapitecMoneyInOut => Box::new(CapitecMoneyInOutAdapter),
        BankFormatVariant::Generic => {
            Box::new(GenericAdapter::new(config.generic.date_formats.clone()))
        }
    }
}

/// A row split into its date, narrative and trailing numeric slots.
#[derive(Debug)]
pub(crate) struct RowParts<'r> {
    pub date: NaiveDate,
    pub description: String,
    pub slots: &'r [String],
}

impl<'r> RowParts<'r> {
    /// Split `row` at `slot_start`. The date is the first narrative-side token
    /// accepted by `parse_date`.
    pub fn split(
        row: &'r RowCandidate,
        slot_start: usize,
        parse_date: impl Fn(&str) -> Option<NaiveDate>,
        date_label: &str,
    ) -> Result<Self, Warning> {
        let head = &row.tokens[..slot_start];
        let Some((date_index, date)) =
            head.iter().enumerate().find_map(|(i, t)| parse_date(t).map(|d| (i, d)))
        else {
            return Err(Warning::new(
                WarningKind::MissingDate,
                format!("no {date_label} date on transaction line"),
            ));
        };
        if slot_start == row.tokens.len() {
            return Err(Warning::new(WarningKind::MissingAmount, "no amount columns on transaction line"));
        }
        let description = head
            .iter()
            .enumerate()
            .filter(|(i, t)| *i != date_index && !is_blank(t))
            .map(|(_, t)| t.trim())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Self { date, description, slots: &row.tokens[slot_start..] })
    }

    /// Value of slot `index`; a missing or blank slot is zero.
    pub fn slot(&self, index: usize) -> Result<Decimal, Warning> {
        match self.slots.get(index) {
            None => Ok(Decimal::ZERO),
            Some(token) => slot_value(token).ok_or_else(|| {
                Warning::new(WarningKind::MissingAmount, format!("unreadable amount '{token}'"))
            }),
        }
    }
}

/// Resolve a debit/credit pair into a signed amount. Debits are outflows.
pub(crate) fn debit_credit_amount(debit: Decimal, credit: Decimal) -> Result<Decimal, Warning> {
    match (debit.is_zero(), credit.is_zero()) {
        (false, false) => Err(Warning::new(
            WarningKind::AmbiguousDebitCredit,
            format!("both debit ({debit}) and credit ({credit}) are set"),
        )),
        (false, true) => Ok(-debit.abs()),
        (true, false) => Ok(credit.abs()),
        (true, true) => Err(no_transactional_amount()),
    }
}

pub(crate) fn no_transactional_amount() -> Warning {
    Warning::new(WarningKind::NoTransactionalAmount, "transaction line has no non-zero amount")
}

/// Build the transaction, dropping rows whose amount resolves to zero.
pub(crate) fn emit(
    date: NaiveDate,
    description: &str,
    amount: Decimal,
    variant: BankFormatVariant,
) -> RowOutcome {
    let amount = Money::from_decimal(amount);
    if amount.is_zero() {
        return RowOutcome::Drop(no_transactional_amount());
    }
    RowOutcome::Emit(Transaction::new(date, description, amount, variant))
}

/// Collapse a `Result<RowOutcome, Warning>` built with `?` into an outcome.
pub(crate) fn outcome(result: Result<RowOutcome, Warning>) -> RowOutcome {
    result.unwrap_or_else(RowOutcome::Drop)
}


#[cfg(test)]
mod tests {
    use super::test_support::data_row;
    use super::*;
    use crate::extract::RowKind;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn debit_credit_signs() {
        assert_eq!(debit_credit_amount(dec("45.99"), Decimal::ZERO).unwrap(), dec("-45.99"));
        assert_eq!(debit_credit_amount(Decimal::ZERO, dec("100.00")).unwrap(), dec("100.00"));
        assert_eq!(
            debit_credit_amount(dec("1.00"), dec("2.00")).unwrap_err().kind,
            WarningKind::AmbiguousDebitCredit
        );
        assert_eq!(
            debit_credit_amount(Decimal::ZERO, Decimal::ZERO).unwrap_err().kind,
            WarningKind::NoTransactionalAmount
        );
    }

    #[test]
    fn convert_skips_non_data_rows_and_locates_warnings() {
        let header = RowCandidate { kind: RowKind::Header, ..data_row(1, &["Date", "Amount"]) };
        let rows = vec![
            header,
            data_row(2, &["2024-01-15", "SPAR", "-45.99"]),
            data_row(3, &["2024-01-16", "NOTHING", "0.00"]),
        ];
        let adapter = adapter_for(BankFormatVariant::CapitecSimpleAmount, &IngestConfig::default());
        let output = adapter.convert(&mut rows.into_iter(), &CancellationToken::new()).unwrap();
        assert_eq!(output.transactions.len(), 1);
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].line, Some(3));
        assert_eq!(output.warnings[0].kind, WarningKind::NoTransactionalAmount);
    }

    #[test]
    fn convert_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let rows = vec![data_row(1, &["2024-01-15", "SPAR", "-45.99"])];
        let adapter = adapter_for(BankFormatVariant::CapitecSimpleAmount, &IngestConfig::default());
        assert_eq!(adapter.convert(&mut rows.into_iter(), &cancel), Err(Cancelled));
    }

    #[test]
    fn cancellation_midway_stops_at_next_row() {
        let config = IngestConfig::default();
        for variant in [BankFormatVariant::CapitecSimpleAmount, BankFormatVariant::Generic] {
            let cancel = CancellationToken::new();
            let pulled = std::cell::Cell::new(0);
            let mut rows = (1..=5)
                .map(|line| data_row(line, &["2024-01-15", "SPAR", "-1.00"]))
                .inspect(|row| {
                    pulled.set(pulled.get() + 1);
                    if row.line == 2 {
                        cancel.cancel();
                    }
                });
            let adapter = adapter_for(variant, &config);
            assert_eq!(adapter.convert(&mut rows, &cancel), Err(Cancelled), "{variant}");
            assert_eq!(pulled.get(), 2, "{variant}");
        }
    }

    #[test]
    fn adapter_for_matches_variant() {
        let config = IngestConfig::default();
        for variant in BankFormatVariant::SPECIFIC.into_iter().chain([BankFormatVariant::Generic]) {
            assert_eq!(adapter_for(variant, &config).variant(), variant);
        }
    }

    #[test]
    fn split_joins_narrative_around_date() {
        let row = data_row(1, &["REF1", "2024-01-15", "", "SPAR", "-45.99"]);
        let parts = RowParts::split(&row, 4, |t| crate::tokens::DateShape::IsoDash.parse(t), "YYYY-MM-DD").unwrap();
        assert_eq!(parts.description, "REF1 SPAR");
        assert_eq!(parts.slots.len(), 1);
        assert_eq!(parts.slot(3).unwrap(), Decimal::ZERO);
    }
}
