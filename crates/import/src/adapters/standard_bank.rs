use rust_decimal::Decimal;

use super::{debit_credit_amount, emit, outcome, BankAdapter, RowOutcome};
use crate::config::StandardBankConfig;
use crate::extract::RowCandidate;
use crate::tokens::{is_amount_token, is_blank, slot_value, DateShape};
use ledgerline_core::{BankFormatVariant, Warning, WarningKind};

/// Standard Bank plain-text export: `YYYYMMDD` date, narrative, then service
/// fee, debit and credit columns followed by the running balance.
#[derive(Debug, Clone, Default)]
pub struct StandardBankAdapter {
    config: StandardBankConfig,
}

impl StandardBankAdapter {
    pub fn new(config: StandardBankConfig) -> Self {
        Self { config }
    }

    /// A numeric token whose integer part is itself a valid `YYYYMMDD` date.
    fn is_date_shaped(&self, token: &str) -> bool {
        if !self.config.exclude_date_shaped_tokens {
            return false;
        }
        let integer = token.trim().split('.').next().unwrap_or_default().replace(',', "");
        DateShape::Compact8.parse(&integer).is_some()
    }

    /// Start of the trailing numeric run, looking through date-shaped tokens.
    fn candidate_start(&self, tokens: &[String], floor: usize) -> usize {
        let mut start = tokens.len();
        while start > floor {
            let t = &tokens[start - 1];
            if is_blank(t) || is_amount_token(t) || self.is_date_shaped(t) {
                start -= 1;
            } else {
                break;
            }
        }
        start
    }

    fn read(&self, row: &RowCandidate) -> Result<RowOutcome, Warning> {
        let tokens = &row.tokens;
        let Some((date_index, date)) = tokens
            .iter()
            .enumerate()
            .find_map(|(i, t)| DateShape::Compact8.parse(t).map(|d| (i, d)))
        else {
            return Err(Warning::new(WarningKind::MissingDate, "no YYYYMMDD date on transaction line"));
        };

        let start = self.candidate_start(tokens, date_index + 1);
        let description = tokens[..start]
            .iter()
            .enumerate()
            .filter(|(i, t)| *i != date_index && !is_blank(t))
            .map(|(_, t)| t.trim())
            .collect::<Vec<_>>()
            .join(" ");

        let mut candidates = Vec::new();
        for token in &tokens[start..] {
            if self.is_date_shaped(token) {
                continue;
            }
            let value = slot_value(token).ok_or_else(|| {
                Warning::new(WarningKind::MissingAmount, format!("unreadable amount '{token}'"))
            })?;
            candidates.push(value);
        }

        let threshold = Decimal::from(self.config.balance_threshold);
        let before = candidates.len();
        candidates.retain(|v| v.abs() <= threshold);
        if candidates.len() == before {
            candidates.pop();
        }

        let (debit, credit) = match candidates.as_slice() {
            [.., _fee, debit, credit] => (*debit, *credit),
            [debit, credit] => (*debit, *credit),
            _ => {
                return Err(Warning::new(
                    WarningKind::MissingAmount,
                    "expected debit and credit columns before the balance",
                ))
            }
        };
        let amount = debit_credit_amount(debit, credit)?;
        Ok(emit(date, &description, amount, BankFormatVariant::StandardBankText))
    }
}

impl BankAdapter for StandardBankAdapter {
    fn variant(&self) -> BankFormatVariant {
        BankFormatVariant::StandardBankText
    }

    fn parse_row(&self, row: &RowCandidate) -> RowOutcome {
        outcome(self.read(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::data_row;
    use chrono::NaiveDate;
    use ledgerline_core::Money;

    fn parse(cells: &[&str]) -> RowOutcome {
        StandardBankAdapter::default().parse_row(&data_row(1, cells))
    }

    fn amount(outcome: RowOutcome) -> Money {
        match outcome {
            RowOutcome::Emit(tx) => tx.amount,
            other => panic!("expected a transaction, got {other:?}"),
        }
    }

    fn dropped(outcome: RowOutcome) -> WarningKind {
        match outcome {
            RowOutcome::Drop(w) => w.kind,
            other => panic!("expected a dropped row, got {other:?}"),
        }
    }

    #[test]
    fn debit_only_is_outflow() {
        let outcome = parse(&["20240115", "SPAR SUPERMARKET", "0.00", "45.99", "0.00", "12,345.67"]);
        match outcome {
            RowOutcome::Emit(tx) => {
                assert_eq!(tx.amount, Money::from_cents(-4599));
                assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
                assert_eq!(tx.description, "SPAR SUPERMARKET");
                assert_eq!(tx.bank_source, BankFormatVariant::StandardBankText);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn credit_only_is_inflow() {
        let outcome = parse(&["20240116", "SALARY", "0.00", "0.00", "25,000.00", "37,345.67"]);
        assert_eq!(amount(outcome), Money::from_cents(2_500_000));
    }

    #[test]
    fn both_zero_is_dropped() {
        let outcome = parse(&["20240117", "NOTE", "0.00", "0.00", "0.00", "37,345.67"]);
        assert_eq!(dropped(outcome), WarningKind::NoTransactionalAmount);
    }

    #[test]
    fn balance_above_threshold_is_removed_wherever_it_sits() {
        let outcome = parse(&["20240115", "SPAR", "0.00", "45.99", "0.00", "12,345,678.90"]);
        assert_eq!(amount(outcome), Money::from_cents(-4599));
    }

    #[test]
    fn date_shaped_tokens_are_not_amounts() {
        let outcome =
            parse(&["20240115", "SPAR", "0.00", "45.99", "20240114.00", "0.00", "1,000.00"]);
        assert_eq!(amount(outcome), Money::from_cents(-4599));
    }

    #[test]
    fn date_shaped_tokens_kept_when_exclusion_disabled() {
        let adapter = StandardBankAdapter::new(StandardBankConfig {
            exclude_date_shaped_tokens: false,
            ..StandardBankConfig::default()
        });
        let outcome = adapter.parse_row(&data_row(1, &["20240115", "X", "0.00", "20240114.00", "1.00"]));
        // 20240114.00 is now a candidate; it exceeds the threshold and is taken as the balance
        assert_eq!(amount(outcome), Money::from_cents(100));
    }

    #[test]
    fn two_candidates_are_debit_and_credit() {
        let outcome = parse(&["20240115", "FEE", "10.00", "", "500.00"]);
        assert_eq!(amount(outcome), Money::from_cents(-1000));
    }

    #[test]
    fn missing_date_is_reported() {
        assert_eq!(dropped(parse(&["SPAR", "0.00", "45.99", "0.00", "1.00"])), WarningKind::MissingDate);
    }
}
