use rust_decimal::Decimal;

use super::{emit, outcome, BankAdapter, RowOutcome, RowParts};
use crate::extract::RowCandidate;
use crate::tokens::{trailing_slot_start, DateShape};
use ledgerline_core::{BankFormatVariant, Warning, WarningKind};

fn split(row: &RowCandidate) -> Result<RowParts<'_>, Warning> {
    let slot_start = trailing_slot_start(&row.tokens);
    RowParts::split(row, slot_start, |t| DateShape::IsoDash.parse(t), "YYYY-MM-DD")
}

/// Capitec export with one signed amount column.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapitecSimpleAdapter;

impl CapitecSimpleAdapter {
    fn read(&self, row: &RowCandidate) -> Result<RowOutcome, Warning> {
        let parts = split(row)?;
        let amount = parts.slot(0)?;
        Ok(emit(parts.date, &parts.description, amount, BankFormatVariant::CapitecSimpleAmount))
    }
}

impl BankAdapter for CapitecSimpleAdapter {
    fn variant(&self) -> BankFormatVariant {
        BankFormatVariant::CapitecSimpleAmount
    }

    fn parse_row(&self, row: &RowCandidate) -> RowOutcome {
        outcome(self.read(row))
    }
}

/// Capitec export with money in, money out and fee columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapitecMoneyInOutAdapter;

impl CapitecMoneyInOutAdapter {
    fn read(&self, row: &RowCandidate) -> Result<RowOutcome, Warning> {
        let parts = split(row)?;
        if parts.slots.len() < 2 {
            return Err(Warning::new(
                WarningKind::MissingAmount,
                "expected money in and money out columns",
            ));
        }
        let money_in = parts.slot(0)?;
        let money_out = parts.slot(1)?;
        let fee = parts.slot(2)?;
        check_sign("money in", money_in, Decimal::is_sign_positive)?;
        check_sign("money out", money_out, Decimal::is_sign_negative)?;
        check_sign("fee", fee, Decimal::is_sign_negative)?;
        let amount = money_in + money_out + fee;
        Ok(emit(parts.date, &parts.description, amount, BankFormatVariant::CapitecMoneyInOut))
    }
}

/// Zero satisfies every convention.
fn check_sign(column: &str, value: Decimal, expected: fn(&Decimal) -> bool) -> Result<(), Warning> {
    if value.is_zero() || expected(&value) {
        Ok(())
    } else {
        Err(Warning::new(
            WarningKind::SignConvention,
            format!("{column} has the wrong sign: {value}"),
        ))
    }
}

impl BankAdapter for CapitecMoneyInOutAdapter {
    fn variant(&self) -> BankFormatVariant {
        BankFormatVariant::CapitecMoneyInOut
    }

    fn parse_row(&self, row: &RowCandidate) -> RowOutcome {
        outcome(self.read(row))
    }
}
