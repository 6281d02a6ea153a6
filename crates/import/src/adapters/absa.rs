use super::{debit_credit_amount, emit, outcome, BankAdapter, RowOutcome, RowParts};
use crate::extract::RowCandidate;
use crate::tokens::{trailing_slot_start, DateShape};
use ledgerline_core::{BankFormatVariant, Warning, WarningKind};

/// ABSA export: `DD/MM/YYYY` date with separate debit and credit columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsaAdapter;

impl AbsaAdapter {
    fn read(&self, row: &RowCandidate) -> Result<RowOutcome, Warning> {
        let slot_start = trailing_slot_start(&row.tokens);
        let parts =
            RowParts::split(row, slot_start, |t| DateShape::DaySlash.parse(t), "DD/MM/YYYY")?;
        if parts.slots.len() < 2 {
            return Err(Warning::new(
                WarningKind::MissingAmount,
                "expected debit and credit columns",
            ));
        }
        let amount = debit_credit_amount(parts.slot(0)?, parts.slot(1)?)?;
        Ok(emit(parts.date, &parts.description, amount, BankFormatVariant::AbsaDebitCredit))
    }
}

impl BankAdapter for AbsaAdapter {
    fn variant(&self) -> BankFormatVariant {
        BankFormatVariant::AbsaDebitCredit
    }

    fn parse_row(&self, row: &RowCandidate) -> RowOutcome {
        outcome(self.read(row))
    }
}
