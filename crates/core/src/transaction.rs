use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::Category;
use super::money::Money;

/// The closed set of statement dialects an adapter exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankFormatVariant {
    StandardBankText,
    AbsaDebitCredit,
    CapitecSimpleAmount,
    CapitecMoneyInOut,
    Generic,
}

impl BankFormatVariant {
    /// Every variant with a bank-specific adapter, in detection order.
    pub const SPECIFIC: [BankFormatVariant; 4] = [
        BankFormatVariant::StandardBankText,
        BankFormatVariant::AbsaDebitCredit,
        BankFormatVariant::CapitecSimpleAmount,
        BankFormatVariant::CapitecMoneyInOut,
    ];

    pub fn key(self) -> &'static str {
        match self {
            BankFormatVariant::StandardBankText => "standard_bank_text",
            BankFormatVariant::AbsaDebitCredit => "absa_debit_credit",
            BankFormatVariant::CapitecSimpleAmount => "capitec_simple_amount",
            BankFormatVariant::CapitecMoneyInOut => "capitec_money_in_out",
            BankFormatVariant::Generic => "generic",
        }
    }

    pub fn is_generic(self) -> bool {
        self == BankFormatVariant::Generic
    }
}

impl fmt::Display for BankFormatVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for BankFormatVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard_bank_text" => Ok(BankFormatVariant::StandardBankText),
            "absa_debit_credit" => Ok(BankFormatVariant::AbsaDebitCredit),
            "capitec_simple_amount" => Ok(BankFormatVariant::CapitecSimpleAmount),
            "capitec_money_in_out" => Ok(BankFormatVariant::CapitecMoneyInOut),
            "generic" => Ok(BankFormatVariant::Generic),
            other => Err(format!("Unknown bank format: '{other}'")),
        }
    }
}

/// Canonical transaction emitted by every adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub bank_source: BankFormatVariant,
    pub category: Option<Category>,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        description: &str,
        amount: Money,
        bank_source: BankFormatVariant,
    ) -> Self {
        Self {
            date,
            description: description.trim().to_string(),
            amount,
            bank_source,
            category: None,
        }
    }

    pub fn is_outflow(&self) -> bool {
        self.amount.is_negative()
    }

    pub fn category_name(&self) -> Option<&str> {
        self.category.as_ref().map(|c| c.name.as_str())
    }
}
