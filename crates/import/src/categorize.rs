use serde::{Deserialize, Serialize};

use crate::config::CategorizeConfig;
use crate::patterns::{PatternLearner, Suggestion};
use crate::rules::{RuleEngine, RuleMatch};
use ledgerline_core::{CategoryCatalog, Transaction};

/// Where a transaction's category came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Assignment {
    Rule(RuleMatch),
    LearnedPattern(Suggestion),
    Fallback,
    /// The transaction arrived already categorized.
    Preserved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedRow {
    pub assignment: Assignment,
    /// A learned suggestion that was not applied automatically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
}

/// Rules first, learned patterns second, the fallback category last.
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: RuleEngine,
    catalog: CategoryCatalog,
    config: CategorizeConfig,
}

impl Categorizer {
    pub fn new(rules: RuleEngine, catalog: CategoryCatalog, config: CategorizeConfig) -> Self {
        Self { rules, catalog, config }
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    /// Categorize in place. Pattern use counts are only bumped for transactions
    /// no rule claimed.
    pub fn categorize(
        &self,
        transactions: &mut [Transaction],
        mut learner: Option<&mut PatternLearner>,
    ) -> Vec<CategorizedRow> {
        let mut rows = Vec::with_capacity(transactions.len());
        for tx in transactions.iter_mut() {
            if tx.category.is_some() {
                rows.push(CategorizedRow { assignment: Assignment::Preserved, suggestion: None });
                continue;
            }
            if let Some(found) = self.rules.find_auto_match(&tx.description) {
                tx.category = Some(self.catalog.resolve(&found.category));
                rows.push(CategorizedRow { assignment: Assignment::Rule(found), suggestion: None });
                continue;
            }
            let suggestion = learner.as_deref_mut().and_then(|l| l.match_description(&tx.description));
            let row = match suggestion {
                Some(s) if self.config.apply_learned_suggestions => {
                    tx.category = Some(self.catalog.resolve(&s.category));
                    CategorizedRow { assignment: Assignment::LearnedPattern(s), suggestion: None }
                }
                other => {
                    tx.category = Some(self.catalog.resolve(&self.config.fallback_category));
                    CategorizedRow { assignment: Assignment::Fallback, suggestion: other }
                }
            };
            rows.push(row);
        }
        let by_rule = rows.iter().filter(|r| matches!(r.assignment, Assignment::Rule(_))).count();
        tracing::info!(transactions = rows.len(), by_rule, "categorized transactions");
        rows
    }
}
