use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{contains_word, normalize_text};
use ledgerline_core::{Category, CategoryCatalog, Transaction};

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse rules: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i32 {
    100
}

/// A keyword rule as authored by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Lower runs first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub auto_apply: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// On-disk rule file: `[[rules]]` and `[[categories]]` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleBook {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl RuleBook {
    pub fn from_toml(content: &str) -> Result<Self, RuleError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &std::path::Path) -> Result<Self, RuleError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn catalog(&self) -> CategoryCatalog {
        CategoryCatalog::with_custom(self.categories.clone())
    }
}

/// The rule and keyword that claimed a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_id: String,
    pub rule_name: String,
    pub category: String,
    pub keyword: String,
    pub auto_apply: bool,
}

/// A rule with its keywords normalized once up front.
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: Rule,
    keywords: Vec<String>,
}

impl CompiledRule {
    fn matching_keyword(&self, description: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| contains_word(description, k))
            .map(String::as_str)
    }

    fn to_match(&self, keyword: &str) -> RuleMatch {
        RuleMatch {
            rule_id: self.rule.id.clone(),
            rule_name: self.rule.name.clone(),
            category: self.rule.category.clone(),
            keyword: keyword.to_string(),
            auto_apply: self.rule.auto_apply,
        }
    }
}

/// First-match-wins keyword categorization over an immutable rule snapshot.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut compiled: Vec<CompiledRule> = rules
            .into_iter()
            .filter(|r| r.enabled)
            .map(|rule| {
                let keywords = rule
                    .keywords
                    .iter()
                    .map(|k| normalize_text(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                CompiledRule { rule, keywords }
            })
            .collect();
        // Lowest priority first; stable, so authoring order breaks ties.
        compiled.sort_by_key(|c| c.rule.priority);
        Self { rules: compiled }
    }

    pub fn from_toml(content: &str) -> Result<Self, RuleError> {
        Ok(Self::new(RuleBook::from_toml(content)?.rules))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn find(
        &self,
        description: &str,
        mut eligible: impl FnMut(&CompiledRule) -> bool,
    ) -> Option<RuleMatch> {
        let description = normalize_text(description);
        self.rules
            .iter()
            .filter(|c| eligible(*c))
            .find_map(|c| c.matching_keyword(&description).map(|k| c.to_match(k)))
    }

    /// First enabled rule matching `description`, whether or not it auto-applies.
    pub fn find_match(&self, description: &str) -> Option<RuleMatch> {
        self.find(description, |_| true)
    }

    /// First enabled auto-apply rule matching `description`.
    pub fn find_auto_match(&self, description: &str) -> Option<RuleMatch> {
        self.find(description, |c| c.rule.auto_apply)
    }

    /// What every enabled rule would assign, without touching the transactions.
    pub fn preview(&self, transactions: &[Transaction]) -> Vec<Option<RuleMatch>> {
        transactions.iter().map(|tx| self.find_match(&tx.description)).collect()
    }

    /// Assign a category to every uncategorized transaction: the first auto-apply
    /// match, else `fallback`. Transactions that already carry a category are
    /// left alone and report `None`, as do fallback assignments.
    pub fn categorize(
        &self,
        transactions: &mut [Transaction],
        catalog: &CategoryCatalog,
        fallback: &str,
    ) -> Vec<Option<RuleMatch>> {
        transactions
            .iter_mut()
            .map(|tx| {
                if tx.category.is_some() {
                    return None;
                }
                let found = self.find_auto_match(&tx.description);
                let name = found.as_ref().map_or(fallback, |m| m.category.as_str());
                tx.category = Some(catalog.resolve(name));
                found
            })
            .collect()
    }
}
