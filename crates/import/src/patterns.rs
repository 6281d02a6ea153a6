//! Learning categories from explicit user assignments.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::normalize_text;
use ledgerline_core::Transaction;

/// Confidence given to a freshly learned pattern.
pub const INITIAL_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// The full normalized description.
    Exact,
    /// The first two tokens.
    StartsWith,
    /// The first token.
    Merchant,
}

impl PatternType {
    /// Most specific first; matching stops at the first tier with a hit.
    pub const SPECIFICITY: [PatternType; 3] =
        [PatternType::Exact, PatternType::StartsWith, PatternType::Merchant];

    /// The value this pattern type keys on for a normalized description.
    pub fn derive(self, normalized: &str) -> Option<String> {
        let mut tokens = normalized.split(' ').filter(|t| !t.is_empty());
        match self {
            PatternType::Exact => (!normalized.is_empty()).then(|| normalized.to_string()),
            PatternType::StartsWith => {
                let first = tokens.next()?;
                let second = tokens.next()?;
                Some(format!("{first} {second}"))
            }
            PatternType::Merchant => tokens.next().map(str::to_string),
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternType::Exact => write!(f, "exact"),
            PatternType::StartsWith => write!(f, "starts_with"),
            PatternType::Merchant => write!(f, "merchant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub category: String,
    pub pattern_type: PatternType,
    pub pattern_value: String,
    pub confidence_score: f64,
    pub use_count: u64,
    pub enabled: bool,
}

impl Pattern {
    fn new(category: &str, pattern_type: PatternType, pattern_value: String) -> Self {
        Self {
            category: category.to_string(),
            pattern_type,
            pattern_value,
            confidence_score: INITIAL_CONFIDENCE,
            use_count: 0,
            enabled: true,
        }
    }
}

/// A learned category proposal. Distinct from a rule assignment: callers decide
/// whether to apply it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: String,
    pub pattern_type: PatternType,
    pub pattern_value: String,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnOutcome {
    Created,
    /// An existing pattern now points at a different category.
    Reassigned,
    Unchanged,
}

/// Per-owner pattern set. Patterns are inert data and are never removed here.
#[derive(Debug, Clone, Default)]
pub struct PatternLearner {
    patterns: Vec<Pattern>,
}

impl PatternLearner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patterns(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn into_patterns(self) -> Vec<Pattern> {
        self.patterns
    }

    /// Record that `description` belongs to `category`. Returns what happened to
    /// each derived pattern, most specific first.
    pub fn learn(&mut self, description: &str, category: &str) -> Vec<(PatternType, LearnOutcome)> {
        let normalized = normalize_text(description);
        let category = category.trim();
        if normalized.is_empty() || category.is_empty() {
            return Vec::new();
        }
        let mut outcomes = Vec::new();
        for pattern_type in PatternType::SPECIFICITY {
            let Some(value) = pattern_type.derive(&normalized) else {
                continue;
            };
            let existing = self
                .patterns
                .iter_mut()
                .find(|p| p.pattern_type == pattern_type && p.pattern_value == value);
            let outcome = match existing {
                Some(p) if p.category == category => LearnOutcome::Unchanged,
                Some(p) => {
                    tracing::debug!(
                        pattern = %value,
                        from = %p.category,
                        to = category,
                        "pattern reassigned"
                    );
                    p.category = category.to_string();
                    LearnOutcome::Reassigned
                }
                None => {
                    self.patterns.push(Pattern::new(category, pattern_type, value));
                    LearnOutcome::Created
                }
            };
            outcomes.push((pattern_type, outcome));
        }
        outcomes
    }

    fn lookup(&self, normalized: &str) -> Option<usize> {
        PatternType::SPECIFICITY.into_iter().find_map(|pattern_type| {
            let value = pattern_type.derive(normalized)?;
            self.patterns.iter().position(|p| {
                p.enabled && p.pattern_type == pattern_type && p.pattern_value == value
            })
        })
    }

    /// The most specific enabled pattern for `description`, without counting a use.
    pub fn suggest(&self, description: &str) -> Option<Suggestion> {
        let index = self.lookup(&normalize_text(description))?;
        Some(suggestion(&self.patterns[index]))
    }

    /// Suggest for a single description and count the use.
    pub fn match_description(&mut self, description: &str) -> Option<Suggestion> {
        let index = self.lookup(&normalize_text(description))?;
        let pattern = &mut self.patterns[index];
        pattern.use_count += 1;
        Some(suggestion(pattern))
    }

    /// One suggestion slot per transaction, in order.
    pub fn match_transactions(&mut self, transactions: &[Transaction]) -> Vec<Option<Suggestion>> {
        transactions
            .iter()
            .map(|tx| self.match_description(&tx.description))
            .collect()
    }
}

fn suggestion(pattern: &Pattern) -> Suggestion {
    Suggestion {
        category: pattern.category.clone(),
        pattern_type: pattern.pattern_type,
        pattern_value: pattern.pattern_value.clone(),
        confidence_score: pattern.confidence_score,
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode patterns: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid owner id: {0:?}")]
    InvalidOwner(String),
    #[error("Pattern store lock poisoned")]
    Poisoned,
}

/// Get/put of a pattern set by opaque owner id.
pub trait PatternStore {
    /// An owner with no stored patterns yields an empty set.
    fn load(&self, owner: &str) -> Result<Vec<Pattern>, StoreError>;
    fn save(&self, owner: &str, patterns: &[Pattern]) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryPatternStore {
    sets: Mutex<HashMap<String, Vec<Pattern>>>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PatternStore for InMemoryPatternStore {
    fn load(&self, owner: &str) -> Result<Vec<Pattern>, StoreError> {
        let sets = self.sets.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(sets.get(owner).cloned().unwrap_or_default())
    }

    fn save(&self, owner: &str, patterns: &[Pattern]) -> Result<(), StoreError> {
        let mut sets = self.sets.lock().map_err(|_| StoreError::Poisoned)?;
        sets.insert(owner.to_string(), patterns.to_vec());
        Ok(())
    }
}
