use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tokens::DEFAULT_GENERIC_DATE_FORMATS;
use ledgerline_core::FALLBACK_CATEGORY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Ingestion settings. Every field has a default, so an empty TOML file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Data rows handed to the detector.
    pub sample_rows: usize,
    /// Normalized detector score below which Generic is chosen.
    pub min_confidence: f64,
    /// Fold dateless, amountless lines into the previous row's description.
    pub merge_continuations: bool,
    /// Field delimiter for delimited exports; sniffed when unset.
    pub delimiter: Option<char>,
    pub standard_bank: StandardBankConfig,
    pub generic: GenericConfig,
    pub categorize: CategorizeConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sample_rows: 5,
            min_confidence: 0.5,
            merge_continuations: true,
            delimiter: None,
            standard_bank: StandardBankConfig::default(),
            generic: GenericConfig::default(),
            categorize: CategorizeConfig::default(),
        }
    }
}

/// Guards against the two column confusions Standard Bank text exports invite.
/// Both values are empirical and may need revisiting for other export variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardBankConfig {
    /// Amount candidates above this magnitude are taken to be the running balance.
    pub balance_threshold: u64,
    /// Drop numeric tokens whose integer part is a valid `YYYYMMDD` date.
    pub exclude_date_shaped_tokens: bool,
}

impl Default for StandardBankConfig {
    fn default() -> Self {
        Self { balance_threshold: 10_000_000, exclude_date_shaped_tokens: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericConfig {
    /// chrono format strings, tried in order.
    pub date_formats: Vec<String>,
}

impl Default for GenericConfig {
    fn default() -> Self {
        Self {
            date_formats: DEFAULT_GENERIC_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizeConfig {
    pub fallback_category: String,
    /// Apply learned-pattern suggestions without confirmation.
    pub apply_learned_suggestions: bool,
}

impl Default for CategorizeConfig {
    fn default() -> Self {
        Self { fallback_category: FALLBACK_CATEGORY.to_string(), apply_learned_suggestions: false }
    }
}

impl IngestConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: IngestConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rows == 0 {
            return Err(ConfigError::Invalid("sample_rows must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_confidence must be within 0.0–1.0, got {}",
                self.min_confidence
            )));
        }
        if let Some(d) = self.delimiter {
            if !d.is_ascii() || d.is_ascii_alphanumeric() || d == '"' {
                return Err(ConfigError::Invalid(format!("unusable delimiter '{d}'")));
            }
        }
        if self.generic.date_formats.is_empty() {
            return Err(ConfigError::Invalid("generic.date_formats must not be empty".into()));
        }
        if self.categorize.fallback_category.trim().is_empty() {
            return Err(ConfigError::Invalid("categorize.fallback_category must not be empty".into()));
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> Option<u8> {
        self.delimiter.map(|d| d as u8)
    }
}
