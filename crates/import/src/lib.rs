// Compiled regex cache shared by the tokenizers.
macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static ::regex::Regex {
            static R: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
            R.get_or_init(|| ::regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod adapters;
pub mod cancel;
pub mod categorize;
pub mod config;
pub mod detect;
pub mod extract;
pub mod fingerprint;
pub mod patterns;
pub mod pipeline;
pub(crate) mod region;
pub mod rules;
pub mod tokens;
pub(crate) mod util;

pub use adapters::{
    adapter_for, AbsaAdapter, AdapterOutput, BankAdapter, CapitecMoneyInOutAdapter,
    CapitecSimpleAdapter, GenericAdapter, RowOutcome, StandardBankAdapter,
};
pub use cancel::{CancellationToken, Cancelled};
pub use categorize::{Assignment, CategorizedRow, Categorizer};
pub use config::{CategorizeConfig, ConfigError, GenericConfig, IngestConfig, StandardBankConfig};
pub use detect::{BankFormatDetector, DetectionResult, FormatSignature, Sample, SignatureScore};
pub use extract::{ExtractError, ExtractOptions, Extractor, RowCandidate, RowKind, Rows, StatementSource};
pub use fingerprint::source_digest;
pub use patterns::{
    InMemoryPatternStore, LearnOutcome, Pattern, PatternLearner, PatternStore, PatternType,
    StoreError, Suggestion,
};
pub use pipeline::{DetectionReport, IngestError, IngestReport, IngestionPipeline, Stage};
pub use rules::{Rule, RuleBook, RuleEngine, RuleError, RuleMatch};
