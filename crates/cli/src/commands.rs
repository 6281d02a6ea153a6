use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ledgerline_import::{
    CancellationToken, CategorizedRow, Categorizer, DetectionReport, IngestConfig, IngestReport,
    IngestionPipeline, LearnOutcome, Pattern, PatternLearner, PatternStore, PatternType, RuleBook,
    RuleEngine, StatementSource, StoreError,
};
use ledgerline_ocr::OcrConfig;
use serde::{Deserialize, Serialize};

/// Contents of the `--config` file: ingestion settings at the top level, OCR
/// settings under `[ocr]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        settings.ingest.validate().with_context(|| format!("validating {}", path.display()))?;
        Ok(settings)
    }
}

/// Pattern sets stored as `<dir>/<owner>.json`.
#[derive(Debug, Clone)]
pub struct FilePatternStore {
    dir: PathBuf,
}

impl FilePatternStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, owner: &str) -> Result<PathBuf, StoreError> {
        if owner.is_empty() || owner.contains(|c: char| c == '/' || c == '\\') || owner.starts_with('.') {
            return Err(StoreError::InvalidOwner(owner.to_string()));
        }
        Ok(self.dir.join(format!("{owner}.json")))
    }
}

impl PatternStore for FilePatternStore {
    fn load(&self, owner: &str) -> Result<Vec<Pattern>, StoreError> {
        match fs::read(self.path(owner)?) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, owner: &str, patterns: &[Pattern]) -> Result<(), StoreError> {
        let path = self.path(owner)?;
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(patterns)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Where learned patterns live for this run.
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub store: FilePatternStore,
    pub owner: String,
}

#[derive(Debug, Serialize)]
pub struct IngestOutput {
    #[serde(flatten)]
    pub report: IngestReport,
    pub categorization: Vec<CategorizedRow>,
}

#[derive(Debug, Serialize)]
pub struct LearnOutput {
    pub owner: String,
    pub outcomes: Vec<LearnedPattern>,
    pub total_patterns: usize,
}

#[derive(Debug, Serialize)]
pub struct LearnedPattern {
    pub pattern_type: PatternType,
    pub outcome: LearnOutcome,
}

pub fn read_statement(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading statement {}", path.display()))
}

pub fn detect(config: &IngestConfig, text: &str) -> Result<DetectionReport> {
    let source = StatementSource::infer(text, config.delimiter_byte());
    Ok(IngestionPipeline::new(config.clone()).detect(&source)?)
}

/// Ingest and categorize a statement. When `patterns` is given, learned
/// suggestions are consulted and the updated use counts written back.
pub fn ingest(
    config: &IngestConfig,
    source: &StatementSource<'_>,
    rules: Option<&Path>,
    patterns: Option<&PatternSet>,
    cancel: &CancellationToken,
) -> Result<IngestOutput> {
    let mut report = IngestionPipeline::new(config.clone()).run(source, cancel)?;

    let book = match rules {
        Some(path) => RuleBook::load(path).with_context(|| format!("loading rules {}", path.display()))?,
        None => RuleBook::default(),
    };
    let catalog = book.catalog();
    let categorizer = Categorizer::new(RuleEngine::new(book.rules), catalog, config.categorize.clone());
    tracing::debug!(rules = categorizer.rules().len(), "rule engine ready");

    let categorization = match patterns {
        Some(set) => {
            let stored = set
                .store
                .load(&set.owner)
                .with_context(|| format!("loading patterns for {}", set.owner))?;
            let mut learner = PatternLearner::from_patterns(stored);
            let rows = categorizer.categorize(&mut report.transactions, Some(&mut learner));
            set.store
                .save(&set.owner, learner.patterns())
                .with_context(|| format!("saving patterns for {}", set.owner))?;
            rows
        }
        None => categorizer.categorize(&mut report.transactions, None),
    };
    Ok(IngestOutput { report, categorization })
}

pub fn learn(set: &PatternSet, description: &str, category: &str) -> Result<LearnOutput> {
    let stored = set
        .store
        .load(&set.owner)
        .with_context(|| format!("loading patterns for {}", set.owner))?;
    let mut learner = PatternLearner::from_patterns(stored);
    let outcomes = learner
        .learn(description, category)
        .into_iter()
        .map(|(pattern_type, outcome)| LearnedPattern { pattern_type, outcome })
        .collect::<Vec<_>>();
    if outcomes.is_empty() {
        anyhow::bail!("nothing to learn from an empty description or category");
    }
    set.store
        .save(&set.owner, learner.patterns())
        .with_context(|| format!("saving patterns for {}", set.owner))?;
    Ok(LearnOutput {
        owner: set.owner.clone(),
        outcomes,
        total_patterns: learner.patterns().len(),
    })
}

#[cfg(feature = "tesseract")]
pub async fn ingest_regions(
    settings: &Settings,
    layout: &Path,
    pages: &[PathBuf],
    rules: Option<&Path>,
    patterns: Option<&PatternSet>,
    cancel: &CancellationToken,
) -> Result<IngestOutput> {
    use ledgerline_core::DocumentLayout;
    use ledgerline_ocr::recognizer::tesseract_backend::TesseractRecognizer;
    use ledgerline_ocr::{PageImage, RegionOcrPipeline};

    let layout: DocumentLayout = serde_json::from_str(
        &fs::read_to_string(layout).with_context(|| format!("reading layout {}", layout.display()))?,
    )
    .context("parsing layout")?;
    let mut images = Vec::with_capacity(pages.len());
    for (i, path) in pages.iter().enumerate() {
        let bytes = fs::read(path).with_context(|| format!("reading page {}", path.display()))?;
        images.push(PageImage::new(i + 1, bytes));
    }

    let ocr = RegionOcrPipeline::new(TesseractRecognizer::new(None, "eng"), settings.ocr.clone());
    let recognized = ocr.recognize_document(images, &layout).await?;
    let source = StatementSource::Regions { pages: &recognized.pages, amount_type: layout.amount_type };
    let mut output = ingest(&settings.ingest, &source, rules, patterns, cancel)?;

    let mut warnings = recognized.warnings;
    warnings.append(&mut output.report.warnings);
    output.report.warnings = warnings;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_core::BankFormatVariant;

    const CAPITEC: &str = "\
Posting Date,Description,Amount
2024-01-15,SPAR CAPE TOWN,-45.99
2024-01-16,SALARY ACME,25000.00
2024-01-17,WOOLWORTHS 456 DURBAN,-300.00
";

    fn pattern_set(dir: &Path) -> PatternSet {
        PatternSet { store: FilePatternStore::new(dir), owner: "alice".into() }
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePatternStore::new(dir.path().join("patterns"));
        assert!(store.load("alice").unwrap().is_empty());

        let mut learner = PatternLearner::new();
        learner.learn("SPAR NORTH", "Groceries");
        store.save("alice", learner.patterns()).unwrap();

        assert_eq!(store.load("alice").unwrap(), learner.patterns());
        assert!(store.load("bob").unwrap().is_empty());
    }

    #[test]
    fn file_store_rejects_path_like_owner() {
        let store = FilePatternStore::new("/tmp");
        for owner in ["", "../etc/passwd", "a/b", r"a\b", ".hidden"] {
            assert!(matches!(store.load(owner), Err(StoreError::InvalidOwner(_))), "{owner}");
        }
    }

    #[test]
    fn settings_read_ingest_and_ocr_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerline.toml");
        fs::write(&path, "sample_rows = 3\n\n[ocr]\ntimeout_ms = 1000\n").unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.ingest.sample_rows, 3);
        assert_eq!(settings.ocr.timeout_ms, 1000);
        assert_eq!(settings.ocr.max_concurrent_regions, 4);
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn ingest_categorizes_with_rules_and_learned_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules.toml");
        fs::write(
            &rules,
            "[[rules]]\nid = \"groceries\"\nname = \"Groceries\"\ncategory = \"Groceries\"\nkeywords = [\"spar\"]\n",
        )
        .unwrap();
        let set = pattern_set(&dir.path().join("patterns"));
        learn(&set, "WOOLWORTHS 123 CAPE TOWN", "Groceries").unwrap();

        let mut config = IngestConfig::default();
        config.categorize.apply_learned_suggestions = true;
        let source = StatementSource::infer(CAPITEC, None);
        let output =
            ingest(&config, &source, Some(&rules), Some(&set), &CancellationToken::new()).unwrap();

        assert_eq!(output.report.bank_source, BankFormatVariant::CapitecSimpleAmount);
        let names: Vec<_> =
            output.report.transactions.iter().map(|t| t.category_name().unwrap()).collect();
        assert_eq!(names, vec!["Groceries", "Other", "Groceries"]);

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["categorization"][0]["assignment"]["source"], "rule");
        assert_eq!(json["categorization"][2]["assignment"]["source"], "learned_pattern");
        assert_eq!(json["document_hash"].as_str().unwrap().len(), 64);

        let merchant = set
            .store
            .load("alice")
            .unwrap()
            .into_iter()
            .find(|p| p.pattern_type == PatternType::Merchant)
            .unwrap();
        assert_eq!(merchant.use_count, 1);
    }

    #[test]
    fn learn_reports_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let set = pattern_set(dir.path());
        let first = learn(&set, "Netflix", "Entertainment").unwrap();
        assert_eq!(first.total_patterns, 2);
        assert!(first.outcomes.iter().all(|o| o.outcome == LearnOutcome::Created));
        let again = learn(&set, "NETFLIX", "Entertainment").unwrap();
        assert!(again.outcomes.iter().all(|o| o.outcome == LearnOutcome::Unchanged));
        assert!(learn(&set, "  ", "Entertainment").is_err());
    }

    #[test]
    fn detect_reports_scores() {
        let report = detect(&IngestConfig::default(), CAPITEC).unwrap();
        assert_eq!(report.result.variant, BankFormatVariant::CapitecSimpleAmount);
        assert_eq!(report.scores.len(), 4);
    }
}
