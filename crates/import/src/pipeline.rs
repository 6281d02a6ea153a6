//! Extraction, detection and conversion of a single statement.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::{adapter_for, AdapterOutput, BankAdapter, GenericAdapter};
use crate::cancel::{CancellationToken, Cancelled};
use crate::config::IngestConfig;
use crate::detect::{BankFormatDetector, DetectionResult, Sample, SignatureScore};
use crate::extract::{
    ExtractError, ExtractOptions, Extractor, RowCandidate, RowKind, Rows, StatementSource,
};
use crate::fingerprint::source_digest;
use ledgerline_core::{BankFormatVariant, Transaction, Warning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Detection,
    Adapter,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("extraction failed: {0}")]
    Region(#[from] ExtractError),
    #[error("extraction failed: document yielded no rows")]
    NoRows { warnings: Vec<Warning> },
    #[error("detection failed: {header_rows} header rows but no transaction rows")]
    NoDataRows { header_rows: usize, warnings: Vec<Warning> },
    #[error("adapter failed: {variant} read no transactions ({dropped} rows dropped)")]
    NoTransactions { variant: BankFormatVariant, dropped: usize, warnings: Vec<Warning> },
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl IngestError {
    /// The pipeline stage that failed; `None` for cancellation.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            IngestError::Region(_) | IngestError::NoRows { .. } => Some(Stage::Extraction),
            IngestError::NoDataRows { .. } => Some(Stage::Detection),
            IngestError::NoTransactions { .. } => Some(Stage::Adapter),
            IngestError::Cancelled(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// SHA-256 of the ingested document.
    pub document_hash: String,
    pub detection: DetectionResult,
    /// The adapter that produced the transactions. Differs from the detected
    /// variant when the specific adapter read nothing and Generic took over.
    pub bank_source: BankFormatVariant,
    pub transactions: Vec<Transaction>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub result: DetectionResult,
    pub scores: Vec<SignatureScore>,
    pub header_rows: usize,
    pub data_rows: usize,
}

pub struct IngestionPipeline {
    config: IngestConfig,
    extractor: Extractor,
    detector: BankFormatDetector,
}

impl IngestionPipeline {
    pub fn new(config: IngestConfig) -> Self {
        let extractor = Extractor::new(ExtractOptions::from(&config));
        let detector = BankFormatDetector::new(config.min_confidence);
        Self { config, extractor, detector }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Pull rows until `sample_rows` data rows have been seen or the source ends.
    /// A source that runs dry first fails with the extraction warnings attached.
    fn sample(
        &self,
        rows: &mut Rows<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RowCandidate>, IngestError> {
        let mut sampled = Vec::new();
        let mut data = 0;
        for row in rows.by_ref() {
            cancel.check()?;
            if row.is_data() {
                data += 1;
            }
            sampled.push(row);
            if data == self.config.sample_rows {
                break;
            }
        }
        if sampled.is_empty() {
            return Err(IngestError::NoRows { warnings: rows.take_warnings() });
        }
        if data == 0 {
            let header_rows = sampled.iter().filter(|r| r.kind == RowKind::Header).count();
            return Err(IngestError::NoDataRows { header_rows, warnings: rows.take_warnings() });
        }
        Ok(sampled)
    }

    /// Classify the source without converting it.
    pub fn detect(&self, source: &StatementSource<'_>) -> Result<DetectionReport, IngestError> {
        let mut rows = self.extractor.rows(source)?;
        let sampled = self.sample(&mut rows, &CancellationToken::new())?;
        let sample = Sample::from_rows(&sampled);
        Ok(DetectionReport {
            result: self.detector.detect(&sample),
            scores: self.detector.score(&sample),
            header_rows: sampled.iter().filter(|r| r.kind == RowKind::Header).count(),
            data_rows: sample.data_rows(),
        })
    }

    /// Convert `source` with `adapter`, returning extraction warnings alongside.
    fn convert(
        &self,
        source: &StatementSource<'_>,
        adapter: &dyn BankAdapter,
        cancel: &CancellationToken,
    ) -> Result<(AdapterOutput, Vec<Warning>), IngestError> {
        let mut rows = self.extractor.rows(source)?;
        let output = adapter.convert(&mut rows, cancel)?;
        Ok((output, rows.take_warnings()))
    }

    pub fn run(
        &self,
        source: &StatementSource<'_>,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, IngestError> {
        let document_hash = source_digest(source);
        let mut rows = self.extractor.rows(source)?;
        let sampled = self.sample(&mut rows, cancel)?;
        let detection = self.detector.detect(&Sample::from_rows(&sampled));

        let adapter = adapter_for(detection.variant, &self.config);
        let mut output = {
            let mut all = sampled.into_iter().chain(rows.by_ref());
            adapter.convert(&mut all, cancel)?
        };
        let mut extraction_warnings = rows.take_warnings();
        let mut bank_source = detection.variant;

        if output.transactions.is_empty() && !bank_source.is_generic() {
            tracing::warn!(
                variant = %bank_source,
                dropped = output.dropped(),
                "no transactions read, retrying with the generic adapter"
            );
            let generic = GenericAdapter::new(self.config.generic.date_formats.clone());
            let (retry, warnings) = self.convert(source, &generic, cancel)?;
            output = retry;
            extraction_warnings = warnings;
            bank_source = BankFormatVariant::Generic;
        }

        let dropped = output.dropped();
        let mut warnings = extraction_warnings;
        warnings.extend(output.warnings);
        if output.transactions.is_empty() {
            return Err(IngestError::NoTransactions { variant: bank_source, dropped, warnings });
        }

        tracing::info!(
            %bank_source,
            transactions = output.transactions.len(),
            warnings = warnings.len(),
            "statement ingested"
        );
        Ok(IngestReport {
            document_hash,
            detection,
            bank_source,
            transactions: output.transactions,
            warnings,
        })
    }
}
