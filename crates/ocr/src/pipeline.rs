use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use ledgerline_core::{DocumentLayout, LayoutError, PageRegionText, Warning, WarningKind};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::preprocess::PreprocessError;
use crate::recognizer::OcrBackend;
use crate::types::{OcrConfig, PageImage, RegionOcrOutput, RegionRequest};

/// How a single region came back.
#[derive(Debug)]
enum RegionStatus {
    Text(String),
    TimedOut,
    Failed(String),
}

/// Runs OCR over every configured (page, region) crop of a document.
///
/// Each crop is recognized on the blocking pool, at most
/// `max_concurrent_regions` engine calls at a time, and awaited for at most
/// `timeout_ms`. A crop that
/// times out or fails contributes empty text and a warning; only an invalid
/// layout aborts the document.
pub struct RegionOcrPipeline<R: OcrBackend> {
    backend: Arc<R>,
    config: OcrConfig,
}

impl<R: OcrBackend + 'static> RegionOcrPipeline<R> {
    pub fn new(backend: R, config: OcrConfig) -> Self {
        Self { backend: Arc::new(backend), config }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    pub async fn recognize_document(
        &self,
        pages: Vec<PageImage>,
        layout: &DocumentLayout,
    ) -> Result<RegionOcrOutput, LayoutError> {
        layout.validate()?;

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_regions.max(1)));
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let mut warnings = Vec::new();
        let mut finished: Vec<(RegionRequest, RegionStatus)> = Vec::new();
        let mut tasks = JoinSet::new();

        for page in pages {
            let Some(regions) = layout.regions_for_page(page.index) else {
                tracing::warn!(page = page.index, "no regions configured for page");
                warnings.push(
                    Warning::new(WarningKind::PageWithoutRegions, "no regions configured for page")
                        .on_page(page.index),
                );
                continue;
            };
            let requests: Vec<RegionRequest> = regions
                .regions(layout.amount_type)
                .into_iter()
                .map(|(kind, region)| RegionRequest { page: page.index, kind, region })
                .collect();

            let image = match decode(page.bytes).await {
                Ok(image) => Arc::new(image),
                Err(e) => {
                    tracing::warn!(page = page.index, error = %e, "page image could not be decoded");
                    finished.extend(
                        requests.into_iter().map(|r| (r, RegionStatus::Failed(e.clone()))),
                    );
                    continue;
                }
            };

            for request in requests {
                let backend = Arc::clone(&self.backend);
                let image = Arc::clone(&image);
                let semaphore = Arc::clone(&semaphore);
                let max_side = self.config.max_image_side;
                tasks.spawn(async move {
                    // The semaphore is never closed.
                    let permit = semaphore.acquire_owned().await.ok();
                    // The permit lives as long as the engine call, which keeps
                    // running on the blocking pool after a timeout.
                    let work = tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        backend.crop_and_recognize(&image, &request, max_side)
                    });
                    let status = match tokio::time::timeout(timeout, work).await {
                        Err(_) => RegionStatus::TimedOut,
                        Ok(Err(join)) => RegionStatus::Failed(join.to_string()),
                        Ok(Ok(Err(e))) => RegionStatus::Failed(e.to_string()),
                        Ok(Ok(Ok(text))) => RegionStatus::Text(text),
                    };
                    (request, status)
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(done) => finished.push(done),
                Err(e) => tracing::error!(error = %e, "region task aborted"),
            }
        }
        finished.sort_by_key(|(r, _)| (r.page, r.kind));

        let mut pages: BTreeMap<usize, PageRegionText> = BTreeMap::new();
        for (request, status) in finished {
            let text = match status {
                RegionStatus::Text(text) => text,
                RegionStatus::TimedOut => {
                    tracing::warn!(page = request.page, region = %request.kind, "OCR timed out");
                    warnings.push(
                        Warning::new(
                            WarningKind::OcrTimeout { region: request.kind },
                            format!("{} timed out after {} ms", request.kind, self.config.timeout_ms),
                        )
                        .on_page(request.page),
                    );
                    String::new()
                }
                RegionStatus::Failed(message) => {
                    tracing::warn!(page = request.page, region = %request.kind, error = %message, "OCR failed");
                    warnings.push(
                        Warning::new(
                            WarningKind::OcrFailed { region: request.kind },
                            format!("{} could not be recognized: {message}", request.kind),
                        )
                        .on_page(request.page),
                    );
                    String::new()
                }
            };
            pages
                .entry(request.page)
                .or_insert_with(|| PageRegionText::new(request.page))
                .fragments
                .insert(request.kind, text);
        }

        warnings.sort_by_key(|w| w.page);
        tracing::info!(pages = pages.len(), warnings = warnings.len(), "region OCR finished");
        Ok(RegionOcrOutput { pages: pages.into_values().collect(), warnings })
    }
}

async fn decode(bytes: Vec<u8>) -> Result<DynamicImage, String> {
    let decoded = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes).map_err(PreprocessError::from)
    })
    .await;
    match decoded {
        Ok(Ok(image)) => Ok(image),
        Ok(Err(e)) => Err(e.to_string()),
        Err(join) => Err(join.to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
