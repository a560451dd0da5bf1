//! Runs source adapters through the full harvesting pipeline.
//!
//! For each selected source:
//! 1. **Listing**: fetch the listing page and let the adapter find candidates
//! 2. **Fetching**: fetch each candidate's article page
//! 3. **Extraction**: let the adapter pull the body text out of it
//! 4. **Storage**: upsert the article into the [`ArticleStore`]
//! 5. **Delivery**: hand the text to the [`DeliveryNotifier`]
//!
//! A source that fails, or panics, is recorded in its [`SourceReport`] and the
//! run moves on to the next one.

use crate::fetcher::Fetcher;
use crate::models::{ExtractionCandidate, NewArticle, Source};
use crate::notifier::DeliveryNotifier;
use crate::scrapers::SourceAdapter;
use crate::store::{ArticleStore, StoreError, UpsertOutcome};
use futures::FutureExt;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// How much work runs at once.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Run every selected source at the same time instead of one by one.
    pub parallel_sources: bool,
    /// Article pages fetched at once per source. `1` is fully sequential.
    pub article_workers: usize,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            parallel_sources: false,
            article_workers: 1,
        }
    }
}

/// Per-source tally of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: Source,
    /// Candidates found on the listing page.
    pub candidates: usize,
    pub inserted: usize,
    pub already_stored: usize,
    /// Pages that could not be fetched or yielded an incomplete article.
    pub skipped: usize,
    /// Articles the store refused with a database error.
    pub store_failures: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
    /// Set when the source aborted unexpectedly.
    pub error: Option<String>,
}

impl SourceReport {
    fn new(source: Source) -> Self {
        Self {
            source,
            candidates: 0,
            inserted: 0,
            already_stored: 0,
            skipped: 0,
            store_failures: 0,
            delivered: 0,
            delivery_failures: 0,
            error: None,
        }
    }

    fn record(&mut self, outcome: ArticleOutcome) {
        match outcome {
            ArticleOutcome::Skipped => self.skipped += 1,
            ArticleOutcome::StoreFailed => self.store_failures += 1,
            ArticleOutcome::Stored { outcome, delivered } => {
                match outcome {
                    UpsertOutcome::Inserted => self.inserted += 1,
                    UpsertOutcome::AlreadyExists => self.already_stored += 1,
                }
                if delivered {
                    self.delivered += 1;
                } else {
                    self.delivery_failures += 1;
                }
            }
        }
    }
}

/// Result of [`Harvester::run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// One report per source that ran, in selection order.
    pub sources: Vec<SourceReport>,
    pub elapsed: StdDuration,
}

impl RunSummary {
    pub fn report(&self, source: Source) -> Option<&SourceReport> {
        self.sources.iter().find(|r| r.source == source)
    }

    pub fn inserted(&self) -> usize {
        self.sources.iter().map(|r| r.inserted).sum()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|r| r.error.is_some()).count()
    }
}

enum ArticleOutcome {
    Skipped,
    StoreFailed,
    Stored {
        outcome: UpsertOutcome,
        delivered: bool,
    },
}

/// Resolve a selection list against the available adapters.
///
/// Identifiers match case-insensitively; unknown ones are ignored and
/// repeated ones collapse. An empty selection picks every adapter.
pub fn resolve_selection(
    adapters: &[Arc<dyn SourceAdapter>],
    selected: &[String],
) -> Vec<Arc<dyn SourceAdapter>> {
    if selected.iter().all(|s| s.trim().is_empty()) {
        return adapters.to_vec();
    }

    selected
        .iter()
        .filter(|name| !name.trim().is_empty())
        .filter_map(|name| match name.parse::<Source>() {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(error = %e, "Ignoring unknown source");
                None
            }
        })
        .unique()
        .filter_map(|source| adapters.iter().find(|a| a.source() == source).cloned())
        .collect()
}

/// Owns the process-wide resources and drives adapters through the pipeline.
pub struct Harvester<S> {
    fetcher: Fetcher,
    store: S,
    notifier: DeliveryNotifier,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    options: HarvestOptions,
}

impl<S: ArticleStore> Harvester<S> {
    pub fn new(
        fetcher: Fetcher,
        store: S,
        notifier: DeliveryNotifier,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        options: HarvestOptions,
    ) -> Self {
        Self {
            fetcher,
            store,
            notifier,
            adapters,
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give back the store so the caller can shut it down.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Harvest the selected sources (all of them if `selected` is empty).
    #[instrument(level = "info", skip_all, fields(?selected))]
    pub async fn run(&self, selected: &[String]) -> RunSummary {
        let start_time = Instant::now();
        let adapters = resolve_selection(&self.adapters, selected);
        info!(
            sources = ?adapters.iter().map(|a| a.source().id()).collect::<Vec<_>>(),
            parallel = self.options.parallel_sources,
            article_workers = self.options.article_workers,
            "Starting harvest"
        );

        let sources = if self.options.parallel_sources {
            join_all(adapters.iter().map(|a| self.run_isolated(a.as_ref()))).await
        } else {
            let mut reports = Vec::with_capacity(adapters.len());
            for adapter in &adapters {
                reports.push(self.run_isolated(adapter.as_ref()).await);
            }
            reports
        };

        let summary = RunSummary {
            sources,
            elapsed: start_time.elapsed(),
        };
        info!(
            elapsed = ?summary.elapsed,
            secs = summary.elapsed.as_secs(),
            millis = summary.elapsed.subsec_millis(),
            inserted = summary.inserted(),
            failed_sources = summary.failed_sources(),
            "Harvest complete"
        );
        summary
    }

    /// Run one source, turning a panic into a recorded error.
    async fn run_isolated(&self, adapter: &dyn SourceAdapter) -> SourceReport {
        let source = adapter.source();
        match AssertUnwindSafe(self.harvest_source(adapter))
            .catch_unwind()
            .await
        {
            Ok(report) => report,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(%source, error = %message, "Source aborted unexpectedly");
                SourceReport {
                    error: Some(message),
                    ..SourceReport::new(source)
                }
            }
        }
    }

    #[instrument(level = "info", skip_all, fields(source = %adapter.source()))]
    async fn harvest_source(&self, adapter: &dyn SourceAdapter) -> SourceReport {
        let source = adapter.source();
        let mut report = SourceReport::new(source);

        let candidates = match self.fetcher.fetch(adapter.listing_url()).await {
            Ok(doc) => adapter.listing(&doc),
            Err(e) => {
                warn!(url = adapter.listing_url(), error = %e, "Listing page unavailable");
                return report;
            }
        };
        report.candidates = candidates.len();
        if candidates.is_empty() {
            warn!(url = adapter.listing_url(), "Listing page yielded no articles");
            return report;
        }

        let outcomes = stream::iter(candidates)
            .map(|candidate| self.process_candidate(adapter, candidate))
            .buffer_unordered(self.options.article_workers.max(1))
            .collect::<Vec<_>>()
            .await;
        for outcome in outcomes {
            report.record(outcome);
        }

        info!(
            candidates = report.candidates,
            inserted = report.inserted,
            already_stored = report.already_stored,
            skipped = report.skipped,
            store_failures = report.store_failures,
            delivery_failures = report.delivery_failures,
            "Source harvested"
        );
        report
    }

    async fn process_candidate(
        &self,
        adapter: &dyn SourceAdapter,
        candidate: ExtractionCandidate,
    ) -> ArticleOutcome {
        let url = candidate.url.as_str();
        let content = match self.fetcher.fetch(url).await {
            Ok(doc) => adapter.extract_content(&doc),
            Err(e) => {
                warn!(%url, error = %e, "Article page unavailable; skipping");
                return ArticleOutcome::Skipped;
            }
        };

        let article = NewArticle::new(candidate.source, &candidate.title, url, &content);
        let outcome = match self.store.upsert(article).await {
            Ok(outcome) => outcome,
            Err(StoreError::Validation { field }) => {
                debug!(%url, field, "Incomplete article; skipping");
                return ArticleOutcome::Skipped;
            }
            Err(e) => {
                error!(%url, error = %e, "Could not store article");
                return ArticleOutcome::StoreFailed;
            }
        };
        match outcome {
            UpsertOutcome::Inserted => {
                info!(%url, title = %truncate_title(&candidate.title), "Stored article")
            }
            UpsertOutcome::AlreadyExists => debug!(%url, "Article already stored"),
        }

        let delivered = self.notifier.notify(&content, url).await.is_delivered();
        ArticleOutcome::Stored { outcome, delivered }
    }
}

fn truncate_title(title: &str) -> String {
    title.chars().take(80).collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
