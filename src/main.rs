//! # News Harvest
//!
//! Harvests articles from a fixed set of news sites, stores each one exactly
//! once in MongoDB, and forwards its text to a classification endpoint.
//!
//! ## Features
//!
//! - Reads L'Humanité, GameSpot, Marianne, Le Monde, France 3 Régions,
//!   Médiacités and Le Point through one table-driven adapter
//! - Retries flaky pages with exponential backoff
//! - Deduplicates on `(source, url)` with a unique index
//! - Posts `{"text", "url"}` to the analysis API without ever blocking storage
//!
//! ## Usage
//!
//! ```sh
//! SITES=lemonde,lepoint MONGO_URI=mongodb://db:27017/ news_harvest
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Listing**: Find article links on each source's listing page
//! 2. **Fetching**: Download every linked article page
//! 3. **Extraction**: Pull the body text out with per-site selectors
//! 4. **Storage**: Upsert into MongoDB, once per `(source, url)`
//! 5. **Delivery**: Send the text to the classification endpoint

use clap::Parser;
use std::error::Error;
use std::time::Duration as StdDuration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use news_harvest::cli::Cli;
use news_harvest::fetcher::{Fetcher, RetryPolicy, build_client};
use news_harvest::notifier::DeliveryNotifier;
use news_harvest::orchestrator::{Harvester, RunSummary};
use news_harvest::scrapers::builtin_adapters;
use news_harvest::store::{MemoryStore, MongoStore};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("news_harvest starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Process-wide resources ----
    let client = build_client()?;
    let fetcher = Fetcher::new(
        client.clone(),
        StdDuration::from_secs(args.fetch_timeout_secs),
        RetryPolicy::default(),
    );
    let notifier = DeliveryNotifier::new(
        client,
        args.api_url.clone(),
        StdDuration::from_secs(args.api_timeout_secs),
    );
    info!(endpoint = notifier.endpoint(), "Delivering articles for analysis");

    let adapters = builtin_adapters()?;
    let options = args.harvest_options();

    // ---- Harvest ----
    let summary = if args.dry_run {
        warn!("Dry run: articles are kept in memory only");
        let harvester = Harvester::new(fetcher, MemoryStore::new(), notifier, adapters, options);
        let summary = harvester.run(&args.sites).await;
        let stored = harvester.store().records();
        for record in &stored {
            debug!(source = %record.source, title = %record.title, url = %record.url, "Kept in memory");
        }
        info!(stored = stored.len(), "Dry run finished");
        summary
    } else {
        let store =
            match MongoStore::connect(&args.mongo_uri, &args.database, &args.collection).await {
                Ok(store) => store,
                Err(e) => {
                    error!(
                        database = %args.database,
                        collection = %args.collection,
                        error = %e,
                        "Could not initialise article store (check MONGO_URI)"
                    );
                    return Err(e.into());
                }
            };
        let harvester = Harvester::new(fetcher, store, notifier, adapters, options);
        let summary = harvester.run(&args.sites).await;
        harvester.into_store().shutdown().await;
        summary
    };
    log_summary(&summary);

    info!(
        elapsed = ?summary.elapsed,
        secs = summary.elapsed.as_secs(),
        millis = summary.elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// One line per source: counts for the ones that ran, the error for the rest.
fn log_summary(summary: &RunSummary) {
    for report in &summary.sources {
        match &report.error {
            Some(e) => warn!(source = %report.source, error = %e, "Source failed"),
            None => info!(
                source = %report.source,
                candidates = report.candidates,
                inserted = report.inserted,
                already_stored = report.already_stored,
                skipped = report.skipped,
                store_failures = report.store_failures,
                delivered = report.delivered,
                delivery_failures = report.delivery_failures,
                "Source summary"
            ),
        }
    }
}
