//! Command-line interface definitions for News Harvest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every argument can also be provided through an environment variable, which
//! is how the harvester is usually configured when it runs on a schedule.

use crate::fetcher::DEFAULT_FETCH_TIMEOUT;
use crate::notifier::{DEFAULT_DELIVERY_TIMEOUT, DEFAULT_ENDPOINT};
use crate::orchestrator::HarvestOptions;
use crate::store::mongo::{DEFAULT_COLLECTION, DEFAULT_DATABASE, DEFAULT_URI};
use clap::Parser;

/// Command-line arguments for the News Harvest application.
///
/// # Examples
///
/// ```sh
/// # Harvest every known source
/// news_harvest
///
/// # Only two sources, through the environment
/// SITES=lemonde,lepoint news_harvest
///
/// # All sources at once, four article pages at a time per source
/// news_harvest --parallel-sources --article-workers 4
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Comma-separated source identifiers to harvest (all when omitted)
    #[arg(long, env = "SITES", value_delimiter = ',')]
    pub sites: Vec<String>,

    /// MongoDB connection string
    #[arg(long, env = "MONGO_URI", default_value = DEFAULT_URI)]
    pub mongo_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGO_DB", default_value = DEFAULT_DATABASE)]
    pub database: String,

    /// MongoDB collection name
    #[arg(long, env = "MONGO_COLLECTION", default_value = DEFAULT_COLLECTION)]
    pub collection: String,

    /// Classification endpoint receiving `{"text", "url"}` for each article
    #[arg(long, env = "API_URL", default_value = DEFAULT_ENDPOINT)]
    pub api_url: String,

    /// Timeout in seconds for each page request
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT.as_secs())]
    pub fetch_timeout_secs: u64,

    /// Timeout in seconds for each delivery to the classification endpoint
    #[arg(long, default_value_t = DEFAULT_DELIVERY_TIMEOUT.as_secs())]
    pub api_timeout_secs: u64,

    /// Harvest all selected sources concurrently
    #[arg(long, env = "PARALLEL_SOURCES")]
    pub parallel_sources: bool,

    /// Article pages fetched concurrently per source
    #[arg(long, env = "ARTICLE_WORKERS", default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..=16))]
    pub article_workers: u16,

    /// Keep articles in memory instead of MongoDB (nothing is persisted)
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub fn harvest_options(&self) -> HarvestOptions {
        HarvestOptions {
            parallel_sources: self.parallel_sources,
            article_workers: usize::from(self.article_workers),
        }
    }
}
