//! News source adapters for turning site markup into article candidates.
//!
//! Every site is read the same way, in two phases:
//!
//! 1. **Listing**: Find article cards on the site's front or section page and
//!    pull a title and a link out of each one
//! 2. **Content**: Extract the body text of each linked article page
//!
//! The sites only differ in *which* elements hold those pieces, so a single
//! table-driven [`SiteAdapter`] implements [`SourceAdapter`] for all of them.
//! The per-site rules live in [`sites`].
//!
//! # Supported Sources
//!
//! | Source | Listing page | Card selector |
//! |--------|--------------|---------------|
//! | L'Humanité | `humanite.fr/` | `article.myvertical-card` |
//! | GameSpot | `gamespot.com/` | `div.card-item__content` |
//! | Marianne | `marianne.net/` | `article.thumbnail` |
//! | Le Monde | `lemonde.fr/international/` | `section.area--runner div.article` |
//! | France 3 Régions | `france3-regions.franceinfo.fr/` | `a.article-card__title` |
//! | Médiacités | `mediacites.fr/` | `h2.title` |
//! | Le Point | `lepoint.fr/` | `article.full-click a[href]` |

pub mod extract;
pub mod sites;

use crate::links;
use crate::models::{ExtractionCandidate, Source};
use extract::{ExtractMode, extract_text, node_text};
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

pub use sites::{LinkRule, ListingRule, SiteConfig, TitleRule, site_config};

/// Raised when a site configuration cannot be turned into an adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid selector {selector:?} for {site}: {reason}")]
    Selector {
        site: Source,
        selector: String,
        reason: String,
    },

    #[error("invalid base url {url:?} for {site}: {reason}")]
    BaseUrl {
        site: Source,
        url: String,
        reason: String,
    },
}

/// The two capabilities every news source provides.
///
/// Implementations only parse; fetching is the orchestrator's job, so an
/// adapter never sees network failures.
pub trait SourceAdapter: Send + Sync {
    /// Which site this adapter reads.
    fn source(&self) -> Source;

    /// Absolute URL of the listing page to scan for articles.
    fn listing_url(&self) -> &str;

    /// Extract article candidates from a fetched listing page.
    ///
    /// Cards without a navigable link or without title text are skipped.
    fn listing(&self, doc: &Html) -> Vec<ExtractionCandidate>;

    /// Extract newline-joined body text from a fetched article page.
    ///
    /// Returns an empty string only when the page has no text to offer.
    fn extract_content(&self, doc: &Html) -> String;
}

enum CompiledLink {
    Card,
    Descendant(Selector),
}

enum CompiledTitle {
    Descendant(Selector),
    LinkText,
    DescendantOrLinkText(Selector),
}

/// A [`SourceAdapter`] driven by a [`SiteConfig`] with precompiled selectors.
pub struct SiteAdapter {
    source: Source,
    base_url: String,
    listing_url: String,
    card: Selector,
    link: CompiledLink,
    title: CompiledTitle,
    strategies: Vec<(Selector, ExtractMode)>,
}

impl std::fmt::Debug for SiteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteAdapter")
            .field("source", &self.source)
            .field("base_url", &self.base_url)
            .field("listing_url", &self.listing_url)
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

impl SiteAdapter {
    /// Compile every selector of `config`.
    pub fn new(config: SiteConfig) -> Result<Self, AdapterError> {
        let site = config.source;
        let compile = |selector: &str| {
            Selector::parse(selector).map_err(|e| AdapterError::Selector {
                site,
                selector: selector.to_string(),
                reason: e.to_string(),
            })
        };

        let listing_url = Url::parse(&config.base_url)
            .and_then(|base| base.join(config.listing_path))
            .map_err(|e| AdapterError::BaseUrl {
                site,
                url: config.base_url.clone(),
                reason: e.to_string(),
            })?
            .to_string();

        let card = compile(config.listing.card)?;
        let link = match config.listing.link {
            LinkRule::Card => CompiledLink::Card,
            LinkRule::Descendant(selector) => CompiledLink::Descendant(compile(selector)?),
        };
        let title = match config.listing.title {
            TitleRule::Descendant(selector) => CompiledTitle::Descendant(compile(selector)?),
            TitleRule::LinkText => CompiledTitle::LinkText,
            TitleRule::DescendantOrLinkText(selector) => {
                CompiledTitle::DescendantOrLinkText(compile(selector)?)
            }
        };
        let strategies = config
            .content
            .iter()
            .map(|(selector, mode)| compile(*selector).map(|s| (s, *mode)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: site,
            base_url: config.base_url,
            listing_url,
            card,
            link,
            title,
            strategies,
        })
    }

    fn candidate(&self, card: ElementRef<'_>) -> Option<ExtractionCandidate> {
        let link = match &self.link {
            CompiledLink::Card => card,
            CompiledLink::Descendant(selector) => card.select(selector).next()?,
        };
        let raw_href = link.value().attr("href")?;
        let url = links::normalize(&self.base_url, raw_href)?;

        let title = match &self.title {
            CompiledTitle::Descendant(selector) => card.select(selector).next().map(node_text),
            CompiledTitle::LinkText => Some(node_text(link)),
            CompiledTitle::DescendantOrLinkText(selector) => Some(
                card.select(selector)
                    .next()
                    .map(node_text)
                    .unwrap_or_else(|| node_text(link)),
            ),
        }
        .filter(|t| !t.is_empty())?;

        Some(ExtractionCandidate {
            source: self.source,
            title,
            raw_href: raw_href.to_string(),
            url,
        })
    }
}

impl SourceAdapter for SiteAdapter {
    fn source(&self) -> Source {
        self.source
    }

    fn listing_url(&self) -> &str {
        &self.listing_url
    }

    #[instrument(level = "debug", skip_all, fields(source = %self.source))]
    fn listing(&self, doc: &Html) -> Vec<ExtractionCandidate> {
        let cards = doc.select(&self.card).count();
        let candidates = doc
            .select(&self.card)
            .filter_map(|card| self.candidate(card))
            .unique_by(|c| c.url.clone())
            .collect::<Vec<_>>();

        info!(
            cards,
            count = candidates.len(),
            source = %self.source,
            "Indexed listing page"
        );
        debug!(urls = ?candidates.iter().map(|c| &c.url).collect::<Vec<_>>(), "Candidate URLs");
        candidates
    }

    fn extract_content(&self, doc: &Html) -> String {
        extract_text(doc, &self.strategies)
    }
}

/// Build an adapter for every known source, in run order.
pub fn builtin_adapters() -> Result<Vec<Arc<dyn SourceAdapter>>, AdapterError> {
    Source::ALL
        .into_iter()
        .map(|source| {
            SiteAdapter::new(site_config(source)).map(|a| Arc::new(a) as Arc<dyn SourceAdapter>)
        })
        .collect()
}
