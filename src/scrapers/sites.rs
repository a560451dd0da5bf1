//! Per-site listing and content rules.

use super::extract::ExtractMode::{self, Paragraphs};
use crate::models::Source;

/// Where the article link of a listing card lives.
#[derive(Debug, Clone, Copy)]
pub enum LinkRule {
    /// The card element is itself the `<a>`.
    Card,
    /// First descendant of the card matching the selector.
    Descendant(&'static str),
}

/// Where the headline of a listing card lives.
#[derive(Debug, Clone, Copy)]
pub enum TitleRule {
    /// Text of the first descendant of the card matching the selector.
    Descendant(&'static str),
    /// Text of the link element.
    LinkText,
    /// Like `Descendant`, using the link text when nothing matches.
    DescendantOrLinkText(&'static str),
}

/// How to find article cards on a listing page.
#[derive(Debug, Clone, Copy)]
pub struct ListingRule {
    pub card: &'static str,
    pub link: LinkRule,
    pub title: TitleRule,
}

/// Everything needed to read one site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub source: Source,
    /// Base for resolving hrefs found on the listing page.
    pub base_url: String,
    /// Listing page, relative to `base_url`.
    pub listing_path: &'static str,
    pub listing: ListingRule,
    /// Content strategies, tried in order.
    pub content: Vec<(&'static str, ExtractMode)>,
}

impl SiteConfig {
    /// Point the site at a different host, keeping its rules.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// The rules for reading `source`.
pub fn site_config(source: Source) -> SiteConfig {
    let (base_url, listing_path, listing, content) = match source {
        Source::Humanite => (
            "https://www.humanite.fr/",
            "",
            ListingRule {
                card: "article.myvertical-card",
                link: LinkRule::Descendant("a[href]"),
                title: TitleRule::Descendant("h3.vertical-card__title"),
            },
            vec![("div.article-content", Paragraphs), ("article", Paragraphs)],
        ),
        Source::Gamespot => (
            "https://www.gamespot.com/",
            "",
            ListingRule {
                card: "div.card-item__content",
                link: LinkRule::Descendant("a[href]"),
                title: TitleRule::Descendant("h4.card-item__title"),
            },
            vec![("article", Paragraphs), ("div.js-content-entity-body", Paragraphs)],
        ),
        Source::Marianne => (
            "https://www.marianne.net/",
            "",
            ListingRule {
                card: "article.thumbnail",
                link: LinkRule::Descendant("a.thumbnail__link"),
                title: TitleRule::LinkText,
            },
            vec![("article", Paragraphs), ("div.article__content", Paragraphs)],
        ),
        Source::LeMonde => (
            "https://www.lemonde.fr",
            "international/",
            ListingRule {
                card: "section.area--runner div.article",
                link: LinkRule::Descendant("a.lmd-link-clickarea__link"),
                title: TitleRule::Descendant("p.article__title"),
            },
            vec![("section.article__content", Paragraphs), ("article", Paragraphs)],
        ),
        Source::France3 => (
            "https://france3-regions.franceinfo.fr/",
            "",
            ListingRule {
                card: "a.article-card__title",
                link: LinkRule::Card,
                title: TitleRule::LinkText,
            },
            vec![("div.article__body", Paragraphs), ("article", Paragraphs)],
        ),
        Source::Mediacites => (
            "https://www.mediacites.fr/",
            "",
            ListingRule {
                card: "h2.title",
                link: LinkRule::Descendant("a[href]"),
                title: TitleRule::LinkText,
            },
            vec![("article", Paragraphs), ("div.content", Paragraphs)],
        ),
        Source::LePoint => (
            "https://www.lepoint.fr/",
            "",
            ListingRule {
                card: "article.full-click a[href]",
                link: LinkRule::Card,
                title: TitleRule::DescendantOrLinkText("h2"),
            },
            vec![("div.article-content", Paragraphs), ("article", Paragraphs)],
        ),
    };

    SiteConfig {
        source,
        base_url: base_url.to_string(),
        listing_path,
        listing,
        content,
    }
}
