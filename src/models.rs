//! Data models for harvested articles.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Source`]: The closed set of sites the harvester knows how to read
//! - [`ExtractionCandidate`]: A (title, link) pair found on a listing page
//! - [`NewArticle`]: An extracted article waiting to be stored
//! - [`ArticleRecord`]: The canonical stored article

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A news site the harvester has an adapter for.
///
/// Each source has a lowercase identifier used on the command line and a
/// display label that is written to the `source` field of stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Humanite,
    Gamespot,
    Marianne,
    LeMonde,
    France3,
    Mediacites,
    LePoint,
}

impl Source {
    /// Every known source, in the order a full run visits them.
    pub const ALL: [Source; 7] = [
        Source::Humanite,
        Source::Gamespot,
        Source::Marianne,
        Source::LeMonde,
        Source::France3,
        Source::Mediacites,
        Source::LePoint,
    ];

    /// The identifier accepted in the `SITES` selection list.
    pub fn id(&self) -> &'static str {
        match self {
            Source::Humanite => "humanite",
            Source::Gamespot => "gamespot",
            Source::Marianne => "marianne",
            Source::LeMonde => "lemonde",
            Source::France3 => "france3",
            Source::Mediacites => "mediacites",
            Source::LePoint => "lepoint",
        }
    }

    /// The label stored in [`ArticleRecord::source`].
    pub fn label(&self) -> &'static str {
        match self {
            Source::Humanite => "L'Humanité",
            Source::Gamespot => "GameSpot",
            Source::Marianne => "Marianne",
            Source::LeMonde => "Le Monde",
            Source::France3 => "France 3 Régions",
            Source::Mediacites => "Médiacités",
            Source::LePoint => "Le Point",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Returned when a selection entry names no known source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown source identifier: {0}")]
pub struct UnknownSource(pub String);

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Source::ALL
            .into_iter()
            .find(|source| source.id() == wanted)
            .ok_or_else(|| UnknownSource(s.to_string()))
    }
}

/// A link found on a listing page, before the article page is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCandidate {
    pub source: Source,
    /// Human-readable headline text from the listing card.
    pub title: String,
    /// The `href` exactly as it appeared in the markup.
    pub raw_href: String,
    /// `raw_href` resolved to an absolute http(s) URL.
    pub url: String,
}

/// An extracted article that has not been stored yet.
///
/// The store stamps `scraped_at` when (and only when) it inserts the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub source: Source,
    pub title: String,
    pub url: String,
    pub content: String,
}

impl NewArticle {
    /// Build an article with surrounding whitespace stripped from every field.
    pub fn new(source: Source, title: &str, url: &str, content: &str) -> Self {
        Self {
            source,
            title: title.trim().to_string(),
            url: url.trim().to_string(),
            content: content.trim().to_string(),
        }
    }

    /// Name of the first required field that is empty, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.title.trim().is_empty() {
            Some("title")
        } else if self.url.trim().is_empty() {
            Some("url")
        } else if self.content.trim().is_empty() {
            Some("content")
        } else {
            None
        }
    }

    /// Turn into a stored record stamped with `scraped_at`.
    pub fn into_record(self, scraped_at: DateTime<Utc>) -> ArticleRecord {
        ArticleRecord {
            source: self.source.label().to_string(),
            title: self.title,
            url: self.url,
            content: self.content,
            scraped_at,
        }
    }
}

/// The canonical stored article. Unique per `(source, url)`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleRecord {
    /// Display label of the [`Source`] this article came from.
    pub source: String,
    pub title: String,
    pub url: String,
    /// Paragraph text joined with newlines.
    pub content: String,
    pub scraped_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parse_is_case_insensitive() {
        assert_eq!("LeMonde".parse::<Source>(), Ok(Source::LeMonde));
        assert_eq!(" humanite ".parse::<Source>(), Ok(Source::Humanite));
        assert_eq!("FRANCE3".parse::<Source>(), Ok(Source::France3));
    }

    #[test]
    fn test_source_parse_unknown() {
        let err = "france24".parse::<Source>().unwrap_err();
        assert_eq!(err, UnknownSource("france24".to_string()));
    }

    #[test]
    fn test_source_ids_round_trip() {
        for source in Source::ALL {
            assert_eq!(source.id().parse::<Source>(), Ok(source));
        }
    }

    #[test]
    fn test_new_article_trims_fields() {
        let article = NewArticle::new(
            Source::LePoint,
            "  Titre \n",
            " https://www.lepoint.fr/a ",
            "\n corps \n",
        );
        assert_eq!(article.title, "Titre");
        assert_eq!(article.url, "https://www.lepoint.fr/a");
        assert_eq!(article.content, "corps");
        assert_eq!(article.missing_field(), None);
    }

    #[test]
    fn test_missing_field() {
        let article = NewArticle::new(Source::Marianne, " ", "https://x.fr/", "text");
        assert_eq!(article.missing_field(), Some("title"));
        let article = NewArticle::new(Source::Marianne, "t", "", "text");
        assert_eq!(article.missing_field(), Some("url"));
        let article = NewArticle::new(Source::Marianne, "t", "https://x.fr/", "  ");
        assert_eq!(article.missing_field(), Some("content"));
    }

    #[test]
    fn test_record_uses_source_label() {
        let now = Utc::now();
        let record =
            NewArticle::new(Source::Mediacites, "t", "https://x.fr/", "c").into_record(now);
        assert_eq!(record.source, "Médiacités");
        assert_eq!(record.scraped_at, now);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"source\":\"Médiacités\""));
    }
}
