//! In-process article store.

use super::{ArticleStore, StoreError, UpsertOutcome, validate};
use crate::models::{ArticleRecord, NewArticle};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

/// Article store backed by a concurrent map keyed by `(source label, url)`.
///
/// The map's entry API is the uniqueness constraint: checking for a key and
/// inserting it happen under the same shard lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<(String, String), ArticleRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored record for `(source label, url)`, if any.
    pub fn get(&self, source: &str, url: &str) -> Option<ArticleRecord> {
        self.records
            .get(&(source.to_string(), url.to_string()))
            .map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every stored record, in no particular order.
    pub fn records(&self) -> Vec<ArticleRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }
}

impl ArticleStore for MemoryStore {
    async fn upsert(&self, article: NewArticle) -> Result<UpsertOutcome, StoreError> {
        validate(&article)?;

        let key = (article.source.label().to_string(), article.url.clone());
        let outcome = match self.records.entry(key) {
            Entry::Occupied(_) => UpsertOutcome::AlreadyExists,
            Entry::Vacant(slot) => {
                slot.insert(article.into_record(Utc::now()));
                UpsertOutcome::Inserted
            }
        };
        debug!(?outcome, "Memory upsert");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use std::sync::Arc;

    fn article(url: &str) -> NewArticle {
        NewArticle::new(Source::LeMonde, "Titre", url, "Premier.\nSecond.")
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let url = "https://www.lemonde.fr/international/article/a.html";

        assert_eq!(store.upsert(article(url)).await.unwrap(), UpsertOutcome::Inserted);
        let first = store.get("Le Monde", url).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut again = article(url);
        again.content = "Contenu modifié".to_string();
        assert_eq!(store.upsert(again).await.unwrap(), UpsertOutcome::AlreadyExists);

        assert_eq!(store.len(), 1);
        let stored = store.get("Le Monde", url).unwrap();
        assert_eq!(stored.scraped_at, first.scraped_at);
        assert_eq!(stored.content, "Premier.\nSecond.");
    }

    #[tokio::test]
    async fn test_same_url_different_source_are_distinct() {
        let store = MemoryStore::new();
        let url = "https://example.com/shared";
        store.upsert(article(url)).await.unwrap();
        let other = NewArticle::new(Source::LePoint, "Titre", url, "Texte");
        assert_eq!(store.upsert(other).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_records_lists_every_stored_article() {
        let store = MemoryStore::new();
        store.upsert(article("https://www.lemonde.fr/a.html")).await.unwrap();
        store.upsert(article("https://www.lemonde.fr/b.html")).await.unwrap();
        store.upsert(article("https://www.lemonde.fr/a.html")).await.unwrap();

        let mut urls = store.records().into_iter().map(|r| r.url).collect::<Vec<_>>();
        urls.sort();
        assert_eq!(urls, vec!["https://www.lemonde.fr/a.html", "https://www.lemonde.fr/b.html"]);
        assert!(store.records().iter().all(|r| r.source == "Le Monde"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_insert_once() {
        let store = Arc::new(MemoryStore::new());
        let url = "https://www.lemonde.fr/international/article/race.html";

        let handles = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.upsert(article(url)).await })
            })
            .collect::<Vec<_>>();

        let mut inserted = 0;
        let mut existing = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                UpsertOutcome::Inserted => inserted += 1,
                UpsertOutcome::AlreadyExists => existing += 1,
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(existing, 31);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_articles_are_rejected() {
        let store = MemoryStore::new();
        let cases = [
            (NewArticle::new(Source::Marianne, "", "https://x.fr/a", "c"), "title"),
            (NewArticle::new(Source::Marianne, "t", " ", "c"), "url"),
            (NewArticle::new(Source::Marianne, "t", "https://x.fr/b", "\n"), "content"),
        ];
        for (article, expected) in cases {
            match store.upsert(article).await {
                Err(StoreError::Validation { field }) => assert_eq!(field, expected),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
        assert!(store.is_empty());
    }
}
