//! Article persistence with set-if-absent semantics.
//!
//! Every backend guarantees at most one stored record per `(source, url)`.
//! The guarantee comes from the backend itself (a unique index, an atomic map
//! entry), never from locking in the caller, so any number of harvesting tasks
//! may upsert the same article concurrently:
//!
//! - exactly one call reports [`UpsertOutcome::Inserted`]
//! - every other call reports [`UpsertOutcome::AlreadyExists`]
//! - none of them sees an error because of the race
//!
//! # Backends
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | MongoDB | [`mongo`] | Production; unique index `uniq_source_url` |
//! | In-memory | [`memory`] | Tests and dry runs |

pub mod memory;
pub mod mongo;

use crate::models::NewArticle;
use thiserror::Error;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Result of a successful upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The record did not exist and was written.
    Inserted,
    /// A record with the same `(source, url)` was already stored; nothing changed.
    AlreadyExists,
}

/// Why an upsert did not complete.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The article is missing a required field; nothing was written.
    #[error("article rejected: empty {field}")]
    Validation { field: &'static str },

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

/// A place to keep harvested articles.
pub trait ArticleStore: Send + Sync {
    /// Insert `article` unless its `(source, url)` is already stored.
    ///
    /// `scraped_at` is set to the current time on insert and never touched
    /// afterwards.
    async fn upsert(&self, article: NewArticle) -> Result<UpsertOutcome, StoreError>;
}

/// Reject articles with an empty title, url or content.
pub fn validate(article: &NewArticle) -> Result<(), StoreError> {
    match article.missing_field() {
        Some(field) => Err(StoreError::Validation { field }),
        None => Ok(()),
    }
}
