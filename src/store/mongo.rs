//! MongoDB article store.
//!
//! Records live in one collection with a unique index on `(source, url)`.
//! Upserts use `$setOnInsert`, so an existing document is never modified, and
//! a duplicate-key error from a lost insert race is reported as
//! [`UpsertOutcome::AlreadyExists`].

use super::{ArticleStore, StoreError, UpsertOutcome, validate};
use crate::models::{ArticleRecord, NewArticle};
use chrono::Utc;
use mongodb::bson::{DateTime as BsonDateTime, Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use tracing::{info, instrument, warn};

pub const DEFAULT_URI: &str = "mongodb://localhost:27017/";
pub const DEFAULT_DATABASE: &str = "articles_db";
pub const DEFAULT_COLLECTION: &str = "articles";
pub const UNIQUE_INDEX_NAME: &str = "uniq_source_url";

const DUPLICATE_KEY: i32 = 11000;

/// Article store backed by a MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connect and make sure the `(source, url)` unique index exists.
    ///
    /// Fails when the server cannot be reached, which callers treat as fatal.
    #[instrument(level = "info", skip(uri))]
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let collection = client.database(database).collection::<Document>(collection);

        let index = IndexModel::builder()
            .keys(doc! { "source": 1, "url": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name(UNIQUE_INDEX_NAME.to_string())
                    .build(),
            )
            .build();
        collection.create_index(index).await?;
        info!(index = UNIQUE_INDEX_NAME, "Article collection ready");

        Ok(Self { client, collection })
    }

    /// Close every pooled connection.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
        info!("MongoDB connections closed");
    }
}

/// Filter and `$setOnInsert` update for storing `record`.
fn upsert_documents(record: &ArticleRecord) -> (Document, Document) {
    let filter = doc! { "source": record.source.as_str(), "url": record.url.as_str() };
    let update = doc! {
        "$setOnInsert": {
            "source": record.source.as_str(),
            "title": record.title.as_str(),
            "url": record.url.as_str(),
            "content": record.content.as_str(),
            "scraped_at": BsonDateTime::from_millis(record.scraped_at.timestamp_millis()),
        }
    };
    (filter, update)
}

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

impl ArticleStore for MongoStore {
    #[instrument(level = "debug", skip_all, fields(source = %article.source, url = %article.url))]
    async fn upsert(&self, article: NewArticle) -> Result<UpsertOutcome, StoreError> {
        validate(&article)?;

        let record = article.into_record(Utc::now());
        let (filter, update) = upsert_documents(&record);

        match self.collection.update_one(filter, update).upsert(true).await {
            Ok(result) if result.upserted_id.is_some() => Ok(UpsertOutcome::Inserted),
            Ok(_) => Ok(UpsertOutcome::AlreadyExists),
            Err(e) if is_duplicate_key(&e) => {
                warn!("Lost insert race; article already stored");
                Ok(UpsertOutcome::AlreadyExists)
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use mongodb::bson::from_document;
    use mongodb::error::{CommandError, WriteError};

    fn write_error(code: i32) -> MongoError {
        let e: WriteError =
            from_document(doc! { "code": code, "errmsg": "E11000 duplicate key error" }).unwrap();
        MongoError::from(ErrorKind::Write(WriteFailure::WriteError(e)))
    }

    fn command_error(code: i32) -> MongoError {
        let e: CommandError = from_document(doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error",
        })
        .unwrap();
        MongoError::from(ErrorKind::Command(e))
    }

    #[test]
    fn test_duplicate_key_from_write_error() {
        assert!(is_duplicate_key(&write_error(11000)));
        assert!(!is_duplicate_key(&write_error(121)));
    }

    #[test]
    fn test_duplicate_key_from_command_error() {
        assert!(is_duplicate_key(&command_error(11000)));
        assert!(!is_duplicate_key(&command_error(121)));
    }

    #[test]
    fn test_upsert_documents() {
        let now = Utc::now();
        let record = NewArticle::new(
            Source::Humanite,
            " Titre ",
            "https://www.humanite.fr/a",
            "Corps",
        )
        .into_record(now);
        let (filter, update) = upsert_documents(&record);

        assert_eq!(filter.get_str("source").unwrap(), "L'Humanité");
        assert_eq!(filter.get_str("url").unwrap(), "https://www.humanite.fr/a");
        assert_eq!(filter.len(), 2);

        let set = update.get_document("$setOnInsert").unwrap();
        assert_eq!(set.get_str("title").unwrap(), "Titre");
        assert_eq!(set.get_str("content").unwrap(), "Corps");
        assert_eq!(
            set.get_datetime("scraped_at").unwrap().timestamp_millis(),
            now.timestamp_millis()
        );
        assert_eq!(update.len(), 1);
    }
}
