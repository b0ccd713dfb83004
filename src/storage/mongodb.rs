//! MongoDB store backend using the official MongoDB async driver.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! jsonapi-rs = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! Each resource lives in its own collection. Documents are converted between
//! `serde_json` and BSON; identifiers are stored as strings under `_id`.
//! The driver pools connections itself, so a [`Session`] here is a cheap
//! database handle without a lease.

use crate::core::error::StorageError;
use crate::core::store::{Clause, Document, FindOptions, Query, Session, StorePool, StoreSession};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document as BsonDocument, doc};
use mongodb::{Client, Database};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn backend(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend {
        backend: "mongodb".to_string(),
        message: e.to_string(),
    }
}

fn to_bson(value: &Value) -> Result<Bson, StorageError> {
    bson::to_bson(value).map_err(|e| StorageError::Malformed(e.to_string()))
}

/// Convert a stored JSON document into a BSON document.
fn json_to_document(document: &Document) -> Result<BsonDocument, StorageError> {
    bson::to_document(document).map_err(|e| StorageError::Malformed(e.to_string()))
}

/// Convert a BSON document back into a JSON document.
fn document_to_json(document: BsonDocument) -> Result<Document, StorageError> {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::Malformed(format!(
            "expected object, got {}",
            other
        ))),
    }
}

/// Translate a query into a MongoDB filter.
fn filter_document(query: &Query) -> Result<BsonDocument, StorageError> {
    let mut parts = Vec::with_capacity(query.clauses().len());
    for clause in query.clauses() {
        let part = match clause {
            Clause::Eq(key, value) => doc! { key: to_bson(value)? },
            Clause::In(key, values) => {
                let values = values.iter().map(to_bson).collect::<Result<Vec<_>, _>>()?;
                doc! { key: { "$in": values } }
            }
        };
        parts.push(part);
    }

    Ok(if parts.is_empty() {
        BsonDocument::new()
    } else {
        doc! { "$and": parts }
    })
}

fn sort_document(options: &FindOptions) -> BsonDocument {
    let mut sort = BsonDocument::new();
    for key in &options.sort {
        sort.insert(key.key.clone(), if key.descending { -1 } else { 1 });
    }
    sort
}

/// Cursor limit; a value past `i64::MAX` means no limit, since the driver
/// reads negative limits as single-batch requests
fn cursor_limit(limit: u64) -> Option<i64> {
    i64::try_from(limit).ok()
}

fn projection_document(keys: &[String]) -> BsonDocument {
    let mut projection = BsonDocument::new();
    for key in keys {
        projection.insert(key.clone(), 1);
    }
    projection
}

// ---------------------------------------------------------------------------
// MongoStore
// ---------------------------------------------------------------------------

/// Store backed by a MongoDB database.
///
/// # Example
///
/// ```rust,ignore
/// use jsonapi::storage::MongoStore;
///
/// let store = MongoStore::connect("mongodb://localhost:27017", "blog").await?;
/// let posts = Controller::new(post_meta(), Arc::new(store));
/// ```
#[derive(Clone, Debug)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn connect(uri: &str, database: &str) -> Result<Self, StorageError> {
        let client = Client::with_uri_str(uri).await.map_err(backend)?;
        Ok(Self::new(client.database(database)))
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

#[async_trait]
impl StorePool for MongoStore {
    async fn acquire(&self) -> Result<Session, StorageError> {
        Ok(Session::new(MongoSession {
            database: self.database.clone(),
        }))
    }
}

struct MongoSession {
    database: Database,
}

impl MongoSession {
    fn collection(&self, name: &str) -> mongodb::Collection<BsonDocument> {
        self.database.collection(name)
    }
}

#[async_trait]
impl StoreSession for MongoSession {
    async fn find(
        &self,
        collection: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StorageError> {
        let coll = self.collection(collection);
        let mut find = coll.find(filter_document(query)?);
        if !options.sort.is_empty() {
            find = find.sort(sort_document(options));
        }
        if let Some(skip) = options.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = options.limit.and_then(cursor_limit) {
            find = find.limit(limit);
        }
        if let Some(keys) = &options.projection {
            find = find.projection(projection_document(keys));
        }

        let cursor = find.await.map_err(backend)?;
        let documents: Vec<BsonDocument> = cursor.try_collect().await.map_err(backend)?;
        documents.into_iter().map(document_to_json).collect()
    }

    async fn count(&self, collection: &str, query: &Query) -> Result<u64, StorageError> {
        self.collection(collection)
            .count_documents(filter_document(query)?)
            .await
            .map_err(backend)
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<(), StorageError> {
        self.collection(collection)
            .insert_one(json_to_document(&document)?)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        query: &Query,
        document: Document,
    ) -> Result<u64, StorageError> {
        let result = self
            .collection(collection)
            .replace_one(filter_document(query)?, json_to_document(&document)?)
            .await
            .map_err(backend)?;
        Ok(result.matched_count)
    }

    async fn remove(&self, collection: &str, query: &Query) -> Result<u64, StorageError> {
        let result = self
            .collection(collection)
            .delete_many(filter_document(query)?)
            .await
            .map_err(backend)?;
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::SortKey;
    use serde_json::json;

    #[test]
    fn filter_document_empty_query() {
        assert_eq!(filter_document(&Query::new()).unwrap(), BsonDocument::new());
    }

    #[test]
    fn filter_document_combines_clauses() {
        let query = Query::new()
            .eq("published", true)
            .is_in("title", vec![json!("a"), json!("b")]);
        let filter = filter_document(&query).unwrap();
        assert_eq!(
            filter,
            doc! { "$and": [ { "published": true }, { "title": { "$in": ["a", "b"] } } ] }
        );
    }

    #[test]
    fn sort_document_directions() {
        let options = FindOptions::default().sort(vec![SortKey::asc("title"), SortKey::desc("votes")]);
        assert_eq!(sort_document(&options), doc! { "title": 1, "votes": -1 });
    }

    #[test]
    fn document_round_trip_preserves_fields() {
        let document = json!({"_id": "abc", "title": "x", "posts": ["a"]})
            .as_object()
            .cloned()
            .unwrap();
        let bson = json_to_document(&document).unwrap();
        assert_eq!(document_to_json(bson).unwrap(), document);
    }

    #[test]
    fn cursor_limit_never_goes_negative() {
        assert_eq!(cursor_limit(10), Some(10));
        assert_eq!(cursor_limit(i64::MAX as u64), Some(i64::MAX));
        assert_eq!(cursor_limit(u64::MAX), None);
    }
}
