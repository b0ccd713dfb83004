//! In-memory document store for testing and development

use crate::config::{ApiConfig, DEFAULT_POOL_SIZE};
use crate::core::error::StorageError;
use crate::core::store::{
    Document, FindOptions, ID_KEY, Query, Session, StorePool, StoreSession,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type Collections = Arc<RwLock<HashMap<String, Vec<Document>>>>;

/// In-memory store
///
/// Collections keep insertion order. A semaphore bounds the number of
/// concurrently checked-out sessions, mirroring a connection pool.
#[derive(Clone)]
pub struct InMemoryStore {
    collections: Collections,
    permits: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_pool_size(DEFAULT_POOL_SIZE)
    }

    /// Store whose session pool is bounded by `pool_size`
    pub fn from_config(config: &ApiConfig) -> Self {
        Self::with_pool_size(config.pool_size)
    }

    pub fn with_pool_size(size: usize) -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            permits: Arc::new(Semaphore::new(size.max(1))),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of sessions currently checked out
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Snapshot of a collection
    pub fn documents(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Released when the owning session drops
struct Lease {
    active: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorePool for InMemoryStore {
    async fn acquire(&self) -> Result<Session, StorageError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StorageError::PoolClosed)?;
        self.active.fetch_add(1, Ordering::SeqCst);

        let lease = Lease {
            active: self.active.clone(),
            _permit: permit,
        };
        let session = InMemorySession {
            collections: self.collections.clone(),
        };
        Ok(Session::new(session).with_lease(lease))
    }
}

struct InMemorySession {
    collections: Collections,
}

fn project(mut document: Document, keys: &[String]) -> Document {
    document.retain(|key, _| key == ID_KEY || keys.iter().any(|k| k == key));
    document
}

#[async_trait]
impl StoreSession for InMemorySession {
    async fn find(
        &self,
        collection: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StorageError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;

        let mut documents: Vec<Document> = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| query.matches(d)).cloned().collect())
            .unwrap_or_default();

        if !options.sort.is_empty() {
            documents.sort_by(|a, b| {
                options
                    .sort
                    .iter()
                    .map(|key| key.compare(a, b))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map(|l| l as usize).unwrap_or(usize::MAX);

        Ok(documents
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| match &options.projection {
                Some(keys) => project(d, keys),
                None => d,
            })
            .collect())
    }

    async fn count(&self, collection: &str, query: &Query) -> Result<u64, StorageError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;

        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| query.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<(), StorageError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;

        let documents = collections.entry(collection.to_string()).or_default();
        if let Some(id) = document.get(ID_KEY)
            && documents.iter().any(|d| d.get(ID_KEY) == Some(id))
        {
            return Err(StorageError::Duplicate {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        documents.push(document);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        query: &Query,
        mut document: Document,
    ) -> Result<u64, StorageError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;

        let Some(existing) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| query.matches(d)))
        else {
            return Ok(0);
        };

        if let Some(id) = existing.get(ID_KEY) {
            document.insert(ID_KEY.to_string(), id.clone());
        }
        *existing = document;
        Ok(1)
    }

    async fn remove(&self, collection: &str, query: &Query) -> Result<u64, StorageError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;

        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|d| !query.matches(d));
        Ok((before - documents.len()) as u64)
    }
}
