//! Store abstraction: predicates, find options and scoped sessions
//!
//! Resources are persisted as JSON documents in named collections. A request
//! checks out exactly one [`Session`] from a [`StorePool`]; dropping the
//! session returns its lease to the pool on every exit path.

use crate::core::error::StorageError;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;
use uuid::Uuid;

/// A stored document, keyed by storage key
pub type Document = serde_json::Map<String, Value>;

/// Storage key holding the document identifier
pub const ID_KEY: &str = "_id";

/// Read the identifier of a stored document
pub fn document_id(document: &Document) -> Result<Uuid, StorageError> {
    match document.get(ID_KEY) {
        Some(Value::String(raw)) => Uuid::parse_str(raw)
            .map_err(|e| StorageError::Malformed(format!("invalid {} '{}': {}", ID_KEY, raw, e))),
        _ => Err(StorageError::Malformed(format!("missing {}", ID_KEY))),
    }
}

// =============================================================================
// Predicates
// =============================================================================

/// A single predicate clause
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Stored value equals the value, or a stored array contains it
    Eq(String, Value),

    /// Stored value matches any of the values
    In(String, Vec<Value>),
}

impl Clause {
    pub fn key(&self) -> &str {
        match self {
            Clause::Eq(key, _) | Clause::In(key, _) => key,
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        let stored = document.get(self.key());
        match self {
            Clause::Eq(_, expected) => value_matches(stored, expected),
            Clause::In(_, values) => values.iter().any(|v| value_matches(stored, v)),
        }
    }
}

fn value_matches(stored: Option<&Value>, expected: &Value) -> bool {
    match stored {
        Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
        Some(value) => value == expected,
        None => expected.is_null(),
    }
}

/// Conjunction of clauses
///
/// Authorizers may narrow a query by pushing further clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query matching a single identifier
    pub fn by_id(id: Uuid) -> Self {
        Self::new().eq(ID_KEY, id.to_string())
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(key.into(), value.into()));
        self
    }

    pub fn is_in(mut self, key: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.push(Clause::In(key.into(), values));
        self
    }

    /// Append all clauses of another query
    pub fn and(mut self, other: Query) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|clause| clause.matches(document))
    }
}

/// Sort instruction on a storage key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub key: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            descending: false,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            descending: true,
        }
    }

    /// Compare two documents on this key
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = compare_values(a.get(&self.key), b.get(&self.key));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Options applied to a find operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<SortKey>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    /// Storage keys to keep; the identifier is always kept
    pub projection: Option<Vec<String>>,
}

impl FindOptions {
    pub fn sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn project<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.projection = Some(keys.into_iter().map(Into::into).collect());
        self
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Operations available on a checked-out store session
#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Find documents matching a query
    async fn find(
        &self,
        collection: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StorageError>;

    /// Count documents matching a query
    async fn count(&self, collection: &str, query: &Query) -> Result<u64, StorageError>;

    /// Insert a new document
    async fn insert(&self, collection: &str, document: Document) -> Result<(), StorageError>;

    /// Replace the first document matching a query; returns the number replaced
    async fn update(
        &self,
        collection: &str,
        query: &Query,
        document: Document,
    ) -> Result<u64, StorageError>;

    /// Remove all documents matching a query; returns the number removed
    async fn remove(&self, collection: &str, query: &Query) -> Result<u64, StorageError>;

    /// Find a document by identifier
    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Document>, StorageError> {
        let options = FindOptions::default().limit(1);
        let documents = self.find(collection, &Query::by_id(id), &options).await?;
        Ok(documents.into_iter().next())
    }
}

/// A pool handing out sessions
#[async_trait]
pub trait StorePool: Send + Sync {
    /// Check out a session; it is released when the returned guard drops
    async fn acquire(&self) -> Result<Session, StorageError>;
}

/// Scoped session guard
///
/// Dereferences to the underlying [`StoreSession`]. Any lease attached with
/// [`Session::with_lease`] is dropped together with the guard.
pub struct Session {
    inner: Box<dyn StoreSession>,
    lease: Option<Box<dyn Any + Send + Sync>>,
}

impl Session {
    pub fn new(inner: impl StoreSession + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            lease: None,
        }
    }

    /// Attach a value released when the session drops
    pub fn with_lease(mut self, lease: impl Any + Send + Sync) -> Self {
        self.lease = Some(Box::new(lease));
        self
    }
}

impl Deref for Session {
    type Target = dyn StoreSession;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::trace!(leased = self.lease.is_some(), "store session released");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("leased", &self.lease.is_some())
            .finish()
    }
}
