//! Authorizer and validator callbacks
//!
//! A [`Callback`] receives the request [`Context`] and may inspect or mutate
//! it. Controllers run at most one authorizer and one validator; several
//! callbacks are chained with [`Combine`].
//!
//! ```rust,ignore
//! use jsonapi::prelude::*;
//!
//! let authorizer = from_fn(|ctx: &mut Context<'_, Post>| {
//!     if ctx.headers().contains_key("authorization") {
//!         Ok(())
//!     } else {
//!         Err(CallbackError::plain("missing credentials"))
//!     }
//! });
//! ```

use crate::core::context::Context;
use crate::core::error::ApiError;
use crate::core::model::Model;
use async_trait::async_trait;
use axum::http::StatusCode;
use std::fmt;
use std::sync::Arc;

/// Error returned by a callback
///
/// The status of a plain error is chosen by the call site: 401 for
/// authorizers, 400 for validators.
#[derive(Debug)]
pub enum CallbackError {
    /// Message returned verbatim to the client
    Plain(String),

    /// Internal failure; logged and hidden from the client
    Fatal(anyhow::Error),
}

impl CallbackError {
    pub fn plain(message: impl Into<String>) -> Self {
        CallbackError::Plain(message.into())
    }

    pub fn fatal(cause: impl Into<anyhow::Error>) -> Self {
        CallbackError::Fatal(cause.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CallbackError::Fatal(_))
    }

    /// Convert using the status of the call site for plain errors
    pub fn into_api_error(self, status: StatusCode) -> ApiError {
        match self {
            CallbackError::Plain(message) => ApiError::plain(status, message),
            CallbackError::Fatal(cause) => ApiError::Fatal(cause),
        }
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackError::Plain(message) => write!(f, "{}", message),
            CallbackError::Fatal(cause) => write!(f, "Fatal: {}", cause),
        }
    }
}

impl std::error::Error for CallbackError {}

/// Authorizer or validator hook
#[async_trait]
pub trait Callback<M: Model>: Send + Sync {
    async fn call(&self, ctx: &mut Context<'_, M>) -> Result<(), CallbackError>;
}

#[async_trait]
impl<M: Model, C: Callback<M> + ?Sized> Callback<M> for Arc<C> {
    async fn call(&self, ctx: &mut Context<'_, M>) -> Result<(), CallbackError> {
        (**self).call(ctx).await
    }
}

/// Runs callbacks in order and stops at the first error
pub struct Combine<M> {
    callbacks: Vec<Arc<dyn Callback<M>>>,
}

impl<M: Model> Combine<M> {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn with(mut self, callback: impl Callback<M> + 'static) -> Self {
        self.callbacks.push(Arc::new(callback));
        self
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<M: Model> Default for Combine<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M: Model> Callback<M> for Combine<M> {
    async fn call(&self, ctx: &mut Context<'_, M>) -> Result<(), CallbackError> {
        for callback in &self.callbacks {
            callback.call(ctx).await?;
        }
        Ok(())
    }
}

/// Chain already shared callbacks
pub fn combine<M: Model>(callbacks: Vec<Arc<dyn Callback<M>>>) -> Combine<M> {
    Combine { callbacks }
}

/// Callback built from a synchronous closure
pub struct FnCallback<F>(F);

/// Wrap a closure as a [`Callback`]
pub fn from_fn<M, F>(f: F) -> FnCallback<F>
where
    M: Model,
    F: for<'a, 'b> Fn(&'a mut Context<'b, M>) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    FnCallback(f)
}

#[async_trait]
impl<M, F> Callback<M> for FnCallback<F>
where
    M: Model,
    F: for<'a, 'b> Fn(&'a mut Context<'b, M>) -> Result<(), CallbackError> + Send + Sync,
{
    async fn call(&self, ctx: &mut Context<'_, M>) -> Result<(), CallbackError> {
        (self.0)(ctx)
    }
}

#[cfg(all(test, feature = "in-memory"))]
mod tests {
    use super::*;
    use crate::core::context::Action;
    use crate::core::model::{Field, ModelMeta};
    use crate::core::store::StorePool;
    use crate::server::request::{Intent, ResourceRequest};
    use crate::storage::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Debug, Clone, Default)]
    struct Note {
        id: Uuid,
        text: String,
    }

    impl Model for Note {
        fn id(&self) -> Uuid {
            self.id
        }

        fn set_id(&mut self, id: Uuid) {
            self.id = id;
        }
    }

    fn meta() -> ModelMeta<Note> {
        ModelMeta::new("notes").field(Field::attribute(
            "text",
            |n: &Note| &n.text,
            |n: &mut Note| &mut n.text,
        ))
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Callback<Note> for Counting {
        async fn call(&self, _ctx: &mut Context<'_, Note>) -> Result<(), CallbackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CallbackError::plain("stop"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_combine_stops_at_first_error() {
        let store = InMemoryStore::new();
        let session = store.acquire().await.unwrap();
        let meta = meta();
        let request = ResourceRequest::new(Intent::List);
        let mut ctx = Context::new(Action::List, &session, &meta, &request);

        let calls = Arc::new(AtomicUsize::new(0));
        let combined = Combine::new()
            .with(Counting {
                calls: calls.clone(),
                fail: false,
            })
            .with(Counting {
                calls: calls.clone(),
                fail: true,
            })
            .with(Counting {
                calls: calls.clone(),
                fail: false,
            });
        assert_eq!(combined.len(), 3);

        let err = combined.call(&mut ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "stop");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_from_fn_can_narrow_query() {
        let store = InMemoryStore::new();
        let session = store.acquire().await.unwrap();
        let meta = meta();
        let request = ResourceRequest::new(Intent::List);
        let mut ctx = Context::new(Action::List, &session, &meta, &request);

        let authorizer = from_fn(|ctx: &mut Context<'_, Note>| {
            ctx.query.push(crate::core::store::Clause::Eq(
                "text".to_string(),
                "mine".into(),
            ));
            Ok(())
        });
        authorizer.call(&mut ctx).await.unwrap();
        assert_eq!(ctx.query.clauses().len(), 1);
    }

    #[tokio::test]
    async fn test_original_is_cached_and_update_only() {
        let store = InMemoryStore::new();
        let session = store.acquire().await.unwrap();
        let meta = meta();
        let request = ResourceRequest::new(Intent::List);

        let stored = Note {
            id: Uuid::new_v4(),
            text: "before".to_string(),
        };
        session
            .insert("notes", meta.to_document(&stored))
            .await
            .unwrap();

        let mut find = Context::new(Action::Find, &session, &meta, &request);
        find.model = Some(stored.clone());
        assert!(find.original().await.unwrap_err().is_fatal());

        let mut ctx = Context::new(Action::Update, &session, &meta, &request);
        ctx.model = Some(Note {
            text: "after".to_string(),
            ..stored.clone()
        });
        assert_eq!(ctx.original().await.unwrap().text, "before");

        // a second read is served from the cache
        session
            .remove("notes", &crate::core::store::Query::by_id(stored.id))
            .await
            .unwrap();
        assert_eq!(ctx.original().await.unwrap().text, "before");
    }

    #[test]
    fn test_into_api_error_uses_call_site_status() {
        let error = CallbackError::plain("nope").into_api_error(StatusCode::UNAUTHORIZED);
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);

        let error = CallbackError::fatal(anyhow::anyhow!("db down"))
            .into_api_error(StatusCode::BAD_REQUEST);
        assert!(error.is_fatal());
    }
}
