//! Per-request context handed to callbacks

use crate::core::callback::CallbackError;
use crate::core::model::{Model, ModelMeta};
use crate::core::store::{Query, Session, SortKey};
use crate::server::request::ResourceRequest;
use anyhow::anyhow;
use axum::http::{Extensions, HeaderMap};

/// Action a context is created for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Find,
    Create,
    Update,
    Delete,
}

impl Action {
    /// Whether the action reads without modifying
    pub fn is_read(&self) -> bool {
        matches!(self, Action::List | Action::Find)
    }
}

/// State shared by the controller and its callbacks for one request
///
/// `query` and `sort` may be narrowed by an authorizer before the store is
/// consulted. `extensions` is a free side channel between callbacks.
pub struct Context<'a, M: Model> {
    pub action: Action,
    pub query: Query,
    pub sort: Vec<SortKey>,
    pub model: Option<M>,
    pub extensions: Extensions,
    session: &'a Session,
    meta: &'a ModelMeta<M>,
    request: &'a ResourceRequest,
    original: Option<M>,
}

impl<'a, M: Model> Context<'a, M> {
    pub fn new(
        action: Action,
        session: &'a Session,
        meta: &'a ModelMeta<M>,
        request: &'a ResourceRequest,
    ) -> Self {
        Self {
            action,
            query: Query::new(),
            sort: Vec::new(),
            model: None,
            extensions: Extensions::new(),
            session,
            meta,
            request,
            original: None,
        }
    }

    /// Store session checked out for this request
    pub fn session(&self) -> &'a Session {
        self.session
    }

    pub fn meta(&self) -> &'a ModelMeta<M> {
        self.meta
    }

    pub fn request(&self) -> &'a ResourceRequest {
        self.request
    }

    pub fn headers(&self) -> &'a HeaderMap {
        &self.request.headers
    }

    /// Persisted state of the model being updated
    ///
    /// Fetched on first use and cached for the rest of the request. Only
    /// available for [`Action::Update`] once the model is loaded.
    pub async fn original(&mut self) -> Result<&M, CallbackError> {
        if self.action != Action::Update {
            return Err(CallbackError::fatal(anyhow!(
                "original is only available during update"
            )));
        }

        if self.original.is_none() {
            let id = self
                .model
                .as_ref()
                .map(Model::id)
                .ok_or_else(|| CallbackError::fatal(anyhow!("no model loaded")))?;
            let document = self
                .session
                .find_by_id(self.meta.collection_name(), id)
                .await
                .map_err(CallbackError::fatal)?
                .ok_or_else(|| {
                    CallbackError::fatal(anyhow!(
                        "original of {} '{}' not found",
                        self.meta.resource(),
                        id
                    ))
                })?;
            self.original = Some(self.meta.from_document(document).map_err(CallbackError::fatal)?);
        }

        self.original
            .as_ref()
            .ok_or_else(|| CallbackError::fatal(anyhow!("original not cached")))
    }
}
