//! Resource controllers
//!
//! A [`Controller`] serves one resource: it classifies nothing itself but
//! receives a [`ResourceRequest`] from its [`Group`], runs the callback
//! pipeline and talks to the store through a single scoped session.

mod assembly;
mod list;
mod mutation;
mod relationships;

use crate::config::ResourceConfig;
use crate::core::callback::Callback;
use crate::core::context::{Action, Context};
use crate::core::document::{Document, ResourceObject};
use crate::core::error::{ApiError, ConfigError};
use crate::core::model::{Model, ModelMeta, Schema};
use crate::core::store::{Query, Session, StorePool};
use crate::server::group::Group;
use crate::server::request::{Intent, RelationshipOp, ResourceRequest};
use crate::server::response::ApiResponse;
use anyhow::anyhow;
use async_trait::async_trait;
use axum::http::StatusCode;
use std::sync::{Arc, OnceLock, Weak};
use uuid::Uuid;

/// Type-erased controller as seen by a [`Group`]
#[async_trait]
pub trait Resource: Send + Sync {
    fn schema(&self) -> &Schema;

    /// Set the owning group; fails when already attached
    fn attach(&self, group: Weak<Group>) -> Result<(), ConfigError>;

    /// Reject an intent the resource never serves, before any parsing
    fn accepts(&self, intent: &Intent) -> Result<(), ApiError>;

    /// Serve a classified request
    async fn handle(&self, request: ResourceRequest) -> Result<ApiResponse, ApiError>;

    /// Load a single resource for a to-one related endpoint
    ///
    /// A missing resource yields `None`.
    async fn related_resource(
        &self,
        session: &Session,
        request: &ResourceRequest,
        id: Uuid,
    ) -> Result<Option<ResourceObject>, ApiError>;

    /// List resources matching `base` for a to-many or has-many related endpoint
    async fn related_collection(
        &self,
        session: &Session,
        request: &ResourceRequest,
        base: Query,
        self_link: String,
    ) -> Result<Document, ApiError>;
}

/// Controller of a single resource
///
/// # Example
///
/// ```ignore
/// let posts = Controller::new(post_meta(), store.clone())
///     .authorizer(from_fn(require_token))
///     .validator(Combine::new().with(DependentResources::new([("comments", "post")])))
///     .list_limit(100);
/// ```
pub struct Controller<M: Model> {
    meta: Arc<ModelMeta<M>>,
    store: Arc<dyn StorePool>,
    authorizer: Option<Arc<dyn Callback<M>>>,
    validator: Option<Arc<dyn Callback<M>>>,
    no_list: bool,
    list_limit: u64,
    group: OnceLock<Weak<Group>>,
}

impl<M: Model> Controller<M> {
    pub fn new(meta: ModelMeta<M>, store: Arc<dyn StorePool>) -> Self {
        Self {
            meta: Arc::new(meta),
            store,
            authorizer: None,
            validator: None,
            no_list: false,
            list_limit: 0,
            group: OnceLock::new(),
        }
    }

    pub fn authorizer(mut self, authorizer: impl Callback<M> + 'static) -> Self {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }

    pub fn validator(mut self, validator: impl Callback<M> + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Reject list requests with 405
    pub fn no_list(mut self, no_list: bool) -> Self {
        self.no_list = no_list;
        self
    }

    /// Force pagination with at most `limit` resources per page; 0 disables
    pub fn list_limit(mut self, limit: u64) -> Self {
        self.list_limit = limit;
        self
    }

    /// Apply configured overrides
    pub fn apply_config(mut self, config: &ResourceConfig) -> Self {
        if let Some(no_list) = config.no_list {
            self.no_list = no_list;
        }
        if let Some(limit) = config.list_limit {
            self.list_limit = limit;
        }
        self
    }

    pub fn meta(&self) -> &ModelMeta<M> {
        &self.meta
    }

    pub(crate) async fn acquire(&self) -> Result<Session, ApiError> {
        Ok(self.store.acquire().await?)
    }

    pub(crate) fn group(&self) -> Result<Arc<Group>, ApiError> {
        self.group.get().and_then(Weak::upgrade).ok_or_else(|| {
            ApiError::fatal(anyhow!(
                "controller for '{}' is not attached to a group",
                self.meta.resource()
            ))
        })
    }

    /// Run the authorizer; plain failures are 401
    pub(crate) async fn authorize(&self, ctx: &mut Context<'_, M>) -> Result<(), ApiError> {
        match &self.authorizer {
            Some(authorizer) => authorizer
                .call(ctx)
                .await
                .map_err(|e| e.into_api_error(StatusCode::UNAUTHORIZED)),
            None => Ok(()),
        }
    }

    /// Run the validator; plain failures are 400
    pub(crate) async fn run_validator(&self, ctx: &mut Context<'_, M>) -> Result<(), ApiError> {
        match &self.validator {
            Some(validator) => validator
                .call(ctx)
                .await
                .map_err(|e| e.into_api_error(StatusCode::BAD_REQUEST)),
            None => Ok(()),
        }
    }
}

/// Model held by a context after loading or construction
pub(crate) fn subject<'c, M: Model>(ctx: &'c Context<'_, M>) -> Result<&'c M, ApiError> {
    ctx.model
        .as_ref()
        .ok_or_else(|| ApiError::fatal(anyhow!("no model in context")))
}

#[async_trait]
impl<M: Model> Resource for Controller<M> {
    fn schema(&self) -> &Schema {
        self.meta.schema()
    }

    fn attach(&self, group: Weak<Group>) -> Result<(), ConfigError> {
        self.group
            .set(group)
            .map_err(|_| ConfigError::AlreadyAttached(self.meta.resource().to_string()))
    }

    fn accepts(&self, intent: &Intent) -> Result<(), ApiError> {
        if *intent == Intent::List && self.no_list {
            return Err(ApiError::method_not_allowed(format!(
                "listing '{}' is disabled",
                self.meta.resource()
            )));
        }
        Ok(())
    }

    async fn handle(&self, request: ResourceRequest) -> Result<ApiResponse, ApiError> {
        self.accepts(&request.intent)?;

        let session = self.acquire().await?;
        let intent = request.intent.clone();

        match intent {
            Intent::List => self.list(&session, &request).await,
            Intent::Find(id) => self.find(&session, &request, id).await,
            Intent::Create => self.create(&session, &request).await,
            Intent::Update(id) => self.update(&session, &request, id).await,
            Intent::Delete(id) => self.delete(&session, &request, id).await,
            Intent::Related { id, relation } => {
                self.get_related(&session, &request, id, &relation).await
            }
            Intent::Relationship {
                id,
                relation,
                op: RelationshipOp::Get,
            } => self.get_relationship(&session, &request, id, &relation).await,
            Intent::Relationship { id, relation, op } => {
                self.modify_relationship(&session, &request, id, &relation, op)
                    .await
            }
        }
    }

    async fn related_resource(
        &self,
        session: &Session,
        request: &ResourceRequest,
        id: Uuid,
    ) -> Result<Option<ResourceObject>, ApiError> {
        let mut ctx = Context::new(Action::Find, session, self.meta(), request);
        match self.load(&mut ctx, id).await {
            Ok(()) => {}
            Err(error) if error.is_not_found() => return Ok(None),
            Err(error) => return Err(error),
        }

        let fieldset = request.params.fields_for(self.meta.resource());
        let resource = self
            .build_resource(session, subject(&ctx)?, fieldset)
            .await?;
        Ok(Some(resource))
    }

    async fn related_collection(
        &self,
        session: &Session,
        request: &ResourceRequest,
        base: Query,
        self_link: String,
    ) -> Result<Document, ApiError> {
        self.collection(session, request, base, self_link).await
    }
}
