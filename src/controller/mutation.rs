//! Find, create, update and delete

use super::{Controller, subject};
use crate::core::context::{Action, Context};
use crate::core::document::{Document, ResourceBody, parse_id};
use crate::core::error::ApiError;
use crate::core::model::Model;
use crate::core::store::{FindOptions, Query, Session};
use crate::server::request::ResourceRequest;
use crate::server::response::ApiResponse;
use anyhow::anyhow;
use std::collections::HashSet;
use uuid::Uuid;

impl<M: Model> Controller<M> {
    /// Load the model with the given id into the context
    ///
    /// The authorizer runs first and may narrow `ctx.query`; a model outside
    /// the narrowed query is reported as not found.
    pub(crate) async fn load(&self, ctx: &mut Context<'_, M>, id: Uuid) -> Result<(), ApiError> {
        ctx.query = Query::by_id(id);
        self.authorize(ctx).await?;

        let document = ctx
            .session()
            .find(
                self.meta.collection_name(),
                &ctx.query,
                &FindOptions::default().limit(1),
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ApiError::not_found(format!(
                    "{} '{}' not found",
                    self.meta.resource(),
                    id
                ))
            })?;

        ctx.model = Some(self.meta.from_document(document)?);
        Ok(())
    }

    fn check_kind(&self, body: &ResourceBody) -> Result<(), ApiError> {
        if body.kind != self.meta.resource() {
            return Err(ApiError::bad_request(format!(
                "expected resource of type '{}', got '{}'",
                self.meta.resource(),
                body.kind
            )));
        }
        Ok(())
    }

    /// Structural validation followed by the validator
    ///
    /// Without `touched` every field is checked (create).
    pub(crate) async fn validate(
        &self,
        ctx: &mut Context<'_, M>,
        touched: Option<&HashSet<String>>,
    ) -> Result<(), ApiError> {
        self.meta
            .validate(subject(ctx)?, touched)
            .map_err(ApiError::bad_request)?;
        self.run_validator(ctx).await
    }

    /// Validate the touched fields and write the model back by id
    pub(crate) async fn persist(
        &self,
        ctx: &mut Context<'_, M>,
        touched: &HashSet<String>,
    ) -> Result<(), ApiError> {
        self.validate(ctx, Some(touched)).await?;

        let model = subject(ctx)?;
        let updated = ctx
            .session()
            .update(
                self.meta.collection_name(),
                &Query::by_id(model.id()),
                self.meta.to_document(model),
            )
            .await?;
        if updated == 0 {
            return Err(ApiError::not_found(format!(
                "{} '{}' not found",
                self.meta.resource(),
                model.id()
            )));
        }
        Ok(())
    }

    fn fieldset<'r>(&self, request: &'r ResourceRequest) -> Option<&'r [String]> {
        request.params.fields_for(self.meta.resource())
    }

    pub(crate) async fn find(
        &self,
        session: &Session,
        request: &ResourceRequest,
        id: Uuid,
    ) -> Result<ApiResponse, ApiError> {
        let mut ctx = Context::new(Action::Find, session, self.meta(), request);
        self.load(&mut ctx, id).await?;

        let resource = self
            .build_resource(session, subject(&ctx)?, self.fieldset(request))
            .await?;
        ApiResponse::ok(&Document::resource(resource))
    }

    pub(crate) async fn create(
        &self,
        session: &Session,
        request: &ResourceRequest,
    ) -> Result<ApiResponse, ApiError> {
        let body = ResourceBody::from_body(request.body.as_ref())?;
        self.check_kind(&body)?;
        if body.id.is_some() {
            return Err(ApiError::bad_request(
                "client-generated ids are not supported",
            ));
        }

        let mut model = M::default();
        model.set_id(Uuid::new_v4());
        self.meta.assign(&mut model, &body)?;

        let mut ctx = Context::new(Action::Create, session, self.meta(), request);
        ctx.model = Some(model);
        self.authorize(&mut ctx).await?;
        self.validate(&mut ctx, None).await?;

        let model = subject(&ctx)?;
        session
            .insert(self.meta.collection_name(), self.meta.to_document(model))
            .await?;
        tracing::debug!(resource = %self.meta.resource(), id = %model.id(), "resource created");

        let resource = self
            .build_resource(session, model, self.fieldset(request))
            .await?;
        let location = resource.links.self_link.clone();
        ApiResponse::created(&Document::resource(resource), location)
    }

    pub(crate) async fn update(
        &self,
        session: &Session,
        request: &ResourceRequest,
        id: Uuid,
    ) -> Result<ApiResponse, ApiError> {
        let body = ResourceBody::from_body(request.body.as_ref())?;
        self.check_kind(&body)?;
        if let Some(raw) = &body.id
            && parse_id(raw)? != id
        {
            return Err(ApiError::bad_request(format!(
                "resource id '{}' does not match '{}'",
                raw, id
            )));
        }

        let mut ctx = Context::new(Action::Update, session, self.meta(), request);
        self.load(&mut ctx, id).await?;

        let touched = {
            let model = ctx
                .model
                .as_mut()
                .ok_or_else(|| ApiError::fatal(anyhow!("no model in context")))?;
            self.meta.assign(model, &body)?
        };
        self.persist(&mut ctx, &touched).await?;

        let resource = self
            .build_resource(session, subject(&ctx)?, self.fieldset(request))
            .await?;
        ApiResponse::ok(&Document::resource(resource))
    }

    pub(crate) async fn delete(
        &self,
        session: &Session,
        request: &ResourceRequest,
        id: Uuid,
    ) -> Result<ApiResponse, ApiError> {
        let mut ctx = Context::new(Action::Delete, session, self.meta(), request);
        self.load(&mut ctx, id).await?;
        self.run_validator(&mut ctx).await?;

        session
            .remove(self.meta.collection_name(), &ctx.query)
            .await?;
        tracing::debug!(resource = %self.meta.resource(), id = %id, "resource deleted");

        Ok(ApiResponse::no_content())
    }
}
