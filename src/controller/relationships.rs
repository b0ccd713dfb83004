//! Related resource and relationship endpoints

use super::{Controller, subject};
use crate::core::context::{Action, Context};
use crate::core::document::{Document, Linkage};
use crate::core::error::ApiError;
use crate::core::model::{FieldMeta, Model, RelationKind, Relationship};
use crate::core::store::{ID_KEY, Query, Session};
use crate::server::request::{RelationshipOp, ResourceRequest};
use crate::server::response::ApiResponse;
use anyhow::anyhow;
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

impl<M: Model> Controller<M> {
    fn relation(&self, name: &str) -> Result<(&FieldMeta, &Relationship), ApiError> {
        self.meta.schema().relationship(name).ok_or_else(|| {
            ApiError::not_found(format!(
                "'{}' has no relationship named '{}'",
                self.meta.resource(),
                name
            ))
        })
    }

    /// `GET /{resource}/{id}/{relation}`
    ///
    /// To-one targets are loaded through the target controller; to-many and
    /// has-many targets are listed by it with the request's list parameters.
    pub(crate) async fn get_related(
        &self,
        session: &Session,
        request: &ResourceRequest,
        id: Uuid,
        relation: &str,
    ) -> Result<ApiResponse, ApiError> {
        let (field, relationship) = self.relation(relation)?;

        let mut ctx = Context::new(Action::Find, session, self.meta(), request);
        self.load(&mut ctx, id).await?;
        let model = subject(&ctx)?;

        let group = self.group()?;
        let target = group.resource(&relationship.target)?;
        let self_link = group.related_url(self.meta.resource(), id, &field.name);

        match relationship.kind {
            RelationKind::ToOne => {
                let related = match self.meta.to_one(model, &field.name).flatten() {
                    Some(target_id) => target.related_resource(session, request, target_id).await?,
                    None => None,
                };
                ApiResponse::ok(&Document::related(related, self_link))
            }
            RelationKind::ToMany => {
                let ids: Vec<Value> = self
                    .meta
                    .to_many(model, &field.name)
                    .map(|ids| ids.iter().map(|id| Value::String(id.to_string())).collect())
                    .unwrap_or_default();
                let base = Query::new().is_in(ID_KEY, ids);
                let document = target
                    .related_collection(session, request, base, self_link)
                    .await?;
                ApiResponse::ok(&document)
            }
            RelationKind::HasMany => {
                let base = group.inverse(self.meta.resource(), &field.name)?.query(id);
                let document = target
                    .related_collection(session, request, base, self_link)
                    .await?;
                ApiResponse::ok(&document)
            }
        }
    }

    /// `GET /{resource}/{id}/relationships/{relation}`
    pub(crate) async fn get_relationship(
        &self,
        session: &Session,
        request: &ResourceRequest,
        id: Uuid,
        relation: &str,
    ) -> Result<ApiResponse, ApiError> {
        self.relation(relation)?;

        let mut ctx = Context::new(Action::Find, session, self.meta(), request);
        self.load(&mut ctx, id).await?;

        let mut resource = self.build_resource(session, subject(&ctx)?, None).await?;
        let relationship = resource.relationships.shift_remove(relation).ok_or_else(|| {
            ApiError::fatal(anyhow!("relationship '{}' missing from resource", relation))
        })?;
        ApiResponse::ok(&relationship)
    }

    /// `PATCH|POST|DELETE /{resource}/{id}/relationships/{relation}`
    ///
    /// Set replaces the references; append and remove only apply to to-many
    /// relationships. The change is validated and persisted like an update.
    pub(crate) async fn modify_relationship(
        &self,
        session: &Session,
        request: &ResourceRequest,
        id: Uuid,
        relation: &str,
        op: RelationshipOp,
    ) -> Result<ApiResponse, ApiError> {
        let (field, relationship) = self.relation(relation)?;
        if relationship.kind == RelationKind::HasMany {
            return Err(ApiError::bad_request(format!(
                "has-many relationship '{}' is read-only; set '{}' on '{}' instead",
                field.name,
                relationship.inverse.as_deref().unwrap_or_default(),
                relationship.target
            )));
        }
        if op != RelationshipOp::Set && relationship.kind != RelationKind::ToMany {
            return Err(ApiError::bad_request(format!(
                "relationship '{}' only supports replacement",
                field.name
            )));
        }

        let linkage = Linkage::from_body(request.body.as_ref())?;

        let mut ctx = Context::new(Action::Update, session, self.meta(), request);
        self.load(&mut ctx, id).await?;

        {
            let model = ctx
                .model
                .as_mut()
                .ok_or_else(|| ApiError::fatal(anyhow!("no model in context")))?;

            match op {
                RelationshipOp::Set => self.meta.assign_linkage(model, &field.name, linkage)?,
                RelationshipOp::Append | RelationshipOp::Remove => {
                    let Linkage::Many(identifiers) = linkage else {
                        return Err(ApiError::bad_request(format!(
                            "relationship '{}' expects an array of resource identifiers",
                            field.name
                        )));
                    };
                    let references = identifiers
                        .iter()
                        .map(|identifier| identifier.resolve(&relationship.target))
                        .collect::<Result<Vec<_>, _>>()?;

                    let stored = self.meta.to_many_mut(model, &field.name).ok_or_else(|| {
                        ApiError::fatal(anyhow!("'{}' is not a to-many relationship", field.name))
                    })?;
                    for reference in references {
                        let position = stored.iter().position(|existing| *existing == reference);
                        match (op, position) {
                            (RelationshipOp::Append, None) => stored.push(reference),
                            (RelationshipOp::Remove, Some(index)) => {
                                stored.remove(index);
                            }
                            _ => {}
                        }
                    }
                }
                RelationshipOp::Get => {
                    return Err(ApiError::fatal(anyhow!(
                        "relationship read routed to modification"
                    )));
                }
            }
        }

        let touched = HashSet::from([field.name.clone()]);
        self.persist(&mut ctx, &touched).await?;

        Ok(ApiResponse::no_content())
    }
}
