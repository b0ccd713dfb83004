//! Resource object assembly

use super::Controller;
use crate::core::document::{
    Identifier, Linkage, RelationshipLinks, RelationshipObject, ResourceLinks, ResourceObject,
};
use crate::core::error::ApiError;
use crate::core::model::{FieldMeta, Model, RelationKind, Relationship};
use crate::core::store::{FindOptions, ID_KEY, Session, document_id};
use crate::server::group::Group;
use indexmap::IndexMap;
use uuid::Uuid;

impl<M: Model> Controller<M> {
    /// Build the resource object of a model
    ///
    /// Every declared relationship is present with links, whatever its value.
    /// The sparse fieldset only restricts attributes.
    pub(crate) async fn build_resource(
        &self,
        session: &Session,
        model: &M,
        fieldset: Option<&[String]>,
    ) -> Result<ResourceObject, ApiError> {
        let group = self.group()?;
        let resource = self.meta.resource();
        let id = model.id();

        let mut relationships = IndexMap::new();
        for (field, relationship) in self.meta.schema().relationships() {
            let data = self
                .linkage(&group, session, model, field, relationship)
                .await?;
            let links = RelationshipLinks {
                self_link: group.relationship_url(resource, id, &field.name),
                related: group.related_url(resource, id, &field.name),
            };
            relationships.insert(field.name.clone(), RelationshipObject { links, data });
        }

        Ok(ResourceObject {
            kind: resource.to_string(),
            id: id.to_string(),
            attributes: self.meta.attributes(model, fieldset),
            relationships,
            links: ResourceLinks {
                self_link: group.resource_url(resource, id),
            },
        })
    }

    async fn linkage(
        &self,
        group: &Group,
        session: &Session,
        model: &M,
        field: &FieldMeta,
        relationship: &Relationship,
    ) -> Result<Linkage, ApiError> {
        let target = relationship.target.as_str();
        let identifiers = |ids: &[Uuid]| -> Vec<Identifier> {
            ids.iter().map(|id| Identifier::new(target, *id)).collect()
        };

        match relationship.kind {
            RelationKind::ToOne => {
                let reference = self.meta.to_one(model, &field.name).flatten();
                Ok(Linkage::One(reference.map(|id| Identifier::new(target, id))))
            }
            RelationKind::ToMany => {
                let references = self
                    .meta
                    .to_many(model, &field.name)
                    .map(|ids| identifiers(ids))
                    .unwrap_or_default();
                Ok(Linkage::Many(references))
            }
            RelationKind::HasMany => {
                let ids = self
                    .inverse_ids(group, session, model.id(), &field.name)
                    .await?;
                Ok(Linkage::Many(identifiers(&ids)))
            }
        }
    }

    /// Identifiers of the target documents referencing `id` through the inverse
    pub(crate) async fn inverse_ids(
        &self,
        group: &Group,
        session: &Session,
        id: Uuid,
        relation: &str,
    ) -> Result<Vec<Uuid>, ApiError> {
        let lookup = group.inverse(self.meta.resource(), relation)?;
        let options = FindOptions::default().project([ID_KEY]);
        let documents = session
            .find(&lookup.collection, &lookup.query(id), &options)
            .await?;

        Ok(documents
            .iter()
            .map(document_id)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
