//! List queries: filters, sorting and pagination

use super::Controller;
use crate::core::context::{Action, Context};
use crate::core::document::{Document, DocumentLinks, parse_id};
use crate::core::error::ApiError;
use crate::core::model::{FieldMeta, FieldType, Model, ScalarKind};
use crate::core::query::{ListParams, Page};
use crate::core::store::{Clause, FindOptions, Query, Session, SortKey};
use crate::server::request::ResourceRequest;
use crate::server::response::ApiResponse;
use serde_json::Value;

/// Coerce a raw filter value to the stored representation of a field
fn filter_value(field: &FieldMeta, raw: &str) -> Result<Value, ApiError> {
    match field.ty {
        // anything but the literal "true" filters on false
        FieldType::Scalar(ScalarKind::Bool) => Ok(Value::Bool(raw == "true")),
        // float fields store `5.0`, which never equals the integer `5`
        FieldType::Scalar(ScalarKind::Number { float: true }) => Ok(raw
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string()))),
        FieldType::Scalar(ScalarKind::Number { float: false }) => Ok(raw
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| raw.parse::<f64>().map(Value::from))
            .unwrap_or_else(|_| Value::String(raw.to_string()))),
        FieldType::Identifier | FieldType::OptionalIdentifier | FieldType::IdentifierList => {
            Ok(Value::String(parse_id(raw)?.to_string()))
        }
        _ => Ok(Value::String(raw.to_string())),
    }
}

impl<M: Model> Controller<M> {
    /// Clauses for the filters requested on filterable fields
    ///
    /// A single value is an equality test, several values a membership test.
    /// Filters on other fields are ignored.
    pub(crate) fn filter_query(&self, params: &ListParams) -> Result<Query, ApiError> {
        let mut query = Query::new();

        for field in &self.meta.schema().fields {
            if !field.filterable {
                continue;
            }
            let Some(key) = &field.key else { continue };
            let Some(raw) = params.filters.get(&field.name) else {
                continue;
            };

            let mut values = raw
                .iter()
                .map(|value| filter_value(field, value))
                .collect::<Result<Vec<_>, _>>()?;
            let clause = if values.len() == 1 {
                Clause::Eq(key.clone(), values.remove(0))
            } else {
                Clause::In(key.clone(), values)
            };
            query.push(clause);
        }

        Ok(query)
    }

    /// Sort keys for sortable fields, in request order
    ///
    /// Unknown or unsortable keys are dropped.
    pub(crate) fn sort_keys(&self, params: &ListParams) -> Vec<SortKey> {
        let mut keys = Vec::new();

        for raw in &params.sort {
            let (name, descending) = match raw.strip_prefix('-') {
                Some(name) => (name, true),
                None => (raw.as_str(), false),
            };

            let key = self
                .meta
                .schema()
                .field(name)
                .filter(|field| field.sortable)
                .and_then(|field| field.key.clone());

            match key {
                Some(key) => keys.push(SortKey { key, descending }),
                None => tracing::debug!(
                    resource = %self.meta.resource(),
                    sort = %raw,
                    "dropping unsupported sort key"
                ),
            }
        }

        keys
    }

    /// Effective page, with the forced list limit applied
    pub(crate) fn page(&self, params: &ListParams) -> Option<Page> {
        Page::resolve(params.page_number, params.page_size, self.list_limit)
    }

    pub(crate) async fn list(
        &self,
        session: &Session,
        request: &ResourceRequest,
    ) -> Result<ApiResponse, ApiError> {
        let self_link = self.group()?.collection_url(self.meta.resource());
        let document = self
            .collection(session, request, Query::new(), self_link)
            .await?;
        ApiResponse::ok(&document)
    }

    /// Collection document for the resources matching `base` and the filters
    ///
    /// Shared by the list endpoint and related collections delegated from
    /// other controllers.
    pub(crate) async fn collection(
        &self,
        session: &Session,
        request: &ResourceRequest,
        base: Query,
        self_link: String,
    ) -> Result<Document, ApiError> {
        let params = &request.params;
        let collection = self.meta.collection_name();

        let mut ctx = Context::new(Action::List, session, self.meta(), request);
        ctx.query = base.and(self.filter_query(params)?);
        ctx.sort = self.sort_keys(params);
        self.authorize(&mut ctx).await?;

        let page = self.page(params);
        let mut options = FindOptions::default().sort(ctx.sort.clone());
        if let Some(page) = page {
            options = options.skip(page.skip()).limit(page.size);
        }

        let documents = session.find(collection, &ctx.query, &options).await?;
        let fieldset = params.fields_for(self.meta.resource());

        let mut resources = Vec::with_capacity(documents.len());
        for document in documents {
            let model = self.meta.from_document(document)?;
            resources.push(self.build_resource(session, &model, fieldset).await?);
        }

        let links = match page {
            Some(page) => {
                let total = session.count(collection, &ctx.query).await?;
                page.links(&self_link, total, &params.link_suffix())
            }
            None => DocumentLinks::new(self_link),
        };

        Ok(Document::collection(resources, links))
    }
}
