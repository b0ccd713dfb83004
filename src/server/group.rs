//! Registry of resource controllers
//!
//! A [`Group`] maps resource names to controllers and is the only way a
//! controller reaches the controller of a related resource. It is built once
//! by [`super::builder::GroupBuilder`] and read-only afterwards.

use super::builder::GroupBuilder;
use super::request::{Intent, ResourceRequest};
use super::response::ApiResponse;
use crate::controller::Resource;
use crate::core::error::ApiError;
use crate::core::query::ListParams;
use crate::core::store::Query;
use anyhow::anyhow;
use axum::Router;
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Resolved storage location of a has-many inverse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InverseLookup {
    /// Collection of the target resource
    pub collection: String,
    /// Storage key of the inverse relationship on the target
    pub key: String,
}

impl InverseLookup {
    /// Documents of the target collection referencing `id`
    pub fn query(&self, id: Uuid) -> Query {
        Query::new().eq(self.key.clone(), id.to_string())
    }
}

/// Registered resources and their resolved inverses
pub struct Group {
    pub(crate) base_url: String,
    pub(crate) resources: HashMap<String, Arc<dyn Resource>>,
    pub(crate) inverses: HashMap<(String, String), InverseLookup>,
}

impl Group {
    pub fn builder() -> GroupBuilder {
        GroupBuilder::new()
    }

    /// Prefix of every generated link
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn Resource>> {
        self.resources.get(name)
    }

    /// Controller of a resource that must exist
    pub fn resource(&self, name: &str) -> Result<&Arc<dyn Resource>, ApiError> {
        self.find(name)
            .ok_or_else(|| ApiError::fatal(anyhow!("resource '{}' is not registered", name)))
    }

    /// Inverse lookup of a has-many relationship
    pub fn inverse(&self, resource: &str, relation: &str) -> Result<&InverseLookup, ApiError> {
        self.inverses
            .get(&(resource.to_string(), relation.to_string()))
            .ok_or_else(|| {
                ApiError::fatal(anyhow!(
                    "no inverse resolved for has-many relationship '{}.{}'",
                    resource,
                    relation
                ))
            })
    }

    /// Registered resource names, sorted
    pub fn resource_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn collection_url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    pub fn resource_url(&self, resource: &str, id: Uuid) -> String {
        format!("{}/{}/{}", self.base_url, resource, id)
    }

    pub fn related_url(&self, resource: &str, id: Uuid, relation: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, resource, id, relation)
    }

    pub fn relationship_url(&self, resource: &str, id: Uuid, relation: &str) -> String {
        format!(
            "{}/{}/{}/relationships/{}",
            self.base_url, resource, id, relation
        )
    }

    /// Route a raw request to the owning controller
    ///
    /// `path` is relative to the group root, e.g. `posts/{id}/comments`.
    pub async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: Vec<(String, String)>,
        headers: HeaderMap,
        body: &[u8],
    ) -> Response {
        match self.route(method, path, query, headers, body).await {
            Ok(response) => response.into_response(),
            Err(error) => error.into_response(),
        }
    }

    async fn route(
        &self,
        method: &Method,
        path: &str,
        query: Vec<(String, String)>,
        headers: HeaderMap,
        body: &[u8],
    ) -> Result<ApiResponse, ApiError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((name, rest)) = segments.split_first() else {
            return Err(ApiError::not_found("no resource given"));
        };

        let resource = self
            .find(name)
            .ok_or_else(|| ApiError::not_found(format!("unknown resource '{}'", name)))?;
        let intent = Intent::classify(method, rest)?;
        resource.accepts(&intent)?;
        let params = ListParams::from_pairs(query)?;

        let mut request = ResourceRequest::new(intent)
            .with_params(params)
            .with_headers(headers);
        if !body.iter().all(u8::is_ascii_whitespace) {
            let value = serde_json::from_slice(body)
                .map_err(|e| ApiError::bad_request(format!("malformed JSON body: {}", e)))?;
            request = request.with_body(value);
        }

        tracing::debug!(resource = %name, intent = ?request.intent, "dispatching request");
        resource.handle(request).await
    }

    /// Axum router serving every registered resource
    pub fn router(self: &Arc<Self>) -> Router {
        super::router::build_router(self.clone())
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("base_url", &self.base_url)
            .field("resources", &self.resource_names())
            .field("inverses", &self.inverses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(base_url: &str) -> Group {
        Group {
            base_url: base_url.to_string(),
            resources: HashMap::new(),
            inverses: HashMap::from([(
                ("posts".to_string(), "comments".to_string()),
                InverseLookup {
                    collection: "comments".to_string(),
                    key: "post".to_string(),
                },
            )]),
        }
    }

    #[test]
    fn test_urls() {
        let group = empty("/api");
        let id = Uuid::nil();
        assert_eq!(group.collection_url("posts"), "/api/posts");
        assert_eq!(group.resource_url("posts", id), format!("/api/posts/{}", id));
        assert_eq!(
            group.related_url("posts", id, "comments"),
            format!("/api/posts/{}/comments", id)
        );
        assert_eq!(
            group.relationship_url("posts", id, "comments"),
            format!("/api/posts/{}/relationships/comments", id)
        );
    }

    #[test]
    fn test_inverse_lookup() {
        let group = empty("");
        let id = Uuid::new_v4();
        let lookup = group.inverse("posts", "comments").unwrap();
        assert_eq!(lookup.query(id), Query::new().eq("post", id.to_string()));
        assert!(group.inverse("posts", "selections").unwrap_err().is_fatal());
    }

    #[test]
    fn test_missing_resource_is_fatal() {
        let group = empty("");
        assert!(group.find("posts").is_none());
        assert!(group.resource("posts").err().is_some_and(|e| e.is_fatal()));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_resource() {
        let group = empty("");
        let response = group
            .dispatch(&Method::GET, "posts", Vec::new(), HeaderMap::new(), b"")
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
