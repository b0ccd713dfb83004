//! JSON:API wire documents
//!
//! Outbound documents are plain serde structs; inbound bodies are parsed into
//! [`ResourceBody`] and [`Linkage`] with plain 400 errors on malformed input.

use crate::core::error::ApiError;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Media type of every response body
pub const MEDIA_TYPE: &str = "application/vnd.api+json";

/// Parse a resource identifier, rejecting malformed values with a 400
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::bad_request(format!("'{}' is not a valid resource id", raw)))
}

/// Resource identifier object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl Identifier {
    pub fn new(kind: impl Into<String>, id: Uuid) -> Self {
        Self {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    /// Check the type against the expected target and parse the id
    pub fn resolve(&self, target: &str) -> Result<Uuid, ApiError> {
        if self.kind != target {
            return Err(ApiError::bad_request(format!(
                "expected resource of type '{}', got '{}'",
                target, self.kind
            )));
        }
        parse_id(&self.id)
    }
}

/// Relationship data: a single (possibly absent) identifier or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Linkage {
    One(Option<Identifier>),
    Many(Vec<Identifier>),
}

impl Linkage {
    /// Parse the value of a `data` member
    pub fn from_value(value: &Value) -> Result<Self, ApiError> {
        match value {
            Value::Null => Ok(Linkage::One(None)),
            Value::Object(_) => Ok(Linkage::One(Some(identifier(value)?))),
            Value::Array(items) => Ok(Linkage::Many(
                items.iter().map(identifier).collect::<Result<_, _>>()?,
            )),
            _ => Err(ApiError::bad_request(
                "relationship data must be null, an identifier or an array of identifiers",
            )),
        }
    }

    /// Parse a `{"data": ...}` relationship request body
    pub fn from_body(body: Option<&Value>) -> Result<Self, ApiError> {
        let data = body
            .and_then(|b| b.get("data"))
            .ok_or_else(|| ApiError::bad_request("request body must contain 'data'"))?;
        Self::from_value(data)
    }
}

fn identifier(value: &Value) -> Result<Identifier, ApiError> {
    Identifier::deserialize(value)
        .map_err(|e| ApiError::bad_request(format!("invalid resource identifier: {}", e)))
}

/// Links of a relationship object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub related: String,
}

/// Relationship object embedded in a resource or returned on its own
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipObject {
    pub links: RelationshipLinks,
    pub data: Linkage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceLinks {
    #[serde(rename = "self")]
    pub self_link: String,
}

/// Resource object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub attributes: IndexMap<String, Value>,
    pub relationships: IndexMap<String, RelationshipObject>,
    pub links: ResourceLinks,
}

/// Top-level links of a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl DocumentLinks {
    pub fn new(self_link: impl Into<String>) -> Self {
        Self {
            self_link: self_link.into(),
            ..Default::default()
        }
    }
}

/// Primary data of a document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Resource(Option<Box<ResourceObject>>),
    Collection(Vec<ResourceObject>),
}

/// Top-level document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub data: PrimaryData,
    pub links: DocumentLinks,
}

impl Document {
    /// Single resource document linking to the resource itself
    pub fn resource(resource: ResourceObject) -> Self {
        let links = DocumentLinks::new(resource.links.self_link.clone());
        Self {
            data: PrimaryData::Resource(Some(Box::new(resource))),
            links,
        }
    }

    /// Document for a to-one related endpoint; `None` renders `data: null`
    pub fn related(resource: Option<ResourceObject>, self_link: impl Into<String>) -> Self {
        Self {
            data: PrimaryData::Resource(resource.map(Box::new)),
            links: DocumentLinks::new(self_link),
        }
    }

    pub fn collection(resources: Vec<ResourceObject>, links: DocumentLinks) -> Self {
        Self {
            data: PrimaryData::Collection(resources),
            links,
        }
    }
}

// =============================================================================
// Request bodies
// =============================================================================

/// Relationship member of a resource request body
#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipBody {
    #[serde(default, deserialize_with = "present")]
    data: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl RelationshipBody {
    pub fn linkage(&self) -> Result<Linkage, ApiError> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| ApiError::bad_request("relationship must contain 'data'"))?;
        Linkage::from_value(data)
    }
}

/// Resource object of a create or update request
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceBody {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
    #[serde(default)]
    pub relationships: IndexMap<String, RelationshipBody>,
}

impl ResourceBody {
    /// Parse a `{"data": {...}}` request body
    pub fn from_body(body: Option<&Value>) -> Result<Self, ApiError> {
        let data = body
            .and_then(|b| b.get("data"))
            .ok_or_else(|| ApiError::bad_request("request body must contain 'data'"))?;
        Self::deserialize(data)
            .map_err(|e| ApiError::bad_request(format!("invalid resource object: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_linkage_from_value() {
        let id = Uuid::new_v4();
        assert_eq!(Linkage::from_value(&json!(null)).unwrap(), Linkage::One(None));

        let one = Linkage::from_value(&json!({"type": "posts", "id": id.to_string()})).unwrap();
        assert_eq!(one, Linkage::One(Some(Identifier::new("posts", id))));

        let many = Linkage::from_value(&json!([{"type": "posts", "id": id.to_string()}])).unwrap();
        assert_eq!(many, Linkage::Many(vec![Identifier::new("posts", id)]));

        assert!(Linkage::from_value(&json!("posts")).is_err());
        assert!(Linkage::from_value(&json!({"id": "x"})).is_err());
    }

    #[test]
    fn test_linkage_from_body_requires_data() {
        let err = Linkage::from_body(Some(&json!({}))).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert!(Linkage::from_body(None).is_err());
    }

    #[test]
    fn test_identifier_resolve() {
        let id = Uuid::new_v4();
        assert_eq!(Identifier::new("posts", id).resolve("posts").unwrap(), id);
        assert!(Identifier::new("users", id).resolve("posts").is_err());

        let malformed = Identifier {
            kind: "posts".to_string(),
            id: "123".to_string(),
        };
        assert!(malformed.resolve("posts").is_err());
    }

    #[test]
    fn test_resource_body_parsing() {
        let body = json!({
            "data": {
                "type": "comments",
                "attributes": {"message": "hi"},
                "relationships": {
                    "parent": {"data": null},
                    "post": {}
                }
            }
        });
        let parsed = ResourceBody::from_body(Some(&body)).unwrap();
        assert_eq!(parsed.kind, "comments");
        assert!(parsed.id.is_none());
        assert_eq!(parsed.attributes["message"], json!("hi"));
        assert_eq!(
            parsed.relationships["parent"].linkage().unwrap(),
            Linkage::One(None)
        );
        assert!(parsed.relationships["post"].linkage().is_err());
    }

    #[test]
    fn test_serialize_null_to_one() {
        let value = serde_json::to_value(Linkage::One(None)).unwrap();
        assert_eq!(value, json!(null));

        let document = Document::related(None, "/comments/1/parent");
        let value = serde_json::to_value(document).unwrap();
        assert_eq!(value, json!({"data": null, "links": {"self": "/comments/1/parent"}}));
    }
}
