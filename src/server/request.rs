//! Inbound request classification

use crate::core::document::parse_id;
use crate::core::error::ApiError;
use crate::core::query::ListParams;
use axum::http::{HeaderMap, Method};
use serde_json::Value;
use uuid::Uuid;

/// Operation on a relationship endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipOp {
    Get,
    Set,
    Append,
    Remove,
}

/// What a request asks a controller to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    List,
    Find(Uuid),
    Create,
    Update(Uuid),
    Delete(Uuid),
    /// `GET /{resource}/{id}/{relation}`
    Related { id: Uuid, relation: String },
    /// `/{resource}/{id}/relationships/{relation}`
    Relationship {
        id: Uuid,
        relation: String,
        op: RelationshipOp,
    },
}

fn not_allowed(method: &Method) -> ApiError {
    ApiError::method_not_allowed(format!("method {} is not allowed here", method))
}

impl Intent {
    /// Classify a method and the path segments following the resource name
    pub fn classify(method: &Method, segments: &[&str]) -> Result<Self, ApiError> {
        let method_name = method.as_str();

        match segments {
            [] => match method_name {
                "GET" => Ok(Intent::List),
                "POST" => Ok(Intent::Create),
                _ => Err(not_allowed(method)),
            },
            [id] => {
                let intent = match method_name {
                    "GET" => Intent::Find,
                    "PATCH" => Intent::Update,
                    "DELETE" => Intent::Delete,
                    _ => return Err(not_allowed(method)),
                };
                Ok(intent(parse_id(id)?))
            }
            [id, relation] => match method_name {
                "GET" => Ok(Intent::Related {
                    id: parse_id(id)?,
                    relation: relation.to_string(),
                }),
                _ => Err(not_allowed(method)),
            },
            [id, "relationships", relation] => {
                let op = match method_name {
                    "GET" => RelationshipOp::Get,
                    "PATCH" => RelationshipOp::Set,
                    "POST" => RelationshipOp::Append,
                    "DELETE" => RelationshipOp::Remove,
                    _ => return Err(not_allowed(method)),
                };
                Ok(Intent::Relationship {
                    id: parse_id(id)?,
                    relation: relation.to_string(),
                    op,
                })
            }
            _ => Err(ApiError::not_found("no such endpoint")),
        }
    }
}

/// A classified request routed to a controller
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub intent: Intent,
    pub params: ListParams,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl ResourceRequest {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            params: ListParams::default(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_params(mut self, params: ListParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}
