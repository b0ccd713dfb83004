//! Axum router for a resource group

use super::group::Group;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use axum::routing::any;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the router serving every resource of a group
///
/// A single catch-all route hands the path to [`Group::dispatch`]:
/// - GET|POST /{resource}
/// - GET|PATCH|DELETE /{resource}/{id}
/// - GET /{resource}/{id}/{relation}
/// - GET|PATCH|POST|DELETE /{resource}/{id}/relationships/{relation}
pub fn build_router(group: Arc<Group>) -> Router {
    Router::new()
        .route("/{*path}", any(dispatch))
        .layer(TraceLayer::new_for_http())
        .with_state(group)
}

async fn dispatch(
    State(group): State<Arc<Group>>,
    method: Method,
    Path(path): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    group.dispatch(&method, &path, query, headers, &body).await
}
