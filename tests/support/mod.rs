//! Shared fixtures for HTTP-level tests
//!
//! A small blog served from an [`InMemoryStore`]:
//! - `posts`: title, published, text-body; has-many `comments` (inverse
//!   `post`) and `selections` (inverse `posts`)
//! - `comments`: message; to-one `post`, optional to-one `parent`, has-many
//!   `replies` (inverse `parent`)
//! - `selections`: name; to-many `posts`
//!
//! # Usage
//!
//! ```rust,ignore
//! mod support;
//! use support::*;
//! ```

#![allow(dead_code)]

use axum_test::TestServer;
use jsonapi::prelude::*;
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub published: bool,
    pub text_body: String,
}

impl Model for Post {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comment {
    pub id: Uuid,
    pub message: String,
    pub post: Option<Uuid>,
    pub parent: Option<Uuid>,
}

impl Model for Comment {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub id: Uuid,
    pub name: String,
    pub posts: Vec<Uuid>,
}

impl Model for Selection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

pub fn post_meta() -> ModelMeta<Post> {
    ModelMeta::new("posts")
        .field(
            Field::attribute("title", |p: &Post| &p.title, |p: &mut Post| &mut p.title)
                .required()
                .filterable()
                .sortable(),
        )
        .field(
            Field::attribute("published", |p: &Post| &p.published, |p: &mut Post| {
                &mut p.published
            })
            .filterable(),
        )
        .field(Field::attribute(
            "text-body",
            |p: &Post| &p.text_body,
            |p: &mut Post| &mut p.text_body,
        ))
        .field(Field::has_many("comments", "comments", "post"))
        .field(Field::has_many("selections", "selections", "posts"))
}

pub fn comment_meta() -> ModelMeta<Comment> {
    ModelMeta::new("comments")
        .field(
            Field::attribute("message", |c: &Comment| &c.message, |c: &mut Comment| {
                &mut c.message
            })
            .sortable(),
        )
        .field(
            Field::to_one("post", "posts", |c: &Comment| &c.post, |c: &mut Comment| {
                &mut c.post
            })
            .filterable(),
        )
        .field(
            Field::to_one("parent", "comments", |c: &Comment| &c.parent, |c: &mut Comment| {
                &mut c.parent
            })
            .optional(),
        )
        .field(Field::has_many("replies", "comments", "parent"))
}

pub fn selection_meta() -> ModelMeta<Selection> {
    ModelMeta::new("selections")
        .field(Field::attribute(
            "name",
            |s: &Selection| &s.name,
            |s: &mut Selection| &mut s.name,
        ))
        .field(Field::to_many(
            "posts",
            "posts",
            |s: &Selection| &s.posts,
            |s: &mut Selection| &mut s.posts,
        ))
}

// ---------------------------------------------------------------------------
// Servers
// ---------------------------------------------------------------------------

pub struct Controllers {
    pub posts: Controller<Post>,
    pub comments: Controller<Comment>,
    pub selections: Controller<Selection>,
}

/// Default controllers sharing one store
pub fn controllers(store: &InMemoryStore) -> Controllers {
    controllers_on(Arc::new(store.clone()))
}

/// Default controllers over any store backend
pub fn controllers_on(store: Arc<dyn StorePool>) -> Controllers {
    Controllers {
        posts: Controller::new(post_meta(), store.clone()),
        comments: Controller::new(comment_meta(), store.clone()),
        selections: Controller::new(selection_meta(), store),
    }
}

/// Serve customized controllers
pub fn serve(controllers: Controllers) -> TestServer {
    let group = GroupBuilder::new()
        .register(controllers.posts)
        .register(controllers.comments)
        .register(controllers.selections)
        .build()
        .expect("group should build");
    TestServer::new(group.router()).expect("failed to create test server")
}

/// Serve the default blog
pub fn server() -> (TestServer, InMemoryStore) {
    let store = InMemoryStore::new();
    let server = serve(controllers(&store));
    (server, store)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub fn identifier(kind: &str, id: &str) -> Value {
    json!({"type": kind, "id": id})
}

/// Create a resource and return its id
pub async fn create(server: &TestServer, kind: &str, attributes: Value, relationships: Value) -> String {
    let response = server
        .post(&format!("/{}", kind))
        .json(&json!({
            "data": {
                "type": kind,
                "attributes": attributes,
                "relationships": relationships,
            }
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body: Value = response.json();
    body["data"]["id"]
        .as_str()
        .expect("created resource has an id")
        .to_string()
}

pub async fn create_post(server: &TestServer, title: &str) -> String {
    create(server, "posts", json!({"title": title}), json!({})).await
}

pub async fn create_comment(server: &TestServer, post: &str, message: &str) -> String {
    create(
        server,
        "comments",
        json!({"message": message}),
        json!({"post": {"data": identifier("posts", post)}}),
    )
    .await
}

/// Ids of the resources in a collection document
pub fn ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .expect("collection document")
        .iter()
        .map(|resource| resource["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// Ids of the identifiers in relationship data
pub fn linkage_ids(data: &Value) -> Vec<String> {
    data.as_array()
        .expect("to-many linkage")
        .iter()
        .map(|identifier| identifier["id"].as_str().unwrap_or_default().to_string())
        .collect()
}
