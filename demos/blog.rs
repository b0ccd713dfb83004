//! Blog API example
//!
//! Serves posts, comments and selections from an in-memory store:
//! - Posts list their comments and the selections containing them
//! - Comments reference a post and optionally a parent comment
//! - Writes require an `x-api-token: secret` header
//!
//! Overrides are read from the YAML file named by `API_CONFIG`, if set.
//!
//! ```text
//! cargo run --example blog
//! curl -X POST localhost:3000/posts -H 'x-api-token: secret' \
//!      -d '{"data":{"type":"posts","attributes":{"title":"Hello"}}}'
//! ```

use anyhow::Result;
use jsonapi::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default)]
struct Post {
    id: Uuid,
    title: String,
    published: bool,
    text_body: String,
}

impl Model for Post {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

#[derive(Debug, Clone, Default)]
struct Comment {
    id: Uuid,
    message: String,
    post: Option<Uuid>,
    parent: Option<Uuid>,
}

impl Model for Comment {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

#[derive(Debug, Clone, Default)]
struct Selection {
    id: Uuid,
    name: String,
    posts: Vec<Uuid>,
}

impl Model for Selection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

fn post_meta() -> ModelMeta<Post> {
    ModelMeta::new("posts")
        .field(
            Field::attribute("title", |p: &Post| &p.title, |p: &mut Post| &mut p.title)
                .required()
                .filterable()
                .sortable()
                .rule(validators::string_length(1, 200)),
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

fn comment_meta() -> ModelMeta<Comment> {
    ModelMeta::new("comments")
        .field(
            Field::attribute("message", |c: &Comment| &c.message, |c: &mut Comment| {
                &mut c.message
            })
            .required()
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

fn selection_meta() -> ModelMeta<Selection> {
    ModelMeta::new("selections")
        .field(
            Field::attribute("name", |s: &Selection| &s.name, |s: &mut Selection| {
                &mut s.name
            })
            .required(),
        )
        .field(Field::to_many(
            "posts",
            "posts",
            |s: &Selection| &s.posts,
            |s: &mut Selection| &mut s.posts,
        ))
}

/// Reads are public, writes need the demo token
fn require_token<M: Model>(ctx: &mut Context<'_, M>) -> Result<(), CallbackError> {
    if ctx.action.is_read() {
        return Ok(());
    }
    match ctx.headers().get("x-api-token") {
        Some(token) if token == "secret" => Ok(()),
        _ => Err(CallbackError::plain("missing or invalid token")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,jsonapi=debug")),
        )
        .init();

    let config = match std::env::var("API_CONFIG") {
        Ok(path) => ApiConfig::from_yaml_file(path)?,
        Err(_) => ApiConfig::default(),
    };

    let store = Arc::new(InMemoryStore::from_config(&config));

    let posts = Controller::new(post_meta(), store.clone())
        .authorizer(from_fn(require_token::<Post>))
        .validator(
            Combine::new()
                .with(ProtectedAttributes::new([("published", false)]))
                .with(DependentResources::new([("comments", "post")])),
        );

    let comments = Controller::new(comment_meta(), store.clone())
        .authorizer(from_fn(require_token::<Comment>))
        .validator(
            Combine::new()
                .with(VerifyReferences::new([("post", "posts"), ("parent", "comments")]))
                .with(MatchingReferences::new("comments", "parent", [("post", "post")]))
                .with(DependentResources::new([("comments", "parent")])),
        )
        .list_limit(50);

    let selections = Controller::new(selection_meta(), store)
        .authorizer(from_fn(require_token::<Selection>))
        .validator(VerifyReferences::new([("posts", "posts")]));

    GroupBuilder::new()
        .config(config)
        .register(posts)
        .register(comments)
        .register(selections)
        .serve("127.0.0.1:3000")
        .await
}
