//! # jsonapi-rs
//!
//! Metadata-driven JSON:API resource controllers over a document store.
//!
//! ## Features
//!
//! - **Accessor Tables**: Models describe their fields once with typed lenses, no reflection
//! - **Full Resource Surface**: List, find, create, update, delete and relationship endpoints
//! - **Three Relationship Kinds**: To-one, to-many and inverse has-many resolved across controllers
//! - **Query Parameters**: `filter[...]`, `sort`, `page[number]`, `page[size]`, `fields[...]`
//! - **Callback Pipeline**: Authorizers and validators with plain and fatal errors
//! - **Fail-Fast Registry**: Dangling relationships are rejected when the group is built
//! - **Scoped Sessions**: One store session per request, released on every exit path
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jsonapi::prelude::*;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Post {
//!     id: Uuid,
//!     title: String,
//! }
//!
//! impl Model for Post {
//!     fn id(&self) -> Uuid { self.id }
//!     fn set_id(&mut self, id: Uuid) { self.id = id; }
//! }
//!
//! let meta = ModelMeta::new("posts")
//!     .field(Field::attribute("title", |p: &Post| &p.title, |p: &mut Post| &mut p.title).required())
//!     .field(Field::has_many("comments", "comments", "post"));
//!
//! let store = Arc::new(InMemoryStore::new());
//! let group = GroupBuilder::new()
//!     .register(Controller::new(meta, store.clone()))
//!     .register(Controller::new(comment_meta(), store))
//!     .build()?;
//!
//! axum::serve(listener, group.router()).await?;
//! ```

pub mod config;
pub mod controller;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        callback::{Callback, CallbackError, Combine, FnCallback, combine, from_fn},
        context::{Action, Context},
        document::{Identifier, Linkage, MEDIA_TYPE, ResourceObject},
        error::{ApiError, ConfigError, StorageError},
        model::{Field, FieldMeta, FieldType, Model, ModelMeta, RelationKind, Relationship, Schema},
        query::{ListParams, Page},
        store::{Clause, Document, FindOptions, Query, Session, SortKey, StorePool, StoreSession},
        validation::{
            DependentResources, MatchingReferences, ProtectedAttributes, VerifyReferences,
            validators,
        },
    };

    // === Controllers ===
    pub use crate::controller::{Controller, Resource};

    // === Server ===
    pub use crate::server::{
        ApiResponse, Group, GroupBuilder, Intent, RelationshipOp, ResourceRequest, build_router,
    };

    // === Storage ===
    #[cfg(feature = "in-memory")]
    pub use crate::storage::InMemoryStore;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoStore;

    // === Config ===
    pub use crate::config::{ApiConfig, ResourceConfig};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use uuid::Uuid;
}
