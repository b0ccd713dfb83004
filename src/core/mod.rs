//! Core module containing the resource model, callbacks and store traits

pub mod callback;
pub mod context;
pub mod document;
pub mod error;
pub mod model;
pub mod query;
pub mod store;
pub mod validation;

pub use callback::{Callback, CallbackError, Combine, combine, from_fn};
pub use context::{Action, Context};
pub use document::{Document, Identifier, Linkage, ResourceObject};
pub use error::{ApiError, ConfigError, StorageError};
pub use model::{Field, FieldMeta, FieldType, Model, ModelMeta, RelationKind, Relationship, Schema};
pub use query::{ListParams, Page};
pub use store::{Query, Session, SortKey, StorePool, StoreSession};
