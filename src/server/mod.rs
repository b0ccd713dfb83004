//! Server module: the controller registry and its HTTP surface
//!
//! - [`GroupBuilder`] registers controllers and validates relationships
//! - [`Group`] routes classified requests to controllers
//! - [`build_router`] exposes a group over axum

pub mod builder;
pub mod group;
pub mod request;
pub mod response;
pub mod router;

pub use builder::GroupBuilder;
pub use group::{Group, InverseLookup};
pub use request::{Intent, RelationshipOp, ResourceRequest};
pub use response::ApiResponse;
pub use router::build_router;
