//! Validation for resource models
//!
//! Two layers run before a model is persisted:
//!
//! - field rules ([`validators`]) attached to attributes and checked during
//!   structural validation;
//! - validator callbacks ([`builtin`]) that consult the store, such as
//!   reference checks or dependent-resource guards.

pub mod builtin;
pub mod validators;

pub use builtin::{DependentResources, MatchingReferences, ProtectedAttributes, VerifyReferences};
