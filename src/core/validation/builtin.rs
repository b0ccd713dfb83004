//! Built-in validator callbacks
//!
//! Each validator is an ordinary [`Callback`] and is usually combined with
//! others through [`crate::core::callback::Combine`]:
//!
//! ```rust,ignore
//! let validator = Combine::new()
//!     .with(ProtectedAttributes::new([("published", false)]))
//!     .with(DependentResources::new([("comments", "post")]));
//! ```

use crate::core::callback::{Callback, CallbackError};
use crate::core::context::{Action, Context};
use crate::core::model::{Model, ModelMeta};
use crate::core::store::Query;
use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

fn loaded<'c, M: Model>(ctx: &'c Context<'_, M>) -> Result<&'c M, CallbackError> {
    ctx.model
        .as_ref()
        .ok_or_else(|| CallbackError::fatal(anyhow!("validator invoked without a model")))
}

fn value_of<M: Model>(meta: &ModelMeta<M>, model: &M, field: &str) -> Result<Value, CallbackError> {
    meta.field_value(model, field).ok_or_else(|| {
        CallbackError::fatal(anyhow!(
            "'{}' has no stored field named '{}'",
            meta.resource(),
            field
        ))
    })
}

fn references<M: Model>(meta: &ModelMeta<M>, model: &M, field: &str) -> Result<Vec<Uuid>, CallbackError> {
    if let Some(reference) = meta.to_one(model, field) {
        return Ok(reference.into_iter().collect());
    }
    if let Some(references) = meta.to_many(model, field) {
        return Ok(references.clone());
    }
    Err(CallbackError::fatal(anyhow!(
        "'{}' has no to-one or to-many relationship named '{}'",
        meta.resource(),
        field
    )))
}

// =============================================================================
// ProtectedAttributes
// =============================================================================

/// Rejects writes to protected fields
///
/// On create each field must hold its configured default; on update it must
/// be unchanged from the persisted original.
pub struct ProtectedAttributes {
    fields: Vec<(String, Value)>,
}

impl ProtectedAttributes {
    pub fn new<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl<M: Model> Callback<M> for ProtectedAttributes {
    async fn call(&self, ctx: &mut Context<'_, M>) -> Result<(), CallbackError> {
        let meta = ctx.meta();

        match ctx.action {
            Action::Create => {
                let model = loaded(ctx)?;
                for (field, default) in &self.fields {
                    if &value_of(meta, model, field)? != default {
                        return Err(CallbackError::plain(format!(
                            "field '{}' is protected",
                            field
                        )));
                    }
                }
            }
            Action::Update => {
                let current = {
                    let model = loaded(ctx)?;
                    self.fields
                        .iter()
                        .map(|(field, _)| value_of(meta, model, field).map(|value| (field, value)))
                        .collect::<Result<Vec<_>, _>>()?
                };

                let original = ctx.original().await?;
                for (field, value) in current {
                    if value_of(meta, original, field)? != value {
                        return Err(CallbackError::plain(format!(
                            "field '{}' is protected",
                            field
                        )));
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }
}

// =============================================================================
// DependentResources
// =============================================================================

/// Blocks deletion while other documents still reference the resource
///
/// Each entry names a collection and the storage key holding the reference.
pub struct DependentResources {
    resources: Vec<(String, String)>,
}

impl DependentResources {
    pub fn new<I, C, K>(resources: I) -> Self
    where
        I: IntoIterator<Item = (C, K)>,
        C: Into<String>,
        K: Into<String>,
    {
        Self {
            resources: resources
                .into_iter()
                .map(|(c, k)| (c.into(), k.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl<M: Model> Callback<M> for DependentResources {
    async fn call(&self, ctx: &mut Context<'_, M>) -> Result<(), CallbackError> {
        if ctx.action != Action::Delete {
            return Ok(());
        }

        let id = loaded(ctx)?.id();
        let session = ctx.session();

        for (collection, key) in &self.resources {
            let query = Query::new().eq(key.as_str(), id.to_string());
            let count = session
                .count(collection, &query)
                .await
                .map_err(CallbackError::fatal)?;
            if count > 0 {
                return Err(CallbackError::plain("resource has dependent resources"));
            }
        }

        Ok(())
    }
}

// =============================================================================
// VerifyReferences
// =============================================================================

/// Ensures every set reference points at an existing document
///
/// Each entry names a relationship field and the collection it points into.
pub struct VerifyReferences {
    references: Vec<(String, String)>,
}

impl VerifyReferences {
    pub fn new<I, F, C>(references: I) -> Self
    where
        I: IntoIterator<Item = (F, C)>,
        F: Into<String>,
        C: Into<String>,
    {
        Self {
            references: references
                .into_iter()
                .map(|(f, c)| (f.into(), c.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl<M: Model> Callback<M> for VerifyReferences {
    async fn call(&self, ctx: &mut Context<'_, M>) -> Result<(), CallbackError> {
        if !matches!(ctx.action, Action::Create | Action::Update) {
            return Ok(());
        }

        let meta = ctx.meta();
        let session = ctx.session();
        let model = loaded(ctx)?;

        for (field, collection) in &self.references {
            for id in references(meta, model, field)? {
                let count = session
                    .count(collection, &Query::by_id(id))
                    .await
                    .map_err(CallbackError::fatal)?;
                if count != 1 {
                    return Err(CallbackError::plain(format!(
                        "missing required relationship '{}'",
                        field
                    )));
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// MatchingReferences
// =============================================================================

/// Ensures a referenced document agrees with the model on selected fields
///
/// The document referenced by `reference` in `collection` must carry, for
/// each `(target key, local field)` pair, the same value as the local field.
pub struct MatchingReferences {
    collection: String,
    reference: String,
    matches: Vec<(String, String)>,
}

impl MatchingReferences {
    pub fn new<I, T, L>(collection: &str, reference: &str, matches: I) -> Self
    where
        I: IntoIterator<Item = (T, L)>,
        T: Into<String>,
        L: Into<String>,
    {
        Self {
            collection: collection.to_string(),
            reference: reference.to_string(),
            matches: matches
                .into_iter()
                .map(|(t, l)| (t.into(), l.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl<M: Model> Callback<M> for MatchingReferences {
    async fn call(&self, ctx: &mut Context<'_, M>) -> Result<(), CallbackError> {
        if !matches!(ctx.action, Action::Create | Action::Update) {
            return Ok(());
        }

        let meta = ctx.meta();
        let model = loaded(ctx)?;

        let reference = meta.to_one(model, &self.reference).ok_or_else(|| {
            CallbackError::fatal(anyhow!(
                "'{}' has no to-one relationship named '{}'",
                meta.resource(),
                self.reference
            ))
        })?;
        let Some(id) = reference else {
            return Ok(());
        };

        let mut query = Query::by_id(id);
        for (target, local) in &self.matches {
            let value = value_of(meta, model, local)?;
            if value.is_null() {
                return Err(CallbackError::plain(format!(
                    "missing value for '{}'",
                    local
                )));
            }
            query = query.eq(target.as_str(), value);
        }

        let count = ctx
            .session()
            .count(&self.collection, &query)
            .await
            .map_err(CallbackError::fatal)?;
        if count == 0 {
            return Err(CallbackError::plain(format!(
                "references of '{}' do not match",
                self.reference
            )));
        }

        Ok(())
    }
}
