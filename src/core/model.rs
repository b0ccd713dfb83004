//! Model metadata and the per-model accessor table
//!
//! A [`ModelMeta`] describes one resource: its name, storage collection and
//! fields. Every field pairs a [`FieldMeta`] descriptor with typed accessors
//! built from fn-pointer lenses, so reading or writing a field never relies on
//! runtime type inspection.
//!
//! ```rust,ignore
//! use jsonapi::prelude::*;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Comment {
//!     id: Uuid,
//!     message: String,
//!     post: Option<Uuid>,
//! }
//!
//! let meta = ModelMeta::new("comments")
//!     .field(Field::attribute("message", |c: &Comment| &c.message, |c: &mut Comment| &mut c.message).required())
//!     .field(Field::to_one("post", "posts", |c: &Comment| &c.post, |c: &mut Comment| &mut c.post));
//! ```

use crate::core::document::{Linkage, ResourceBody};
use crate::core::error::{ApiError, StorageError};
use crate::core::store::{Document, ID_KEY, document_id};
use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// A persisted resource model
///
/// `Default` provides the zero-value instance populated on create.
pub trait Model: Clone + Default + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn set_id(&mut self, id: Uuid);
}

/// JSON kind of an attribute, derived from the zero-value instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    /// `float` when the zero value serializes as a floating point number
    Number { float: bool },
    String,
    Other,
}

impl ScalarKind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ScalarKind::Bool,
            Value::Number(n) => ScalarKind::Number { float: n.is_f64() },
            Value::String(_) => ScalarKind::String,
            _ => ScalarKind::Other,
        }
    }
}

/// Type tag of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarKind),
    Identifier,
    OptionalIdentifier,
    IdentifierList,
    /// Has-many relationship without storage
    Inverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    ToOne,
    ToMany,
    HasMany,
}

/// Relationship descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub kind: RelationKind,
    pub name: String,
    pub target: String,
    /// Relation name on the target holding the reference (has-many only)
    pub inverse: Option<String>,
    /// A to-one relationship that may be unset
    pub optional: bool,
}

/// Field descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    /// Logical name used on the wire
    pub name: String,
    /// Storage key; `None` for has-many relationships
    pub key: Option<String>,
    pub ty: FieldType,
    pub relationship: Option<Relationship>,
    pub filterable: bool,
    pub sortable: bool,
    pub required: bool,
}

impl FieldMeta {
    pub fn is_attribute(&self) -> bool {
        self.relationship.is_none()
    }
}

/// Type-erased description of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub resource: String,
    pub collection: String,
    pub fields: Vec<FieldMeta>,
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relationships(&self) -> impl Iterator<Item = (&FieldMeta, &Relationship)> {
        self.fields
            .iter()
            .filter_map(|f| f.relationship.as_ref().map(|r| (f, r)))
    }

    pub fn relationship(&self, name: &str) -> Option<(&FieldMeta, &Relationship)> {
        self.relationships().find(|(f, _)| f.name == name)
    }
}

// =============================================================================
// Accessors
// =============================================================================

/// Field-level validation rule, see [`crate::core::validation::validators`]
pub type FieldRule = Arc<dyn Fn(&str, &Value) -> Result<(), String> + Send + Sync>;

type Getter<M> = Arc<dyn Fn(&M) -> Value + Send + Sync>;
type Setter<M> = Arc<dyn Fn(&mut M, Value) -> Result<(), String> + Send + Sync>;

enum Accessor<M> {
    Attribute {
        get: Getter<M>,
        set: Setter<M>,
        rules: Vec<FieldRule>,
    },
    ToOne {
        get: fn(&M) -> &Option<Uuid>,
        get_mut: fn(&mut M) -> &mut Option<Uuid>,
    },
    ToMany {
        get: fn(&M) -> &Vec<Uuid>,
        get_mut: fn(&mut M) -> &mut Vec<Uuid>,
    },
    HasMany,
}

fn default_key(name: &str) -> String {
    name.replace('-', "_")
}

fn ids_value(ids: &[Uuid]) -> Value {
    Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect())
}

fn stored_id(value: &Value) -> Result<Uuid, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected identifier string, got {}", value))
        .and_then(|raw| Uuid::parse_str(raw).map_err(|e| e.to_string()))
}

/// A field definition: descriptor plus accessors
pub struct Field<M> {
    meta: FieldMeta,
    accessor: Accessor<M>,
}

impl<M: Model> Field<M> {
    /// Plain attribute stored under its (dash-free) name
    pub fn attribute<T>(name: &str, get: fn(&M) -> &T, get_mut: fn(&mut M) -> &mut T) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let zero = serde_json::to_value(get(&M::default())).unwrap_or(Value::Null);
        let getter: Getter<M> =
            Arc::new(move |model: &M| serde_json::to_value(get(model)).unwrap_or(Value::Null));
        let setter: Setter<M> = Arc::new(move |model: &mut M, value: Value| {
            *get_mut(model) = serde_json::from_value(value).map_err(|e| e.to_string())?;
            Ok(())
        });

        Self {
            meta: FieldMeta {
                name: name.to_string(),
                key: Some(default_key(name)),
                ty: FieldType::Scalar(ScalarKind::of(&zero)),
                relationship: None,
                filterable: false,
                sortable: false,
                required: false,
            },
            accessor: Accessor::Attribute {
                get: getter,
                set: setter,
                rules: Vec::new(),
            },
        }
    }

    /// Required to-one relationship; call [`Field::optional`] to allow unset
    pub fn to_one(
        name: &str,
        target: &str,
        get: fn(&M) -> &Option<Uuid>,
        get_mut: fn(&mut M) -> &mut Option<Uuid>,
    ) -> Self {
        Self::relationship(
            name,
            FieldType::Identifier,
            RelationKind::ToOne,
            target,
            None,
            Accessor::ToOne { get, get_mut },
        )
    }

    pub fn to_many(
        name: &str,
        target: &str,
        get: fn(&M) -> &Vec<Uuid>,
        get_mut: fn(&mut M) -> &mut Vec<Uuid>,
    ) -> Self {
        Self::relationship(
            name,
            FieldType::IdentifierList,
            RelationKind::ToMany,
            target,
            None,
            Accessor::ToMany { get, get_mut },
        )
    }

    /// Has-many relationship resolved through `inverse` on the target
    pub fn has_many(name: &str, target: &str, inverse: &str) -> Self {
        let mut field = Self::relationship(
            name,
            FieldType::Inverse,
            RelationKind::HasMany,
            target,
            Some(inverse.to_string()),
            Accessor::HasMany,
        );
        field.meta.key = None;
        field
    }

    fn relationship(
        name: &str,
        ty: FieldType,
        kind: RelationKind,
        target: &str,
        inverse: Option<String>,
        accessor: Accessor<M>,
    ) -> Self {
        Self {
            meta: FieldMeta {
                name: name.to_string(),
                key: Some(default_key(name)),
                ty,
                relationship: Some(Relationship {
                    kind,
                    name: name.to_string(),
                    target: target.to_string(),
                    inverse,
                    optional: false,
                }),
                filterable: false,
                sortable: false,
                required: false,
            },
            accessor,
        }
    }

    /// Override the storage key
    pub fn key(mut self, key: &str) -> Self {
        if self.meta.key.is_some() {
            self.meta.key = Some(key.to_string());
        }
        self
    }

    pub fn filterable(mut self) -> Self {
        self.meta.filterable = self.meta.key.is_some();
        self
    }

    pub fn sortable(mut self) -> Self {
        self.meta.sortable = self.meta.key.is_some();
        self
    }

    /// Reject blank values during structural validation
    pub fn required(mut self) -> Self {
        self.meta.required = true;
        self
    }

    /// Allow a to-one relationship to be unset
    pub fn optional(mut self) -> Self {
        if let Some(relationship) = self.meta.relationship.as_mut()
            && relationship.kind == RelationKind::ToOne
        {
            relationship.optional = true;
            self.meta.ty = FieldType::OptionalIdentifier;
        }
        self
    }

    /// Attach a validation rule to an attribute
    pub fn rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<(), String> + Send + Sync + 'static,
    {
        if let Accessor::Attribute { rules, .. } = &mut self.accessor {
            rules.push(Arc::new(rule));
        }
        self
    }
}

// =============================================================================
// ModelMeta
// =============================================================================

/// Metadata and accessor table of a model
pub struct ModelMeta<M> {
    schema: Schema,
    accessors: Vec<Accessor<M>>,
}

impl<M: Model> ModelMeta<M> {
    /// Start a model stored in a collection named after the resource
    pub fn new(resource: &str) -> Self {
        Self {
            schema: Schema {
                resource: resource.to_string(),
                collection: resource.to_string(),
                fields: Vec::new(),
            },
            accessors: Vec::new(),
        }
    }

    pub fn collection(mut self, name: &str) -> Self {
        self.schema.collection = name.to_string();
        self
    }

    pub fn field(mut self, field: Field<M>) -> Self {
        self.schema.fields.push(field.meta);
        self.accessors.push(field.accessor);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn resource(&self) -> &str {
        &self.schema.resource
    }

    pub fn collection_name(&self) -> &str {
        &self.schema.collection
    }

    fn entries(&self) -> impl Iterator<Item = (&FieldMeta, &Accessor<M>)> {
        self.schema.fields.iter().zip(self.accessors.iter())
    }

    fn entry(&self, name: &str) -> Option<(&FieldMeta, &Accessor<M>)> {
        self.entries().find(|(meta, _)| meta.name == name)
    }

    /// JSON value of a stored field; `None` for unknown or has-many fields
    pub fn field_value(&self, model: &M, name: &str) -> Option<Value> {
        match self.entry(name)?.1 {
            Accessor::Attribute { get, .. } => Some(get(model)),
            Accessor::ToOne { get, .. } => Some(
                get(model)
                    .map(|id| Value::String(id.to_string()))
                    .unwrap_or(Value::Null),
            ),
            Accessor::ToMany { get, .. } => Some(ids_value(get(model))),
            Accessor::HasMany => None,
        }
    }

    /// Reference of a to-one field
    pub fn to_one(&self, model: &M, name: &str) -> Option<Option<Uuid>> {
        match self.entry(name)?.1 {
            Accessor::ToOne { get, .. } => Some(*get(model)),
            _ => None,
        }
    }

    /// References of a to-many field
    pub fn to_many<'m>(&self, model: &'m M, name: &str) -> Option<&'m Vec<Uuid>> {
        match self.entry(name)?.1 {
            Accessor::ToMany { get, .. } => Some(get(model)),
            _ => None,
        }
    }

    pub fn to_many_mut<'m>(&self, model: &'m mut M, name: &str) -> Option<&'m mut Vec<Uuid>> {
        match self.entry(name)?.1 {
            Accessor::ToMany { get_mut, .. } => Some(get_mut(model)),
            _ => None,
        }
    }

    /// Attribute values, restricted to a sparse fieldset when given
    pub fn attributes(&self, model: &M, fieldset: Option<&[String]>) -> IndexMap<String, Value> {
        self.entries()
            .filter(|(meta, _)| fieldset.is_none_or(|names| names.contains(&meta.name)))
            .filter_map(|(meta, accessor)| match accessor {
                Accessor::Attribute { get, .. } => Some((meta.name.clone(), get(model))),
                _ => None,
            })
            .collect()
    }

    /// Encode a model as a stored document
    pub fn to_document(&self, model: &M) -> Document {
        let mut document = Document::new();
        document.insert(ID_KEY.to_string(), Value::String(model.id().to_string()));

        for (meta, accessor) in self.entries() {
            let Some(key) = &meta.key else { continue };
            let value = match accessor {
                Accessor::Attribute { get, .. } => get(model),
                Accessor::ToOne { get, .. } => get(model)
                    .map(|id| Value::String(id.to_string()))
                    .unwrap_or(Value::Null),
                Accessor::ToMany { get, .. } => ids_value(get(model)),
                Accessor::HasMany => continue,
            };
            document.insert(key.clone(), value);
        }

        document
    }

    /// Materialize a stored document into a model instance
    pub fn from_document(&self, mut document: Document) -> Result<M, StorageError> {
        let mut model = M::default();
        model.set_id(document_id(&document)?);

        for (meta, accessor) in self.entries() {
            let Some(key) = &meta.key else { continue };
            let Some(value) = document.remove(key) else {
                continue;
            };
            let malformed =
                |e: String| StorageError::Malformed(format!("{}.{}: {}", self.resource(), key, e));

            match accessor {
                Accessor::Attribute { set, .. } => set(&mut model, value).map_err(malformed)?,
                Accessor::ToOne { get_mut, .. } => {
                    *get_mut(&mut model) = match value {
                        Value::Null => None,
                        other => Some(stored_id(&other).map_err(malformed)?),
                    };
                }
                Accessor::ToMany { get_mut, .. } => {
                    let ids = match value {
                        Value::Null => Vec::new(),
                        Value::Array(items) => items
                            .iter()
                            .map(stored_id)
                            .collect::<Result<Vec<_>, _>>()
                            .map_err(malformed)?,
                        other => return Err(malformed(format!("expected array, got {}", other))),
                    };
                    *get_mut(&mut model) = ids;
                }
                Accessor::HasMany => {}
            }
        }

        Ok(model)
    }

    /// Apply the attributes and relationships of a request body
    ///
    /// Returns the names of the fields that were assigned.
    pub fn assign(&self, model: &mut M, body: &ResourceBody) -> Result<HashSet<String>, ApiError> {
        let mut touched = HashSet::new();

        for (name, value) in &body.attributes {
            let (meta, accessor) = self
                .entry(name)
                .ok_or_else(|| ApiError::bad_request(format!("unknown attribute '{}'", name)))?;
            let Accessor::Attribute { set, .. } = accessor else {
                return Err(ApiError::bad_request(format!(
                    "'{}' is a relationship, not an attribute",
                    name
                )));
            };
            set(model, value.clone()).map_err(|e| {
                ApiError::bad_request(format!("invalid value for attribute '{}': {}", name, e))
            })?;
            touched.insert(meta.name.clone());
        }

        for (name, relationship) in &body.relationships {
            self.assign_linkage(model, name, relationship.linkage()?)?;
            touched.insert(name.clone());
        }

        Ok(touched)
    }

    /// Replace the references of a to-one or to-many relationship
    pub fn assign_linkage(&self, model: &mut M, name: &str, linkage: Linkage) -> Result<(), ApiError> {
        let (meta, accessor) = self
            .entry(name)
            .ok_or_else(|| ApiError::bad_request(format!("unknown relationship '{}'", name)))?;
        let relationship = meta.relationship.as_ref().ok_or_else(|| {
            ApiError::bad_request(format!("'{}' is an attribute, not a relationship", name))
        })?;

        match (accessor, linkage) {
            (Accessor::ToOne { get_mut, .. }, Linkage::One(identifier)) => {
                *get_mut(model) = identifier
                    .map(|i| i.resolve(&relationship.target))
                    .transpose()?;
                Ok(())
            }
            (Accessor::ToMany { get_mut, .. }, Linkage::Many(identifiers)) => {
                *get_mut(model) = identifiers
                    .iter()
                    .map(|i| i.resolve(&relationship.target))
                    .collect::<Result<_, _>>()?;
                Ok(())
            }
            (Accessor::ToOne { .. }, Linkage::Many(_)) => Err(ApiError::bad_request(format!(
                "relationship '{}' expects a single resource identifier or null",
                name
            ))),
            (Accessor::ToMany { .. }, Linkage::One(_)) => Err(ApiError::bad_request(format!(
                "relationship '{}' expects an array of resource identifiers",
                name
            ))),
            _ => Err(ApiError::bad_request(format!(
                "has-many relationship '{}' is read-only; set '{}' on '{}' instead",
                name,
                relationship.inverse.as_deref().unwrap_or_default(),
                relationship.target
            ))),
        }
    }

    /// Structural validation
    ///
    /// With `touched` given, only those fields are checked (partial update).
    pub fn validate(&self, model: &M, touched: Option<&HashSet<String>>) -> Result<(), String> {
        for (meta, accessor) in self.entries() {
            if touched.is_some_and(|names| !names.contains(&meta.name)) {
                continue;
            }

            match accessor {
                Accessor::Attribute { get, rules, .. } => {
                    let value = get(model);
                    if meta.required && is_blank(&value) {
                        return Err(format!("attribute '{}' is required", meta.name));
                    }
                    for rule in rules {
                        rule(&meta.name, &value)?;
                    }
                }
                Accessor::ToOne { get, .. } => {
                    let optional = meta.relationship.as_ref().is_some_and(|r| r.optional);
                    if !optional && get(model).is_none() {
                        return Err(format!("relationship '{}' is required", meta.name));
                    }
                }
                Accessor::ToMany { get, .. } => {
                    if meta.required && get(model).is_empty() {
                        return Err(format!("relationship '{}' is required", meta.name));
                    }
                }
                Accessor::HasMany => {}
            }
        }
        Ok(())
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
