//! Models - typed structs stored through the entity layer.
//!
//! A [`Model`] is a plain serde struct whose fields are the properties of one
//! kind. `#[derive(Model)]` writes the schema from the field types; the typed
//! accessor converts to and from [`Entity`] so validation, key allocation and
//! indexing work exactly as for dynamic entities.
//!
//! ## Example
//!
//! ```ignore
//! use polystore::{Context, Model, ModelsExt};
//!
//! #[derive(Model, Serialize, Deserialize, Clone)]
//! struct Person {
//!     #[model(id)]
//!     id: Option<i64>,
//!     firstname: Option<String>,
//!     #[model(required)]
//!     lastname: String,
//! }
//!
//! let ctx = Context::default();
//! ctx.register_model::<Person>()?;
//! let stored = ctx.models::<Person>().put(&person)?;
//! let loaded = ctx.models::<Person>().get(stored.key)?;
//! ```

mod model_repository;

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::adapter::Adapter;
use crate::entity::{DictOptions, Entity, ToDict};
use crate::error::{KeyError, ModelError};
use crate::key::{Key, KeyId};
use crate::registry::Context;
use crate::schema::{record_to_json, Schema, Value};

pub use model_repository::{ModelRepository, ModelsExt};

/// Trait for structs stored as entities of one kind.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Kind name, e.g. `"Person"`.
    const KIND: &'static str;

    /// Field carrying the key id (`i64` or `String`, usually optional).
    /// When unset or `None`, an id is allocated on put.
    const ID_FIELD: Option<&'static str> = None;

    fn schema() -> Schema;
}

/// A model together with the key it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<M> {
    pub key: Key,
    pub data: M,
}

impl Context {
    /// Register the kind described by `M`.
    pub fn register_model<M: Model>(&self) -> Result<Arc<dyn Adapter>, ModelError> {
        self.register(M::schema())
    }
}

/// Build an (unsaved) entity from a model. Fields without a declared
/// property are ignored; `null` fields stay unset.
pub(crate) fn to_entity<M: Model>(
    schema: Arc<Schema>,
    model: &M,
    parent: Option<&Key>,
) -> Result<Entity, ModelError> {
    let mut fields = match serde_json::to_value(model)? {
        serde_json::Value::Object(fields) => fields,
        _ => serde_json::Map::new(),
    };

    let mut builder = Key::builder(M::KIND);
    if let Some(id) = M::ID_FIELD.and_then(|field| fields.remove(field)) {
        match id {
            serde_json::Value::Number(n) => {
                let id = n.as_i64().ok_or_else(|| KeyError::Decode(format!("id {} is not an i64", n)))?;
                builder = builder.id(id);
            }
            serde_json::Value::String(name) => builder = builder.id(name),
            _ => {}
        }
    }
    if let Some(parent) = parent {
        builder = builder.parent(parent);
    }

    let mut entity = Entity::with_key(schema.clone(), builder.build()?)?;
    for property in schema.properties() {
        match fields.remove(property.name()) {
            None | Some(serde_json::Value::Null) => {}
            Some(json) => {
                entity.set(property.name(), Value::from_json(json))?;
            }
        }
    }
    Ok(entity)
}

/// Rebuild a model from an entity, writing the key id back into the id field.
pub(crate) fn from_entity<M: Model>(entity: &Entity) -> Result<M, ModelError> {
    let mut json = record_to_json(&entity.to_dict(DictOptions::new()));
    if let (Some(field), serde_json::Value::Object(fields)) = (M::ID_FIELD, &mut json) {
        let id = match entity.key().id() {
            Some(KeyId::Int(id)) => serde_json::Value::from(*id),
            Some(KeyId::Name(name)) => serde_json::Value::from(name.clone()),
            None => serde_json::Value::Null,
        };
        fields.insert(field.to_string(), id);
    }
    Ok(serde_json::from_value(json)?)
}
