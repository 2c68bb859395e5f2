use std::fmt;
use std::sync::Arc;

use crate::adapter::Adapter;
use crate::error::{KeyError, ModelError, ValidationError};
use crate::key::{Key, KeyId};
use crate::registry::Context;
use crate::schema::{Record, Schema, Value};

use super::lookup::KeyLookup;
use super::validate::validate_record;

/// One instance of a registered kind: a key plus explicitly set property values.
///
/// Values are validated lazily, when the entity is written. Unset properties
/// are not stored; they surface through their default in [`Entity::value`]
/// and [`ToDict`](super::ToDict), or as `None` in the explicit dict view.
#[derive(Clone)]
pub struct Entity {
    schema: Arc<Schema>,
    key: Key,
    values: Record,
    persisted: bool,
}

impl Entity {
    /// A new entity with an incomplete key; an id is allocated on first put.
    pub fn new(schema: Arc<Schema>) -> Self {
        let key = Key::bare(schema.kind());
        Entity {
            schema,
            key,
            values: Record::new(),
            persisted: false,
        }
    }

    pub fn with_key(schema: Arc<Schema>, key: Key) -> Result<Self, KeyError> {
        if key.kind() != schema.kind() {
            return Err(KeyError::KindMismatch {
                expected: schema.kind().to_string(),
                found: key.kind().to_string(),
            });
        }
        Ok(Entity {
            schema,
            key,
            values: Record::new(),
            persisted: false,
        })
    }

    pub fn with_id(schema: Arc<Schema>, id: impl Into<KeyId>) -> Result<Self, KeyError> {
        let key = Key::new(schema.kind(), id)?;
        Entity::with_key(schema, key)
    }

    /// Rebuild an entity read back from a backend.
    pub(crate) fn from_stored(schema: Arc<Schema>, mut key: Key, values: Record) -> Self {
        key.mark_persisted();
        Entity {
            schema,
            key,
            values,
            persisted: true,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub(crate) fn key_mut(&mut self) -> &mut Key {
        &mut self.key
    }

    pub fn kind(&self) -> &str {
        self.schema.kind()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Explicitly set values only.
    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn set(
        &mut self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, ValidationError> {
        if self.schema.get(name).is_none() {
            return Err(ValidationError::UnknownProperty {
                kind: self.kind().to_string(),
                property: name.to_string(),
            });
        }
        self.values.insert(name.to_string(), value.into());
        Ok(self)
    }

    /// Builder form of [`Entity::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, ValidationError> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The explicitly set value, if any.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The set value, falling back to the property's default.
    pub fn value(&self, name: &str) -> Option<Value> {
        match self.values.get(name) {
            Some(value) => Some(value.clone()),
            None => self.schema.get(name).and_then(|p| p.implicit_value()),
        }
    }

    /// Check every property against its policy and return the normalized
    /// record that would be written.
    pub fn validate(&self) -> Result<Record, ValidationError> {
        validate_record(&self.schema, &self.values)
    }

    /// Replace explicit values with a validated record.
    pub(crate) fn replace_values(&mut self, record: Record) {
        self.values = record;
    }

    /// Freeze the key after a successful write.
    pub(crate) fn mark_persisted(&mut self) {
        self.key.mark_persisted();
        self.persisted = true;
    }

    /// Persist through the adapter bound to this kind.
    pub fn put(&mut self, ctx: &Context) -> Result<Key, ModelError> {
        ctx.put(self)
    }

    /// Persist through an explicitly chosen adapter.
    pub fn put_with(&mut self, ctx: &Context, adapter: &dyn Adapter) -> Result<Key, ModelError> {
        ctx.put_with(self, adapter)
    }

    pub fn delete(&self, ctx: &Context) -> Result<bool, ModelError> {
        ctx.delete(&self.key)
    }

    pub fn delete_with(&self, ctx: &Context, adapter: &dyn Adapter) -> Result<bool, ModelError> {
        ctx.delete_with(&self.key, adapter)
    }

    /// Load an entity of `kind` from a key, a bare id, or an encoded key.
    pub fn load(
        ctx: &Context,
        kind: &str,
        lookup: impl KeyLookup,
    ) -> Result<Option<Entity>, ModelError> {
        let key = lookup.resolve(kind)?;
        ctx.get(&key)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.key == other.key && self.values == other.values
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("kind", &self.kind())
            .field("key", &self.key)
            .field("values", &self.values)
            .field("persisted", &self.persisted)
            .finish()
    }
}
