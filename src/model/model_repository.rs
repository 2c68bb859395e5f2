//! ModelRepository - Typed accessor for model CRUD and queries.

use std::marker::PhantomData;

use crate::entity::{Entity, KeyLookup};
use crate::error::ModelError;
use crate::key::Key;
use crate::query::Query;
use crate::registry::Context;

use super::{from_entity, to_entity, Model, Stored};

/// Typed repository wrapper for accessing models of a specific kind.
pub struct ModelRepository<'a, M> {
    ctx: &'a Context,
    parent: Option<Key>,
    _marker: PhantomData<M>,
}

impl<'a, M: Model> ModelRepository<'a, M> {
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            parent: None,
            _marker: PhantomData,
        }
    }

    /// Scope puts to children of `parent` and queries to its descendants.
    pub fn under(mut self, parent: &Key) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Get a model by key, bare id, or encoded key.
    pub fn get(&self, lookup: impl KeyLookup) -> Result<Option<Stored<M>>, ModelError> {
        let key = self.resolve(lookup)?;
        self.ctx.get(&key)?.map(stored).transpose()
    }

    /// Validate and write. Returns the model with its id field filled in.
    pub fn put(&self, model: &M) -> Result<Stored<M>, ModelError> {
        let schema = self.ctx.schema(M::KIND)?;
        let mut entity = to_entity(schema, model, self.parent.as_ref())?;
        self.ctx.put(&mut entity)?;
        stored(entity)
    }

    /// Delete a model by key or id. Returns true if it existed.
    pub fn delete(&self, lookup: impl KeyLookup) -> Result<bool, ModelError> {
        let key = self.resolve(lookup)?;
        self.ctx.delete(&key)
    }

    /// Root keys are re-homed under the scoped parent.
    fn resolve(&self, lookup: impl KeyLookup) -> Result<Key, ModelError> {
        let key = lookup.resolve(M::KIND)?;
        match (&self.parent, key.parent()) {
            (Some(parent), None) => {
                let mut builder = Key::builder(M::KIND).parent(parent);
                if let Some(id) = key.id() {
                    builder = builder.id(id.clone());
                }
                Ok(builder.build()?)
            }
            _ => Ok(key),
        }
    }

    /// Start a query over this kind (scoped to the parent, if any).
    pub fn query(&self) -> Result<Query, ModelError> {
        let query = self.ctx.query(M::KIND)?;
        Ok(match &self.parent {
            Some(parent) => query.ancestor(parent),
            None => query,
        })
    }

    /// Run a query and decode every returned entity. Keys-only rows are skipped.
    pub fn fetch(&self, query: &Query) -> Result<Vec<Stored<M>>, ModelError> {
        query
            .fetch(self.ctx)?
            .into_iter()
            .filter_map(|result| result.into_entity())
            .map(stored)
            .collect()
    }
}

fn stored<M: Model>(entity: Entity) -> Result<Stored<M>, ModelError> {
    Ok(Stored {
        data: from_entity(&entity)?,
        key: entity.key().clone(),
    })
}

/// Extension trait for typed model access on a [`Context`].
pub trait ModelsExt {
    fn models<M: Model>(&self) -> ModelRepository<'_, M>;
}

impl ModelsExt for Context {
    fn models<M: Model>(&self) -> ModelRepository<'_, M> {
        ModelRepository::new(self)
    }
}
