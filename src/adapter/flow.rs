//! The work shared by every backend around get/put/delete: key checks,
//! validation, id allocation, key encoding and index maintenance. Backends
//! only ever see encoded keys and validated records.

use tracing::debug;

use crate::entity::Entity;
use crate::error::{AdapterError, ModelError};
use crate::key::Key;
use crate::registry::Context;

use super::{Adapter, IndexSet};

fn encode(adapter: &dyn Adapter, key: &Key) -> String {
    let (joined, parts) = key.flatten_joined();
    adapter.encode_key(joined, &parts)
}

pub(crate) fn fetch(
    ctx: &Context,
    adapter: &dyn Adapter,
    key: &Key,
) -> Result<Option<Entity>, ModelError> {
    key.ensure_complete()?;
    let schema = ctx.schema(key.kind())?;
    let encoded = encode(adapter, key);
    let record = adapter.get(&encoded)?;

    if ctx.config().debug {
        debug!(
            adapter = adapter.name(),
            key = %key,
            found = record.is_some(),
            "get"
        );
    }
    Ok(record.map(|record| Entity::from_stored(schema, key.clone(), record)))
}

/// Validate, complete the key if needed, replace any previous index set and
/// write. Nothing reaches the backend when validation fails.
pub(crate) fn store(
    ctx: &Context,
    adapter: &dyn Adapter,
    entity: &mut Entity,
) -> Result<Key, ModelError> {
    let record = entity.validate()?;

    if !entity.key().is_complete() {
        let id = adapter
            .allocate_ids(entity.kind(), 1)?
            .next()
            .ok_or_else(|| AdapterError::Storage(format!("no id allocated for '{}'", entity.kind())))?;
        entity.key_mut().set_id(id)?;
    }
    entity.key().ensure_complete()?;

    let key = entity.key().clone();
    let encoded = encode(adapter, &key);

    // Indexes change only after the record is written, so a failed put
    // leaves the previous record and its entries intact.
    let indexer = adapter.indexer();
    let stale = match indexer {
        Some(_) => adapter
            .get(&encoded)?
            .map(|previous| IndexSet::generate(&key, entity.schema(), &previous))
            .unwrap_or_default(),
        None => IndexSet::default(),
    };
    let fresh = IndexSet::generate(&key, entity.schema(), &record);

    let previous_values = entity.values().clone();
    entity.replace_values(record);
    if let Err(err) = adapter.put(&encoded, entity) {
        entity.replace_values(previous_values);
        return Err(err.into());
    }
    entity.mark_persisted();

    if let Some(indexer) = indexer {
        indexer.replace_indexes(&encoded, &stale, &fresh)?;
        if ctx.config().debug {
            debug!(adapter = adapter.name(), key = %key, entries = fresh.len(), "wrote indexes");
        }
    }

    if ctx.config().debug {
        debug!(adapter = adapter.name(), key = %key, "put");
    }
    Ok(entity.key().clone())
}

/// Remove the record and, for indexed backends, every index entry computed
/// from what was stored.
pub(crate) fn remove(ctx: &Context, adapter: &dyn Adapter, key: &Key) -> Result<bool, ModelError> {
    key.ensure_complete()?;
    let encoded = encode(adapter, key);

    if let Some(indexer) = adapter.indexer() {
        if let Some(previous) = adapter.get(&encoded)? {
            let schema = ctx.schema(key.kind())?;
            let stale = IndexSet::generate(key, &schema, &previous);
            indexer.clean_indexes(&encoded, &stale)?;
            if ctx.config().debug {
                debug!(adapter = adapter.name(), key = %key, entries = stale.len(), "cleaned indexes");
            }
        }
    }

    let removed = adapter.delete(&encoded)?;
    if ctx.config().debug {
        debug!(adapter = adapter.name(), key = %key, removed, "delete");
    }
    Ok(removed)
}
