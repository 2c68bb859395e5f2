//! CacheAdapter - stores records in a key-value cache. No indexing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::entity::Entity;
use crate::error::AdapterError;
use crate::key::{KeyId, KeyPart};
use crate::schema::Record;

use super::{Adapter, IdRange};

const ID_COUNTER_PREFIX: &str = "__ids__:";

/// The subset of a cache server's commands this adapter needs.
pub trait CacheClient: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AdapterError>;

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), AdapterError>;

    /// Returns `true` if the key existed.
    fn delete(&self, key: &str) -> Result<bool, AdapterError>;

    /// Atomically add `by` to a counter (missing counters start at zero) and
    /// return the new value.
    fn incr(&self, key: &str, by: u64) -> Result<i64, AdapterError>;

    /// Raise a counter to at least `floor` and return its value.
    ///
    /// The default reads with `incr(key, 0)` and then adds the difference, so
    /// it is not atomic against a concurrent `incr`; a client with a native
    /// max operation should use it.
    fn raise(&self, key: &str, floor: i64) -> Result<i64, AdapterError> {
        let current = self.incr(key, 0)?;
        if current >= floor {
            return Ok(current);
        }
        let gap = floor
            .checked_sub(current)
            .and_then(|gap| u64::try_from(gap).ok())
            .ok_or_else(|| counter_overflow(key))?;
        self.incr(key, gap)
    }

    /// Whether the cache server is reachable.
    fn is_available(&self) -> bool {
        true
    }
}

fn counter_overflow(key: &str) -> AdapterError {
    AdapterError::Storage(format!("counter '{}' overflowed", key))
}

/// In-process cache client. Clones share storage.
#[derive(Clone, Default)]
pub struct LocalCache {
    storage: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheClient for LocalCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AdapterError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| AdapterError::LockPoisoned("cache get"))?;
        Ok(storage.get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), AdapterError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| AdapterError::LockPoisoned("cache set"))?;
        storage.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, AdapterError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| AdapterError::LockPoisoned("cache delete"))?;
        Ok(storage.remove(key).is_some())
    }

    fn incr(&self, key: &str, by: u64) -> Result<i64, AdapterError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| AdapterError::LockPoisoned("cache incr"))?;

        let current = read_counter(&storage, key)?;
        let next = i64::try_from(by)
            .ok()
            .and_then(|by| current.checked_add(by))
            .ok_or_else(|| counter_overflow(key))?;
        storage.insert(key.to_string(), next.to_string().into_bytes());
        Ok(next)
    }

    fn raise(&self, key: &str, floor: i64) -> Result<i64, AdapterError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| AdapterError::LockPoisoned("cache raise"))?;

        let next = read_counter(&storage, key)?.max(floor);
        storage.insert(key.to_string(), next.to_string().into_bytes());
        Ok(next)
    }
}

/// Counters are stored as decimal text, like a cache server would.
fn read_counter(storage: &HashMap<String, Vec<u8>>, key: &str) -> Result<i64, AdapterError> {
    match storage.get(key) {
        Some(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or_else(|| AdapterError::Storage(format!("'{}' is not a counter", key))),
        None => Ok(0),
    }
}

/// Adapter over any [`CacheClient`]. Records are `bitcode`-encoded and
/// stored under `prefix + base64(joined key)`.
#[derive(Clone)]
pub struct CacheAdapter<C: CacheClient> {
    client: C,
    prefix: String,
}

impl<C: CacheClient> CacheAdapter<C> {
    pub const NAME: &'static str = "cache";

    pub fn new(client: C) -> Self {
        CacheAdapter {
            client,
            prefix: String::new(),
        }
    }

    /// Namespace every stored key, e.g. per application.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn counter_key(&self, kind: &str) -> String {
        format!("{}{}{}", self.prefix, ID_COUNTER_PREFIX, kind)
    }
}

impl<C: CacheClient> Adapter for CacheAdapter<C> {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_supported(&self) -> bool {
        self.client.is_available()
    }

    fn encode_key(&self, joined: String, _parts: &[KeyPart]) -> String {
        format!("{}{}", self.prefix, URL_SAFE_NO_PAD.encode(joined.as_bytes()))
    }

    fn get(&self, encoded: &str) -> Result<Option<Record>, AdapterError> {
        match self.client.get(encoded)? {
            Some(bytes) => bitcode::deserialize::<Record>(&bytes)
                .map(Some)
                .map_err(|e| AdapterError::Serde(e.to_string())),
            None => Ok(None),
        }
    }

    fn put(&self, encoded: &str, entity: &Entity) -> Result<(), AdapterError> {
        let bytes =
            bitcode::serialize(entity.values()).map_err(|e| AdapterError::Serde(e.to_string()))?;
        // Explicit integer ids move the counter past them before the write.
        if let Some(KeyId::Int(id)) = entity.key().id() {
            self.client.raise(&self.counter_key(entity.kind()), *id)?;
        }
        self.client.set(encoded, bytes)
    }

    fn delete(&self, encoded: &str) -> Result<bool, AdapterError> {
        self.client.delete(encoded)
    }

    fn allocate_ids(&self, kind: &str, count: usize) -> Result<IdRange, AdapterError> {
        if count == 0 {
            return Ok(IdRange::empty());
        }
        let span = i64::try_from(count).map_err(|_| AdapterError::ids_exhausted(kind))?;
        let last = self.client.incr(&self.counter_key(kind), count as u64)?;
        last.checked_sub(span)
            .and_then(|before| IdRange::after(before, count))
            .ok_or_else(|| AdapterError::ids_exhausted(kind))
    }
}
