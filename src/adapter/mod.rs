//! Storage adapters.
//!
//! An [`Adapter`] is the contract a storage backend satisfies: raw
//! get/put/delete of records by encoded key, plus id allocation. Adapters
//! that also maintain secondary indexes expose an [`IndexedAdapter`] through
//! [`Adapter::indexer`]. The shared pre/post work around every call
//! (validation, key allocation, flattening, index maintenance) lives in
//! [`Context`](crate::Context), not in the backends.
//!
//! Backends shipped here:
//! - [`InMemoryAdapter`] - reference backend with full index and query support.
//! - [`CacheAdapter`] - key-value cache backend; no indexing.

mod cache;
pub(crate) mod flow;
mod ids;
mod in_memory;
mod index;
mod index_value;

use crate::entity::Entity;
use crate::error::AdapterError;
use crate::key::KeyPart;
use crate::schema::Record;

pub use cache::{CacheAdapter, CacheClient, LocalCache};
pub use ids::IdRange;
pub use in_memory::{InMemoryAdapter, KindStats};
pub use index::{IndexEntry, IndexSet, IndexedAdapter};
pub use index_value::{
    decode_index_value, encode_index_value, DATETIME_PREFIX, DATE_PREFIX, KEY_PREFIX, TIME_PREFIX,
};

/// Backend contract. Every method has a default that fails with
/// [`AdapterError::NotImplemented`], so a partial backend reports the
/// missing method by name on first use.
pub trait Adapter: Send + Sync {
    /// Registry name, e.g. `"inmemory"`.
    fn name(&self) -> &str;

    /// Whether this backend can run in the current environment. Evaluated
    /// once per adapter by the registry.
    fn is_supported(&self) -> bool {
        true
    }

    /// Backend-specific encoding of a flattened key. Defaults to the joined form.
    fn encode_key(&self, joined: String, _parts: &[KeyPart]) -> String {
        joined
    }

    /// Fetch the stored record, or `None` if the key is unknown.
    fn get(&self, _encoded: &str) -> Result<Option<Record>, AdapterError> {
        Err(AdapterError::not_implemented(self.name(), "get"))
    }

    /// Store the entity's current (already validated) values under `encoded`.
    fn put(&self, _encoded: &str, _entity: &Entity) -> Result<(), AdapterError> {
        Err(AdapterError::not_implemented(self.name(), "put"))
    }

    /// Remove the record. Returns `false` for unknown keys.
    fn delete(&self, _encoded: &str) -> Result<bool, AdapterError> {
        Err(AdapterError::not_implemented(self.name(), "delete"))
    }

    /// Allocate `count` fresh integer ids for `kind`.
    fn allocate_ids(&self, _kind: &str, _count: usize) -> Result<IdRange, AdapterError> {
        Err(AdapterError::not_implemented(self.name(), "allocate_ids"))
    }

    /// The indexing half of this backend, if it has one.
    fn indexer(&self) -> Option<&dyn IndexedAdapter> {
        None
    }
}
