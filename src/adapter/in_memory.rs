//! InMemoryAdapter - HashMap-backed reference backend with indexes and queries.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexSet as KeySet;

use crate::entity::Entity;
use crate::error::AdapterError;
use crate::key::{Key, KeyId};
use crate::query::{Operator, Query, QueryRow};
use crate::schema::Record;

use super::{Adapter, IdRange, IndexEntry, IndexSet, IndexedAdapter};

struct StoredEntity {
    key: Key,
    record: Record,
}

#[derive(Default)]
struct KindMeta {
    pointer: i64,
    count: usize,
}

#[derive(Default)]
struct State {
    datastore: HashMap<String, StoredEntity>,
    /// Index key -> encoded entity keys, in write order.
    indexes: HashMap<String, KeySet<String>>,
    kinds: HashMap<String, KindMeta>,
    count: usize,
    known: HashSet<String>,
}

impl State {
    fn write_entries(&mut self, encoded: &str, entries: &IndexSet) {
        for entry in entries.entries() {
            let keys = self.indexes.entry(entry.index_key()).or_default();
            if !keys.contains(encoded) {
                keys.insert(encoded.to_string());
            }
        }
    }

    fn clean_entries(&mut self, encoded: &str, entries: &IndexSet) {
        for entry in entries.entries() {
            let index_key = entry.index_key();
            let emptied = match self.indexes.get_mut(&index_key) {
                Some(keys) => {
                    keys.shift_remove(encoded);
                    keys.is_empty()
                }
                None => false,
            };
            if emptied {
                self.indexes.remove(&index_key);
            }
        }
    }

    fn lookup(&self, entry: &IndexEntry) -> HashSet<&str> {
        self.indexes
            .get(&entry.index_key())
            .map(|keys| keys.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Per-kind bookkeeping of the in-memory backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindStats {
    /// Last allocated (or explicitly written) integer id.
    pub pointer: i64,
    /// Entities of this kind currently stored.
    pub count: usize,
}

/// In-memory adapter backed by HashMaps behind one lock.
///
/// Storage key is the joined flattened key. Clone-friendly via Arc; clones
/// share state, so the registry singleton and any handle a test holds see
/// the same data.
#[derive(Clone, Default)]
pub struct InMemoryAdapter {
    state: Arc<RwLock<State>>,
}

impl InMemoryAdapter {
    pub const NAME: &'static str = "inmemory";

    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, AdapterError> {
        self.state
            .read()
            .map_err(|_| AdapterError::LockPoisoned("read"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, AdapterError> {
        self.state
            .write()
            .map_err(|_| AdapterError::LockPoisoned("write"))
    }

    pub fn stats(&self, kind: &str) -> Result<KindStats, AdapterError> {
        let state = self.read()?;
        Ok(state
            .kinds
            .get(kind)
            .map(|meta| KindStats {
                pointer: meta.pointer,
                count: meta.count,
            })
            .unwrap_or_default())
    }

    /// Entities stored across all kinds.
    pub fn global_count(&self) -> Result<usize, AdapterError> {
        Ok(self.read()?.count)
    }

    pub fn contains(&self, encoded: &str) -> Result<bool, AdapterError> {
        Ok(self.read()?.known.contains(encoded))
    }

    /// Encoded keys currently associated with an index entry.
    pub fn indexed(&self, entry: &IndexEntry) -> Result<Vec<String>, AdapterError> {
        Ok(self
            .read()?
            .indexes
            .get(&entry.index_key())
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Drop every record, index and counter.
    pub fn clear(&self) -> Result<(), AdapterError> {
        *self.write()? = State::default();
        Ok(())
    }
}

impl Adapter for InMemoryAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn get(&self, encoded: &str) -> Result<Option<Record>, AdapterError> {
        let state = self.read()?;
        Ok(state.datastore.get(encoded).map(|stored| stored.record.clone()))
    }

    fn put(&self, encoded: &str, entity: &Entity) -> Result<(), AdapterError> {
        let mut state = self.write()?;
        let kind = entity.kind().to_string();

        if state.known.insert(encoded.to_string()) {
            state.count += 1;
            state.kinds.entry(kind.clone()).or_default().count += 1;
        }

        // Explicit integer ids advance the pointer so allocation never collides.
        if let Some(KeyId::Int(id)) = entity.key().id() {
            let meta = state.kinds.entry(kind).or_default();
            meta.pointer = meta.pointer.max(*id);
        }

        state.datastore.insert(
            encoded.to_string(),
            StoredEntity {
                key: entity.key().clone(),
                record: entity.values().clone(),
            },
        );
        Ok(())
    }

    fn delete(&self, encoded: &str) -> Result<bool, AdapterError> {
        let mut state = self.write()?;
        if !state.known.remove(encoded) {
            return Ok(false);
        }
        if let Some(stored) = state.datastore.remove(encoded) {
            if let Some(meta) = state.kinds.get_mut(stored.key.kind()) {
                meta.count = meta.count.saturating_sub(1);
            }
        }
        state.count = state.count.saturating_sub(1);
        Ok(true)
    }

    fn allocate_ids(&self, kind: &str, count: usize) -> Result<IdRange, AdapterError> {
        let mut state = self.write()?;
        let meta = state.kinds.entry(kind.to_string()).or_default();
        let range =
            IdRange::after(meta.pointer, count).ok_or_else(|| AdapterError::ids_exhausted(kind))?;
        if let Some(last) = range.last_id() {
            meta.pointer = last;
        }
        Ok(range)
    }

    fn indexer(&self) -> Option<&dyn IndexedAdapter> {
        Some(self)
    }
}

impl IndexedAdapter for InMemoryAdapter {
    fn write_indexes(&self, encoded: &str, writes: &IndexSet) -> Result<(), AdapterError> {
        self.write()?.write_entries(encoded, writes);
        Ok(())
    }

    fn clean_indexes(&self, encoded: &str, indexes: &IndexSet) -> Result<(), AdapterError> {
        self.write()?.clean_entries(encoded, indexes);
        Ok(())
    }

    /// Both halves under one write lock.
    fn replace_indexes(
        &self,
        encoded: &str,
        stale: &IndexSet,
        fresh: &IndexSet,
    ) -> Result<(), AdapterError> {
        let mut state = self.write()?;
        state.clean_entries(encoded, &stale.without(fresh));
        state.write_entries(encoded, fresh);
        Ok(())
    }

    /// Candidates come from the kind index, narrowed by the ancestor group
    /// and by equality filters on indexed values. Filters on unindexed
    /// properties therefore never match.
    fn execute_query(&self, query: &Query) -> Result<Vec<QueryRow>, AdapterError> {
        let state = self.read()?;
        let state = &*state;

        let mut narrowing: Vec<HashSet<&str>> = Vec::new();
        if let Some(ancestor) = query.ancestor_key() {
            let mut group = state.lookup(&IndexEntry::group_under(ancestor));
            let (own, _) = ancestor.flatten_joined();
            if let Some((stored, _)) = state.datastore.get_key_value(&own) {
                group.insert(stored.as_str());
            }
            narrowing.push(group);
        }
        for filter in query.filters() {
            if filter.op != Operator::Eq {
                continue;
            }
            if let Some(entry) = IndexEntry::property(query.kind(), &filter.property, &filter.value) {
                narrowing.push(state.lookup(&entry));
            }
        }

        let kind_index = IndexEntry::Kind(query.kind().to_string()).index_key();
        let candidates = state
            .indexes
            .get(&kind_index)
            .into_iter()
            .flatten()
            .filter(|encoded| narrowing.iter().all(|set| set.contains(encoded.as_str())))
            .filter_map(|encoded| state.datastore.get(encoded))
            .map(|stored| (stored.key.clone(), stored.record.clone()));

        Ok(query.evaluate(candidates))
    }
}
