use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use polystore::{
    Adapter, AdapterError, BaseType, Config, Context, Entity, IdRange, InMemoryAdapter,
    IndexSet, IndexedAdapter, Key, Model, Property, Query, QueryRow, Record, Schema,
};
use serde::{Deserialize, Serialize};

pub fn person_schema() -> Schema {
    Schema::new("Person")
        .property(Property::new("firstname", BaseType::String))
        .property(Property::new("lastname", BaseType::String).required())
        .property(Property::new("age", BaseType::Int).default_value(18))
        .property(Property::new("tags", BaseType::String).repeated())
        .property(Property::new("bio", BaseType::String).unindexed())
}

/// A context whose `inmemory` adapter is a handle the test keeps.
pub fn context_with(config: Config) -> (Context, InMemoryAdapter) {
    let ctx = Context::new(config);
    let mem = InMemoryAdapter::new();
    let handle = mem.clone();
    ctx.register_adapter("inmemory", move |_| Arc::new(handle.clone()) as Arc<dyn Adapter>)
        .unwrap();
    (ctx, mem)
}

pub fn context() -> (Context, InMemoryAdapter) {
    context_with(Config::default())
}

#[derive(Model, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[model(required)]
    pub city: String,
    pub street: Option<String>,
}

#[derive(Model, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[model(kind = "Employee")]
pub struct Employee {
    pub id: Option<i64>,
    #[model(required)]
    pub name: String,
    #[model(choices("admin", "staff"), default = "staff")]
    pub role: Option<String>,
    pub skills: Vec<String>,
    pub hired: Option<NaiveDate>,
    #[model(nested)]
    pub address: Option<Address>,
    pub manager: Option<Key>,
    #[model(unindexed)]
    pub notes: Option<String>,
}

impl Employee {
    pub fn named(name: &str) -> Self {
        Employee {
            id: None,
            name: name.to_string(),
            role: None,
            skills: Vec::new(),
            hired: None,
            address: None,
            manager: None,
            notes: None,
        }
    }
}

#[derive(Model, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[model(adapter = "cache")]
pub struct Session {
    #[model(id)]
    pub token: String,
    #[model(required)]
    pub user: String,
    pub hits: i64,
}

/// A backend that can only read.
pub struct ReadOnly;

impl Adapter for ReadOnly {
    fn name(&self) -> &str {
        "readonly"
    }

    fn get(&self, _encoded: &str) -> Result<Option<Record>, AdapterError> {
        Ok(None)
    }
}

/// A backend that is never available.
pub struct Offline;

impl Adapter for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    fn is_supported(&self) -> bool {
        false
    }
}

/// An indexed backend over an in-memory store whose writes fail on demand.
#[derive(Clone, Default)]
pub struct Flaky {
    pub inner: InMemoryAdapter,
    pub failing: Arc<AtomicBool>,
}

impl Flaky {
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Adapter for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn get(&self, encoded: &str) -> Result<Option<Record>, AdapterError> {
        self.inner.get(encoded)
    }

    fn put(&self, encoded: &str, entity: &Entity) -> Result<(), AdapterError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::Storage("write refused".into()));
        }
        self.inner.put(encoded, entity)
    }

    fn delete(&self, encoded: &str) -> Result<bool, AdapterError> {
        self.inner.delete(encoded)
    }

    fn allocate_ids(&self, kind: &str, count: usize) -> Result<IdRange, AdapterError> {
        self.inner.allocate_ids(kind, count)
    }

    fn indexer(&self) -> Option<&dyn IndexedAdapter> {
        Some(self)
    }
}

// Uses the trait's default replace_indexes (clean, then write).
impl IndexedAdapter for Flaky {
    fn write_indexes(&self, encoded: &str, writes: &IndexSet) -> Result<(), AdapterError> {
        self.inner.write_indexes(encoded, writes)
    }

    fn clean_indexes(&self, encoded: &str, indexes: &IndexSet) -> Result<(), AdapterError> {
        self.inner.clean_indexes(encoded, indexes)
    }

    fn execute_query(&self, query: &Query) -> Result<Vec<QueryRow>, AdapterError> {
        self.inner.execute_query(query)
    }
}
