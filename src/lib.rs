//! Adapter-pluggable entity persistence: one schema, many storage backends,
//! with hierarchical keys and secondary indexes.

extern crate self as polystore;

pub mod adapter;
mod config;
mod entity;
mod error;
mod key;
mod model;
mod query;
mod registry;
mod schema;

pub use adapter::{
    Adapter, CacheAdapter, CacheClient, IdRange, InMemoryAdapter, IndexEntry, IndexSet,
    IndexedAdapter, KindStats, LocalCache,
};
pub use config::{AdapterConfig, Config};
pub use entity::{DictOptions, Entity, KeyLookup, Raw, ToDict, ToJson, Urlsafe, KEY_FIELD};
pub use error::{AdapterError, ConfigError, KeyError, ModelError, ValidationError};
pub use key::{Ancestry, Key, KeyBuilder, KeyId, KeyPart, KEY_FIELDS, SEPARATOR};
pub use model::{Model, ModelRepository, ModelsExt, Stored};
pub use query::{Direction, Filter, Operator, Order, Query, QueryResult, QueryRow};
pub use registry::{AdapterFactory, Context};
pub use schema::{BaseType, Property, Record, Schema, Validator, Value};

// Re-export the derive macro
pub use polystore_macros::Model;
