//! Adapter registry and the process-wide [`Context`].
//!
//! A `Context` owns what would otherwise be global state: adapter factories,
//! one adapter instance per adapter name, the supported-ness of each adapter
//! (evaluated once), and the kind -> schema / kind -> adapter tables filled by
//! [`Context::register`]. Share it behind an `Arc` across threads.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{info, warn};

use crate::adapter::{flow, Adapter, CacheAdapter, IdRange, InMemoryAdapter, LocalCache};
use crate::config::Config;
use crate::entity::Entity;
use crate::error::{AdapterError, KeyError, ModelError};
use crate::key::{Key, SEPARATOR};
use crate::query::{Query, QueryResult};
use crate::schema::Schema;

/// Builds an adapter instance on first use.
pub type AdapterFactory = Arc<dyn Fn(&Config) -> Arc<dyn Adapter> + Send + Sync>;

#[derive(Default)]
struct Registry {
    factories: HashMap<String, AdapterFactory>,
    adapters: HashMap<String, Arc<dyn Adapter>>,
    supported: HashMap<String, bool>,
    schemas: HashMap<String, Arc<Schema>>,
    by_kind: HashMap<String, Arc<dyn Adapter>>,
}

impl Registry {
    fn instance(&mut self, config: &Config, name: &str) -> Result<Arc<dyn Adapter>, AdapterError> {
        if let Some(adapter) = self.adapters.get(name) {
            return Ok(adapter.clone());
        }
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| AdapterError::UnknownAdapter(name.to_string()))?;
        let adapter = factory(config);
        self.adapters.insert(name.to_string(), adapter.clone());
        Ok(adapter)
    }

    fn is_supported(&mut self, name: &str, adapter: &dyn Adapter) -> bool {
        *self
            .supported
            .entry(name.to_string())
            .or_insert_with(|| adapter.is_supported())
    }

    /// Explicit overrides must be supported; default candidates are skipped
    /// until one is.
    fn resolve(&mut self, config: &Config, schema: &Schema) -> Result<Arc<dyn Adapter>, AdapterError> {
        let kind = schema.kind();
        let explicit = schema
            .adapter_override()
            .or_else(|| config.adapter_for_kind(kind))
            .map(str::to_string);

        if let Some(name) = explicit {
            let adapter = self.instance(config, &name)?;
            if !self.is_supported(&name, adapter.as_ref()) {
                return Err(AdapterError::Unsupported { adapter: name });
            }
            return Ok(adapter);
        }

        let candidates = std::iter::once(&config.adapters.default).chain(&config.adapters.fallbacks);
        for name in candidates {
            let adapter = self.instance(config, name)?;
            if self.is_supported(name, adapter.as_ref()) {
                return Ok(adapter);
            }
            warn!(adapter = %name, kind, "adapter not supported here, trying next candidate");
        }
        Err(AdapterError::NoSupportedAdapter {
            kind: kind.to_string(),
        })
    }
}

pub struct Context {
    config: Config,
    registry: RwLock<Registry>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Context {
    /// A context with the built-in `inmemory` and `cache` adapters registered.
    pub fn new(config: Config) -> Self {
        let ctx = Context {
            config,
            registry: RwLock::new(Registry::default()),
        };
        if let Ok(mut registry) = ctx.registry.write() {
            registry.factories.insert(
                InMemoryAdapter::NAME.to_string(),
                Arc::new(|_: &Config| Arc::new(InMemoryAdapter::new()) as Arc<dyn Adapter>),
            );
            registry.factories.insert(
                CacheAdapter::<LocalCache>::NAME.to_string(),
                Arc::new(|_: &Config| Arc::new(CacheAdapter::new(LocalCache::new())) as Arc<dyn Adapter>),
            );
        }
        ctx
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Registry>, AdapterError> {
        self.registry
            .read()
            .map_err(|_| AdapterError::LockPoisoned("registry read"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Registry>, AdapterError> {
        self.registry
            .write()
            .map_err(|_| AdapterError::LockPoisoned("registry write"))
    }

    /// Register (or replace) an adapter factory under `name`. Any instance
    /// already built under that name is dropped.
    pub fn register_adapter<F>(&self, name: &str, factory: F) -> Result<(), AdapterError>
    where
        F: Fn(&Config) -> Arc<dyn Adapter> + Send + Sync + 'static,
    {
        let mut registry = self.write()?;
        registry.factories.insert(name.to_string(), Arc::new(factory));
        registry.adapters.remove(name);
        registry.supported.remove(name);
        Ok(())
    }

    /// Register a kind and bind it to its adapter. Each kind registers once.
    pub fn register(&self, schema: Schema) -> Result<Arc<dyn Adapter>, ModelError> {
        let kind = schema.kind().to_string();
        if kind.contains(SEPARATOR) {
            return Err(KeyError::ReservedSeparator(kind).into());
        }

        let mut registry = self.write()?;
        if registry.schemas.contains_key(&kind) {
            return Err(AdapterError::DuplicateKind(kind).into());
        }

        let adapter = registry.resolve(&self.config, &schema)?;
        info!(kind = %kind, adapter = adapter.name(), "acquired adapter");

        registry.schemas.insert(kind.clone(), Arc::new(schema));
        registry.by_kind.insert(kind, adapter.clone());
        Ok(adapter)
    }

    pub fn schema(&self, kind: &str) -> Result<Arc<Schema>, AdapterError> {
        self.read()?
            .schemas
            .get(kind)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownKind(kind.to_string()))
    }

    /// The adapter bound to `kind`.
    pub fn adapter_for(&self, kind: &str) -> Result<Arc<dyn Adapter>, AdapterError> {
        self.read()?
            .by_kind
            .get(kind)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownKind(kind.to_string()))
    }

    /// The shared instance registered under `name`, built on first use.
    pub fn adapter(&self, name: &str) -> Result<Arc<dyn Adapter>, AdapterError> {
        self.write()?.instance(&self.config, name)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Result<Vec<String>, AdapterError> {
        let mut kinds: Vec<_> = self.read()?.schemas.keys().cloned().collect();
        kinds.sort();
        Ok(kinds)
    }

    /// A fresh entity of a registered kind.
    pub fn entity(&self, kind: &str) -> Result<Entity, AdapterError> {
        Ok(Entity::new(self.schema(kind)?))
    }

    pub fn get(&self, key: &Key) -> Result<Option<Entity>, ModelError> {
        let adapter = self.adapter_for(key.kind())?;
        flow::fetch(self, adapter.as_ref(), key)
    }

    pub fn get_with(&self, key: &Key, adapter: &dyn Adapter) -> Result<Option<Entity>, ModelError> {
        flow::fetch(self, adapter, key)
    }

    pub fn put(&self, entity: &mut Entity) -> Result<Key, ModelError> {
        let adapter = self.adapter_for(entity.kind())?;
        flow::store(self, adapter.as_ref(), entity)
    }

    pub fn put_with(&self, entity: &mut Entity, adapter: &dyn Adapter) -> Result<Key, ModelError> {
        flow::store(self, adapter, entity)
    }

    pub fn delete(&self, key: &Key) -> Result<bool, ModelError> {
        let adapter = self.adapter_for(key.kind())?;
        flow::remove(self, adapter.as_ref(), key)
    }

    pub fn delete_with(&self, key: &Key, adapter: &dyn Adapter) -> Result<bool, ModelError> {
        flow::remove(self, adapter, key)
    }

    /// Reserve `count` ids for `kind` without writing anything.
    pub fn allocate_ids(&self, kind: &str, count: usize) -> Result<IdRange, ModelError> {
        let adapter = self.adapter_for(kind)?;
        Ok(adapter.allocate_ids(kind, count)?)
    }

    /// Start a query. Fails for kinds bound to a backend without indexes.
    pub fn query(&self, kind: &str) -> Result<Query, ModelError> {
        let adapter = self.adapter_for(kind)?;
        if adapter.indexer().is_none() {
            return Err(AdapterError::IndexingUnsupported {
                adapter: adapter.name().to_string(),
                kind: kind.to_string(),
            }
            .into());
        }
        Ok(Query::new(kind))
    }

    pub fn run_query(&self, query: &Query) -> Result<Vec<QueryResult>, ModelError> {
        let schema = self.schema(query.kind())?;
        let adapter = self.adapter_for(query.kind())?;
        let indexer = adapter
            .indexer()
            .ok_or_else(|| AdapterError::IndexingUnsupported {
                adapter: adapter.name().to_string(),
                kind: query.kind().to_string(),
            })?;

        let mut query = query.clone();
        query.normalize(&schema)?;
        let rows = indexer.execute_query(&query)?;

        Ok(rows
            .into_iter()
            .map(|row| match row.record {
                Some(record) => QueryResult::Entity(Entity::from_stored(schema.clone(), row.key, record)),
                None => {
                    let mut key = row.key;
                    key.mark_persisted();
                    QueryResult::Key(key)
                }
            })
            .collect())
    }

    /// Forget every registered kind and adapter instance. Factories stay, so
    /// the context can be reused; stored data lives on in any adapter handle
    /// still held elsewhere.
    pub fn teardown(&self) -> Result<(), AdapterError> {
        let mut registry = self.write()?;
        registry.schemas.clear();
        registry.by_kind.clear();
        registry.adapters.clear();
        registry.supported.clear();
        Ok(())
    }
}
