//! Secondary-index generation for indexed adapters.
//!
//! Every stored entity owns a set of index entries:
//!
//! | Entry | Index key | Meaning |
//! |-------|-----------|---------|
//! | `Exists` | `__key__` | the entity exists |
//! | `Kind` | `__kind__ SEP kind` | kind membership |
//! | `Group` | `__group__ SEP root` | entity group of the root ancestor (`__root__` for roots) |
//! | `Property` | `kind SEP property SEP value` | one per indexed value |
//!
//! Meta entries always come first; property entries follow schema
//! declaration order, and repeated values keep their list order.

use crate::error::AdapterError;
use crate::key::{Key, SEPARATOR};
use crate::query::{Query, QueryRow};
use crate::schema::{Record, Schema, Value};

use super::index_value::encode_index_value;
use super::Adapter;

const EXISTS_INDEX: &str = "__key__";
const KIND_INDEX: &str = "__kind__";
const GROUP_INDEX: &str = "__group__";
const ROOT_GROUP: &str = "__root__";

/// One index entry owned by a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexEntry {
    Exists,
    Kind(String),
    /// Joined form of the root ancestor, or `None` for root entities.
    Group(Option<String>),
    Property {
        kind: String,
        property: String,
        value: String,
    },
}

impl IndexEntry {
    /// The ancestor-group entry for `key`, grouped by its root ancestor only.
    pub fn group_of(key: &Key) -> IndexEntry {
        match key.parent() {
            None => IndexEntry::Group(None),
            Some(_) => IndexEntry::Group(Some(key.root().flatten_joined().0)),
        }
    }

    /// The group an ancestor query on `ancestor` has to scan.
    pub fn group_under(ancestor: &Key) -> IndexEntry {
        IndexEntry::Group(Some(ancestor.root().flatten_joined().0))
    }

    pub fn property(kind: &str, property: &str, value: &Value) -> Option<IndexEntry> {
        Some(IndexEntry::Property {
            kind: kind.to_string(),
            property: property.to_string(),
            value: encode_index_value(value)?,
        })
    }

    pub fn is_meta(&self) -> bool {
        !matches!(self, IndexEntry::Property { .. })
    }

    /// Flat key under which backends store this entry.
    pub fn index_key(&self) -> String {
        let sep = SEPARATOR.to_string();
        match self {
            IndexEntry::Exists => EXISTS_INDEX.to_string(),
            IndexEntry::Kind(kind) => [KIND_INDEX, kind].join(&sep),
            IndexEntry::Group(root) => [GROUP_INDEX, root.as_deref().unwrap_or(ROOT_GROUP)].join(&sep),
            IndexEntry::Property {
                kind,
                property,
                value,
            } => [kind.as_str(), property.as_str(), value.as_str()].join(&sep),
        }
    }
}

/// Ordered index entries for one entity: meta entries, then property entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSet {
    meta: Vec<IndexEntry>,
    properties: Vec<IndexEntry>,
}

impl IndexSet {
    /// Meta entries only.
    pub fn meta_for(key: &Key) -> Self {
        IndexSet {
            meta: vec![
                IndexEntry::Exists,
                IndexEntry::Kind(key.kind().to_string()),
                IndexEntry::group_of(key),
            ],
            properties: Vec::new(),
        }
    }

    /// Meta entries plus one entry per indexed property value in `record`.
    pub fn generate(key: &Key, schema: &Schema, record: &Record) -> Self {
        let mut set = IndexSet::meta_for(key);
        for property in schema.properties().iter().filter(|p| p.is_indexed()) {
            let Some(value) = record.get(property.name()) else {
                continue;
            };
            let values: &[Value] = match value {
                Value::List(items) if property.is_repeated() => items,
                single => std::slice::from_ref(single),
            };
            set.properties.extend(
                values
                    .iter()
                    .filter_map(|v| IndexEntry::property(schema.kind(), property.name(), v)),
            );
        }
        set
    }

    pub fn meta(&self) -> &[IndexEntry] {
        &self.meta
    }

    pub fn properties(&self) -> &[IndexEntry] {
        &self.properties
    }

    /// All entries, meta first.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.meta.iter().chain(self.properties.iter())
    }

    pub fn len(&self) -> usize {
        self.meta.len() + self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries of `self` that `other` does not also hold, in order.
    pub fn without(&self, other: &IndexSet) -> IndexSet {
        fn keep(entries: &[IndexEntry], other: &[IndexEntry]) -> Vec<IndexEntry> {
            entries.iter().filter(|e| !other.contains(*e)).cloned().collect()
        }
        IndexSet {
            meta: keep(&self.meta, &other.meta),
            properties: keep(&self.properties, &other.properties),
        }
    }
}

/// Indexing half of a backend. Only adapters that return `Some` from
/// [`Adapter::indexer`] can serve queries.
pub trait IndexedAdapter: Adapter {
    /// Associate every entry in `writes` with `encoded`.
    fn write_indexes(&self, _encoded: &str, _writes: &IndexSet) -> Result<(), AdapterError> {
        Err(AdapterError::not_implemented(self.name(), "write_indexes"))
    }

    /// Drop the association between `encoded` and every entry in `indexes`.
    fn clean_indexes(&self, _encoded: &str, _indexes: &IndexSet) -> Result<(), AdapterError> {
        Err(AdapterError::not_implemented(self.name(), "clean_indexes"))
    }

    /// Move `encoded` from its `stale` entries to its `fresh` ones. Entries
    /// held by both sets are left in place. Backends with a single lock
    /// should override this to make the swap atomic.
    fn replace_indexes(
        &self,
        encoded: &str,
        stale: &IndexSet,
        fresh: &IndexSet,
    ) -> Result<(), AdapterError> {
        self.clean_indexes(encoded, &stale.without(fresh))?;
        self.write_indexes(encoded, fresh)
    }

    fn execute_query(&self, _query: &Query) -> Result<Vec<QueryRow>, AdapterError> {
        Err(AdapterError::not_implemented(self.name(), "execute_query"))
    }
}
