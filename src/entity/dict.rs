//! Dictionary and JSON views of keys and entities.

use std::collections::BTreeMap;

use crate::key::{Key, KeyId};
use crate::schema::{record_to_json, Record, Value};

use super::Entity;

/// Name under which `DictOptions::all` places the entity key.
pub const KEY_FIELD: &str = "__key__";

/// Shaping options for [`ToDict::to_dict`].
///
/// `include` (when non-empty) restricts output to the listed names, `exclude`
/// removes names, `filter` drops entries it rejects, and `map` rewrites
/// surviving values. `all` additionally emits the entity key under
/// [`KEY_FIELD`].
#[derive(Clone, Copy, Default)]
pub struct DictOptions<'a> {
    include: &'a [&'a str],
    exclude: &'a [&'a str],
    filter: Option<&'a dyn Fn(&str, &Value) -> bool>,
    map: Option<&'a dyn Fn(&str, Value) -> Value>,
    all: bool,
}

impl<'a> DictOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, names: &'a [&'a str]) -> Self {
        self.include = names;
        self
    }

    pub fn exclude(mut self, names: &'a [&'a str]) -> Self {
        self.exclude = names;
        self
    }

    pub fn filter(mut self, filter: &'a dyn Fn(&str, &Value) -> bool) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn map(mut self, map: &'a dyn Fn(&str, Value) -> Value) -> Self {
        self.map = Some(map);
        self
    }

    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }

    fn admits(&self, name: &str) -> bool {
        (self.include.is_empty() || self.include.contains(&name)) && !self.exclude.contains(&name)
    }

    fn shape(&self, name: &str, value: Value) -> Option<Value> {
        if let Some(filter) = self.filter {
            if !filter(name, &value) {
                return None;
            }
        }
        Some(match self.map {
            Some(map) => map(name, value),
            None => value,
        })
    }

    fn collect<I>(&self, entries: I) -> Record
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        entries
            .into_iter()
            .filter(|(name, _)| self.admits(name))
            .filter_map(|(name, value)| {
                let value = self.shape(&name, value)?;
                Some((name, value))
            })
            .collect()
    }
}

/// Capability: render as a property-name → value mapping.
pub trait ToDict {
    fn to_dict(&self, options: DictOptions<'_>) -> Record;
}

/// Capability: render as JSON, built on the default dict view.
pub trait ToJson: ToDict {
    fn to_json_value(&self) -> serde_json::Value {
        record_to_json(&self.to_dict(DictOptions::default()))
    }

    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_json_value())
    }
}

impl ToDict for Entity {
    /// Every declared property, with unset ones surfacing as their default
    /// (or null when there is none).
    fn to_dict(&self, options: DictOptions<'_>) -> Record {
        let mut entries: Vec<(String, Value)> = self
            .schema()
            .properties()
            .iter()
            .map(|property| {
                let value = self.value(property.name()).unwrap_or(Value::Null);
                (property.name().to_string(), value)
            })
            .collect();

        if options.all && self.key().is_complete() {
            entries.push((KEY_FIELD.to_string(), Value::Key(self.key().clone())));
        }

        options.collect(entries)
    }
}

impl ToJson for Entity {}

impl Entity {
    /// Explicit view: unset properties map to `None`, distinguishable from an
    /// explicitly stored null (`Some(Value::Null)`).
    pub fn to_dict_explicit(&self, options: DictOptions<'_>) -> BTreeMap<String, Option<Value>> {
        self.schema()
            .properties()
            .iter()
            .map(|property| property.name())
            .filter(|name| options.admits(name))
            .filter_map(|name| match self.get(name) {
                Some(value) => {
                    let value = options.shape(name, value.clone())?;
                    Some((name.to_string(), Some(value)))
                }
                None => Some((name.to_string(), None)),
            })
            .collect()
    }
}

impl ToDict for Key {
    fn to_dict(&self, options: DictOptions<'_>) -> Record {
        let id = match self.id() {
            Some(KeyId::Int(id)) => Value::Int(*id),
            Some(KeyId::Name(name)) => Value::String(name.clone()),
            None => Value::Null,
        };
        let parent = match self.parent() {
            Some(parent) => Value::Key(parent.clone()),
            None => Value::Null,
        };
        options.collect([
            ("namespace".to_string(), self.namespace().map(Value::from).into()),
            ("kind".to_string(), Value::from(self.kind())),
            ("id".to_string(), id),
            ("parent".to_string(), parent),
        ])
    }
}

impl ToJson for Key {}
