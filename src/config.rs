//! Runtime configuration, loaded from TOML.
//!
//! ```toml
//! # Emit per-operation debug events.
//! debug = false
//!
//! [adapters]
//! # Adapter used by kinds without an override.
//! default = "inmemory"
//! # Tried in order when the default reports itself unsupported.
//! fallbacks = ["cache"]
//!
//! [adapters.kinds]
//! Session = "cache"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::adapter::InMemoryAdapter;
use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdapterConfig {
    /// Adapter name for kinds without an override.
    #[serde(default = "default_adapter")]
    pub default: String,
    /// Ordered candidates used when the default is unsupported.
    #[serde(default)]
    pub fallbacks: Vec<String>,
    /// Per-kind adapter overrides.
    #[serde(default)]
    pub kinds: HashMap<String, String>,
}

fn default_adapter() -> String {
    InMemoryAdapter::NAME.to_string()
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            default: default_adapter(),
            fallbacks: Vec::new(),
            kinds: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub adapters: AdapterConfig,
    /// The whole parsed tree, for [`Config::get`].
    #[serde(skip)]
    raw: toml::Table,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            debug: false,
            adapters: AdapterConfig::default(),
            raw: toml::Table::new(),
        };
        config.sync_raw();
        config
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(text)?;
        config.raw = text.parse::<toml::Table>()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self.sync_raw();
        self
    }

    pub fn with_default_adapter(mut self, name: impl Into<String>) -> Self {
        self.adapters.default = name.into();
        self.sync_raw();
        self
    }

    pub fn with_fallbacks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.adapters.fallbacks = names.into_iter().map(Into::into).collect();
        self.sync_raw();
        self
    }

    pub fn with_kind_adapter(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.adapters.kinds.insert(kind.into(), name.into());
        self.sync_raw();
        self
    }

    /// Configured override for `kind`, if any.
    pub fn adapter_for_kind(&self, kind: &str) -> Option<&str> {
        self.adapters.kinds.get(kind).map(String::as_str)
    }

    /// Resolve a dotted path (`"adapters.default"`) over the raw tree.
    pub fn get(&self, path: &str) -> Option<&toml::Value> {
        let mut segments = path.split('.');
        let mut current = self.raw.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Like [`Config::get`], deserialized into `T`, or `default` when the path
    /// is missing or has another shape.
    pub fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        self.get(path)
            .and_then(|value| value.clone().try_into().ok())
            .unwrap_or(default)
    }

    /// Keep the raw tree in step with typed edits; unknown keys survive.
    fn sync_raw(&mut self) {
        if let Ok(toml::Value::Table(typed)) = toml::Value::try_from(&*self) {
            for (name, value) in typed {
                self.raw.insert(name, value);
            }
        }
    }
}
