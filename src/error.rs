use thiserror::Error;

/// Errors raised while building, encoding, or decoding a [`Key`](crate::Key).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key of kind '{kind}' is incomplete (no id)")]
    Incomplete { kind: String },
    #[error("raw key has {parts} parts, expected a multiple of {fields}")]
    SchemaMismatch { parts: usize, fields: usize },
    #[error("key supplied in multiple formats (raw and urlsafe)")]
    MultipleFormats,
    #[error("no key format supplied")]
    NoFormat,
    #[error("cannot decode key: {0}")]
    Decode(String),
    #[error("'{0}' contains the reserved key separator")]
    ReservedSeparator(String),
    #[error("parent key of kind '{kind}' is incomplete")]
    IncompleteParent { kind: String },
    #[error("key of kind '{kind}' is persisted and cannot be modified")]
    Persisted { kind: String },
    #[error("key of kind '{found}' cannot identify an entity of kind '{expected}'")]
    KindMismatch { expected: String, found: String },
}

/// Property policy violations, raised before anything reaches a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("property '{property}' of '{kind}' is required")]
    Required { kind: String, property: String },
    #[error("property '{property}' of '{kind}' is repeated and requires a list")]
    Repeated { kind: String, property: String },
    #[error("property '{property}' of '{kind}' is not repeated and cannot hold a list")]
    NotRepeated { kind: String, property: String },
    #[error("property '{property}' of '{kind}' expects {expected}, got {found}")]
    Type {
        kind: String,
        property: String,
        expected: String,
        found: &'static str,
    },
    #[error("value {value} is not an allowed choice for property '{property}' of '{kind}'")]
    Choice {
        kind: String,
        property: String,
        value: String,
    },
    #[error("property '{property}' of '{kind}' failed validation: {message}")]
    Custom {
        kind: String,
        property: String,
        message: String,
    },
    #[error("'{kind}' has no property named '{property}'")]
    UnknownProperty { kind: String, property: String },
}

/// Adapter resolution and backend failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("adapter '{adapter}' does not implement '{method}'")]
    NotImplemented {
        adapter: String,
        method: &'static str,
    },
    #[error("adapter '{adapter}' does not support indexing (kind '{kind}')")]
    IndexingUnsupported { adapter: String, kind: String },
    #[error("adapter '{adapter}' is not supported in this environment")]
    Unsupported { adapter: String },
    #[error("no supported adapter available for kind '{kind}'")]
    NoSupportedAdapter { kind: String },
    #[error("unknown adapter '{0}'")]
    UnknownAdapter(String),
    #[error("unknown kind '{0}'")]
    UnknownKind(String),
    #[error("kind '{0}' is already registered")]
    DuplicateKind(String),
    #[error("adapter lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("adapter serialization error: {0}")]
    Serde(String),
    #[error("adapter storage error: {0}")]
    Storage(String),
}

impl AdapterError {
    pub(crate) fn not_implemented(adapter: &str, method: &'static str) -> Self {
        AdapterError::NotImplemented {
            adapter: adapter.to_string(),
            method,
        }
    }

    pub(crate) fn ids_exhausted(kind: &str) -> Self {
        AdapterError::Storage(format!("id space exhausted for '{}'", kind))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {message}")]
    Read { path: String, message: String },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Crate-wide error returned by every persistence operation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
