//! Hierarchical entity keys.
//!
//! A [`Key`] names one entity: a `(namespace, kind, id)` triple plus an
//! optional parent key, forming an ancestry chain from a root entity down to
//! the leaf. Keys without an id are *incomplete*; the adapter assigns an id
//! the first time the owning entity is written.
//!
//! ## Example
//!
//! ```ignore
//! use polystore::Key;
//!
//! let org = Key::new("Org", "acme")?;
//! let user = Key::with_parent("User", "alice", &org)?;
//!
//! assert_eq!(user.len(), 2);
//! assert_eq!(Key::from_urlsafe(&user.urlsafe()?)?, user);
//! ```

mod ancestry;
mod codec;

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::KeyError;

pub use ancestry::Ancestry;
pub use codec::{KEY_FIELDS, SEPARATOR};

/// The id component of a key: an allocated integer or an application name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyId {
    Int(i64),
    Name(String),
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Int(id) => write!(f, "{}", id),
            KeyId::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<i64> for KeyId {
    fn from(id: i64) -> Self {
        KeyId::Int(id)
    }
}

impl From<i32> for KeyId {
    fn from(id: i32) -> Self {
        KeyId::Int(id.into())
    }
}

impl From<u32> for KeyId {
    fn from(id: u32) -> Self {
        KeyId::Int(id.into())
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        KeyId::Name(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        KeyId::Name(name)
    }
}

impl From<&String> for KeyId {
    fn from(name: &String) -> Self {
        KeyId::Name(name.clone())
    }
}

/// One level of a flattened key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPart {
    pub namespace: Option<String>,
    pub kind: String,
    pub id: Option<KeyId>,
}

/// A hierarchical entity identifier.
///
/// Equality and hashing compare the flattened form, so two keys are equal
/// iff every level of their ancestry chains matches.
#[derive(Clone)]
pub struct Key {
    namespace: Option<String>,
    kind: String,
    id: Option<KeyId>,
    parent: Option<Box<Key>>,
    persisted: bool,
}

impl Key {
    /// A complete root key.
    pub fn new(kind: impl Into<String>, id: impl Into<KeyId>) -> Result<Self, KeyError> {
        Key::builder(kind).id(id).build()
    }

    /// A root key without an id.
    pub fn incomplete(kind: impl Into<String>) -> Result<Self, KeyError> {
        Key::builder(kind).build()
    }

    /// A complete key under `parent`. The child inherits the parent's namespace.
    pub fn with_parent(
        kind: impl Into<String>,
        id: impl Into<KeyId>,
        parent: &Key,
    ) -> Result<Self, KeyError> {
        Key::builder(kind).id(id).parent(parent).build()
    }

    pub fn builder(kind: impl Into<String>) -> KeyBuilder {
        KeyBuilder {
            kind: kind.into(),
            id: None,
            namespace: None,
            parent: None,
        }
    }

    /// Incomplete root key for a kind already checked by the registry.
    pub(crate) fn bare(kind: &str) -> Self {
        Key {
            namespace: None,
            kind: kind.to_string(),
            id: None,
            parent: None,
            persisted: false,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> Option<&KeyId> {
        self.id.as_ref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    /// The topmost ancestor, or `self` for a root key.
    pub fn root(&self) -> &Key {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    pub fn is_complete(&self) -> bool {
        self.id.is_some()
    }

    /// Depth of the ancestry chain, or 0 for an incomplete key.
    pub fn len(&self) -> usize {
        if self.is_complete() {
            self.depth()
        } else {
            0
        }
    }

    /// True for incomplete keys.
    pub fn is_empty(&self) -> bool {
        !self.is_complete()
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// True if `ancestor` appears in this key's ancestry chain (including `self`).
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        self.ancestry().any(|key| key == ancestor)
    }

    pub fn set_id(&mut self, id: impl Into<KeyId>) -> Result<(), KeyError> {
        self.ensure_mutable()?;
        self.id = Some(id.into());
        Ok(())
    }

    pub fn set_namespace(&mut self, namespace: Option<String>) -> Result<(), KeyError> {
        self.ensure_mutable()?;
        if let Some(ns) = &namespace {
            codec::check_token(ns)?;
        }
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        Ok(())
    }

    /// Freeze this key after a successful write or read.
    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// Root-first view of the ancestry chain, ending with `self`.
    pub fn ancestry(&self) -> Ancestry<'_> {
        Ancestry::new(self)
    }

    /// Root-first sequence of `(namespace, kind, id)` parts.
    pub fn flatten(&self) -> Vec<KeyPart> {
        self.ancestry()
            .map(|key| KeyPart {
                namespace: key.namespace.clone(),
                kind: key.kind.clone(),
                id: key.id.clone(),
            })
            .collect()
    }

    /// Flattened parts plus their single-string join, used as a flat lookup key.
    pub fn flatten_joined(&self) -> (String, Vec<KeyPart>) {
        let parts = self.flatten();
        (codec::join(&parts), parts)
    }

    /// Reversible, URL-safe encoding of the joined form.
    pub fn urlsafe(&self) -> Result<String, KeyError> {
        self.ensure_complete()?;
        let (joined, _) = self.flatten_joined();
        Ok(codec::to_urlsafe(&joined))
    }

    /// Inverse of [`Key::flatten_joined`].
    pub fn from_raw(raw: &str) -> Result<Self, KeyError> {
        let parts = codec::split(raw)?;
        Key::from_parts(&parts)
    }

    /// Inverse of [`Key::flatten`]: the first part is the root ancestor.
    pub fn from_parts(parts: &[KeyPart]) -> Result<Self, KeyError> {
        let mut key: Option<Key> = None;
        for part in parts {
            let mut builder = Key::builder(part.kind.clone());
            if let Some(id) = &part.id {
                builder = builder.id(id.clone());
            }
            if let Some(ns) = &part.namespace {
                builder = builder.namespace(ns.clone());
            }
            if let Some(parent) = &key {
                builder = builder.parent(parent);
            }
            key = Some(builder.build()?);
        }
        key.ok_or(KeyError::SchemaMismatch {
            parts: 0,
            fields: KEY_FIELDS,
        })
    }

    /// Inverse of [`Key::urlsafe`].
    pub fn from_urlsafe(encoded: &str) -> Result<Self, KeyError> {
        let raw = codec::from_urlsafe(encoded)?;
        Key::from_raw(&raw)
    }

    /// Decode a key given in exactly one of its serialized formats.
    pub fn from_formats(raw: Option<&str>, urlsafe: Option<&str>) -> Result<Self, KeyError> {
        match (raw, urlsafe) {
            (Some(_), Some(_)) => Err(KeyError::MultipleFormats),
            (Some(raw), None) => Key::from_raw(raw),
            (None, Some(encoded)) => Key::from_urlsafe(encoded),
            (None, None) => Err(KeyError::NoFormat),
        }
    }

    pub(crate) fn ensure_complete(&self) -> Result<(), KeyError> {
        for key in self.ancestry() {
            if !key.is_complete() {
                return Err(KeyError::Incomplete {
                    kind: key.kind.clone(),
                });
            }
        }
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), KeyError> {
        if self.persisted {
            return Err(KeyError::Persisted {
                kind: self.kind.clone(),
            });
        }
        Ok(())
    }

    fn depth(&self) -> usize {
        1 + self.parent().map(Key::depth).unwrap_or(0)
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.flatten() == other.flatten()
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.flatten().hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("namespace", &self.namespace)
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("persisted", &self.persisted)
            .finish()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.ancestry().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            match &key.id {
                Some(id) => write!(f, "{}:{}", key.kind, id)?,
                None => write!(f, "{}:?", key.kind)?,
            }
        }
        Ok(())
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = self.urlsafe().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&encoded)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Key::from_urlsafe(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Builder for keys with a namespace, a parent, or both.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    kind: String,
    id: Option<KeyId>,
    namespace: Option<String>,
    parent: Option<Key>,
}

impl KeyBuilder {
    pub fn id(mut self, id: impl Into<KeyId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn parent(mut self, parent: &Key) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn build(self) -> Result<Key, KeyError> {
        codec::check_token(&self.kind)?;
        if let Some(ns) = &self.namespace {
            codec::check_token(ns)?;
        }

        let parent = match self.parent {
            Some(parent) => {
                if parent.ensure_complete().is_err() {
                    return Err(KeyError::IncompleteParent {
                        kind: parent.kind.clone(),
                    });
                }
                Some(Box::new(parent))
            }
            None => None,
        };

        let namespace = self
            .namespace
            .filter(|ns| !ns.is_empty())
            .or_else(|| parent.as_ref().and_then(|p| p.namespace.clone()));

        Ok(Key {
            namespace,
            kind: self.kind,
            id: self.id,
            parent,
            persisted: false,
        })
    }
}
