use crate::error::KeyError;
use crate::key::{Key, KeyId, KeyPart};

/// Anything that can name an entity of a given kind.
pub trait KeyLookup {
    fn resolve(self, kind: &str) -> Result<Key, KeyError>;
}

/// A key in its joined raw form.
#[derive(Debug, Clone, Copy)]
pub struct Raw<'a>(pub &'a str);

/// A key in its urlsafe form.
#[derive(Debug, Clone, Copy)]
pub struct Urlsafe<'a>(pub &'a str);

fn check_kind(key: Key, kind: &str) -> Result<Key, KeyError> {
    if key.kind() != kind {
        return Err(KeyError::KindMismatch {
            expected: kind.to_string(),
            found: key.kind().to_string(),
        });
    }
    Ok(key)
}

impl KeyLookup for Key {
    fn resolve(self, kind: &str) -> Result<Key, KeyError> {
        check_kind(self, kind)
    }
}

impl KeyLookup for &Key {
    fn resolve(self, kind: &str) -> Result<Key, KeyError> {
        check_kind(self.clone(), kind)
    }
}

impl KeyLookup for &[KeyPart] {
    fn resolve(self, kind: &str) -> Result<Key, KeyError> {
        check_kind(Key::from_parts(self)?, kind)
    }
}

impl KeyLookup for Raw<'_> {
    fn resolve(self, kind: &str) -> Result<Key, KeyError> {
        check_kind(Key::from_raw(self.0)?, kind)
    }
}

impl KeyLookup for Urlsafe<'_> {
    fn resolve(self, kind: &str) -> Result<Key, KeyError> {
        check_kind(Key::from_urlsafe(self.0)?, kind)
    }
}

// Bare ids combine with the kind into a root key.

impl KeyLookup for KeyId {
    fn resolve(self, kind: &str) -> Result<Key, KeyError> {
        Key::new(kind, self)
    }
}

impl KeyLookup for i64 {
    fn resolve(self, kind: &str) -> Result<Key, KeyError> {
        Key::new(kind, self)
    }
}

impl KeyLookup for &str {
    fn resolve(self, kind: &str) -> Result<Key, KeyError> {
        Key::new(kind, self)
    }
}

impl KeyLookup for String {
    fn resolve(self, kind: &str) -> Result<Key, KeyError> {
        Key::new(kind, self)
    }
}
