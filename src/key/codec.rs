//! Joined and URL-safe key encodings.
//!
//! The joined form is every flattened part laid out as
//! `namespace SEP kind SEP id`, root first, all separated by [`SEPARATOR`].
//! Ids are written as JSON so integer and string ids survive a round trip.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::KeyError;

use super::{KeyId, KeyPart};

/// Reserved separator between joined key fields.
pub const SEPARATOR: char = '\u{1f}';

/// Number of fields per flattened key part: namespace, kind, id.
pub const KEY_FIELDS: usize = 3;

pub(super) fn check_token(token: &str) -> Result<(), KeyError> {
    if token.contains(SEPARATOR) {
        return Err(KeyError::ReservedSeparator(token.to_string()));
    }
    Ok(())
}

pub(super) fn join(parts: &[KeyPart]) -> String {
    let mut fields = Vec::with_capacity(parts.len() * KEY_FIELDS);
    for part in parts {
        fields.push(part.namespace.clone().unwrap_or_default());
        fields.push(part.kind.clone());
        fields.push(encode_id(part.id.as_ref()));
    }
    fields.join(&SEPARATOR.to_string())
}

pub(super) fn split(raw: &str) -> Result<Vec<KeyPart>, KeyError> {
    let fields: Vec<&str> = raw.split(SEPARATOR).collect();
    if raw.is_empty() || fields.len() % KEY_FIELDS != 0 {
        return Err(KeyError::SchemaMismatch {
            parts: if raw.is_empty() { 0 } else { fields.len() },
            fields: KEY_FIELDS,
        });
    }

    fields
        .chunks(KEY_FIELDS)
        .map(|chunk| {
            Ok(KeyPart {
                namespace: (!chunk[0].is_empty()).then(|| chunk[0].to_string()),
                kind: chunk[1].to_string(),
                id: decode_id(chunk[2])?,
            })
        })
        .collect()
}

pub(super) fn to_urlsafe(joined: &str) -> String {
    URL_SAFE_NO_PAD.encode(joined.as_bytes())
}

pub(super) fn from_urlsafe(encoded: &str) -> Result<String, KeyError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| KeyError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| KeyError::Decode(e.to_string()))
}

fn encode_id(id: Option<&KeyId>) -> String {
    match id {
        None => "null".to_string(),
        Some(KeyId::Int(id)) => id.to_string(),
        Some(KeyId::Name(name)) => serde_json::Value::String(name.clone()).to_string(),
    }
}

fn decode_id(token: &str) -> Result<Option<KeyId>, KeyError> {
    serde_json::from_str::<Option<KeyId>>(token).map_err(|e| KeyError::Decode(e.to_string()))
}
