mod dict;
mod entity;
mod lookup;
mod validate;

pub use dict::{DictOptions, ToDict, ToJson, KEY_FIELD};
pub use entity::Entity;
pub use lookup::{KeyLookup, Raw, Urlsafe};

pub(crate) use validate::validate_record;
