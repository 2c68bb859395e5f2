//! Entity schemas: property descriptors and their policy bundles.
//!
//! A [`Schema`] is the static description of one entity kind. It is built
//! once at startup and handed to [`Context::register`](crate::Context::register),
//! which binds the kind to its adapter.
//!
//! ## Example
//!
//! ```ignore
//! use polystore::{BaseType, Property, Schema};
//!
//! let person = Schema::new("Person")
//!     .property(Property::new("firstname", BaseType::String))
//!     .property(Property::new("lastname", BaseType::String).required())
//!     .property(Property::new("tags", BaseType::String).repeated());
//! ```

mod value;

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::key::Key;

pub use value::{Record, Value};
pub(crate) use value::record_to_json;

/// Custom per-property check, run after type coercion and choice checks.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// The declared type of a property.
#[derive(Clone)]
pub enum BaseType {
    String,
    Int,
    Float,
    Bool,
    Date,
    Time,
    DateTime,
    Key,
    Nested(Arc<Schema>),
}

impl BaseType {
    pub fn name(&self) -> String {
        match self {
            BaseType::String => "string".into(),
            BaseType::Int => "int".into(),
            BaseType::Float => "float".into(),
            BaseType::Bool => "bool".into(),
            BaseType::Date => "date".into(),
            BaseType::Time => "time".into(),
            BaseType::DateTime => "datetime".into(),
            BaseType::Key => "key".into(),
            BaseType::Nested(schema) => format!("nested {}", schema.kind()),
        }
    }

    /// Convert `value` to this basetype if it matches or is coercible.
    ///
    /// Nested schemas are handled by entity validation and return `None` here.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (BaseType::String, v @ Value::String(_)) => Some(v),
            (BaseType::Int, v @ Value::Int(_)) => Some(v),
            (BaseType::Float, v @ Value::Float(_)) => Some(v),
            (BaseType::Float, Value::Int(i)) => Some(Value::Float(i as f64)),
            (BaseType::Bool, v @ Value::Bool(_)) => Some(v),
            (BaseType::Date, v @ Value::Date(_)) => Some(v),
            (BaseType::Date, Value::String(s)) => s.parse::<NaiveDate>().ok().map(Value::Date),
            (BaseType::Time, v @ Value::Time(_)) => Some(v),
            (BaseType::Time, Value::String(s)) => s.parse::<NaiveTime>().ok().map(Value::Time),
            (BaseType::DateTime, v @ Value::DateTime(_)) => Some(v),
            (BaseType::DateTime, Value::Date(d)) => d.and_hms_opt(0, 0, 0).map(Value::DateTime),
            (BaseType::DateTime, Value::String(s)) => {
                s.parse::<NaiveDateTime>().ok().map(Value::DateTime)
            }
            (BaseType::Key, Value::Key(key)) => key.is_complete().then_some(Value::Key(key)),
            (BaseType::Key, Value::String(s)) => Key::from_urlsafe(&s).ok().map(Value::Key),
            _ => None,
        }
    }
}

impl fmt::Debug for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A named, typed property with its `{required, repeated, indexed, default,
/// choices, validator}` policy bundle.
#[derive(Clone)]
pub struct Property {
    name: String,
    basetype: BaseType,
    required: bool,
    repeated: bool,
    indexed: bool,
    default: Option<Value>,
    choices: Option<Vec<Value>>,
    validator: Option<Validator>,
}

impl Property {
    /// A new optional, scalar, indexed property.
    pub fn new(name: impl Into<String>, basetype: BaseType) -> Self {
        Property {
            name: name.into(),
            basetype,
            required: false,
            repeated: false,
            indexed: true,
            default: None,
            choices: None,
            validator: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn unindexed(mut self) -> Self {
        self.indexed = false;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn basetype(&self) -> &BaseType {
        &self.basetype
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn allowed_choices(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    pub(crate) fn validator_fn(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    /// The value an unset property surfaces as: its default, or an empty list
    /// for repeated properties.
    pub fn implicit_value(&self) -> Option<Value> {
        match (&self.default, self.repeated) {
            (Some(default), _) => Some(default.clone()),
            (None, true) => Some(Value::List(Vec::new())),
            (None, false) => None,
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("basetype", &self.basetype)
            .field("required", &self.required)
            .field("repeated", &self.repeated)
            .field("indexed", &self.indexed)
            .field("default", &self.default)
            .field("choices", &self.choices)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Static description of one entity kind.
#[derive(Debug, Clone)]
pub struct Schema {
    kind: String,
    properties: Vec<Property>,
    adapter: Option<String>,
}

impl Schema {
    pub fn new(kind: impl Into<String>) -> Self {
        Schema {
            kind: kind.into(),
            properties: Vec::new(),
            adapter: None,
        }
    }

    /// Declare a property. Redeclaring a name replaces the earlier declaration.
    pub fn property(mut self, property: Property) -> Self {
        match self.properties.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
        self
    }

    /// Bind this kind to a specific adapter instead of the configured default.
    pub fn adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn adapter_override(&self) -> Option<&str> {
        self.adapter.as_deref()
    }
}
