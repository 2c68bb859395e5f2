//! Index-backed queries.
//!
//! A [`Query`] is a plain description (kind, filters, ancestor, ordering,
//! window). [`Context::query`](crate::Context::query) hands one out only when
//! the kind's adapter can index; [`Query::fetch`] runs it through that
//! adapter's [`execute_query`](crate::adapter::IndexedAdapter::execute_query).

use std::cmp::Ordering;

use crate::entity::Entity;
use crate::error::{ModelError, ValidationError};
use crate::key::Key;
use crate::registry::Context;
use crate::schema::{Record, Schema, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
        }
    }
}

/// `property <op> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub property: String,
    pub op: Operator,
    pub value: Value,
}

impl Filter {
    /// Whether a stored record satisfies this filter. A repeated property
    /// matches when any element does; missing properties compare as null.
    pub fn matches(&self, record: &Record) -> bool {
        match record.get(&self.property) {
            Some(Value::List(items)) => items.iter().any(|item| self.matches_value(item)),
            Some(value) => self.matches_value(value),
            None => self.matches_value(&Value::Null),
        }
    }

    fn matches_value(&self, value: &Value) -> bool {
        let ordering = match (value, &self.value) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (left, right) => left.compare(right),
        };
        match ordering {
            Some(ordering) => self.op.accepts(ordering),
            None => self.op == Operator::Ne && *value != self.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
}

/// One row produced by a backend. `record` is `None` for keys-only queries.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub key: Key,
    pub record: Option<Record>,
}

/// A materialized query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Entity(Entity),
    Key(Key),
}

impl QueryResult {
    pub fn key(&self) -> &Key {
        match self {
            QueryResult::Entity(entity) => entity.key(),
            QueryResult::Key(key) => key,
        }
    }

    pub fn into_entity(self) -> Option<Entity> {
        match self {
            QueryResult::Entity(entity) => Some(entity),
            QueryResult::Key(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    kind: String,
    filters: Vec<Filter>,
    ancestor: Option<Key>,
    orders: Vec<Order>,
    limit: Option<usize>,
    offset: usize,
    keys_only: bool,
}

impl Query {
    pub fn new(kind: impl Into<String>) -> Self {
        Query {
            kind: kind.into(),
            filters: Vec::new(),
            ancestor: None,
            orders: Vec::new(),
            limit: None,
            offset: 0,
            keys_only: false,
        }
    }

    pub fn filter(mut self, property: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            property: property.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    /// Shorthand for an equality filter.
    pub fn eq(self, property: &str, value: impl Into<Value>) -> Self {
        self.filter(property, Operator::Eq, value)
    }

    /// Restrict results to `ancestor` and its descendants.
    pub fn ancestor(mut self, ancestor: &Key) -> Self {
        self.ancestor = Some(ancestor.clone());
        self
    }

    pub fn order(mut self, property: &str, direction: Direction) -> Self {
        self.orders.push(Order {
            property: property.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ancestor_key(&self) -> Option<&Key> {
        self.ancestor.as_ref()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_keys_only(&self) -> bool {
        self.keys_only
    }

    /// Run against the adapter bound to this kind.
    pub fn fetch(&self, ctx: &Context) -> Result<Vec<QueryResult>, ModelError> {
        ctx.run_query(self)
    }

    /// Coerce filter values to the declared basetypes so index lookups and
    /// comparisons see the stored representation.
    pub(crate) fn normalize(&mut self, schema: &Schema) -> Result<(), ValidationError> {
        for filter in &mut self.filters {
            let property = schema
                .get(&filter.property)
                .ok_or_else(|| ValidationError::UnknownProperty {
                    kind: schema.kind().to_string(),
                    property: filter.property.clone(),
                })?;
            if let Some(coerced) = property.basetype().coerce(filter.value.clone()) {
                filter.value = coerced;
            }
        }
        for order in &self.orders {
            if schema.get(&order.property).is_none() {
                return Err(ValidationError::UnknownProperty {
                    kind: schema.kind().to_string(),
                    property: order.property.clone(),
                });
            }
        }
        Ok(())
    }

    /// Apply filters, ancestry, ordering and the offset/limit window to a
    /// candidate set. Candidates are expected in index order; ties keep it.
    pub fn evaluate<I>(&self, candidates: I) -> Vec<QueryRow>
    where
        I: IntoIterator<Item = (Key, Record)>,
    {
        let mut rows: Vec<(Key, Record)> = candidates
            .into_iter()
            .filter(|(key, record)| {
                key.kind() == self.kind
                    && self
                        .ancestor
                        .as_ref()
                        .map_or(true, |ancestor| key.has_ancestor(ancestor))
                    && self.filters.iter().all(|f| f.matches(record))
            })
            .collect();

        if !self.orders.is_empty() {
            rows.sort_by(|(_, a), (_, b)| self.compare_records(a, b));
        }

        let window = rows.into_iter().skip(self.offset);
        let window: Box<dyn Iterator<Item = (Key, Record)>> = match self.limit {
            Some(limit) => Box::new(window.take(limit)),
            None => Box::new(window),
        };

        window
            .map(|(key, record)| QueryRow {
                key,
                record: (!self.keys_only).then_some(record),
            })
            .collect()
    }

    fn compare_records(&self, a: &Record, b: &Record) -> Ordering {
        for order in &self.orders {
            let left = a.get(&order.property).unwrap_or(&Value::Null);
            let right = b.get(&order.property).unwrap_or(&Value::Null);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
            };
            let ordering = match order.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
