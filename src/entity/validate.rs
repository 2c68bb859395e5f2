use crate::error::ValidationError;
use crate::schema::{BaseType, Property, Record, Schema, Value};

/// Check `values` against every property policy of `schema`, in declaration
/// order, stopping at the first violation.
///
/// Returns the normalized record: coerced values, defaults for unset
/// properties, and empty lists for unset repeated properties. Unset optional
/// properties without a default are left out.
pub(crate) fn validate_record(schema: &Schema, values: &Record) -> Result<Record, ValidationError> {
    if let Some(unknown) = values.keys().find(|name| schema.get(name).is_none()) {
        return Err(ValidationError::UnknownProperty {
            kind: schema.kind().to_string(),
            property: unknown.clone(),
        });
    }

    let mut normalized = Record::new();
    for property in schema.properties() {
        let value = match values.get(property.name()) {
            Some(value) => value.clone(),
            None if property.is_required() && property.default().is_none() => {
                return Err(ValidationError::Required {
                    kind: schema.kind().to_string(),
                    property: property.name().to_string(),
                });
            }
            None => match property.implicit_value() {
                Some(value) => value,
                None => continue,
            },
        };

        let value = validate_value(schema, property, value)?;
        normalized.insert(property.name().to_string(), value);
    }
    Ok(normalized)
}

fn validate_value(schema: &Schema, property: &Property, value: Value) -> Result<Value, ValidationError> {
    let kind = || schema.kind().to_string();
    let name = || property.name().to_string();

    let value = match (property.is_repeated(), value) {
        (_, Value::Null) if property.is_required() => {
            return Err(ValidationError::Required {
                kind: kind(),
                property: name(),
            });
        }
        (false, Value::Null) => return Ok(Value::Null),
        (true, Value::List(items)) => Value::List(
            items
                .into_iter()
                .map(|item| coerce(schema, property, item))
                .collect::<Result<_, _>>()?,
        ),
        (true, _) => {
            return Err(ValidationError::Repeated {
                kind: kind(),
                property: name(),
            });
        }
        (false, Value::List(_)) => {
            return Err(ValidationError::NotRepeated {
                kind: kind(),
                property: name(),
            });
        }
        (false, value) => coerce(schema, property, value)?,
    };

    if let Some(validator) = property.validator_fn() {
        validator(&value).map_err(|message| ValidationError::Custom {
            kind: kind(),
            property: name(),
            message,
        })?;
    }
    Ok(value)
}

fn coerce(schema: &Schema, property: &Property, value: Value) -> Result<Value, ValidationError> {
    let type_error = |found: &Value| ValidationError::Type {
        kind: schema.kind().to_string(),
        property: property.name().to_string(),
        expected: property.basetype().name(),
        found: found.type_name(),
    };

    let coerced = match property.basetype() {
        BaseType::Nested(nested) => match value {
            Value::Record(record) => Value::Record(validate_record(nested, &record)?),
            other => return Err(type_error(&other)),
        },
        basetype => {
            let found = value.type_name();
            basetype.coerce(value).ok_or_else(|| ValidationError::Type {
                kind: schema.kind().to_string(),
                property: property.name().to_string(),
                expected: basetype.name(),
                found,
            })?
        }
    };

    if let Some(choices) = property.allowed_choices() {
        if !choices.contains(&coerced) {
            return Err(ValidationError::Choice {
                kind: schema.kind().to_string(),
                property: property.name().to_string(),
                value: coerced.to_string(),
            });
        }
    }
    Ok(coerced)
}
