//! Create/update input validation against the data shape and per-field rules.

use crate::config::{DataShape, FieldDescriptor, ValidationRule};
use crate::error::ResolverError;
use crate::query::comparison::{check_scalar, values_equal};
use crate::resolver::shapes::InputShape;
use regex::Regex;
use serde_json::{Map, Value};

pub struct InputValidator;

impl InputValidator {
    /// Validate a create body. All required input fields must be present and non-null.
    pub fn validate_create(shape: &DataShape, input: &InputShape, body: &Value) -> Result<(), ResolverError> {
        let body = as_object(shape, body)?;
        for f in input.fields.iter().filter(|f| f.required) {
            if body.get(&f.name).map_or(true, Value::is_null) {
                return Err(ResolverError::Validation(format!("{} is required", f.name)));
            }
        }
        Self::validate_present(shape, input, body)
    }

    /// Validate only the fields present in body (partial update). The primary key cannot change.
    pub fn validate_update(shape: &DataShape, input: &InputShape, body: &Value) -> Result<(), ResolverError> {
        let body = as_object(shape, body)?;
        if body.is_empty() {
            return Err(ResolverError::Validation(format!("{}: update has no fields", input.name)));
        }
        if body.contains_key(&shape.primary_key) {
            return Err(ResolverError::Validation(format!("{} cannot be updated", shape.primary_key)));
        }
        Self::validate_present(shape, input, body)
    }

    fn validate_present(shape: &DataShape, input: &InputShape, body: &Map<String, Value>) -> Result<(), ResolverError> {
        for (name, v) in body {
            let field = match (input.field(name), shape.field(name)) {
                (Some(_), Some(field)) => field,
                (None, Some(field)) if field.read_only => {
                    return Err(ResolverError::Validation(format!("{} is read-only", name)))
                }
                _ => {
                    return Err(ResolverError::Validation(format!(
                        "{}: unknown field '{}'",
                        input.name, name
                    )))
                }
            };
            validate_field(field, v)?;
        }
        Ok(())
    }
}

fn as_object<'a>(shape: &DataShape, body: &'a Value) -> Result<&'a Map<String, Value>, ResolverError> {
    body.as_object()
        .ok_or_else(|| ResolverError::Validation(format!("{} input must be an object", shape.name)))
}

fn validate_field(field: &FieldDescriptor, v: &Value) -> Result<(), ResolverError> {
    let col = field.name.as_str();
    if v.is_null() {
        if field.nullable {
            return Ok(());
        }
        return Err(ResolverError::Validation(format!("{} cannot be null", col)));
    }
    check_scalar(&field.field_type, v).map_err(|e| ResolverError::Validation(format!("{}: {}", col, e)))?;
    validate_rule(col, v, &field.validation)
}

fn validate_rule(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), ResolverError> {
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(ResolverError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(ResolverError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| ResolverError::Validation(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(ResolverError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| values_equal(v, a)) {
            return Err(ResolverError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(ResolverError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(ResolverError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), ResolverError> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    return Err(ResolverError::Validation(format!("{} must be a valid email", col)));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(ResolverError::Validation(format!("{} must be a valid UUID", col)));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldType;
    use serde_json::json;
    use std::sync::Arc;

    fn shape() -> Arc<DataShape> {
        DataShape::builder("User")
            .field(FieldDescriptor::new("id", FieldType::Id).with_default())
            .field(FieldDescriptor::new("email", FieldType::String).with_rule(ValidationRule {
                format: Some("email".into()),
                max_length: Some(40),
                ..ValidationRule::default()
            }))
            .field(FieldDescriptor::new("age", FieldType::Int).nullable().with_rule(ValidationRule {
                minimum: Some(0.0),
                ..ValidationRule::default()
            }))
            .field(FieldDescriptor::new("created", FieldType::Date).read_only())
            .build()
            .unwrap()
    }

    #[test]
    fn create_checks_required_types_and_rules() {
        let shape = shape();
        let input = InputShape::create_for(&shape, "User");
        assert!(InputValidator::validate_create(&shape, &input, &json!({"email": "a@b.c"})).is_ok());
        assert!(InputValidator::validate_create(&shape, &input, &json!({"email": "a@b.c", "age": null})).is_ok());

        for bad in [
            json!({}),
            json!({"email": "nope"}),
            json!({"email": "a@b.c", "age": -1}),
            json!({"email": "a@b.c", "age": "ten"}),
            json!({"email": "a@b.c", "created": "2024-01-01"}),
            json!({"email": "a@b.c", "nickname": "x"}),
            json!(["a@b.c"]),
        ] {
            assert!(
                matches!(InputValidator::validate_create(&shape, &input, &bad), Err(ResolverError::Validation(_))),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn update_is_partial_but_keeps_primary_key() {
        let shape = shape();
        let input = InputShape::update_for(&shape, "User");
        assert!(InputValidator::validate_update(&shape, &input, &json!({"age": 3})).is_ok());
        assert!(InputValidator::validate_update(&shape, &input, &json!({"id": "x"})).is_err());
        assert!(InputValidator::validate_update(&shape, &input, &json!({})).is_err());
        assert!(InputValidator::validate_update(&shape, &input, &json!({"email": null})).is_err());
    }
}
