//! Config validation: referential integrity between shapes, relations and resolvers.

use crate::config::{DataShapeConfig, FullConfig, RelationKind, ScalarKind};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut shapes_by_name: HashMap<&str, &DataShapeConfig> = HashMap::new();
    for s in &config.shapes {
        if shapes_by_name.insert(s.name.as_str(), s).is_some() {
            return Err(ConfigError::Validation(format!("duplicate shape name: {}", s.name)));
        }
    }

    for s in &config.shapes {
        let field_names: HashSet<&str> = s.fields.iter().map(|f| f.name.as_str()).collect();
        if field_names.len() != s.fields.len() {
            return Err(ConfigError::Validation(format!("{}: duplicate field name", s.name)));
        }
        if !field_names.contains(s.primary_key.as_str()) {
            return Err(ConfigError::InvalidField {
                shape: s.name.clone(),
                field: s.primary_key.clone(),
                reason: "primary key is not a declared field".into(),
            });
        }
        for f in &s.fields {
            if f.type_ == ScalarKind::Enum && f.values.is_empty() {
                return Err(ConfigError::InvalidField {
                    shape: s.name.clone(),
                    field: f.name.clone(),
                    reason: "enum without values".into(),
                });
            }
            if f.type_ != ScalarKind::Enum && !f.values.is_empty() {
                return Err(ConfigError::InvalidField {
                    shape: s.name.clone(),
                    field: f.name.clone(),
                    reason: "values are only allowed on enum fields".into(),
                });
            }
        }

        for r in &s.relations {
            let related = shapes_by_name.get(r.related.as_str()).ok_or_else(|| ConfigError::MissingReference {
                kind: "shape",
                id: r.related.clone(),
            })?;
            let related_fields: HashSet<&str> = related.fields.iter().map(|f| f.name.as_str()).collect();
            let (local, remote) = match r.kind {
                RelationKind::Many => (
                    r.local_key.as_deref().unwrap_or(s.primary_key.as_str()),
                    r.remote_key.as_deref(),
                ),
                RelationKind::One => (
                    r.local_key.as_deref().unwrap_or(""),
                    Some(r.remote_key.as_deref().unwrap_or(related.primary_key.as_str())),
                ),
            };
            if !field_names.contains(local) {
                return Err(ConfigError::MissingReference {
                    kind: "relation local key",
                    id: format!("{}.{}", s.name, r.name),
                });
            }
            match remote {
                Some(remote) if related_fields.contains(remote) => {}
                _ => {
                    return Err(ConfigError::MissingReference {
                        kind: "relation remote key",
                        id: format!("{}.{}", s.name, r.name),
                    })
                }
            }
        }
    }

    for resolver in &config.resolvers {
        if !shapes_by_name.contains_key(resolver.shape.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "shape",
                id: resolver.shape.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> FullConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepts_related_shapes() {
        let c = config(json!({
            "shapes": [
                {"name": "TodoItem", "fields": [{"name": "id", "type": "int"}],
                 "relations": [{"name": "subTasks", "kind": "many", "related": "SubTask", "remote_key": "todoItemId"}]},
                {"name": "SubTask", "fields": [{"name": "id", "type": "int"}, {"name": "todoItemId", "type": "int"}]}
            ]
        }));
        assert!(validate(&c).is_ok());
    }

    #[test]
    fn rejects_unknown_related_shape() {
        let c = config(json!({
            "shapes": [
                {"name": "TodoItem", "fields": [{"name": "id", "type": "int"}],
                 "relations": [{"name": "tags", "kind": "many", "related": "Tag", "remote_key": "todoItemId"}]}
            ]
        }));
        assert_eq!(
            validate(&c),
            Err(ConfigError::MissingReference { kind: "shape", id: "Tag".into() })
        );
    }

    #[test]
    fn rejects_many_relation_without_remote_key() {
        let c = config(json!({
            "shapes": [
                {"name": "TodoItem", "fields": [{"name": "id", "type": "int"}],
                 "relations": [{"name": "subTasks", "kind": "many", "related": "SubTask"}]},
                {"name": "SubTask", "fields": [{"name": "id", "type": "int"}]}
            ]
        }));
        assert!(matches!(validate(&c), Err(ConfigError::MissingReference { kind: "relation remote key", .. })));
    }

    #[test]
    fn rejects_missing_primary_key() {
        let c = config(json!({
            "shapes": [{"name": "Tag", "primary_key": "tagId", "fields": [{"name": "id", "type": "int"}]}]
        }));
        assert!(matches!(validate(&c), Err(ConfigError::InvalidField { .. })));
    }

    #[test]
    fn rejects_resolver_for_unknown_shape() {
        let c = config(json!({
            "shapes": [{"name": "Tag", "fields": [{"name": "id", "type": "int"}]}],
            "resolvers": [{"shape": "TodoItem"}]
        }));
        assert!(matches!(validate(&c), Err(ConfigError::MissingReference { kind: "shape", .. })));
    }
}
