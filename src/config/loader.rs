//! Load config from in-memory structs or from JSON files on disk.

use crate::case::to_pascal_case;
use crate::config::resolved::{DataShape, FieldDescriptor, FieldType, RelationDescriptor, ResolvedModel};
use crate::config::types::*;
use crate::config::{validate, FullConfig};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Build the resolved model from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let pk_by_shape: HashMap<&str, &str> = config
        .shapes
        .iter()
        .map(|s| (s.name.as_str(), s.primary_key.as_str()))
        .collect();

    let mut shapes = Vec::new();
    let mut shape_by_name = HashMap::new();
    for s in &config.shapes {
        let shape = resolve_shape(s, &pk_by_shape)?;
        shape_by_name.insert(s.name.clone(), shape.clone());
        shapes.push(shape);
    }
    tracing::debug!(shapes = shapes.len(), resolvers = config.resolvers.len(), "config resolved");

    Ok(ResolvedModel {
        shapes,
        shape_by_name,
        resolvers: config.resolvers.clone(),
    })
}

fn resolve_shape(s: &DataShapeConfig, pk_by_shape: &HashMap<&str, &str>) -> Result<Arc<DataShape>, ConfigError> {
    let mut builder = DataShape::builder(s.name.clone()).primary_key(s.primary_key.clone());
    if let Some(table) = &s.table {
        builder = builder.table(table.schema.clone(), table.name.clone());
    }
    for f in &s.fields {
        builder = builder.field(resolve_field(&s.name, f));
    }
    for r in &s.relations {
        let related_pk = pk_by_shape.get(r.related.as_str()).copied().ok_or_else(|| ConfigError::MissingReference {
            kind: "shape",
            id: r.related.clone(),
        })?;
        let (local_key, remote_key) = match r.kind {
            RelationKind::Many => (
                r.local_key.clone().unwrap_or_else(|| s.primary_key.clone()),
                r.remote_key.clone().unwrap_or_default(),
            ),
            RelationKind::One => (
                r.local_key.clone().unwrap_or_default(),
                r.remote_key.clone().unwrap_or_else(|| related_pk.to_string()),
            ),
        };
        builder = builder.relation(RelationDescriptor {
            name: r.name.clone(),
            kind: r.kind,
            related: r.related.clone(),
            local_key,
            remote_key,
            nullable: r.nullable,
        });
    }
    builder.build()
}

fn resolve_field(shape: &str, f: &FieldConfig) -> FieldDescriptor {
    let field_type = match f.type_ {
        ScalarKind::Id => FieldType::Id,
        ScalarKind::String => FieldType::String,
        ScalarKind::Int => FieldType::Int,
        ScalarKind::Float => FieldType::Float,
        ScalarKind::Boolean => FieldType::Boolean,
        ScalarKind::Date => FieldType::Date,
        ScalarKind::Enum => FieldType::Enum {
            name: f
                .enum_name
                .clone()
                .unwrap_or_else(|| format!("{}{}", to_pascal_case(shape), to_pascal_case(&f.name))),
            values: f.values.clone(),
        },
    };
    let mut field = FieldDescriptor::new(f.name.clone(), field_type).with_rule(f.validation.clone());
    field.nullable = f.nullable;
    field.filterable = f.filterable;
    field.sortable = f.sortable;
    if let Some(ops) = &f.allowed_comparisons {
        field = field.with_comparisons(ops.iter().copied());
    }
    field.read_only = f.read_only;
    field.has_default = f.has_default;
    if let Some(column) = &f.column {
        field = field.with_column(column.clone());
    }
    if let Some(pg_type) = &f.pg_type {
        field = field.with_pg_type(pg_type.clone());
    }
    field
}

/// Load config from a directory holding `shapes.json` and an optional
/// `resolvers.json`, or from a single JSON file holding both keys.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let read = |p: std::path::PathBuf| async move {
        tokio::fs::read_to_string(&p)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", p.display(), e)))
    };
    let parse_err = |what: &str, e: serde_json::Error| ConfigError::Load(format!("{}: {}", what, e));

    if path.is_file() {
        let text = read(path.to_path_buf()).await?;
        return serde_json::from_str(&text).map_err(|e| parse_err(&path.display().to_string(), e));
    }

    let shapes = serde_json::from_str(&read(path.join("shapes.json")).await?).map_err(|e| parse_err("shapes.json", e))?;
    let resolvers_path = path.join("resolvers.json");
    let resolvers = if resolvers_path.exists() {
        serde_json::from_str(&read(resolvers_path).await?).map_err(|e| parse_err("resolvers.json", e))?
    } else {
        Vec::new()
    };
    Ok(FullConfig { shapes, resolvers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_relations_with_default_keys() {
        let config: FullConfig = serde_json::from_value(json!({
            "shapes": [
                {"name": "TodoItem", "fields": [
                    {"name": "id", "type": "int"},
                    {"name": "assigneeId", "type": "int", "nullable": true},
                    {"name": "priority", "type": "enum", "values": ["LOW", "HIGH"]}
                 ],
                 "relations": [
                    {"name": "subTasks", "kind": "many", "related": "SubTask", "remote_key": "todoItemId"},
                    {"name": "assignee", "kind": "one", "related": "User", "local_key": "assigneeId"}
                 ]},
                {"name": "SubTask", "fields": [{"name": "id", "type": "int"}, {"name": "todoItemId", "type": "int"}]},
                {"name": "User", "fields": [{"name": "id", "type": "int"}]}
            ]
        }))
        .unwrap();
        let model = resolve(&config).unwrap();
        let todo = model.shape("TodoItem").unwrap();

        let sub_tasks = todo.relation("subTasks").unwrap();
        assert_eq!(sub_tasks.local_key, "id");
        assert_eq!(sub_tasks.remote_key, "todoItemId");

        let assignee = todo.relation("assignee").unwrap();
        assert_eq!(assignee.local_key, "assigneeId");
        assert_eq!(assignee.remote_key, "id");

        let priority = todo.field("priority").unwrap();
        assert_eq!(priority.field_type.type_name(), "TodoItemPriority");
        assert_eq!(todo.field("id").unwrap().pg_type, "bigint");
    }
}
