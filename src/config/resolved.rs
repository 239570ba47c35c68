//! Resolved data-shape model: config validated and flattened into immutable descriptors.

use crate::config::{RelationKind, ResolverConfig, ValidationRule};
use crate::error::ConfigError;
use crate::query::ComparisonOperator;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Scalar type of a field. Drives comparison shapes, input validation and SQL casts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldType {
    Id,
    String,
    Int,
    Float,
    Boolean,
    Date,
    Enum { name: String, values: Vec<String> },
}

impl FieldType {
    /// Name used for the type in generated shapes.
    pub fn type_name(&self) -> &str {
        match self {
            FieldType::Id => "ID",
            FieldType::String => "String",
            FieldType::Int => "Int",
            FieldType::Float => "Float",
            FieldType::Boolean => "Boolean",
            FieldType::Date => "DateTime",
            FieldType::Enum { name, .. } => name,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }

    fn default_pg_type(&self) -> &'static str {
        match self {
            FieldType::Id | FieldType::String | FieldType::Enum { .. } => "text",
            FieldType::Int => "bigint",
            FieldType::Float => "double precision",
            FieldType::Boolean => "boolean",
            FieldType::Date => "timestamptz",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub allowed_comparisons: Option<BTreeSet<ComparisonOperator>>,
    pub read_only: bool,
    pub has_default: bool,
    /// Backing column (SQL adapter).
    pub column: String,
    /// PostgreSQL type for parameter casts (SQL adapter).
    pub pg_type: String,
    #[serde(skip)]
    pub validation: ValidationRule,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        let pg_type = field_type.default_pg_type().to_string();
        FieldDescriptor {
            column: name.clone(),
            name,
            field_type,
            nullable: false,
            filterable: true,
            sortable: true,
            allowed_comparisons: None,
            read_only: false,
            has_default: false,
            pg_type,
            validation: ValidationRule::default(),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn not_filterable(mut self) -> Self {
        self.filterable = false;
        self
    }

    pub fn not_sortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    pub fn with_comparisons(mut self, ops: impl IntoIterator<Item = ComparisonOperator>) -> Self {
        self.allowed_comparisons = Some(ops.into_iter().collect());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn with_pg_type(mut self, pg_type: impl Into<String>) -> Self {
        self.pg_type = pg_type.into();
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validation = rule;
        self
    }

    /// Required in create input: not nullable and nothing fills it in.
    pub fn is_required_on_create(&self) -> bool {
        !self.nullable && !self.has_default && !self.read_only
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RelationDescriptor {
    pub name: String,
    pub kind: RelationKind,
    /// Related data shape name.
    pub related: String,
    /// Our field used in the join.
    pub local_key: String,
    /// Their field used in the join.
    pub remote_key: String,
    pub nullable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableBinding {
    pub schema: String,
    pub table: String,
}

/// The record type a resolver is generated for.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataShape {
    pub name: String,
    pub primary_key: String,
    pub fields: Vec<FieldDescriptor>,
    pub relations: Vec<RelationDescriptor>,
    pub table: Option<TableBinding>,
}

impl DataShape {
    pub fn builder(name: impl Into<String>) -> DataShapeBuilder {
        DataShapeBuilder {
            name: name.into(),
            primary_key: "id".into(),
            fields: Vec::new(),
            relations: Vec::new(),
            table: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key_field(&self) -> &FieldDescriptor {
        // build() guarantees the primary key is one of the fields
        self.fields
            .iter()
            .find(|f| f.name == self.primary_key)
            .unwrap_or(&self.fields[0])
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Primary key value of a record, if present and non-null.
    pub fn record_id<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        record.get(&self.primary_key).filter(|v| !v.is_null())
    }
}

/// Key used for maps keyed by record id. Strings are used as-is so that
/// `"1"` and `1` stay distinct only when the store itself distinguishes them.
pub fn id_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct DataShapeBuilder {
    name: String,
    primary_key: String,
    fields: Vec<FieldDescriptor>,
    relations: Vec<RelationDescriptor>,
    table: Option<TableBinding>,
}

impl DataShapeBuilder {
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn table(mut self, schema: impl Into<String>, table: impl Into<String>) -> Self {
        self.table = Some(TableBinding {
            schema: schema.into(),
            table: table.into(),
        });
        self
    }

    /// Validate and freeze the shape. Related shapes are checked by [`crate::config::resolve`].
    pub fn build(self) -> Result<Arc<DataShape>, ConfigError> {
        let mut seen = HashSet::new();
        for f in &self.fields {
            if !seen.insert(f.name.as_str()) {
                return Err(ConfigError::InvalidField {
                    shape: self.name.clone(),
                    field: f.name.clone(),
                    reason: "declared twice".into(),
                });
            }
            if let FieldType::Enum { values, .. } = &f.field_type {
                if values.is_empty() {
                    return Err(ConfigError::InvalidField {
                        shape: self.name.clone(),
                        field: f.name.clone(),
                        reason: "enum without values".into(),
                    });
                }
            }
        }
        if !seen.contains(self.primary_key.as_str()) {
            return Err(ConfigError::InvalidField {
                shape: self.name.clone(),
                field: self.primary_key.clone(),
                reason: "primary key is not a declared field".into(),
            });
        }
        let mut relation_names = HashSet::new();
        for r in &self.relations {
            if !relation_names.insert(r.name.as_str()) || seen.contains(r.name.as_str()) {
                return Err(ConfigError::InvalidField {
                    shape: self.name.clone(),
                    field: r.name.clone(),
                    reason: "relation name clashes with another field or relation".into(),
                });
            }
            if !seen.contains(r.local_key.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "relation local key",
                    id: format!("{}.{}", self.name, r.local_key),
                });
            }
        }
        Ok(Arc::new(DataShape {
            name: self.name,
            primary_key: self.primary_key,
            fields: self.fields,
            relations: self.relations,
            table: self.table,
        }))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub shapes: Vec<Arc<DataShape>>,
    pub shape_by_name: HashMap<String, Arc<DataShape>>,
    pub resolvers: Vec<ResolverConfig>,
}

impl ResolvedModel {
    pub fn shape(&self, name: &str) -> Option<&Arc<DataShape>> {
        self.shape_by_name.get(name)
    }
}
