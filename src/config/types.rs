//! Raw config types matching the JSON shape files (shapes + resolvers).

use crate::config::ResolverOptions;
use crate::query::ComparisonOperator;
use serde::{Deserialize, Serialize};

/// Scalar kind of a field as written in config.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Id,
    String,
    Int,
    Float,
    Boolean,
    Date,
    Enum,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ScalarKind,
    /// Allowed values when `type` is `enum`.
    #[serde(default)]
    pub values: Vec<String>,
    /// Name of the generated enum type; defaults to `<Shape><Field>`.
    #[serde(default)]
    pub enum_name: Option<String>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default = "default_true")]
    pub sortable: bool,
    /// Narrows the comparison operators available in filters on this field.
    #[serde(default)]
    pub allowed_comparisons: Option<Vec<ComparisonOperator>>,
    /// Generated by the backing store; rejected in create/update input.
    #[serde(default)]
    pub read_only: bool,
    /// Backing store supplies a value when the field is omitted on create.
    #[serde(default)]
    pub has_default: bool,
    /// Column name when it differs from the field name (SQL adapter only).
    #[serde(default)]
    pub column: Option<String>,
    /// PostgreSQL type used for parameter casts (SQL adapter only).
    #[serde(default)]
    pub pg_type: Option<String>,
    #[serde(default)]
    pub validation: ValidationRule,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    One,
    Many,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    pub name: String,
    pub kind: RelationKind,
    /// Name of the related data shape.
    pub related: String,
    /// Our field used in the join (our FK for `one`; defaults to our PK for `many`).
    #[serde(default)]
    pub local_key: Option<String>,
    /// Their field used in the join (their FK for `many`; defaults to their PK for `one`).
    #[serde(default)]
    pub remote_key: Option<String>,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
}

fn default_schema() -> String {
    "public".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataShapeConfig {
    pub name: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
    #[serde(default)]
    pub table: Option<TableConfig>,
}

fn default_primary_key() -> String {
    "id".into()
}

/// Which backing strategy a config-declared resolver uses. Assembler and
/// externally supplied services need code and are only available through
/// [`crate::factory::ResolverSource`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Entity,
    Federated,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub shape: String,
    #[serde(default)]
    pub source: SourceKind,
    /// Persistence service key; defaults to the shape name.
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub options: ResolverOptions,
}

/// All config types in one struct for in-memory loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    #[serde(default)]
    pub shapes: Vec<DataShapeConfig>,
    #[serde(default)]
    pub resolvers: Vec<ResolverConfig>,
}
