//! Filter expression tree and the per-shape filter shape that validates it.

use crate::config::DataShape;
use crate::error::{ConfigError, ResolverError};
use crate::query::comparison::{evaluate, ComparisonBuilder, ComparisonOperator, ComparisonShape};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Operator → argument map for one field.
pub type FieldComparison = BTreeMap<ComparisonOperator, Value>;

/// Boolean filter tree. Field comparisons, `and` and `or` at the same node are
/// conjunctive; `not` negates its subtree. The empty filter matches everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    pub fields: BTreeMap<String, FieldComparison>,
    pub and: Vec<Filter>,
    pub or: Vec<Filter>,
    pub not: Option<Box<Filter>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{field: {eq: value}}`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(field, ComparisonOperator::Eq, value)
    }

    /// Matches no record.
    pub fn impossible() -> Self {
        Filter {
            not: Some(Box::default()),
            ..Self::default()
        }
    }

    pub fn with(mut self, field: impl Into<String>, op: ComparisonOperator, value: impl Into<Value>) -> Self {
        self.fields.entry(field.into()).or_default().insert(op, value.into());
        self
    }

    pub fn any_of(filters: Vec<Filter>) -> Self {
        Filter {
            or: filters,
            ..Self::default()
        }
    }

    pub fn negate(filter: Filter) -> Self {
        Filter {
            not: Some(Box::new(filter)),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.and.is_empty() && self.or.is_empty() && self.not.is_none()
    }

    /// `self AND other`, without nesting when either side is empty.
    pub fn merge_and(self, other: Filter) -> Filter {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other;
        }
        Filter {
            and: vec![self, other],
            ..Self::default()
        }
    }

    /// Evaluate without field types: strings compare as text.
    pub fn matches(&self, record: &Value) -> bool {
        self.matches_typed(None, record)
    }

    /// Evaluate with the field types of `shape`.
    pub fn matches_in(&self, shape: &DataShape, record: &Value) -> bool {
        self.matches_typed(Some(shape), record)
    }

    fn matches_typed(&self, shape: Option<&DataShape>, record: &Value) -> bool {
        let fields_match = self.fields.iter().all(|(name, comparison)| {
            let actual = record.get(name).unwrap_or(&Value::Null);
            let field_type = shape.and_then(|s| s.field(name)).map(|f| &f.field_type);
            comparison
                .iter()
                .all(|(op, expected)| evaluate(*op, field_type, actual, expected))
        });
        fields_match
            && self.and.iter().all(|f| f.matches_typed(shape, record))
            && (self.or.is_empty() || self.or.iter().any(|f| f.matches_typed(shape, record)))
            && self.not.as_ref().map_or(true, |f| !f.matches_typed(shape, record))
    }

    /// Rename every field the filter references.
    pub fn map_fields(&self, rename: &dyn Fn(&str) -> String) -> Filter {
        Filter {
            fields: self
                .fields
                .iter()
                .map(|(name, comparison)| (rename(name), comparison.clone()))
                .collect(),
            and: self.and.iter().map(|f| f.map_fields(rename)).collect(),
            or: self.or.iter().map(|f| f.map_fields(rename)).collect(),
            not: self.not.as_ref().map(|f| Box::new(f.map_fields(rename))),
        }
    }

    /// Every field name referenced anywhere in the tree.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        for f in self.and.iter().chain(self.or.iter()).chain(self.not.as_deref()) {
            out.extend(f.referenced_fields());
        }
        out
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        for (name, comparison) in &self.fields {
            let ops: Map<String, Value> = comparison
                .iter()
                .map(|(op, v)| (op.as_str().to_string(), v.clone()))
                .collect();
            obj.insert(name.clone(), Value::Object(ops));
        }
        if !self.and.is_empty() {
            obj.insert("and".into(), Value::Array(self.and.iter().map(Filter::to_value).collect()));
        }
        if !self.or.is_empty() {
            obj.insert("or".into(), Value::Array(self.or.iter().map(Filter::to_value).collect()));
        }
        if let Some(not) = &self.not {
            obj.insert("not".into(), not.to_value());
        }
        Value::Object(obj)
    }

    /// Structural parse; field names and argument kinds are not checked here.
    pub fn from_value(value: &Value) -> Result<Filter, String> {
        let obj = match value {
            Value::Null => return Ok(Filter::default()),
            Value::Object(obj) => obj,
            other => return Err(format!("filter must be an object, got {}", other)),
        };
        let mut filter = Filter::default();
        for (key, v) in obj {
            match key.as_str() {
                "and" | "or" => {
                    let items = v.as_array().ok_or_else(|| format!("'{}' must be a list of filters", key))?;
                    let parsed = items.iter().map(Filter::from_value).collect::<Result<Vec<_>, _>>()?;
                    if key == "and" {
                        filter.and = parsed;
                    } else {
                        filter.or = parsed;
                    }
                }
                "not" => filter.not = Some(Box::new(Filter::from_value(v)?)),
                field => {
                    let ops = v
                        .as_object()
                        .ok_or_else(|| format!("comparison for '{}' must be an object", field))?;
                    let mut comparison = FieldComparison::new();
                    for (op, arg) in ops {
                        let op: ComparisonOperator = op.parse()?;
                        comparison.insert(op, arg.clone());
                    }
                    filter.fields.insert(field.to_string(), comparison);
                }
            }
        }
        Ok(filter)
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Filter::from_value(&value).map_err(de::Error::custom)
    }
}

/// Filter shape of a data shape: one comparison shape per filterable field.
#[derive(Clone, Debug)]
pub struct FilterShape {
    pub name: String,
    pub fields: BTreeMap<String, Arc<ComparisonShape>>,
}

impl FilterShape {
    pub fn for_shape(shape: &DataShape, type_name: &str, comparisons: &ComparisonBuilder) -> Result<Self, ConfigError> {
        let mut fields = BTreeMap::new();
        for f in shape.fields.iter().filter(|f| f.filterable) {
            if let Some(allowed) = &f.allowed_comparisons {
                let supported = ComparisonBuilder::default_operators(&f.field_type);
                if let Some(op) = allowed.iter().find(|op| !supported.contains(op)) {
                    return Err(ConfigError::InvalidField {
                        shape: shape.name.clone(),
                        field: f.name.clone(),
                        reason: format!("operator '{}' is not supported on {}", op, f.field_type.type_name()),
                    });
                }
            }
            let comparison = comparisons.build(&f.field_type, f.allowed_comparisons.as_ref());
            fields.insert(f.name.clone(), comparison);
        }
        Ok(FilterShape {
            name: format!("{}Filter", type_name),
            fields,
        })
    }

    /// Parse and check caller input. Null parses as the empty filter.
    pub fn parse(&self, value: &Value) -> Result<Filter, ResolverError> {
        let filter = Filter::from_value(value).map_err(ResolverError::Validation)?;
        self.check(&filter)?;
        Ok(filter)
    }

    /// Reject unknown or non-filterable fields, disallowed operators and mistyped arguments.
    pub fn check(&self, filter: &Filter) -> Result<(), ResolverError> {
        for (field, comparison) in &filter.fields {
            let shape = self.fields.get(field).ok_or_else(|| {
                ResolverError::Validation(format!("{}: '{}' is not a filterable field", self.name, field))
            })?;
            for (op, arg) in comparison {
                shape
                    .check(*op, arg)
                    .map_err(|e| ResolverError::Validation(format!("{}.{}: {}", self.name, field, e)))?;
            }
        }
        for f in filter.and.iter().chain(filter.or.iter()).chain(filter.not.as_deref()) {
            self.check(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldDescriptor, FieldType};
    use serde_json::json;

    fn todo_shape() -> Arc<DataShape> {
        DataShape::builder("TodoItem")
            .field(FieldDescriptor::new("id", FieldType::Int))
            .field(FieldDescriptor::new("title", FieldType::String))
            .field(FieldDescriptor::new("completed", FieldType::Boolean))
            .field(FieldDescriptor::new("notes", FieldType::String).nullable().not_filterable())
            .build()
            .unwrap()
    }

    #[test]
    fn nested_filters_match() {
        let filter = Filter::from_value(&json!({
            "completed": {"is": false},
            "or": [{"title": {"like": "Create%"}}, {"id": {"in": [7, 8]}}],
            "not": {"id": {"eq": 2}}
        }))
        .unwrap();

        assert!(filter.matches(&json!({"id": 1, "title": "Create Entity", "completed": false})));
        assert!(filter.matches(&json!({"id": 7, "title": "Other", "completed": false})));
        assert!(!filter.matches(&json!({"id": 2, "title": "Create More", "completed": false})));
        assert!(!filter.matches(&json!({"id": 1, "title": "Create Entity", "completed": true})));
        assert!(!filter.matches(&json!({"id": 3, "title": "Other", "completed": false})));
    }

    #[test]
    fn empty_and_impossible() {
        let record = json!({"id": 1});
        assert!(Filter::default().matches(&record));
        assert!(!Filter::impossible().matches(&record));
        assert!(Filter::default().is_empty());
        assert!(!Filter::impossible().is_empty());
    }

    #[test]
    fn merge_and_is_intersection() {
        let a = Filter::new().with("id", ComparisonOperator::Gt, 1);
        let b = Filter::new().with("id", ComparisonOperator::Lt, 4);
        let both = a.clone().merge_and(b.clone());
        for id in 0..6 {
            let record = json!({ "id": id });
            assert_eq!(both.matches(&record), a.matches(&record) && b.matches(&record));
        }
        assert_eq!(Filter::default().merge_and(a.clone()), a);
    }

    #[test]
    fn string_fields_never_match_as_dates() {
        let shape = DataShape::builder("Event")
            .field(FieldDescriptor::new("id", FieldType::Int))
            .field(FieldDescriptor::new("title", FieldType::String))
            .field(FieldDescriptor::new("at", FieldType::Date))
            .build()
            .unwrap();
        let record = json!({"id": 1, "title": "2024-01-01T00:00:00Z", "at": "2024-01-01T00:00:00Z"});
        assert!(!Filter::eq("title", "2024-01-01").matches_in(&shape, &record));
        assert!(Filter::eq("at", "2024-01-01").matches_in(&shape, &record));
        assert!(Filter::new()
            .with("at", ComparisonOperator::Lt, "2024-01-01T00:30:00+00:00")
            .matches_in(&shape, &record));
    }

    #[test]
    fn serde_round_trip() {
        let value = json!({"title": {"eq": "foo"}, "and": [{"id": {"gte": 1}}]});
        let filter: Filter = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&filter).unwrap(), value);
    }

    #[test]
    fn filter_shape_rejects_bad_input() {
        let shape = todo_shape();
        let fs = FilterShape::for_shape(&shape, "TodoItem", &ComparisonBuilder::new()).unwrap();
        assert_eq!(fs.name, "TodoItemFilter");
        assert!(fs.parse(&json!({"title": {"eq": "foo"}})).is_ok());
        assert!(fs.parse(&json!(null)).unwrap().is_empty());

        for bad in [
            json!({"missing": {"eq": 1}}),
            json!({"notes": {"eq": "x"}}),
            json!({"completed": {"eq": true}}),
            json!({"id": {"eq": "one"}}),
            json!({"id": {"between": [1, 2]}}),
            json!({"or": [{"title": {"like": 3}}]}),
        ] {
            assert!(matches!(fs.parse(&bad), Err(ResolverError::Validation(_))), "{}", bad);
        }
    }

    #[test]
    fn narrowed_comparisons_must_be_supported() {
        let shape = DataShape::builder("Flag")
            .field(FieldDescriptor::new("id", FieldType::Int))
            .field(FieldDescriptor::new("on", FieldType::Boolean).with_comparisons([ComparisonOperator::Gt]))
            .build()
            .unwrap();
        let err = FilterShape::for_shape(&shape, "Flag", &ComparisonBuilder::new()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }

    #[test]
    fn map_fields_renames_whole_tree() {
        let filter = Filter::eq("title", "a").merge_and(Filter::negate(Filter::eq("title", "b")));
        let renamed = filter.map_fields(&|f: &str| format!("todo_{}", f));
        let mut fields = renamed.referenced_fields();
        fields.sort();
        assert_eq!(fields, vec!["todo_title", "todo_title"]);
    }
}
