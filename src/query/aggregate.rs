//! Aggregate requests and responses, plus an in-memory evaluator.

use crate::config::DataShape;
use crate::error::ResolverError;
use crate::config::FieldType;
use crate::query::comparison::{compare_typed, typed_equal};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregateQuery {
    pub count: Vec<String>,
    pub sum: Vec<String>,
    pub avg: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
    pub group_by: Vec<String>,
}

impl AggregateQuery {
    pub fn is_empty(&self) -> bool {
        self.count.is_empty()
            && self.sum.is_empty()
            && self.avg.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
            && self.group_by.is_empty()
    }

    /// Every field must exist; `sum` and `avg` need numeric fields.
    pub fn check(&self, shape: &DataShape) -> Result<(), ResolverError> {
        if self.is_empty() {
            return Err(ResolverError::Validation(format!(
                "{} aggregate: nothing requested",
                shape.name
            )));
        }
        let groups = [
            ("count", &self.count),
            ("sum", &self.sum),
            ("avg", &self.avg),
            ("min", &self.min),
            ("max", &self.max),
            ("groupBy", &self.group_by),
        ];
        for (func, fields) in groups {
            for name in fields.iter() {
                let field = shape.field(name).ok_or_else(|| {
                    ResolverError::Validation(format!("{} aggregate {}: unknown field '{}'", shape.name, func, name))
                })?;
                if matches!(func, "sum" | "avg") && !field.field_type.is_numeric() {
                    return Err(ResolverError::Validation(format!(
                        "{} aggregate {}: '{}' is not numeric",
                        shape.name, func, name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn map_fields(&self, rename: &dyn Fn(&str) -> String) -> AggregateQuery {
        let map = |fields: &Vec<String>| fields.iter().map(|f| rename(f)).collect();
        AggregateQuery {
            count: map(&self.count),
            sum: map(&self.sum),
            avg: map(&self.avg),
            min: map(&self.min),
            max: map(&self.max),
            group_by: map(&self.group_by),
        }
    }
}

/// One row per group (a single row when nothing is grouped).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregateResponse {
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub count: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub sum: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub avg: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub min: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub max: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub group_by: Map<String, Value>,
}

impl AggregateResponse {
    pub fn map_fields(&self, rename: &dyn Fn(&str) -> String) -> AggregateResponse {
        let map = |m: &Map<String, Value>| m.iter().map(|(k, v)| (rename(k), v.clone())).collect();
        AggregateResponse {
            count: map(&self.count),
            sum: map(&self.sum),
            avg: map(&self.avg),
            min: map(&self.min),
            max: map(&self.max),
            group_by: map(&self.group_by),
        }
    }
}

/// Aggregate already-filtered records. Groups keep first-seen order. With a
/// shape, `Date` fields group and order by instant.
pub fn aggregate_records(shape: Option<&DataShape>, records: &[Value], query: &AggregateQuery) -> Vec<AggregateResponse> {
    let field_type = |name: &str| shape.and_then(|s| s.field(name)).map(|f| &f.field_type);
    let group_types: Vec<Option<&FieldType>> = query.group_by.iter().map(|f| field_type(f.as_str())).collect();
    let mut groups: Vec<(Vec<Value>, Vec<&Value>)> = Vec::new();
    for record in records {
        let key: Vec<Value> = query
            .group_by
            .iter()
            .map(|f| record.get(f).cloned().unwrap_or(Value::Null))
            .collect();
        match groups
            .iter_mut()
            .find(|(k, _)| k.iter().zip(&key).zip(&group_types).all(|((a, b), t)| typed_equal(*t, a, b)))
        {
            Some((_, members)) => members.push(record),
            None => groups.push((key, vec![record])),
        }
    }
    if groups.is_empty() && query.group_by.is_empty() {
        groups.push((Vec::new(), Vec::new()));
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let values = |field: &str| -> Vec<&Value> {
                members
                    .iter()
                    .filter_map(|r| r.get(field))
                    .filter(|v| !v.is_null())
                    .collect()
            };
            let mut out = AggregateResponse::default();
            for (field, value) in query.group_by.iter().zip(key) {
                out.group_by.insert(field.clone(), value);
            }
            for field in &query.count {
                out.count.insert(field.clone(), Value::from(values(field).len() as u64));
            }
            for field in &query.sum {
                out.sum.insert(field.clone(), sum(&values(field)));
            }
            for field in &query.avg {
                let vals = values(field);
                let avg = if vals.is_empty() {
                    Value::Null
                } else {
                    let total: f64 = vals.iter().filter_map(|v| v.as_f64()).sum();
                    Value::from(total / vals.len() as f64)
                };
                out.avg.insert(field.clone(), avg);
            }
            for field in &query.min {
                out.min.insert(field.clone(), extreme(field_type(field.as_str()), &values(field), Ordering::Less));
            }
            for field in &query.max {
                out.max.insert(field.clone(), extreme(field_type(field.as_str()), &values(field), Ordering::Greater));
            }
            out
        })
        .collect()
}

fn sum(values: &[&Value]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    if values.iter().all(|v| v.is_i64()) {
        return Value::from(values.iter().filter_map(|v| v.as_i64()).sum::<i64>());
    }
    Value::from(values.iter().filter_map(|v| v.as_f64()).sum::<f64>())
}

fn extreme(field_type: Option<&FieldType>, values: &[&Value], keep: Ordering) -> Value {
    values
        .iter()
        .copied()
        .reduce(|best, v| if compare_typed(field_type, v, best) == Some(keep) { v } else { best })
        .cloned()
        .unwrap_or(Value::Null)
}
