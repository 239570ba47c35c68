//! Field comparisons: operators, per-type comparison shapes and in-memory evaluation.

use crate::config::FieldType;
use chrono::{DateTime, FixedOffset, NaiveDate};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    Is,
    IsNot,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    ILike,
    NotILike,
    In,
    NotIn,
}

impl ComparisonOperator {
    pub const ALL: [ComparisonOperator; 14] = [
        ComparisonOperator::Is,
        ComparisonOperator::IsNot,
        ComparisonOperator::Eq,
        ComparisonOperator::Neq,
        ComparisonOperator::Gt,
        ComparisonOperator::Gte,
        ComparisonOperator::Lt,
        ComparisonOperator::Lte,
        ComparisonOperator::Like,
        ComparisonOperator::NotLike,
        ComparisonOperator::ILike,
        ComparisonOperator::NotILike,
        ComparisonOperator::In,
        ComparisonOperator::NotIn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Is => "is",
            ComparisonOperator::IsNot => "isNot",
            ComparisonOperator::Eq => "eq",
            ComparisonOperator::Neq => "neq",
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Gte => "gte",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Lte => "lte",
            ComparisonOperator::Like => "like",
            ComparisonOperator::NotLike => "notLike",
            ComparisonOperator::ILike => "iLike",
            ComparisonOperator::NotILike => "notILike",
            ComparisonOperator::In => "in",
            ComparisonOperator::NotIn => "notIn",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComparisonOperator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown comparison operator '{}'", s))
    }
}

/// What an operator expects as its argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// One value of the field's type.
    Single,
    /// List of values of the field's type.
    List,
    /// LIKE pattern.
    Pattern,
    BooleanOrNull,
    NullOnly,
}

/// Operators allowed on one field type, with the value each expects.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonShape {
    pub name: String,
    pub field_type: FieldType,
    pub operators: BTreeMap<ComparisonOperator, ValueKind>,
}

impl ComparisonShape {
    pub fn allows(&self, op: ComparisonOperator) -> bool {
        self.operators.contains_key(&op)
    }

    /// Check an operator argument against this shape.
    pub fn check(&self, op: ComparisonOperator, value: &Value) -> Result<(), String> {
        let kind = self
            .operators
            .get(&op)
            .ok_or_else(|| format!("operator '{}' is not allowed on {}", op, self.field_type.type_name()))?;
        match kind {
            ValueKind::Single => check_scalar(&self.field_type, value),
            ValueKind::List => match value {
                Value::Array(items) => items.iter().try_for_each(|v| check_scalar(&self.field_type, v)),
                _ => Err(format!("'{}' expects a list", op)),
            },
            ValueKind::Pattern => match value {
                Value::String(_) => Ok(()),
                _ => Err(format!("'{}' expects a string pattern", op)),
            },
            ValueKind::BooleanOrNull => match value {
                Value::Bool(_) | Value::Null => Ok(()),
                _ => Err(format!("'{}' expects true, false or null", op)),
            },
            ValueKind::NullOnly => match value {
                Value::Null => Ok(()),
                _ => Err(format!("'{}' only accepts null on {}", op, self.field_type.type_name())),
            },
        }
    }
}

/// Check that `value` is a non-null value of `field_type`.
pub fn check_scalar(field_type: &FieldType, value: &Value) -> Result<(), String> {
    let ok = match (field_type, value) {
        (_, Value::Null) => return Err("null is not a comparable value".into()),
        (FieldType::Id, Value::String(_)) => true,
        (FieldType::Id, Value::Number(n)) => n.is_i64() || n.is_u64(),
        (FieldType::String, Value::String(_)) => true,
        (FieldType::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
        (FieldType::Float, Value::Number(_)) => true,
        (FieldType::Boolean, Value::Bool(_)) => true,
        (FieldType::Date, Value::String(s)) => parse_date(s).is_some(),
        (FieldType::Enum { values, .. }, Value::String(s)) => {
            if values.contains(s) {
                true
            } else {
                return Err(format!("'{}' is not one of {:?}", s, values));
            }
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("expected {}, got {}", field_type.type_name(), value))
    }
}

/// RFC 3339 timestamps, or plain `YYYY-MM-DD` dates taken as midnight UTC.
pub fn parse_date(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset())
}

/// Order two non-null values of the same scalar kind. `None` when incomparable.
/// Strings compare as text.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Like [`compare_values`], but `Date` fields order by instant. Parseable
/// dates sort before unparseable strings so the order stays total.
pub fn compare_typed(field_type: Option<&FieldType>, a: &Value, b: &Value) -> Option<Ordering> {
    match (field_type, a, b) {
        (Some(FieldType::Date), Value::String(x), Value::String(y)) => match (parse_date(x), parse_date(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            (Some(_), None) => Some(Ordering::Less),
            (None, Some(_)) => Some(Ordering::Greater),
            (None, None) => Some(x.cmp(y)),
        },
        _ => compare_values(a, b),
    }
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    typed_equal(None, a, b)
}

pub fn typed_equal(field_type: Option<&FieldType>, a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            compare_typed(field_type, a, b) == Some(Ordering::Equal)
        }
        _ => a == b,
    }
}

fn like_matches(pattern: &str, value: &str, case_insensitive: bool) -> bool {
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    RegexBuilder::new(&re)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map(|r| r.is_match(value))
        .unwrap_or(false)
}

/// Evaluate one comparison against a record value (`Value::Null` when the field
/// is absent). `field_type` selects date ordering; without it strings compare as text.
pub fn evaluate(op: ComparisonOperator, field_type: Option<&FieldType>, actual: &Value, expected: &Value) -> bool {
    use ComparisonOperator::*;
    let equal = |v: &Value| typed_equal(field_type, actual, v);
    let list_contains = || match expected {
        Value::Array(items) => items.iter().any(|v| equal(v)),
        _ => false,
    };
    let like = |ci: bool| match (actual, expected) {
        (Value::String(s), Value::String(p)) => like_matches(p, s, ci),
        _ => false,
    };
    match op {
        Is => match expected {
            Value::Null => actual.is_null(),
            Value::Bool(b) => actual.as_bool() == Some(*b),
            _ => false,
        },
        IsNot => !evaluate(Is, field_type, actual, expected),
        Eq => !actual.is_null() && equal(expected),
        Neq => actual.is_null() || !equal(expected),
        Gt | Gte | Lt | Lte => match compare_typed(field_type, actual, expected) {
            Some(ord) => match op {
                Gt => ord == Ordering::Greater,
                Gte => ord != Ordering::Less,
                Lt => ord == Ordering::Less,
                _ => ord != Ordering::Greater,
            },
            None => false,
        },
        In => !actual.is_null() && list_contains(),
        NotIn => actual.is_null() || !list_contains(),
        Like => like(false),
        NotLike => actual.is_null() || !like(false),
        ILike => like(true),
        NotILike => actual.is_null() || !like(true),
    }
}

/// Builds comparison shapes and caches them per (field type, operator set).
#[derive(Default)]
pub struct ComparisonBuilder {
    cache: RwLock<HashMap<(FieldType, BTreeSet<ComparisonOperator>), Arc<ComparisonShape>>>,
}

impl ComparisonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operators a field type supports when nothing narrows them.
    pub fn default_operators(field_type: &FieldType) -> BTreeSet<ComparisonOperator> {
        use ComparisonOperator::*;
        match field_type {
            FieldType::Boolean => [Is, IsNot].into_iter().collect(),
            FieldType::String | FieldType::Id => ComparisonOperator::ALL.into_iter().collect(),
            FieldType::Int | FieldType::Float | FieldType::Date => {
                [Is, IsNot, Eq, Neq, Gt, Gte, Lt, Lte, In, NotIn].into_iter().collect()
            }
            FieldType::Enum { .. } => [Is, IsNot, Eq, Neq, In, NotIn].into_iter().collect(),
        }
    }

    /// Shape for `field_type`, narrowed to `allowed` when given. Operators the
    /// type does not support are dropped. Repeated calls return the same `Arc`.
    pub fn build(&self, field_type: &FieldType, allowed: Option<&BTreeSet<ComparisonOperator>>) -> Arc<ComparisonShape> {
        let defaults = Self::default_operators(field_type);
        let ops: BTreeSet<ComparisonOperator> = match allowed {
            Some(allowed) => defaults.intersection(allowed).copied().collect(),
            None => defaults.clone(),
        };
        let key = (field_type.clone(), ops);
        if let Some(shape) = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return shape.clone();
        }

        let mut name = format!("{}FilterComparison", field_type.type_name());
        if key.1 != defaults {
            for op in &key.1 {
                name.push_str(&crate::case::upper_first(op.as_str()));
            }
        }
        let operators = key
            .1
            .iter()
            .map(|op| (*op, value_kind(field_type, *op)))
            .collect();
        let shape = Arc::new(ComparisonShape {
            name,
            field_type: field_type.clone(),
            operators,
        });
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.entry(key).or_insert(shape).clone()
    }

    pub fn cached(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn value_kind(field_type: &FieldType, op: ComparisonOperator) -> ValueKind {
    use ComparisonOperator::*;
    match op {
        Is | IsNot if *field_type == FieldType::Boolean => ValueKind::BooleanOrNull,
        Is | IsNot => ValueKind::NullOnly,
        In | NotIn => ValueKind::List,
        Like | NotLike | ILike | NotILike => ValueKind::Pattern,
        _ => ValueKind::Single,
    }
}
