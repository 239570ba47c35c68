//! Keyset cursors: opaque base64 tokens holding a record's ordering key tuple.

use crate::config::DataShape;
use crate::error::ResolverError;
use crate::query::comparison::check_scalar;
use crate::query::{ComparisonOperator, Filter, SortDirection, SortField, SortNulls};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const CURSOR_TYPE: &str = "keyset";

/// One ordering position: the key value plus the order it was taken under.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorField {
    pub field: String,
    pub value: Value,
    pub direction: SortDirection,
    pub nulls: SortNulls,
}

impl CursorField {
    fn matches(&self, sort: &SortField) -> bool {
        self.field == sort.field && self.direction == sort.direction && self.nulls == resolved_nulls(sort)
    }
}

fn resolved_nulls(sort: &SortField) -> SortNulls {
    if sort.nulls_first() {
        SortNulls::NullsFirst
    } else {
        SortNulls::NullsLast
    }
}

#[derive(Serialize, Deserialize)]
struct CursorPayload {
    #[serde(rename = "type")]
    kind: String,
    fields: Vec<CursorField>,
}

/// Cursor for `record` under `ordering` (which already carries the tiebreaker).
pub fn encode_cursor(record: &Value, ordering: &[SortField]) -> String {
    let payload = CursorPayload {
        kind: CURSOR_TYPE.to_string(),
        fields: ordering
            .iter()
            .map(|s| CursorField {
                field: s.field.clone(),
                value: record.get(&s.field).cloned().unwrap_or(Value::Null),
                direction: s.direction,
                nulls: resolved_nulls(s),
            })
            .collect(),
    };
    // serializing a struct of strings and Values cannot fail
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    STANDARD.encode(json)
}

/// Decode a cursor, rejecting malformed tokens, cursors taken under another
/// ordering (fields, directions or null placement) and values that do not fit
/// the field types of `shape`.
pub fn decode_cursor(cursor: &str, ordering: &[SortField], shape: &DataShape) -> Result<Vec<CursorField>, ResolverError> {
    let invalid = |reason: String| ResolverError::InvalidPagingArguments(format!("invalid cursor: {}", reason));
    let bytes = STANDARD.decode(cursor).map_err(|_| invalid("not base64".into()))?;
    let payload: CursorPayload = serde_json::from_slice(&bytes).map_err(|_| invalid("malformed payload".into()))?;
    if payload.kind != CURSOR_TYPE {
        return Err(invalid("unsupported cursor type".into()));
    }
    let same_ordering =
        payload.fields.len() == ordering.len() && payload.fields.iter().zip(ordering).all(|(c, s)| c.matches(s));
    if !same_ordering {
        return Err(invalid("cursor was produced under a different sort order".into()));
    }
    for position in &payload.fields {
        let field = shape
            .field(&position.field)
            .ok_or_else(|| invalid(format!("unknown field '{}'", position.field)))?;
        if position.value.is_null() {
            if !field.nullable {
                return Err(invalid(format!("'{}' cannot be null", field.name)));
            }
            continue;
        }
        check_scalar(&field.field_type, &position.value).map_err(|e| invalid(format!("'{}': {}", field.name, e)))?;
    }
    Ok(payload.fields)
}

/// Filter selecting records strictly after (`forward`) or before the cursor position.
///
/// One disjunct per ordering position `i`: equal on every earlier key, and past
/// the cursor on key `i`. Null keys follow each sort field's null placement.
pub fn keyset_filter(position: &[CursorField], ordering: &[SortField], forward: bool) -> Filter {
    let mut disjuncts = Vec::new();
    for (i, (cursor, sort)) in position.iter().zip(ordering).enumerate() {
        let past = match past_key(cursor, sort, forward) {
            Some(f) => f,
            None => continue,
        };
        let mut and: Vec<Filter> = position[..i].iter().map(equal_key).collect();
        and.push(past);
        disjuncts.push(Filter {
            and,
            ..Filter::default()
        });
    }
    if disjuncts.is_empty() {
        return Filter::impossible();
    }
    Filter::any_of(disjuncts)
}

fn equal_key(cursor: &CursorField) -> Filter {
    if cursor.value.is_null() {
        Filter::new().with(cursor.field.clone(), ComparisonOperator::Is, Value::Null)
    } else {
        Filter::new().with(cursor.field.clone(), ComparisonOperator::Eq, cursor.value.clone())
    }
}

/// Records past the cursor on this key alone; `None` when nothing can be.
fn past_key(cursor: &CursorField, sort: &SortField, forward: bool) -> Option<Filter> {
    let ascending = (sort.direction == SortDirection::Asc) == forward;
    // in traversal order, do nulls come after every value?
    let nulls_after = sort.nulls_first() != forward;
    let field = cursor.field.clone();
    if cursor.value.is_null() {
        return if nulls_after {
            None
        } else {
            Some(Filter::new().with(field, ComparisonOperator::IsNot, Value::Null))
        };
    }
    let op = if ascending {
        ComparisonOperator::Gt
    } else {
        ComparisonOperator::Lt
    };
    let beyond = Filter::new().with(field.clone(), op, cursor.value.clone());
    if nulls_after {
        Some(Filter::any_of(vec![
            beyond,
            Filter::new().with(field, ComparisonOperator::Is, Value::Null),
        ]))
    } else {
        Some(beyond)
    }
}
