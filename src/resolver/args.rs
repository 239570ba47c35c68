//! JSON argument parsing for [`super::Resolver::invoke`].

use crate::error::ResolverError;
use crate::query::{Filter, FilterShape, PagingArgs, QueryArgs, SortField};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Present, non-null argument.
pub(crate) fn optional<'a>(args: &'a Value, key: &str) -> Option<&'a Value> {
    args.get(key).filter(|v| !v.is_null())
}

pub(crate) fn required<'a>(args: &'a Value, key: &str) -> Result<&'a Value, ResolverError> {
    optional(args, key).ok_or_else(|| ResolverError::Validation(format!("missing argument '{}'", key)))
}

pub(crate) fn filter(shape: &FilterShape, args: &Value) -> Result<Filter, ResolverError> {
    match optional(args, "filter") {
        Some(v) => shape.parse(v),
        None => Ok(Filter::default()),
    }
}

fn parse<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T, ResolverError> {
    serde_json::from_value(value.clone()).map_err(|e| ResolverError::Validation(format!("{}: {}", what, e)))
}

pub(crate) fn sorting(args: &Value) -> Result<Vec<SortField>, ResolverError> {
    optional(args, "sorting").map_or(Ok(Vec::new()), |v| parse(v, "sorting"))
}

pub(crate) fn typed<T: DeserializeOwned>(args: &Value, key: &str) -> Result<T, ResolverError> {
    parse(required(args, key)?, key)
}

/// `{filter?, sorting?, paging?}`. Unrecognised paging keys are paging errors.
pub(crate) fn query_args(shape: &FilterShape, args: &Value) -> Result<QueryArgs, ResolverError> {
    let paging = optional(args, "paging")
        .map(|v| {
            serde_json::from_value::<PagingArgs>(v.clone())
                .map_err(|_| ResolverError::InvalidPagingArguments(format!("unrecognised paging arguments: {}", v)))
        })
        .transpose()?;
    Ok(QueryArgs {
        filter: filter(shape, args)?,
        sorting: sorting(args)?,
        paging,
    })
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value, ResolverError> {
    serde_json::to_value(value).map_err(|e| ResolverError::Backend(format!("serialize result: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ComparisonBuilder, CursorPaging};
    use crate::config::{DataShape, FieldDescriptor, FieldType};
    use serde_json::json;

    fn filter_shape() -> FilterShape {
        let shape = DataShape::builder("Todo")
            .field(FieldDescriptor::new("id", FieldType::Int))
            .field(FieldDescriptor::new("title", FieldType::String))
            .build()
            .unwrap();
        FilterShape::for_shape(&shape, "Todo", &ComparisonBuilder::new()).unwrap()
    }

    #[test]
    fn parses_query_arguments() {
        let args = query_args(
            &filter_shape(),
            &json!({"filter": {"title": {"eq": "foo"}}, "paging": {"first": 1}}),
        )
        .unwrap();
        assert_eq!(args.filter, Filter::eq("title", "foo"));
        assert_eq!(args.paging, Some(PagingArgs::Cursor(CursorPaging::first(1))));
        assert!(args.sorting.is_empty());
    }

    #[test]
    fn mixed_paging_keys_are_paging_errors() {
        let err = query_args(&filter_shape(), &json!({"paging": {"first": 1, "offset": 2}})).unwrap_err();
        assert!(matches!(err, ResolverError::InvalidPagingArguments(_)));
    }

    #[test]
    fn unknown_filter_fields_are_validation_errors() {
        let err = query_args(&filter_shape(), &json!({"filter": {"nope": {"eq": 1}}})).unwrap_err();
        assert!(matches!(err, ResolverError::Validation(_)));
        assert!(matches!(required(&json!({"id": null}), "id"), Err(ResolverError::Validation(_))));
    }
}
