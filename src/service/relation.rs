//! Batched relation loading shared by the bundled services.

use super::{DataService, RelationResult};
use crate::config::{id_key, DataShape, RelationKind};
use crate::error::ResolverError;
use crate::query::comparison::values_equal;
use crate::query::{ComparisonOperator, Filter, Paging, Query};
use serde_json::Value;
use std::collections::HashMap;

/// Load relation `relation` of `shape` for every parent id with one query
/// against `owner` (for the join keys) and one against `related`.
pub(crate) async fn load_relation(
    shape: &DataShape,
    owner: &dyn DataService,
    related: &dyn DataService,
    relation: &str,
    parent_ids: &[Value],
    query: &Query,
) -> Result<HashMap<String, RelationResult>, ResolverError> {
    let descriptor = shape
        .relation(relation)
        .ok_or_else(|| ResolverError::Validation(format!("{} has no relation '{}'", shape.name, relation)))?;

    // parent id -> value of the local join key
    let parents: Vec<(String, Value)> = if descriptor.local_key == shape.primary_key {
        parent_ids.iter().map(|id| (id_key(id), id.clone())).collect()
    } else {
        let owners = owner
            .query(&Query::filtered(Filter::new().with(
                shape.primary_key.clone(),
                ComparisonOperator::In,
                Value::Array(parent_ids.to_vec()),
            )))
            .await?;
        parent_ids
            .iter()
            .map(|id| {
                let local = owners
                    .iter()
                    .find(|r| shape.record_id(r).is_some_and(|v| values_equal(v, id)))
                    .and_then(|r| r.get(&descriptor.local_key).cloned())
                    .unwrap_or(Value::Null);
                (id_key(id), local)
            })
            .collect()
    };

    let keys: Vec<Value> = parents.iter().map(|(_, k)| k.clone()).filter(|k| !k.is_null()).collect();
    let children = if keys.is_empty() {
        Vec::new()
    } else {
        let related_query = Query {
            filter: query.filter.clone().merge_and(Filter::new().with(
                descriptor.remote_key.clone(),
                ComparisonOperator::In,
                Value::Array(keys),
            )),
            sorting: query.sorting.clone(),
            paging: Paging::default(),
        };
        related.query(&related_query).await?
    };
    tracing::debug!(relation = %relation, parents = parents.len(), children = children.len(), "relation loaded");

    let offset = query.paging.offset.unwrap_or(0) as usize;
    let limit = query.paging.limit.map(|l| l as usize).unwrap_or(usize::MAX);
    let mut out = HashMap::with_capacity(parents.len());
    for (parent, key) in parents {
        let mut matching = children
            .iter()
            .filter(|c| !key.is_null() && c.get(&descriptor.remote_key).is_some_and(|v| values_equal(v, &key)));
        let result = match descriptor.kind {
            RelationKind::One => RelationResult::One(matching.next().cloned()),
            RelationKind::Many => RelationResult::Many(matching.skip(offset).take(limit).cloned().collect()),
        };
        out.insert(parent, result);
    }
    Ok(out)
}
