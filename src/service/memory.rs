//! In-memory DataService over a `RwLock<Vec<Value>>`, used by tests and the demo server.

use super::relation::load_relation;
use super::{DataService, DeleteManyResponse, RelationResult, UpdateManyResponse};
use crate::config::{DataShape, FieldType};
use crate::error::ResolverError;
use crate::query::aggregate::aggregate_records;
use crate::query::comparison::values_equal;
use crate::query::sort::compare_records_in;
use crate::query::{AggregateQuery, AggregateResponse, Filter, Query};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct MemoryDataService {
    shape: Arc<DataShape>,
    records: Arc<RwLock<Vec<Value>>>,
    relations: HashMap<String, Arc<dyn DataService>>,
}

impl MemoryDataService {
    pub fn new(shape: Arc<DataShape>) -> Self {
        MemoryDataService {
            shape,
            records: Arc::new(RwLock::new(Vec::new())),
            relations: HashMap::new(),
        }
    }

    pub fn with_records(shape: Arc<DataShape>, records: Vec<Value>) -> Self {
        MemoryDataService {
            shape,
            records: Arc::new(RwLock::new(records)),
            relations: HashMap::new(),
        }
    }

    /// Another service over the same records, without relations. Used as the
    /// target of other services' relations so stores are never duplicated.
    pub fn shared(&self) -> Self {
        MemoryDataService {
            shape: self.shape.clone(),
            records: self.records.clone(),
            relations: HashMap::new(),
        }
    }

    /// Service holding the related records of relation `name`.
    pub fn with_relation(mut self, name: impl Into<String>, service: Arc<dyn DataService>) -> Self {
        self.relations.insert(name.into(), service);
        self
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn matching<'a>(&'a self, records: &'a [Value], filter: &'a Filter) -> impl Iterator<Item = &'a Value> {
        records.iter().filter(move |r| filter.matches_in(&self.shape, r))
    }

    fn select(&self, records: &[Value], query: &Query) -> Vec<Value> {
        let mut out: Vec<Value> = self.matching(records, &query.filter).cloned().collect();
        if !query.sorting.is_empty() {
            out.sort_by(|a, b| compare_records_in(&self.shape, a, b, &query.sorting));
        }
        let offset = query.paging.offset.unwrap_or(0) as usize;
        let limit = query.paging.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        out.into_iter().skip(offset).take(limit).collect()
    }

    fn position(&self, records: &[Value], id: &Value) -> Option<usize> {
        records
            .iter()
            .position(|r| self.shape.record_id(r).is_some_and(|v| values_equal(v, id)))
    }

    /// Fill in a primary key when the caller omitted it.
    fn assign_id(&self, records: &[Value], record: &mut Value) -> Result<(), ResolverError> {
        let pk = &self.shape.primary_key;
        if self.shape.record_id(record).is_some() {
            return Ok(());
        }
        let next = match self.shape.primary_key_field().field_type {
            FieldType::Int => {
                let max = records
                    .iter()
                    .filter_map(|r| r.get(pk).and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0);
                let next = max.checked_add(1).ok_or_else(|| {
                    ResolverError::Conflict(format!("{}: no '{}' left after {}", self.shape.name, pk, max))
                })?;
                Value::from(next)
            }
            FieldType::Id | FieldType::String => Value::String(uuid::Uuid::new_v4().to_string()),
            _ => {
                return Err(ResolverError::Validation(format!(
                    "{}: '{}' is required",
                    self.shape.name, pk
                )))
            }
        };
        if let Value::Object(obj) = record {
            obj.insert(pk.clone(), next);
        }
        Ok(())
    }

    fn insert(&self, records: &mut Vec<Value>, mut record: Value) -> Result<Value, ResolverError> {
        if !record.is_object() {
            return Err(ResolverError::Validation(format!("{}: record must be an object", self.shape.name)));
        }
        self.assign_id(records, &mut record)?;
        if let Some(id) = self.shape.record_id(&record) {
            if self.position(records, id).is_some() {
                return Err(ResolverError::Conflict(format!("{} {} already exists", self.shape.name, id)));
            }
        }
        records.push(record.clone());
        Ok(record)
    }
}

fn apply_update(record: &mut Value, update: &Value) {
    if let (Value::Object(target), Value::Object(changes)) = (record, update) {
        for (k, v) in changes {
            target.insert(k.clone(), v.clone());
        }
    }
}

#[async_trait]
impl DataService for MemoryDataService {
    async fn query(&self, query: &Query) -> Result<Vec<Value>, ResolverError> {
        let records = self.records.read().await;
        Ok(self.select(&records, query))
    }

    async fn count(&self, filter: &Filter) -> Result<u64, ResolverError> {
        let records = self.records.read().await;
        Ok(self.matching(&records, filter).count() as u64)
    }

    async fn find_by_id(&self, id: &Value) -> Result<Option<Value>, ResolverError> {
        let records = self.records.read().await;
        Ok(self.position(&records, id).map(|i| records[i].clone()))
    }

    async fn create_one(&self, record: Value) -> Result<Value, ResolverError> {
        let mut records = self.records.write().await;
        self.insert(&mut records, record)
    }

    async fn create_many(&self, new_records: Vec<Value>) -> Result<Vec<Value>, ResolverError> {
        let mut records = self.records.write().await;
        // all or nothing
        let mut staged = records.clone();
        let mut out = Vec::with_capacity(new_records.len());
        for record in new_records {
            out.push(self.insert(&mut staged, record)?);
        }
        *records = staged;
        Ok(out)
    }

    async fn update_one(&self, id: &Value, update: Value) -> Result<Value, ResolverError> {
        let mut records = self.records.write().await;
        let i = self
            .position(&records, id)
            .ok_or_else(|| ResolverError::NotFound(format!("{} {}", self.shape.name, id)))?;
        apply_update(&mut records[i], &update);
        Ok(records[i].clone())
    }

    async fn update_many(&self, filter: &Filter, update: Value) -> Result<UpdateManyResponse, ResolverError> {
        let mut records = self.records.write().await;
        let mut updated_count = 0;
        for record in records.iter_mut().filter(|r| filter.matches_in(&self.shape, r)) {
            apply_update(record, &update);
            updated_count += 1;
        }
        Ok(UpdateManyResponse { updated_count })
    }

    async fn delete_one(&self, id: &Value) -> Result<Value, ResolverError> {
        let mut records = self.records.write().await;
        let i = self
            .position(&records, id)
            .ok_or_else(|| ResolverError::NotFound(format!("{} {}", self.shape.name, id)))?;
        Ok(records.remove(i))
    }

    async fn delete_many(&self, filter: &Filter) -> Result<DeleteManyResponse, ResolverError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !filter.matches_in(&self.shape, r));
        Ok(DeleteManyResponse {
            deleted_count: (before - records.len()) as u64,
        })
    }

    async fn aggregate(&self, filter: &Filter, query: &AggregateQuery) -> Result<Vec<AggregateResponse>, ResolverError> {
        let records = self.records.read().await;
        let matching: Vec<Value> = self.matching(&records, filter).cloned().collect();
        Ok(aggregate_records(Some(&self.shape), &matching, query))
    }

    async fn find_relation(
        &self,
        relation: &str,
        parent_ids: &[Value],
        query: &Query,
    ) -> Result<HashMap<String, RelationResult>, ResolverError> {
        let related = self
            .relations
            .get(relation)
            .ok_or_else(|| ResolverError::Backend(format!("no service registered for relation '{}'", relation)))?;
        load_relation(&self.shape, self, related.as_ref(), relation, parent_ids, query).await
    }
}
