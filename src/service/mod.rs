//! DataService: the single seam between resolvers and persistence.

mod assembler;
mod memory;
mod pg;
mod relation;
mod validation;

pub use assembler::{Assembler, AssemblerDataService, FieldMappingAssembler};
pub use memory::MemoryDataService;
pub use pg::PgDataService;
pub use validation::InputValidator;

use crate::error::ResolverError;
use crate::query::{AggregateQuery, AggregateResponse, Filter, Paging, Query};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManyResponse {
    pub updated_count: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteManyResponse {
    pub deleted_count: u64,
}

/// Related records of one parent.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RelationResult {
    One(Option<Value>),
    Many(Vec<Value>),
}

impl RelationResult {
    pub fn len(&self) -> usize {
        match self {
            RelationResult::One(record) => usize::from(record.is_some()),
            RelationResult::Many(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_records(self) -> Vec<Value> {
        match self {
            RelationResult::One(record) => record.into_iter().collect(),
            RelationResult::Many(records) => records,
        }
    }
}

/// Persistence operations a resolver delegates to. Records are JSON objects;
/// ids are the primary-key values. Errors pass through resolvers unmodified.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn query(&self, query: &Query) -> Result<Vec<Value>, ResolverError>;

    async fn query_one(&self, query: &Query) -> Result<Option<Value>, ResolverError> {
        let query = Query {
            paging: Paging {
                limit: Some(1),
                offset: query.paging.offset,
            },
            ..query.clone()
        };
        Ok(self.query(&query).await?.into_iter().next())
    }

    async fn count(&self, filter: &Filter) -> Result<u64, ResolverError>;

    async fn find_by_id(&self, id: &Value) -> Result<Option<Value>, ResolverError>;

    async fn create_one(&self, record: Value) -> Result<Value, ResolverError>;

    async fn create_many(&self, records: Vec<Value>) -> Result<Vec<Value>, ResolverError> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.create_one(record).await?);
        }
        Ok(out)
    }

    /// `NotFound` when no record has `id`.
    async fn update_one(&self, id: &Value, update: Value) -> Result<Value, ResolverError>;

    async fn update_many(&self, filter: &Filter, update: Value) -> Result<UpdateManyResponse, ResolverError>;

    /// `NotFound` when no record has `id`. Returns the deleted record.
    async fn delete_one(&self, id: &Value) -> Result<Value, ResolverError>;

    async fn delete_many(&self, filter: &Filter) -> Result<DeleteManyResponse, ResolverError>;

    async fn aggregate(&self, filter: &Filter, query: &AggregateQuery) -> Result<Vec<AggregateResponse>, ResolverError>;

    /// Related records for every parent id, in one batched call.
    /// The result is keyed by [`crate::config::id_key`] of each parent id.
    async fn find_relation(
        &self,
        relation: &str,
        parent_ids: &[Value],
        query: &Query,
    ) -> Result<HashMap<String, RelationResult>, ResolverError>;

    /// Related records per parent matching `filter`, keyed like [`Self::find_relation`].
    async fn count_relation(
        &self,
        relation: &str,
        parent_ids: &[Value],
        filter: &Filter,
    ) -> Result<HashMap<String, u64>, ResolverError> {
        let results = self
            .find_relation(relation, parent_ids, &Query::filtered(filter.clone()))
            .await?;
        Ok(results.into_iter().map(|(id, r)| (id, r.len() as u64)).collect())
    }
}
