//! DataService over PostgreSQL, using the safe SQL builder.

use super::relation::load_relation;
use super::{DataService, DeleteManyResponse, RelationResult, UpdateManyResponse};
use crate::case::{pluralize, to_snake_case};
use crate::config::{DataShape, TableBinding};
use crate::error::ResolverError;
use crate::query::{AggregateQuery, AggregateResponse, Filter, Query};
use crate::sql::{
    aggregate_query, count_query, delete, delete_where, insert, select_by_id, select_query, update, update_where,
    PgBindValue, QueryBuf,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

pub struct PgDataService {
    pool: PgPool,
    shape: Arc<DataShape>,
    table: TableBinding,
    relations: HashMap<String, Arc<dyn DataService>>,
}

impl PgDataService {
    /// Table defaults to `public.<snake_case plural of the shape name>`.
    pub fn new(pool: PgPool, shape: Arc<DataShape>) -> Self {
        let table = shape.table.clone().unwrap_or_else(|| TableBinding {
            schema: "public".into(),
            table: pluralize(&to_snake_case(&shape.name)),
        });
        PgDataService {
            pool,
            shape,
            table,
            relations: HashMap::new(),
        }
    }

    /// Service holding the related rows of relation `name`.
    pub fn with_relation(mut self, name: impl Into<String>, service: Arc<dyn DataService>) -> Self {
        self.relations.insert(name.into(), service);
        self
    }

    pub fn table(&self) -> &TableBinding {
        &self.table
    }

    fn bind<'q>(
        q: &'q QueryBuf,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Value>, ResolverError> {
        let rows = Self::bind(q).fetch_all(&self.pool).await.map_err(map_db_error)?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Value>, ResolverError> {
        let row = Self::bind(q).fetch_optional(&self.pool).await.map_err(map_db_error)?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, ResolverError> {
        let result = Self::bind(q).execute(&self.pool).await.map_err(map_db_error)?;
        Ok(result.rows_affected())
    }

    fn object<'a>(&self, record: &'a Value) -> Result<&'a Map<String, Value>, ResolverError> {
        record
            .as_object()
            .ok_or_else(|| ResolverError::Validation(format!("{}: record must be an object", self.shape.name)))
    }

    fn not_found(&self, id: &Value) -> ResolverError {
        ResolverError::NotFound(format!("{} {}", self.shape.name, id))
    }
}

/// Unique violations surface as conflicts; everything else passes through.
fn map_db_error(e: sqlx::Error) -> ResolverError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return ResolverError::Conflict(db.message().to_string());
        }
    }
    ResolverError::Db(e)
}

#[async_trait]
impl DataService for PgDataService {
    async fn query(&self, query: &Query) -> Result<Vec<Value>, ResolverError> {
        let q = select_query(&self.shape, &self.table, query)?;
        self.fetch_all(&q).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64, ResolverError> {
        let q = count_query(&self.shape, &self.table, filter)?;
        let row = self.fetch_optional(&q).await?;
        Ok(row.and_then(|r| r.get("count").and_then(Value::as_u64)).unwrap_or(0))
    }

    async fn find_by_id(&self, id: &Value) -> Result<Option<Value>, ResolverError> {
        self.fetch_optional(&select_by_id(&self.shape, &self.table, id)).await
    }

    async fn create_one(&self, record: Value) -> Result<Value, ResolverError> {
        let q = insert(&self.shape, &self.table, self.object(&record)?)?;
        self.fetch_optional(&q)
            .await?
            .ok_or(ResolverError::Db(sqlx::Error::RowNotFound))
    }

    /// Inserts in one transaction.
    async fn create_many(&self, records: Vec<Value>) -> Result<Vec<Value>, ResolverError> {
        let mut out = Vec::with_capacity(records.len());
        let mut tx = self.pool.begin().await?;
        for record in &records {
            let q = insert(&self.shape, &self.table, self.object(record)?)?;
            let row = Self::bind(&q).fetch_optional(&mut *tx).await.map_err(map_db_error)?;
            out.push(row.map(|r| row_to_json(&r)).unwrap_or(Value::Null));
        }
        tx.commit().await?;
        Ok(out)
    }

    async fn update_one(&self, id: &Value, changes: Value) -> Result<Value, ResolverError> {
        let q = update(&self.shape, &self.table, id, self.object(&changes)?)?;
        self.fetch_optional(&q).await?.ok_or_else(|| self.not_found(id))
    }

    async fn update_many(&self, filter: &Filter, changes: Value) -> Result<UpdateManyResponse, ResolverError> {
        let q = update_where(&self.shape, &self.table, filter, self.object(&changes)?)?;
        Ok(UpdateManyResponse {
            updated_count: self.execute(&q).await?,
        })
    }

    async fn delete_one(&self, id: &Value) -> Result<Value, ResolverError> {
        let q = delete(&self.shape, &self.table, id);
        self.fetch_optional(&q).await?.ok_or_else(|| self.not_found(id))
    }

    async fn delete_many(&self, filter: &Filter) -> Result<DeleteManyResponse, ResolverError> {
        let q = delete_where(&self.shape, &self.table, filter)?;
        Ok(DeleteManyResponse {
            deleted_count: self.execute(&q).await?,
        })
    }

    async fn aggregate(&self, filter: &Filter, query: &AggregateQuery) -> Result<Vec<AggregateResponse>, ResolverError> {
        let q = aggregate_query(&self.shape, &self.table, filter, query)?;
        let rows = self.fetch_all(&q).await?;
        Ok(rows.into_iter().map(aggregate_row).collect())
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

/// Split `<func>_<field>` columns back into an aggregate response.
fn aggregate_row(row: Value) -> AggregateResponse {
    let mut out = AggregateResponse::default();
    if let Value::Object(cols) = row {
        for (alias, v) in cols {
            let Some((func, field)) = alias.split_once('_') else { continue };
            let target = match func {
                "count" => &mut out.count,
                "sum" => &mut out.sum,
                "avg" => &mut out.avg,
                "min" => &mut out.min,
                "max" => &mut out.max,
                "groupBy" => &mut out.group_by,
                _ => continue,
            };
            target.insert(field.to_string(), v);
        }
    }
    out
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        let v = cell_to_value(row, name);
        map.insert(name.to_string(), v);
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aggregate_rows_split_on_first_underscore() {
        let row = json!({"count_id": 3, "max_due_at": "2024-01-01", "groupBy_completed": true});
        let out = aggregate_row(row);
        assert_eq!(out.count["id"], json!(3));
        assert_eq!(out.max["due_at"], json!("2024-01-01"));
        assert_eq!(out.group_by["completed"], json!(true));
    }
}
