//! Assemblers: map between an external (DTO) shape and the internal entity shape.

use super::{DataService, DeleteManyResponse, RelationResult, UpdateManyResponse};
use crate::error::ResolverError;
use crate::query::{AggregateQuery, AggregateResponse, Filter, Query, SortField};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Bidirectional DTO ↔ entity mapping. Field renames drive the provided
/// conversions; override the record conversions for anything richer.
pub trait Assembler: Send + Sync {
    /// DTO field name → entity field name.
    fn entity_field(&self, dto_field: &str) -> String {
        dto_field.to_string()
    }

    /// Entity field name → DTO field name.
    fn dto_field(&self, entity_field: &str) -> String {
        entity_field.to_string()
    }

    fn convert_to_dto(&self, entity: Value) -> Value {
        rename_keys(entity, &|k| self.dto_field(k))
    }

    fn convert_to_entity(&self, dto: Value) -> Value {
        rename_keys(dto, &|k| self.entity_field(k))
    }

    fn convert_id(&self, id: &Value) -> Value {
        id.clone()
    }

    fn convert_filter(&self, filter: &Filter) -> Filter {
        filter.map_fields(&|f| self.entity_field(f))
    }

    fn convert_query(&self, query: &Query) -> Query {
        Query {
            filter: self.convert_filter(&query.filter),
            sorting: query
                .sorting
                .iter()
                .map(|s| SortField {
                    field: self.entity_field(&s.field),
                    ..s.clone()
                })
                .collect(),
            paging: query.paging,
        }
    }

    fn convert_aggregate_query(&self, query: &AggregateQuery) -> AggregateQuery {
        query.map_fields(&|f| self.entity_field(f))
    }

    fn convert_aggregate_response(&self, response: AggregateResponse) -> AggregateResponse {
        response.map_fields(&|f| self.dto_field(f))
    }
}

fn rename_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(obj) => {
            let renamed: Map<String, Value> = obj.into_iter().map(|(k, v)| (rename(&k), v)).collect();
            Value::Object(renamed)
        }
        other => other,
    }
}

/// Renames fields; fields without a mapping keep their name.
#[derive(Clone, Debug, Default)]
pub struct FieldMappingAssembler {
    to_entity: HashMap<String, String>,
    to_dto: HashMap<String, String>,
}

impl FieldMappingAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map DTO field `dto` to entity field `entity`.
    pub fn map(mut self, dto: impl Into<String>, entity: impl Into<String>) -> Self {
        let (dto, entity) = (dto.into(), entity.into());
        self.to_entity.insert(dto.clone(), entity.clone());
        self.to_dto.insert(entity, dto);
        self
    }
}

impl Assembler for FieldMappingAssembler {
    fn entity_field(&self, dto_field: &str) -> String {
        self.to_entity.get(dto_field).cloned().unwrap_or_else(|| dto_field.to_string())
    }

    fn dto_field(&self, entity_field: &str) -> String {
        self.to_dto.get(entity_field).cloned().unwrap_or_else(|| entity_field.to_string())
    }
}

/// DataService in DTO terms over an entity-level service.
pub struct AssemblerDataService {
    assembler: Arc<dyn Assembler>,
    inner: Arc<dyn DataService>,
}

impl AssemblerDataService {
    pub fn new(assembler: Arc<dyn Assembler>, inner: Arc<dyn DataService>) -> Self {
        AssemblerDataService { assembler, inner }
    }
}

#[async_trait]
impl DataService for AssemblerDataService {
    async fn query(&self, query: &Query) -> Result<Vec<Value>, ResolverError> {
        let records = self.inner.query(&self.assembler.convert_query(query)).await?;
        Ok(records.into_iter().map(|r| self.assembler.convert_to_dto(r)).collect())
    }

    async fn query_one(&self, query: &Query) -> Result<Option<Value>, ResolverError> {
        let record = self.inner.query_one(&self.assembler.convert_query(query)).await?;
        Ok(record.map(|r| self.assembler.convert_to_dto(r)))
    }

    async fn count(&self, filter: &Filter) -> Result<u64, ResolverError> {
        self.inner.count(&self.assembler.convert_filter(filter)).await
    }

    async fn find_by_id(&self, id: &Value) -> Result<Option<Value>, ResolverError> {
        let record = self.inner.find_by_id(&self.assembler.convert_id(id)).await?;
        Ok(record.map(|r| self.assembler.convert_to_dto(r)))
    }

    async fn create_one(&self, record: Value) -> Result<Value, ResolverError> {
        let created = self.inner.create_one(self.assembler.convert_to_entity(record)).await?;
        Ok(self.assembler.convert_to_dto(created))
    }

    async fn create_many(&self, records: Vec<Value>) -> Result<Vec<Value>, ResolverError> {
        let entities = records.into_iter().map(|r| self.assembler.convert_to_entity(r)).collect();
        let created = self.inner.create_many(entities).await?;
        Ok(created.into_iter().map(|r| self.assembler.convert_to_dto(r)).collect())
    }

    async fn update_one(&self, id: &Value, update: Value) -> Result<Value, ResolverError> {
        let updated = self
            .inner
            .update_one(&self.assembler.convert_id(id), self.assembler.convert_to_entity(update))
            .await?;
        Ok(self.assembler.convert_to_dto(updated))
    }

    async fn update_many(&self, filter: &Filter, update: Value) -> Result<UpdateManyResponse, ResolverError> {
        self.inner
            .update_many(&self.assembler.convert_filter(filter), self.assembler.convert_to_entity(update))
            .await
    }

    async fn delete_one(&self, id: &Value) -> Result<Value, ResolverError> {
        let deleted = self.inner.delete_one(&self.assembler.convert_id(id)).await?;
        Ok(self.assembler.convert_to_dto(deleted))
    }

    async fn delete_many(&self, filter: &Filter) -> Result<DeleteManyResponse, ResolverError> {
        self.inner.delete_many(&self.assembler.convert_filter(filter)).await
    }

    async fn aggregate(&self, filter: &Filter, query: &AggregateQuery) -> Result<Vec<AggregateResponse>, ResolverError> {
        let rows = self
            .inner
            .aggregate(
                &self.assembler.convert_filter(filter),
                &self.assembler.convert_aggregate_query(query),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| self.assembler.convert_aggregate_response(r))
            .collect())
    }

    /// Related records belong to another shape and pass through unchanged.
    async fn find_relation(
        &self,
        relation: &str,
        parent_ids: &[Value],
        query: &Query,
    ) -> Result<HashMap<String, RelationResult>, ResolverError> {
        let ids: Vec<Value> = parent_ids.iter().map(|id| self.assembler.convert_id(id)).collect();
        self.inner
            .find_relation(&self.assembler.entity_field(relation), &ids, query)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataShape, FieldDescriptor, FieldType, RelationDescriptor, RelationKind};
    use crate::query::ComparisonOperator;
    use crate::service::MemoryDataService;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// DTO `title`/`completed`/`labels` over entity `name`/`done`/`tags`.
    fn mapped() -> (AssemblerDataService, Arc<MemoryDataService>) {
        let tag = DataShape::builder("Tag")
            .field(FieldDescriptor::new("id", FieldType::Int).read_only())
            .field(FieldDescriptor::new("label", FieldType::String))
            .field(FieldDescriptor::new("todoEntityId", FieldType::Int))
            .build()
            .unwrap();
        let entity = DataShape::builder("TodoEntity")
            .field(FieldDescriptor::new("id", FieldType::Int).read_only())
            .field(FieldDescriptor::new("name", FieldType::String))
            .field(FieldDescriptor::new("done", FieldType::Boolean))
            .relation(RelationDescriptor {
                name: "tags".into(),
                kind: RelationKind::Many,
                related: "Tag".into(),
                local_key: "id".into(),
                remote_key: "todoEntityId".into(),
                nullable: true,
            })
            .build()
            .unwrap();
        let tags = MemoryDataService::with_records(
            tag,
            vec![
                json!({"id": 1, "label": "home", "todoEntityId": 1}),
                json!({"id": 2, "label": "work", "todoEntityId": 2}),
            ],
        );
        let entities = Arc::new(MemoryDataService::new(entity).with_relation("tags", Arc::new(tags)));
        let assembler = FieldMappingAssembler::new()
            .map("title", "name")
            .map("completed", "done")
            .map("labels", "tags");
        (AssemblerDataService::new(Arc::new(assembler), entities.clone()), entities)
    }

    async fn seed(service: &AssemblerDataService) -> Vec<Value> {
        service
            .create_many(vec![
                json!({"title": "a", "completed": false}),
                json!({"title": "b", "completed": true}),
                json!({"title": "c", "completed": false}),
            ])
            .await
            .unwrap()
    }

    #[test]
    fn field_mapping_round_trips() {
        let asm = FieldMappingAssembler::new().map("title", "name").map("isDone", "completed");
        let dto = json!({"id": 1, "title": "t", "isDone": false});
        let entity = asm.convert_to_entity(dto.clone());
        assert_eq!(entity, json!({"id": 1, "name": "t", "completed": false}));
        assert_eq!(asm.convert_to_dto(entity), dto);
    }

    #[test]
    fn queries_are_mapped() {
        let asm = FieldMappingAssembler::new().map("title", "name");
        let query = Query {
            filter: Filter::new()
                .with("title", ComparisonOperator::Like, "a%")
                .merge_and(Filter::eq("id", 1)),
            sorting: vec![SortField::desc("title")],
            ..Query::default()
        };
        let mapped = asm.convert_query(&query);
        assert_eq!(mapped.sorting, vec![SortField::desc("name")]);
        assert!(mapped.filter.matches(&json!({"id": 1, "name": "abc"})));
        assert!(!mapped.filter.matches(&json!({"id": 1, "title": "abc"})));
    }

    #[tokio::test]
    async fn create_many_stores_entity_fields() {
        let (service, entities) = mapped();
        let created = seed(&service).await;
        assert_eq!(created[1], json!({"id": 2, "title": "b", "completed": true}));
        assert_eq!(
            entities.find_by_id(&json!(2)).await.unwrap(),
            Some(json!({"id": 2, "name": "b", "done": true}))
        );
    }

    #[tokio::test]
    async fn bulk_writes_filter_and_update_in_entity_fields() {
        let (service, entities) = mapped();
        seed(&service).await;

        let updated = service
            .update_many(&Filter::eq("completed", false), json!({"title": "open"}))
            .await
            .unwrap();
        assert_eq!(updated.updated_count, 2);
        assert_eq!(
            entities.find_by_id(&json!(3)).await.unwrap(),
            Some(json!({"id": 3, "name": "open", "done": false}))
        );

        let deleted = service.delete_one(&json!(2)).await.unwrap();
        assert_eq!(deleted, json!({"id": 2, "title": "b", "completed": true}));
        assert_eq!(entities.find_by_id(&json!(2)).await.unwrap(), None);

        let removed = service.delete_many(&Filter::eq("title", "open")).await.unwrap();
        assert_eq!(removed.deleted_count, 2);
        assert!(entities.is_empty().await);
    }

    #[tokio::test]
    async fn counts_and_aggregates_answer_in_dto_fields() {
        let (service, _) = mapped();
        seed(&service).await;
        assert_eq!(service.count(&Filter::eq("completed", false)).await.unwrap(), 2);

        let rows = service
            .aggregate(
                &Filter::default(),
                &AggregateQuery {
                    count: vec!["title".into()],
                    group_by: vec!["completed".into()],
                    ..AggregateQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&rows).unwrap(),
            json!([
                {"count": {"title": 2}, "groupBy": {"completed": false}},
                {"count": {"title": 1}, "groupBy": {"completed": true}}
            ])
        );
    }

    #[tokio::test]
    async fn relations_are_looked_up_by_their_entity_name() {
        let (service, _) = mapped();
        seed(&service).await;
        let results = service
            .find_relation("labels", &[json!(1), json!(3)], &Query::default())
            .await
            .unwrap();
        assert_eq!(
            results["1"],
            RelationResult::Many(vec![json!({"id": 1, "label": "home", "todoEntityId": 1})])
        );
        assert!(results["3"].is_empty());
    }
}
