#![allow(dead_code)]

use architect_query::config::{FieldDescriptor, FieldType, RelationDescriptor, RelationKind};
use architect_query::query::{AggregateQuery, AggregateResponse, Filter, Query};
use architect_query::service::{DeleteManyResponse, RelationResult, UpdateManyResponse};
use architect_query::{
    AutoResolverConfig, DataService, DataShape, MemoryDataService, Resolver, ResolverError, ResolverFactory,
    ResolverOptions, ResolverSource,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn todo_shape() -> Arc<DataShape> {
    DataShape::builder("TodoItem")
        .field(FieldDescriptor::new("id", FieldType::Int).read_only())
        .field(FieldDescriptor::new("title", FieldType::String))
        .field(FieldDescriptor::new("description", FieldType::String).nullable())
        .field(FieldDescriptor::new("completed", FieldType::Boolean).with_default())
        .field(FieldDescriptor::new("priority", FieldType::Int).nullable())
        .relation(RelationDescriptor {
            name: "subTasks".into(),
            kind: RelationKind::Many,
            related: "SubTask".into(),
            local_key: "id".into(),
            remote_key: "todoItemId".into(),
            nullable: true,
        })
        .build()
        .unwrap()
}

pub fn sub_task_shape() -> Arc<DataShape> {
    DataShape::builder("SubTask")
        .field(FieldDescriptor::new("id", FieldType::Int).read_only())
        .field(FieldDescriptor::new("title", FieldType::String))
        .field(FieldDescriptor::new("completed", FieldType::Boolean).with_default())
        .field(FieldDescriptor::new("todoItemId", FieldType::Int))
        .build()
        .unwrap()
}

/// Counts every call that reaches the wrapped service.
pub struct CountingService {
    inner: Arc<dyn DataService>,
    calls: AtomicUsize,
}

impl CountingService {
    pub fn new(inner: Arc<dyn DataService>) -> Self {
        CountingService {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DataService for CountingService {
    async fn query(&self, query: &Query) -> Result<Vec<Value>, ResolverError> {
        self.hit();
        self.inner.query(query).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64, ResolverError> {
        self.hit();
        self.inner.count(filter).await
    }

    async fn find_by_id(&self, id: &Value) -> Result<Option<Value>, ResolverError> {
        self.hit();
        self.inner.find_by_id(id).await
    }

    async fn create_one(&self, record: Value) -> Result<Value, ResolverError> {
        self.hit();
        self.inner.create_one(record).await
    }

    async fn create_many(&self, records: Vec<Value>) -> Result<Vec<Value>, ResolverError> {
        self.hit();
        self.inner.create_many(records).await
    }

    async fn update_one(&self, id: &Value, update: Value) -> Result<Value, ResolverError> {
        self.hit();
        self.inner.update_one(id, update).await
    }

    async fn update_many(&self, filter: &Filter, update: Value) -> Result<UpdateManyResponse, ResolverError> {
        self.hit();
        self.inner.update_many(filter, update).await
    }

    async fn delete_one(&self, id: &Value) -> Result<Value, ResolverError> {
        self.hit();
        self.inner.delete_one(id).await
    }

    async fn delete_many(&self, filter: &Filter) -> Result<DeleteManyResponse, ResolverError> {
        self.hit();
        self.inner.delete_many(filter).await
    }

    async fn aggregate(&self, filter: &Filter, query: &AggregateQuery) -> Result<Vec<AggregateResponse>, ResolverError> {
        self.hit();
        self.inner.aggregate(filter, query).await
    }

    async fn find_relation(
        &self,
        relation: &str,
        parent_ids: &[Value],
        query: &Query,
    ) -> Result<HashMap<String, RelationResult>, ResolverError> {
        self.hit();
        self.inner.find_relation(relation, parent_ids, query).await
    }
}

pub fn todo_records() -> Vec<Value> {
    vec![
        json!({"id": 1, "title": "foo", "description": "first", "completed": false, "priority": 2}),
        json!({"id": 2, "title": "bar", "description": null, "completed": true, "priority": 1}),
        json!({"id": 3, "title": "baz", "description": "third", "completed": false, "priority": null}),
        json!({"id": 4, "title": "qux", "description": "fourth", "completed": true, "priority": 2}),
        json!({"id": 5, "title": "quux", "description": "fifth", "completed": false, "priority": 3}),
        json!({"id": 6, "title": "corge", "description": null, "completed": false, "priority": 1}),
        json!({"id": 7, "title": "grault", "description": "seventh", "completed": true, "priority": null}),
    ]
}

pub fn sub_task_records() -> Vec<Value> {
    vec![
        json!({"id": 1, "title": "a", "completed": false, "todoItemId": 1}),
        json!({"id": 2, "title": "b", "completed": true, "todoItemId": 1}),
        json!({"id": 3, "title": "c", "completed": false, "todoItemId": 2}),
    ]
}

/// TodoItem store with a `subTasks` relation over a SubTask store.
pub fn todo_service(records: Vec<Value>) -> MemoryDataService {
    let sub_tasks = MemoryDataService::with_records(sub_task_shape(), sub_task_records());
    MemoryDataService::with_records(todo_shape(), records).with_relation("subTasks", Arc::new(sub_tasks))
}

/// TodoItem resolver over a counting wrapper of `todo_service`.
pub fn counted_resolver(options: ResolverOptions) -> (Resolver, Arc<CountingService>) {
    let counting = Arc::new(CountingService::new(Arc::new(todo_service(todo_records()))));
    let resolver = ResolverFactory::new()
        .with_shape(sub_task_shape())
        .create_resolver(
            AutoResolverConfig::new(todo_shape(), ResolverSource::Service(counting.clone())).with_options(options),
        )
        .unwrap();
    (resolver, counting)
}

pub fn todo_resolver(options: ResolverOptions) -> Resolver {
    counted_resolver(options).0
}

pub fn operation_names(resolver: &Resolver) -> Vec<&str> {
    resolver.operations().iter().map(|o| o.name.as_str()).collect()
}
