mod common;

use architect_query::config::{FieldDescriptor, FieldType};
use architect_query::query::{CursorPaging, QueryArgs, SortField};
use architect_query::{
    load_from_path, resolve, AutoResolverConfig, ConfigError, DataService, DataShape, FieldMappingAssembler,
    Filter, FullConfig, MemoryDataService, PagingStrategy, RequestContext, ResolvedModel, ResolverFactory,
    ResolverSource,
};
use common::operation_names;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn memory_factory(model: &ResolvedModel) -> ResolverFactory {
    model.shapes.iter().fold(ResolverFactory::new(), |factory, shape| {
        factory.with_entity_service(shape.name.clone(), Arc::new(MemoryDataService::new(shape.clone())))
    })
}

#[tokio::test]
async fn assembler_source_maps_between_dto_and_entity_fields() {
    let entity_shape = DataShape::builder("TodoEntity")
        .field(FieldDescriptor::new("id", FieldType::Int).read_only())
        .field(FieldDescriptor::new("name", FieldType::String))
        .field(FieldDescriptor::new("done", FieldType::Boolean).with_default())
        .build()
        .unwrap();
    let dto_shape = DataShape::builder("Todo")
        .field(FieldDescriptor::new("id", FieldType::Int).read_only())
        .field(FieldDescriptor::new("title", FieldType::String))
        .field(FieldDescriptor::new("completed", FieldType::Boolean).with_default())
        .build()
        .unwrap();
    let entities = Arc::new(MemoryDataService::new(entity_shape));
    let assembler = FieldMappingAssembler::new().map("title", "name").map("completed", "done");
    let resolver = ResolverFactory::new()
        .with_entity_service("TodoEntity", entities.clone())
        .create_resolver(AutoResolverConfig::new(
            dto_shape,
            ResolverSource::Assembler {
                assembler: Arc::new(assembler),
                entity: "TodoEntity".into(),
            },
        ))
        .unwrap();
    assert_eq!(resolver.id(), "TodoAutoResolver");
    let ctx = RequestContext::anonymous();

    let created = resolver
        .create()
        .unwrap()
        .create_one(json!({"title": "wash car", "completed": false}), &ctx)
        .await
        .unwrap();
    assert_eq!(created, json!({"id": 1, "title": "wash car", "completed": false}));
    let stored = entities.find_by_id(&json!(1)).await.unwrap().unwrap();
    assert_eq!(stored, json!({"id": 1, "name": "wash car", "done": false}));

    resolver
        .create()
        .unwrap()
        .create_one(json!({"title": "buy milk", "completed": true}), &ctx)
        .await
        .unwrap();
    let page = resolver
        .read()
        .unwrap()
        .query_many(
            QueryArgs::filtered(Filter::eq("title", "buy milk"))
                .sorted(vec![SortField::asc("title")])
                .cursor(CursorPaging::first(5)),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(page.nodes(), vec![&json!({"id": 2, "title": "buy milk", "completed": true})]);

    let updated = resolver
        .update()
        .unwrap()
        .update_one(&json!(1), json!({"completed": true}), &ctx)
        .await
        .unwrap();
    assert_eq!(updated["completed"], json!(true));
    assert_eq!(entities.find_by_id(&json!(1)).await.unwrap().unwrap()["done"], json!(true));
}

#[test]
fn builds_every_resolver_of_a_config() {
    let config: FullConfig = serde_json::from_value(json!({
        "shapes": [
            {
                "name": "Author",
                "fields": [
                    {"name": "id", "type": "int", "read_only": true},
                    {"name": "name", "type": "string"}
                ],
                "relations": [
                    {"name": "books", "kind": "many", "related": "Book", "remote_key": "authorId"}
                ]
            },
            {
                "name": "Book",
                "fields": [
                    {"name": "id", "type": "int", "read_only": true},
                    {"name": "title", "type": "string"},
                    {"name": "authorId", "type": "int"}
                ]
            }
        ],
        "resolvers": [
            {"shape": "Author", "options": {"update": {"disabled": true}}},
            {"shape": "Book", "source": "federated"}
        ]
    }))
    .unwrap();
    let model = resolve(&config).unwrap();
    let registry = memory_factory(&model).create_from_model(&model).unwrap();

    assert_eq!(registry.ids(), vec!["AuthorAutoResolver", "BookFederatedAutoResolver"]);
    let author = registry.get("AuthorAutoResolver").unwrap();
    assert!(author.update().is_none());
    assert!(operation_names(author).contains(&"Author.books"));
    // relation filters come from the related shape of the model
    assert!(author.operation("Author.books").unwrap().input.as_deref() == Some("BookFilter"));

    let book = registry.get("BookFederatedAutoResolver").unwrap();
    assert_eq!(operation_names(book), vec!["resolveReference"]);
}

#[test]
fn resolvers_need_an_entity_service() {
    let config: FullConfig = serde_json::from_value(json!({
        "shapes": [{"name": "Tag", "fields": [{"name": "id", "type": "int"}]}],
        "resolvers": [{"shape": "Tag", "entity": "Label"}]
    }))
    .unwrap();
    let model = resolve(&config).unwrap();
    let err = memory_factory(&model).create_from_model(&model).unwrap_err();
    assert_eq!(
        err,
        ConfigError::MissingReference {
            kind: "entity service",
            id: "Label".into()
        }
    );
}

#[tokio::test]
async fn example_config_directory_loads() {
    let config = load_from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/example_consumer/config"))
        .await
        .unwrap();
    let model = resolve(&config).unwrap();
    let registry = memory_factory(&model).create_from_model(&model).unwrap();
    assert_eq!(registry.len(), 2);

    let todo = registry.get("TodoItemAutoResolver").unwrap();
    assert!(todo.aggregate().is_some());
    assert_eq!(todo.reference().map(|r| r.key()), Some("id"));

    let sub_task = registry.get("SubTaskAutoResolver").unwrap();
    assert_eq!(sub_task.read().unwrap().paging_strategy(), PagingStrategy::Offset);
    assert!(sub_task.operation("deleteManySubTasks").is_none());
    assert!(sub_task.operation("deleteOneSubTask").is_some());
}
