mod common;

use architect_query::config::{OperationOptions, Toggle};
use architect_query::query::PagingStrategy;
use architect_query::resolver::{CapabilityKind, ContainerOverride, ShapeKind};
use architect_query::{AutoResolverConfig, ConfigError, ResolverFactory, ResolverOptions, ResolverSource};
use common::{operation_names, sub_task_shape, todo_resolver, todo_service, todo_records, todo_shape};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;

fn compose(options: ResolverOptions) -> Result<architect_query::Resolver, ConfigError> {
    ResolverFactory::new().with_shape(sub_task_shape()).create_resolver(
        AutoResolverConfig::new(todo_shape(), ResolverSource::Service(Arc::new(todo_service(todo_records()))))
            .with_options(options),
    )
}

#[test]
fn default_resolver_exposes_every_default_capability_in_order() {
    let resolver = todo_resolver(ResolverOptions::default());
    assert_eq!(resolver.id(), "TodoItemAutoResolver");
    assert_eq!(
        operation_names(&resolver),
        vec![
            "TodoItem.subTasks",
            "createOneTodoItem",
            "createManyTodoItems",
            "todoItems",
            "todoItem",
            "updateOneTodoItem",
            "updateManyTodoItems",
            "deleteOneTodoItem",
            "deleteManyTodoItems",
        ]
    );
    assert!(resolver.aggregate().is_none());
    assert!(resolver.reference().is_none());
}

#[test]
fn read_create_delete_without_update() {
    let mut options = ResolverOptions::default();
    options.update.toggle.disabled = true;
    let resolver = todo_resolver(options);
    assert!(resolver.update().is_none());
    assert!(resolver
        .operations()
        .iter()
        .all(|o| o.capability != CapabilityKind::Update));
    assert!(resolver.shapes().iter().all(|s| s.kind != ShapeKind::UpdateInput));
    assert!(resolver.read().is_some() && resolver.create().is_some() && resolver.delete().is_some());
}

#[test]
fn disabled_capabilities_contribute_nothing() {
    let mut options = ResolverOptions::default();
    options.create.toggle.disabled = true;
    options.read.toggle.disabled = true;
    options.update.toggle.disabled = true;
    options.delete.toggle.disabled = true;
    options.relations.toggle.disabled = true;
    let resolver = todo_resolver(options);
    assert!(resolver.operations().is_empty());
    // only the output shape remains
    assert_eq!(resolver.shapes().len(), 1);
    assert_eq!(resolver.shapes()[0].kind, ShapeKind::Output);
}

#[test]
fn shared_shapes_are_registered_once() {
    let resolver = todo_resolver(ResolverOptions::default());
    let filters = resolver.shapes().iter().filter(|s| s.name == "TodoItemFilter").count();
    assert_eq!(filters, 1);
    let names: Vec<&str> = resolver.shapes().iter().map(|s| s.name.as_str()).collect();
    for expected in ["TodoItem", "CreateTodoItem", "UpdateTodoItem", "TodoItemSort", "TodoItemConnection"] {
        assert!(names.contains(&expected), "missing {}", expected);
    }
}

#[test]
fn dto_name_and_operation_names_can_be_overridden() {
    let mut options = ResolverOptions {
        dto_name: Some("Task".into()),
        enable_aggregate: true,
        ..ResolverOptions::default()
    };
    options.read.query_one = OperationOptions::named("task_by_id");
    options.delete.delete_many = OperationOptions::disabled();
    let resolver = todo_resolver(options);
    assert_eq!(resolver.id(), "TaskAutoResolver");
    let names = operation_names(&resolver);
    assert!(names.contains(&"tasks"));
    assert!(names.contains(&"task_by_id"));
    assert!(names.contains(&"createManyTasks"));
    assert!(names.contains(&"taskAggregate"));
    assert!(names.contains(&"Task.subTasks"));
    assert!(!names.contains(&"deleteManyTasks"));
    assert!(names.contains(&"deleteOneTask"));
}

#[test]
fn colliding_operation_names_fail_composition() {
    let mut options = ResolverOptions::default();
    options.read.query_one = OperationOptions::named("createOneTodoItem");
    assert_eq!(
        compose(options).unwrap_err(),
        ConfigError::DuplicateOperation {
            name: "createOneTodoItem".into(),
            existing: "create".into(),
            incoming: "read".into(),
        }
    );
}

#[test]
fn contradictory_options_fail_composition() {
    let mut both = ResolverOptions::default();
    both.read.toggle = Toggle {
        enabled: Some(true),
        disabled: true,
    };
    assert!(matches!(compose(both), Err(ConfigError::Contradictory(_))));

    let sizes = ResolverOptions {
        default_result_size: 500,
        ..ResolverOptions::default()
    };
    assert!(matches!(compose(sizes), Err(ConfigError::Contradictory(_))));

    let mut paging = ResolverOptions {
        paging_strategy: Some(PagingStrategy::Offset),
        ..ResolverOptions::default()
    };
    paging.read.paging_strategy = Some(PagingStrategy::Cursor);
    assert!(matches!(compose(paging), Err(ConfigError::IncompatiblePaging(_))));

    let mut container = ResolverOptions::default();
    container.read.connection = Some(ContainerOverride {
        name: "TodoPage".into(),
        strategy: PagingStrategy::Offset,
    });
    assert!(matches!(compose(container), Err(ConfigError::IncompatiblePaging(_))));

    let mut reference = ResolverOptions::default();
    reference.reference_by.key = Some("nope".into());
    assert!(matches!(compose(reference), Err(ConfigError::InvalidField { .. })));

    let mut relation = ResolverOptions::default();
    relation.relations.relations = HashMap::from([("tags".to_string(), OperationOptions::default())]);
    assert!(matches!(
        compose(relation),
        Err(ConfigError::MissingReference { kind: "relation", .. })
    ));
}

#[test]
fn offset_container_follows_the_paging_strategy() {
    let mut options = ResolverOptions {
        paging_strategy: Some(PagingStrategy::Offset),
        ..ResolverOptions::default()
    };
    options.read.connection = Some(ContainerOverride {
        name: "TodoPage".into(),
        strategy: PagingStrategy::Offset,
    });
    let resolver = compose(options).unwrap();
    let query_many = resolver.operation("todoItems").unwrap();
    assert_eq!(query_many.output, "TodoPage");
    let page = resolver.shapes().iter().find(|s| s.name == "TodoPage").unwrap();
    assert_eq!(page.kind, ShapeKind::OffsetConnection);
    assert_eq!(resolver.read().unwrap().paging_strategy(), PagingStrategy::Offset);
}

#[test]
fn reference_capability_needs_a_key() {
    let mut options = ResolverOptions::default();
    options.reference_by.toggle.enabled = Some(true);
    assert!(matches!(compose(options), Err(ConfigError::Contradictory(_))));

    let mut keyed = ResolverOptions::default();
    keyed.reference_by.key = Some("id".into());
    let resolver = compose(keyed).unwrap();
    assert_eq!(operation_names(&resolver)[0], "resolveReference");
    assert!(resolver.shapes().iter().any(|s| s.name == "TodoItemReference"));
}

#[test]
fn relations_need_their_related_shape() {
    let err = ResolverFactory::new()
        .create_resolver(AutoResolverConfig::new(
            todo_shape(),
            ResolverSource::Service(Arc::new(todo_service(todo_records()))),
        ))
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingReference { kind: "shape", .. }));

    let mut options = ResolverOptions::default();
    options.relations.toggle.disabled = true;
    let resolver = ResolverFactory::new()
        .create_resolver(
            AutoResolverConfig::new(todo_shape(), ResolverSource::Service(Arc::new(todo_service(todo_records()))))
                .with_options(options),
        )
        .unwrap();
    assert!(resolver.relations().is_none());
}

#[test]
fn many_relations_register_their_paging_shapes() {
    let resolver = compose(ResolverOptions {
        enable_total_count: true,
        enable_aggregate: true,
        ..ResolverOptions::default()
    })
    .unwrap();
    let names: Vec<&str> = resolver.shapes().iter().map(|s| s.name.as_str()).collect();
    for expected in ["SubTaskFilter", "SubTaskSort", "SubTaskConnection", "SubTaskAggregateResponse"] {
        assert!(names.contains(&expected), "missing {}", expected);
    }
    let connection = resolver.shapes().iter().find(|s| s.name == "SubTaskConnection").unwrap();
    assert!(connection.fields.iter().any(|f| f.name == "totalCount"));
    assert_eq!(
        &operation_names(&resolver)[..2],
        &["TodoItem.subTasks", "TodoItem.subTasksAggregate"]
    );
}
