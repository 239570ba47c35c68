mod common;

use architect_query::query::{CursorPaging, OffsetPaging, Page, QueryArgs, SortField};
use architect_query::resolver::OperationDescriptor;
use architect_query::{
    AuthorizationDecision, Authorizer, AutoResolverConfig, Filter, OperationOptions, PagingStrategy, RequestContext,
    Resolver, ResolverError, ResolverFactory, ResolverOptions, ResolverSource,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{counted_resolver, sub_task_shape, todo_records, todo_resolver, todo_service, todo_shape, CountingService};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn ids(page: &Page) -> Vec<i64> {
    page.nodes().iter().filter_map(|n| n["id"].as_i64()).collect()
}

struct FixedAuthorizer(AuthorizationDecision);

#[async_trait]
impl Authorizer for FixedAuthorizer {
    async fn authorize(&self, _ctx: &RequestContext, _operation: &OperationDescriptor) -> AuthorizationDecision {
        self.0.clone()
    }
}

fn authorized_resolver(decision: AuthorizationDecision) -> (Resolver, Arc<CountingService>) {
    let counting = Arc::new(CountingService::new(Arc::new(todo_service(todo_records()))));
    let resolver = ResolverFactory::new()
        .with_shape(sub_task_shape())
        .with_authorizer("TodoItem", Arc::new(FixedAuthorizer(decision)))
        .create_resolver(AutoResolverConfig::new(
            todo_shape(),
            ResolverSource::Service(counting.clone()),
        ))
        .unwrap();
    (resolver, counting)
}

#[tokio::test]
async fn first_page_of_a_filtered_query() {
    let resolver = todo_resolver(ResolverOptions::default());
    let read = resolver.read().unwrap();
    let args = QueryArgs::filtered(Filter::eq("title", "foo")).cursor(CursorPaging::first(1));
    let page = read.query_many(args, &RequestContext::anonymous()).await.unwrap();
    let connection = page.into_connection().unwrap();
    assert_eq!(connection.edges.len(), 1);
    assert_eq!(connection.edges[0].node["title"], json!("foo"));
    assert!(!connection.page_info.has_next_page);
    assert!(!connection.page_info.has_previous_page);
    assert_eq!(connection.page_info.end_cursor.as_deref(), Some(connection.edges[0].cursor.as_str()));
    assert_eq!(connection.total_count, None);
}

#[tokio::test]
async fn default_page_size_applies_without_paging() {
    let options = ResolverOptions {
        default_result_size: 3,
        ..ResolverOptions::default()
    };
    let resolver = todo_resolver(options);
    let page = resolver
        .read()
        .unwrap()
        .query_many(QueryArgs::default(), &RequestContext::anonymous())
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![1, 2, 3]);
    assert!(page.has_next_page());
}

#[tokio::test]
async fn invalid_paging_never_reaches_the_service() {
    let (resolver, counting) = counted_resolver(ResolverOptions::default());
    let read = resolver.read().unwrap();
    let ctx = RequestContext::anonymous();
    for paging in [
        CursorPaging::first(-1),
        CursorPaging::first(1).before("abc"),
        CursorPaging {
            first: Some(1),
            last: Some(1),
            ..CursorPaging::default()
        },
    ] {
        let err = read
            .query_many(QueryArgs::default().cursor(paging), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::InvalidPagingArguments(_)), "{:?}", err);
    }
    let err = read
        .query_many(QueryArgs::default().offset(OffsetPaging::new(2, 0)), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::InvalidPagingArguments(_)));

    let err = resolver
        .invoke("todoItems", json!({"paging": {"first": 1, "limit": 1}}), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::InvalidPagingArguments(_)));
    assert_eq!(counting.calls(), 0);
}

#[tokio::test]
async fn forged_and_reused_cursors_are_rejected() {
    let (resolver, counting) = counted_resolver(ResolverOptions::default());
    let read = resolver.read().unwrap();
    let ctx = RequestContext::anonymous();

    let forged = [
        json!({"type": "keyset", "fields": [{"field": "id", "value": {"x": [1]}}]}),
        json!({"type": "keyset", "fields": [{"field": "id", "value": {"x": [1]}, "direction": "ASC", "nulls": "NULLS_LAST"}]}),
        json!({"type": "keyset", "fields": [{"field": "id", "value": "7", "direction": "ASC", "nulls": "NULLS_LAST"}]}),
    ];
    for payload in forged {
        let cursor = STANDARD.encode(payload.to_string());
        let err = read
            .query_many(QueryArgs::default().cursor(CursorPaging::first(2).after(cursor)), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::InvalidPagingArguments(_)), "{:?}", err);
    }
    assert_eq!(counting.calls(), 0);

    let ascending = read
        .query_many(
            QueryArgs::default().sorted(vec![SortField::asc("title")]).cursor(CursorPaging::first(2)),
            &ctx,
        )
        .await
        .unwrap()
        .into_connection()
        .unwrap();
    let cursor = ascending.page_info.end_cursor.unwrap();
    let calls = counting.calls();
    let err = read
        .query_many(
            QueryArgs::default()
                .sorted(vec![SortField::desc("title")])
                .cursor(CursorPaging::first(2).after(cursor)),
            &ctx,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::InvalidPagingArguments(_)));
    assert_eq!(counting.calls(), calls);
}

#[tokio::test]
async fn date_like_titles_walk_in_text_order() {
    let records = vec![
        json!({"id": 1, "title": "2024-01-02", "completed": false}),
        json!({"id": 2, "title": "2024-01-01T00:00:00+05:00", "completed": false}),
        json!({"id": 3, "title": "2024-01-01", "completed": false}),
        json!({"id": 4, "title": "next", "completed": false}),
    ];
    let resolver = ResolverFactory::new()
        .with_shape(sub_task_shape())
        .create_resolver(AutoResolverConfig::new(
            todo_shape(),
            ResolverSource::Service(Arc::new(todo_service(records))),
        ))
        .unwrap();
    let read = resolver.read().unwrap();
    let ctx = RequestContext::anonymous();
    let sorting = vec![SortField::asc("title")];

    let mut walked = Vec::new();
    let mut paging = CursorPaging::first(1);
    loop {
        let page = read
            .query_many(QueryArgs::default().sorted(sorting.clone()).cursor(paging.clone()), &ctx)
            .await
            .unwrap()
            .into_connection()
            .unwrap();
        walked.extend(page.edges.iter().filter_map(|e| e.node["id"].as_i64()));
        if !page.page_info.has_next_page {
            break;
        }
        paging = CursorPaging::first(1).after(page.page_info.end_cursor.clone().unwrap());
    }
    assert_eq!(walked, vec![3, 2, 1, 4]);

    let same_day = read
        .query_many(QueryArgs::filtered(Filter::eq("title", "2024-01-01")), &ctx)
        .await
        .unwrap();
    assert_eq!(ids(&same_day), vec![3]);
}

#[tokio::test]
async fn forward_walk_has_no_gaps_or_overlaps() {
    let resolver = todo_resolver(ResolverOptions::default());
    let read = resolver.read().unwrap();
    let ctx = RequestContext::anonymous();
    let sorting = vec![SortField::desc("priority")];

    let everything = read
        .query_many(QueryArgs::default().sorted(sorting.clone()).cursor(CursorPaging::first(100)), &ctx)
        .await
        .unwrap();
    assert_eq!(everything.nodes().len(), 7);

    let mut walked = Vec::new();
    let mut paging = CursorPaging::first(2);
    loop {
        let page = read
            .query_many(QueryArgs::default().sorted(sorting.clone()).cursor(paging.clone()), &ctx)
            .await
            .unwrap()
            .into_connection()
            .unwrap();
        assert!(page.edges.len() <= 2);
        walked.extend(page.edges.iter().filter_map(|e| e.node["id"].as_i64()));
        if !page.page_info.has_next_page {
            break;
        }
        let cursor = page.page_info.end_cursor.clone().unwrap();
        paging = CursorPaging::first(2).after(cursor);
    }
    assert_eq!(walked, ids(&everything));
}

#[tokio::test]
async fn backward_walk_has_no_gaps_or_overlaps() {
    let resolver = todo_resolver(ResolverOptions::default());
    let read = resolver.read().unwrap();
    let ctx = RequestContext::anonymous();
    let sorting = vec![SortField::asc("title")];

    let everything = read
        .query_many(QueryArgs::default().sorted(sorting.clone()).cursor(CursorPaging::first(100)), &ctx)
        .await
        .unwrap();

    let mut walked: Vec<i64> = Vec::new();
    let mut paging = CursorPaging::last(3);
    loop {
        let page = read
            .query_many(QueryArgs::default().sorted(sorting.clone()).cursor(paging.clone()), &ctx)
            .await
            .unwrap()
            .into_connection()
            .unwrap();
        let mut chunk: Vec<i64> = page.edges.iter().filter_map(|e| e.node["id"].as_i64()).collect();
        chunk.extend(walked);
        walked = chunk;
        if !page.page_info.has_previous_page {
            break;
        }
        let cursor = page.page_info.start_cursor.clone().unwrap();
        paging = CursorPaging::last(3).before(cursor);
    }
    assert_eq!(walked, ids(&everything));
}

#[tokio::test]
async fn offset_paging_with_total_count() {
    let options = ResolverOptions {
        paging_strategy: Some(PagingStrategy::Offset),
        enable_total_count: true,
        ..ResolverOptions::default()
    };
    let resolver = todo_resolver(options);
    let read = resolver.read().unwrap();
    let page = read
        .query_many(
            QueryArgs::default().offset(OffsetPaging::new(3, 3)),
            &RequestContext::anonymous(),
        )
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![4, 5, 6]);
    assert!(page.has_next_page());
    assert!(page.has_previous_page());
    assert_eq!(page.total_count(), Some(7));

    let value = resolver
        .invoke(
            "todoItems",
            json!({"filter": {"completed": {"is": true}}, "paging": {"limit": 10}}),
            &RequestContext::anonymous(),
        )
        .await
        .unwrap();
    assert_eq!(value["totalCount"], json!(3));
    assert_eq!(value["pageInfo"]["hasNextPage"], json!(false));
    assert_eq!(value["nodes"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn unknown_filter_and_sort_fields_are_rejected() {
    let (resolver, counting) = counted_resolver(ResolverOptions::default());
    let read = resolver.read().unwrap();
    let ctx = RequestContext::anonymous();
    let err = read
        .query_many(QueryArgs::filtered(Filter::eq("owner", "me")), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::Validation(_)));
    let err = read
        .query_many(QueryArgs::default().sorted(vec![SortField::asc("owner")]), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::Validation(_)));
    assert_eq!(counting.calls(), 0);
}

#[tokio::test]
async fn lookups_by_id() {
    let resolver = todo_resolver(ResolverOptions::default());
    let read = resolver.read().unwrap();
    let ctx = RequestContext::anonymous();

    let first = read.get_by_id(&json!(3), &ctx).await.unwrap();
    let second = read.get_by_id(&json!(3), &ctx).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first["title"], json!("baz"));

    assert_eq!(read.find_by_id(&json!(99), &ctx).await.unwrap(), None);
    let err = read.get_by_id(&json!(99), &ctx).await.unwrap_err();
    assert!(matches!(err, ResolverError::NotFound(_)));

    let value = resolver.invoke("todoItem", json!({"id": 2}), &ctx).await.unwrap();
    assert_eq!(value["title"], json!("bar"));
    let err = resolver.invoke("todoItem", json!({}), &ctx).await.unwrap_err();
    assert!(matches!(err, ResolverError::Validation(_)));
}

#[tokio::test]
async fn restricted_reads_only_see_matching_records() {
    let (resolver, _) = authorized_resolver(AuthorizationDecision::Restrict(Filter::eq("completed", true)));
    let read = resolver.read().unwrap();
    let ctx = RequestContext::for_principal("alice");
    let page = read
        .query_many(QueryArgs::default().cursor(CursorPaging::first(10)), &ctx)
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![2, 4, 7]);

    // caller filters are ANDed with the restriction
    let page = read
        .query_many(QueryArgs::filtered(Filter::eq("priority", 1)), &ctx)
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![2]);

    assert_eq!(read.find_by_id(&json!(1), &ctx).await.unwrap(), None);
    assert!(read.find_by_id(&json!(4), &ctx).await.unwrap().is_some());
    assert!(matches!(
        read.get_by_id(&json!(1), &ctx).await,
        Err(ResolverError::NotFound(_))
    ));
}

#[tokio::test]
async fn denied_reads_never_reach_the_service() {
    let (resolver, counting) = authorized_resolver(AuthorizationDecision::Deny("not yours".into()));
    let read = resolver.read().unwrap();
    let ctx = RequestContext::for_principal("mallory");
    let err = read.query_many(QueryArgs::default(), &ctx).await.unwrap_err();
    assert!(matches!(err, ResolverError::Authorization(_)));
    let err = read.get_by_id(&json!(1), &ctx).await.unwrap_err();
    assert!(matches!(err, ResolverError::Authorization(_)));
    assert_eq!(counting.calls(), 0);
}

struct CountingInterceptor(Arc<AtomicUsize>);

#[async_trait]
impl architect_query::Interceptor for CountingInterceptor {
    async fn intercept(&self, _ctx: &RequestContext, _operation: &str) -> Result<(), ResolverError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn guards_run_before_interceptors() {
    let intercepted = Arc::new(AtomicUsize::new(0));
    let mut options = ResolverOptions::default();
    options.read.query_many = OperationOptions::default()
        .with_guard(|ctx: &RequestContext, _operation: &str| ctx.principal.is_some())
        .with_interceptor(CountingInterceptor(intercepted.clone()));
    let (resolver, counting) = counted_resolver(options);
    let read = resolver.read().unwrap();

    let err = read
        .query_many(QueryArgs::default(), &RequestContext::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::Authorization(_)));
    assert_eq!(intercepted.load(Ordering::SeqCst), 0);
    assert_eq!(counting.calls(), 0);

    let page = read
        .query_many(QueryArgs::default(), &RequestContext::for_principal("alice"))
        .await
        .unwrap();
    assert_eq!(page.nodes().len(), 7);
    assert_eq!(intercepted.load(Ordering::SeqCst), 1);

    // query one has no guard
    let found: Value = read.get_by_id(&json!(1), &RequestContext::anonymous()).await.unwrap();
    assert_eq!(found["id"], json!(1));
}

#[tokio::test]
async fn disabled_operations_are_unknown() {
    let mut options = ResolverOptions::default();
    options.read.query_many = OperationOptions::disabled();
    let resolver = todo_resolver(options);
    let ctx = RequestContext::anonymous();
    let err = resolver
        .read()
        .unwrap()
        .query_many(QueryArgs::default(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::UnknownOperation(_)));
    let err = resolver.invoke("todoItems", json!({}), &ctx).await.unwrap_err();
    assert!(matches!(err, ResolverError::UnknownOperation(_)));
    assert!(resolver.invoke("todoItem", json!({"id": 1}), &ctx).await.is_ok());
}
