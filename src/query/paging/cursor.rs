use super::{invalid, per_parent, Connection, Edge, Page, PageInfo, PageLimits, Pager, PagingStrategy};
use crate::config::DataShape;
use crate::error::ResolverError;
use crate::query::cursor::{decode_cursor, encode_cursor, keyset_filter};
use crate::query::sort::with_tiebreaker;
use crate::query::{CursorPaging, Filter, Paging, PagingArgs, Query, SortField};
use crate::service::DataService;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Keyset paging over `first`/`after` and `last`/`before`.
pub struct CursorPager {
    shape: Arc<DataShape>,
    limits: PageLimits,
    with_total_count: bool,
}

/// A validated request: what to fetch and how to wrap it.
struct CursorWindow {
    ordering: Vec<SortField>,
    backward: bool,
    size: usize,
    has_cursor: bool,
    query: Query,
}

impl CursorWindow {
    fn connection(&self, mut records: Vec<Value>, total_count: Option<u64>) -> Page {
        let has_more = records.len() > self.size;
        records.truncate(self.size);
        if self.backward {
            records.reverse();
        }
        let edges: Vec<Edge> = records
            .into_iter()
            .map(|node| Edge {
                cursor: encode_cursor(&node, &self.ordering),
                node,
            })
            .collect();
        let (has_next_page, has_previous_page) = if self.backward {
            (self.has_cursor, has_more)
        } else {
            (has_more, self.has_cursor)
        };
        let page_info = PageInfo {
            has_next_page,
            has_previous_page,
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
        };
        Page::Cursor(Connection {
            edges,
            page_info,
            total_count,
        })
    }
}

impl CursorPager {
    /// Pages records of `shape`; its primary key breaks ties and its field
    /// types check cursor values.
    pub fn new(shape: Arc<DataShape>, limits: PageLimits, with_total_count: bool) -> Self {
        CursorPager {
            shape,
            limits,
            with_total_count,
        }
    }

    fn arguments(paging: Option<&PagingArgs>) -> Result<CursorPaging, ResolverError> {
        let args = match paging {
            None => return Ok(CursorPaging::default()),
            Some(PagingArgs::Cursor(args)) => args.clone(),
            Some(PagingArgs::Offset(o)) if o.is_empty() => return Ok(CursorPaging::default()),
            Some(PagingArgs::Offset(_)) => return Err(invalid("limit/offset paging is not supported here; use first/after or last/before")),
        };
        if args.first.is_some() && args.last.is_some() {
            return Err(invalid("cannot combine first and last"));
        }
        if args.first.is_some_and(|n| n < 0) || args.last.is_some_and(|n| n < 0) {
            return Err(invalid("first and last must not be negative"));
        }
        if args.after.is_some() && args.before.is_some() {
            return Err(invalid("cannot combine after and before"));
        }
        if args.first.is_some() && args.before.is_some() {
            return Err(invalid("cannot combine first with before"));
        }
        if args.last.is_some() && args.after.is_some() {
            return Err(invalid("cannot combine last with after"));
        }
        Ok(args)
    }

    fn window(&self, filter: &Filter, sorting: &[SortField], paging: Option<&PagingArgs>) -> Result<CursorWindow, ResolverError> {
        let args = Self::arguments(paging)?;
        let ordering = with_tiebreaker(sorting, &self.shape.primary_key);
        let backward = args.last.is_some() || args.before.is_some();
        let size = self.limits.window(args.first.or(args.last));
        let cursor = args.after.as_deref().or(args.before.as_deref());

        let mut page_filter = filter.clone();
        if let Some(cursor) = cursor {
            let position = decode_cursor(cursor, &ordering, &self.shape)?;
            page_filter = page_filter.merge_and(keyset_filter(&position, &ordering, !backward));
        }
        let query_sorting = if backward {
            ordering.iter().map(SortField::reversed).collect()
        } else {
            ordering.clone()
        };
        Ok(CursorWindow {
            query: Query {
                filter: page_filter,
                sorting: query_sorting,
                paging: Paging {
                    limit: Some(size as u64 + 1),
                    offset: None,
                },
            },
            ordering,
            backward,
            size,
            has_cursor: cursor.is_some(),
        })
    }
}

#[async_trait]
impl Pager for CursorPager {
    fn strategy(&self) -> PagingStrategy {
        PagingStrategy::Cursor
    }

    async fn page(
        &self,
        service: &dyn DataService,
        filter: Filter,
        sorting: Vec<SortField>,
        paging: Option<&PagingArgs>,
    ) -> Result<Page, ResolverError> {
        let window = self.window(&filter, &sorting, paging)?;
        let records = service.query(&window.query).await?;
        let total_count = if self.with_total_count {
            Some(service.count(&filter).await?)
        } else {
            None
        };
        Ok(window.connection(records, total_count))
    }

    async fn page_relation(
        &self,
        service: &dyn DataService,
        relation: &str,
        parent_ids: &[Value],
        filter: Filter,
        sorting: Vec<SortField>,
        paging: Option<&PagingArgs>,
    ) -> Result<HashMap<String, Page>, ResolverError> {
        let window = self.window(&filter, &sorting, paging)?;
        let results = service.find_relation(relation, parent_ids, &window.query).await?;
        let counts = if self.with_total_count {
            Some(service.count_relation(relation, parent_ids, &filter).await?)
        } else {
            None
        };
        Ok(per_parent(parent_ids, results)
            .into_iter()
            .map(|(key, records)| {
                let total = counts.as_ref().map(|c| c.get(&key).copied().unwrap_or(0));
                let page = window.connection(records, total);
                (key, page)
            })
            .collect())
    }
}
