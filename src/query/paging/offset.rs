use super::{invalid, per_parent, OffsetConnection, OffsetPageInfo, Page, PageLimits, Pager, PagingStrategy};
use crate::error::ResolverError;
use crate::query::{Filter, OffsetPaging, Paging, PagingArgs, Query, SortField};
use crate::service::DataService;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// `limit`/`offset` paging.
pub struct OffsetPager {
    limits: PageLimits,
    with_total_count: bool,
}

impl OffsetPager {
    pub fn new(limits: PageLimits, with_total_count: bool) -> Self {
        OffsetPager {
            limits,
            with_total_count,
        }
    }

    fn arguments(paging: Option<&PagingArgs>) -> Result<OffsetPaging, ResolverError> {
        let args = match paging {
            None => return Ok(OffsetPaging::default()),
            Some(PagingArgs::Offset(args)) => args.clone(),
            Some(PagingArgs::Cursor(c)) if c.is_empty() => return Ok(OffsetPaging::default()),
            Some(PagingArgs::Cursor(_)) => return Err(invalid("cursor paging is not supported here; use limit/offset")),
        };
        if args.limit.is_some_and(|n| n < 0) {
            return Err(invalid("limit must not be negative"));
        }
        if args.offset.is_some_and(|n| n < 0) {
            return Err(invalid("offset must not be negative"));
        }
        Ok(args)
    }

    /// Window size, offset and the query fetching one record past the window.
    fn window(&self, filter: &Filter, sorting: Vec<SortField>, paging: Option<&PagingArgs>) -> Result<(usize, u64, Query), ResolverError> {
        let args = Self::arguments(paging)?;
        let limit = self.limits.window(args.limit);
        let offset = args.offset.unwrap_or(0) as u64;
        let query = Query {
            filter: filter.clone(),
            sorting,
            paging: Paging {
                limit: Some(limit as u64 + 1),
                offset: (offset > 0).then_some(offset),
            },
        };
        Ok((limit, offset, query))
    }
}

fn container(limit: usize, offset: u64, mut nodes: Vec<Value>, total_count: Option<u64>) -> Page {
    let has_next_page = nodes.len() > limit;
    nodes.truncate(limit);
    Page::Offset(OffsetConnection {
        nodes,
        page_info: OffsetPageInfo {
            has_next_page,
            has_previous_page: offset > 0,
        },
        total_count,
    })
}

#[async_trait]
impl Pager for OffsetPager {
    fn strategy(&self) -> PagingStrategy {
        PagingStrategy::Offset
    }

    async fn page(
        &self,
        service: &dyn DataService,
        filter: Filter,
        sorting: Vec<SortField>,
        paging: Option<&PagingArgs>,
    ) -> Result<Page, ResolverError> {
        let (limit, offset, query) = self.window(&filter, sorting, paging)?;
        let nodes = service.query(&query).await?;
        let total_count = if self.with_total_count {
            Some(service.count(&filter).await?)
        } else {
            None
        };
        Ok(container(limit, offset, nodes, total_count))
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
        let (limit, offset, query) = self.window(&filter, sorting, paging)?;
        let results = service.find_relation(relation, parent_ids, &query).await?;
        let counts = if self.with_total_count {
            Some(service.count_relation(relation, parent_ids, &filter).await?)
        } else {
            None
        };
        Ok(per_parent(parent_ids, results)
            .into_iter()
            .map(|(key, nodes)| {
                let total = counts.as_ref().map(|c| c.get(&key).copied().unwrap_or(0));
                let page = container(limit, offset, nodes, total);
                (key, page)
            })
            .collect())
    }
}
