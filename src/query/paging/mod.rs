//! Paging strategies. Each resolver has exactly one, fixed at composition time.

mod cursor;
mod offset;

pub use cursor::CursorPager;
pub use offset::OffsetPager;

use crate::error::ResolverError;
use crate::query::{Filter, PagingArgs, SortField};
use crate::service::DataService;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagingStrategy {
    #[default]
    Cursor,
    Offset,
}

impl fmt::Display for PagingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagingStrategy::Cursor => f.write_str("cursor"),
            PagingStrategy::Offset => f.write_str("offset"),
        }
    }
}

/// Window sizing shared by both strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageLimits {
    pub default_size: u32,
    pub max_size: u32,
}

impl PageLimits {
    /// Requested size, or the default; never above the maximum.
    pub fn window(&self, requested: Option<i64>) -> usize {
        let size = requested.unwrap_or(i64::from(self.default_size));
        size.clamp(0, i64::from(self.max_size)) as usize
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_cursor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub node: Value,
    pub cursor: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetPageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetConnection {
    pub nodes: Vec<Value>,
    pub page_info: OffsetPageInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

/// Result container of a query-many call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Page {
    Cursor(Connection),
    Offset(OffsetConnection),
}

impl Page {
    pub fn nodes(&self) -> Vec<&Value> {
        match self {
            Page::Cursor(c) => c.edges.iter().map(|e| &e.node).collect(),
            Page::Offset(o) => o.nodes.iter().collect(),
        }
    }

    pub fn has_next_page(&self) -> bool {
        match self {
            Page::Cursor(c) => c.page_info.has_next_page,
            Page::Offset(o) => o.page_info.has_next_page,
        }
    }

    pub fn has_previous_page(&self) -> bool {
        match self {
            Page::Cursor(c) => c.page_info.has_previous_page,
            Page::Offset(o) => o.page_info.has_previous_page,
        }
    }

    pub fn total_count(&self) -> Option<u64> {
        match self {
            Page::Cursor(c) => c.total_count,
            Page::Offset(o) => o.total_count,
        }
    }

    pub fn into_connection(self) -> Option<Connection> {
        match self {
            Page::Cursor(c) => Some(c),
            Page::Offset(_) => None,
        }
    }

    pub fn into_offset(self) -> Option<OffsetConnection> {
        match self {
            Page::Offset(o) => Some(o),
            Page::Cursor(_) => None,
        }
    }
}

/// Turns caller paging arguments into data-service queries and wraps the results.
///
/// Arguments are validated before the service is called.
#[async_trait]
pub trait Pager: Send + Sync {
    fn strategy(&self) -> PagingStrategy;

    async fn page(
        &self,
        service: &dyn DataService,
        filter: Filter,
        sorting: Vec<SortField>,
        paging: Option<&PagingArgs>,
    ) -> Result<Page, ResolverError>;

    /// One page of related records per parent, from a single batched
    /// `find_relation` call (and one `count_relation` call for total counts).
    /// Keyed by [`crate::config::id_key`]; every parent gets a page.
    async fn page_relation(
        &self,
        service: &dyn DataService,
        relation: &str,
        parent_ids: &[Value],
        filter: Filter,
        sorting: Vec<SortField>,
        paging: Option<&PagingArgs>,
    ) -> Result<HashMap<String, Page>, ResolverError>;
}

/// Related records of `parent_ids` from a `find_relation` result, in parent order.
pub(crate) fn per_parent(
    parent_ids: &[Value],
    mut results: HashMap<String, crate::service::RelationResult>,
) -> Vec<(String, Vec<Value>)> {
    parent_ids
        .iter()
        .map(|id| {
            let key = crate::config::id_key(id);
            let records = results.remove(&key).map(|r| r.into_records()).unwrap_or_default();
            (key, records)
        })
        .collect()
}

pub(crate) fn invalid(message: impl Into<String>) -> ResolverError {
    ResolverError::InvalidPagingArguments(message.into())
}
