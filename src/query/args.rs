use crate::query::{Filter, SortField};
use serde::{Deserialize, Serialize};

/// Persistence-level window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// What a [`crate::service::DataService`] receives.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub filter: Filter,
    pub sorting: Vec<SortField>,
    pub paging: Paging,
}

impl Query {
    pub fn filtered(filter: Filter) -> Self {
        Query {
            filter,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CursorPaging {
    pub first: Option<i64>,
    pub after: Option<String>,
    pub last: Option<i64>,
    pub before: Option<String>,
}

impl CursorPaging {
    pub fn first(n: i64) -> Self {
        CursorPaging {
            first: Some(n),
            ..Self::default()
        }
    }

    pub fn last(n: i64) -> Self {
        CursorPaging {
            last: Some(n),
            ..Self::default()
        }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OffsetPaging {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl OffsetPaging {
    pub fn new(limit: i64, offset: i64) -> Self {
        OffsetPaging {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Caller paging arguments; which variant is valid depends on the resolver's strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PagingArgs {
    Cursor(CursorPaging),
    Offset(OffsetPaging),
}

/// Caller-level query-many arguments.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryArgs {
    pub filter: Filter,
    pub sorting: Vec<SortField>,
    pub paging: Option<PagingArgs>,
}

impl QueryArgs {
    pub fn filtered(filter: Filter) -> Self {
        QueryArgs {
            filter,
            ..Self::default()
        }
    }

    pub fn sorted(mut self, sorting: Vec<SortField>) -> Self {
        self.sorting = sorting;
        self
    }

    pub fn cursor(mut self, paging: CursorPaging) -> Self {
        self.paging = Some(PagingArgs::Cursor(paging));
        self
    }

    pub fn offset(mut self, paging: OffsetPaging) -> Self {
        self.paging = Some(PagingArgs::Offset(paging));
        self
    }
}
