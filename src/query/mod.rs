//! Generic query model: filters, sorting, paging and aggregates over records
//! described by a [`crate::config::DataShape`].

pub mod aggregate;
mod args;
pub mod comparison;
pub mod cursor;
pub mod filter;
pub mod paging;
pub mod sort;

pub use aggregate::{AggregateQuery, AggregateResponse};
pub use args::{CursorPaging, OffsetPaging, Paging, PagingArgs, Query, QueryArgs};
pub use comparison::{ComparisonBuilder, ComparisonOperator, ComparisonShape};
pub use filter::{FieldComparison, Filter, FilterShape};
pub use paging::{Connection, Edge, OffsetConnection, Page, PageInfo, PageLimits, Pager, PagingStrategy};
pub use sort::{SortDirection, SortField, SortNulls};
