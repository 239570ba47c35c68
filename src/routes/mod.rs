//! Router builders.

mod common;
mod resolver;

pub use common::common_routes;
pub use resolver::{resolver_routes, resolver_routes_with_limit, DEFAULT_BODY_LIMIT};
