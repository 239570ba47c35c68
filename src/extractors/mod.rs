//! Request extractors.

mod context;

pub use context::{Context, PRINCIPAL_ID_HEADER, REQUEST_ID_HEADER};
