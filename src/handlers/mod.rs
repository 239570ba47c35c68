//! HTTP handlers for resolver discovery and invocation.

pub mod resolver;
pub use resolver::*;
