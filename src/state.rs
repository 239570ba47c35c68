//! Shared application state for the HTTP adapter.

use crate::factory::ResolverRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Resolvers are composed once at startup and never change afterwards.
    pub registry: Arc<ResolverRegistry>,
}

impl AppState {
    pub fn new(registry: ResolverRegistry) -> Self {
        AppState {
            registry: Arc::new(registry),
        }
    }
}
