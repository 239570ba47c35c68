//! Architect Query: composable CRUD resolvers generated from data-shape descriptors.

pub mod auth;
pub mod case;
pub mod config;
pub mod error;
pub mod events;
pub mod extractors;
pub mod factory;
pub mod handlers;
pub mod query;
pub mod resolver;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use auth::{AuthorizationDecision, Authorizer, Guard, Interceptor, RequestContext};
pub use config::{load_from_path, resolve, validate, DataShape, FullConfig, OperationOptions, ResolvedModel, ResolverOptions};
pub use error::{ConfigError, ResolverError};
pub use events::{BroadcastPublisher, EventPublisher, ResolverEvent};
pub use factory::{AutoResolverConfig, ResolverFactory, ResolverRegistry, ResolverSource};
pub use query::{CursorPaging, Filter, OffsetPaging, Page, PagingStrategy, QueryArgs, SortField};
pub use resolver::{CapabilityKind, OperationDescriptor, Resolver};
pub use routes::{common_routes, resolver_routes};
pub use service::{DataService, FieldMappingAssembler, MemoryDataService, PgDataService};
pub use state::AppState;
