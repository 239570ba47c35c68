//! Resolver composition.
//!
//! Capability modules ([`Capability`]) are applied in a fixed order onto a
//! [`ResolverBuilder`]; each contributes operations, the shapes those
//! operations use, and a typed handle. The composed [`Resolver`] is immutable
//! and can be shared across requests.

mod aggregate;
mod args;
mod builder;
mod create;
mod delete;
mod read;
mod reference;
mod relations;
pub mod shapes;
mod update;

pub use aggregate::{AggregateCapability, Aggregateable};
pub use builder::{federated_capabilities, standard_capabilities, Capability, ResolverBuilder};
pub use create::{CreateCapability, Creatable};
pub use delete::{DeleteCapability, Deleteable};
pub use read::{ReadCapability, Readable};
pub use reference::{ReferenceCapability, Referenceable};
pub use relations::{Relatable, RelationsCapability};
pub use shapes::{ContainerOverride, GeneratedShape, InputField, InputShape, ShapeKind};
pub use update::{UpdateCapability, Updateable};

pub(crate) use builder::compose;

use crate::auth::{apply_decision, Authorizer, RequestContext};
use crate::case::ShapeNames;
use crate::config::{DataShape, OperationOptions, ResolverOptions};
use crate::error::{ConfigError, ResolverError};
use crate::events::{EventPublisher, ResolverEvent};
use crate::query::{ComparisonBuilder, Filter, FilterShape};
use crate::service::DataService;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Reference,
    Relations,
    Aggregate,
    Create,
    Read,
    Update,
    Delete,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Reference => "reference",
            CapabilityKind::Relations => "relations",
            CapabilityKind::Aggregate => "aggregate",
            CapabilityKind::Create => "create",
            CapabilityKind::Read => "read",
            CapabilityKind::Update => "update",
            CapabilityKind::Delete => "delete",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Mutation,
}

/// What an operation does, independent of its (possibly overridden) name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationRole {
    QueryMany,
    QueryOne,
    CreateOne,
    CreateMany,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
    Aggregate,
    Relation(String),
    RelationAggregate(String),
    ResolveReference,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub kind: OperationKind,
    pub capability: CapabilityKind,
    #[serde(skip)]
    pub role: OperationRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    pub output: String,
}

impl OperationDescriptor {
    pub(crate) fn query(name: impl Into<String>, capability: CapabilityKind, role: OperationRole) -> Self {
        Self::new(name.into(), OperationKind::Query, capability, role)
    }

    pub(crate) fn mutation(name: impl Into<String>, capability: CapabilityKind, role: OperationRole) -> Self {
        Self::new(name.into(), OperationKind::Mutation, capability, role)
    }

    fn new(name: String, kind: OperationKind, capability: CapabilityKind, role: OperationRole) -> Self {
        OperationDescriptor {
            name,
            kind,
            capability,
            role,
            input: None,
            output: String::new(),
        }
    }

    pub(crate) fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub(crate) fn output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }
}

/// State shared by every capability handle of one resolver.
pub(crate) struct ResolverCore {
    pub(crate) id: String,
    pub(crate) shape: Arc<DataShape>,
    pub(crate) names: ShapeNames,
    pub(crate) service: Arc<dyn DataService>,
    pub(crate) authorizer: Option<Arc<dyn Authorizer>>,
    pub(crate) publisher: Option<Arc<dyn EventPublisher>>,
    pub(crate) filter_shape: Arc<FilterShape>,
}

impl ResolverCore {
    pub(crate) fn new(
        id: String,
        shape: Arc<DataShape>,
        options: &ResolverOptions,
        service: Arc<dyn DataService>,
        comparisons: &ComparisonBuilder,
    ) -> Result<Self, ConfigError> {
        let names = ShapeNames::new(options.dto_name.as_deref().unwrap_or(&shape.name));
        let filter_shape = Arc::new(FilterShape::for_shape(&shape, &names.pascal, comparisons)?);
        Ok(ResolverCore {
            id,
            shape,
            names,
            service,
            authorizer: None,
            publisher: None,
            filter_shape,
        })
    }

    pub(crate) fn type_name(&self) -> &str {
        &self.names.pascal
    }

    /// Publish `name` when `enabled`. Publisher failures are logged, never returned.
    pub(crate) async fn publish(&self, enabled: bool, name: String, payload: Value) {
        let Some(publisher) = self.publisher.as_ref().filter(|_| enabled) else {
            return;
        };
        let event = ResolverEvent {
            name,
            resolver: self.id.clone(),
            payload,
        };
        let event_name = event.name.clone();
        if let Err(e) = publisher.publish(event).await {
            tracing::warn!(resolver = %self.id, event = %event_name, error = %e, "event publication failed");
        }
    }
}

/// One enabled operation: its descriptor plus the merged guards and interceptors.
pub(crate) struct Operation {
    pub(crate) descriptor: OperationDescriptor,
    options: OperationOptions,
}

impl Operation {
    pub(crate) fn new(descriptor: OperationDescriptor, options: OperationOptions) -> Self {
        Operation { descriptor, options }
    }

    pub(crate) fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Guards, then interceptors, then the authorizer. Returns the filter to
    /// AND into the request.
    pub(crate) async fn admit(&self, core: &ResolverCore, ctx: &RequestContext) -> Result<Filter, ResolverError> {
        self.run_hooks(core, ctx).await?;
        match &core.authorizer {
            Some(authorizer) => apply_decision(authorizer.authorize(ctx, &self.descriptor).await, self.name()),
            None => Ok(Filter::default()),
        }
    }

    /// Guards and interceptors only.
    pub(crate) async fn run_hooks(&self, core: &ResolverCore, ctx: &RequestContext) -> Result<(), ResolverError> {
        let name = self.name();
        tracing::debug!(resolver = %core.id, operation = %name, principal = ?ctx.principal, "admit");
        for guard in &self.options.guards {
            if !guard.can_activate(ctx, name) {
                tracing::warn!(resolver = %core.id, operation = %name, "guard rejected request");
                return Err(ResolverError::Authorization(format!("{}: rejected by guard", name)));
            }
        }
        for interceptor in &self.options.interceptors {
            interceptor.intercept(ctx, name).await?;
        }
        Ok(())
    }
}

/// Operation handle of a capability, or `UnknownOperation` when it was disabled.
pub(crate) fn enabled<'a>(op: &'a Option<Operation>, core: &ResolverCore, what: &str) -> Result<&'a Operation, ResolverError> {
    op.as_ref()
        .ok_or_else(|| ResolverError::UnknownOperation(format!("{}: {} is disabled", core.id, what)))
}

/// A composed resolver: the operations and shapes of its enabled capabilities.
pub struct Resolver {
    core: Arc<ResolverCore>,
    operations: Vec<OperationDescriptor>,
    shapes: Vec<GeneratedShape>,
    reference: Option<ReferenceCapability>,
    relations: Option<RelationsCapability>,
    aggregate: Option<AggregateCapability>,
    create: Option<CreateCapability>,
    read: Option<ReadCapability>,
    update: Option<UpdateCapability>,
    delete: Option<DeleteCapability>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("id", &self.core.id)
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn id(&self) -> &str {
        &self.core.id
    }

    pub fn shape(&self) -> &Arc<DataShape> {
        &self.core.shape
    }

    /// Generated type name: the `dto_name` override or the shape name.
    pub fn type_name(&self) -> &str {
        self.core.type_name()
    }

    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|o| o.name == name)
    }

    pub fn shapes(&self) -> &[GeneratedShape] {
        &self.shapes
    }

    pub fn reference(&self) -> Option<&ReferenceCapability> {
        self.reference.as_ref()
    }

    pub fn relations(&self) -> Option<&RelationsCapability> {
        self.relations.as_ref()
    }

    pub fn aggregate(&self) -> Option<&AggregateCapability> {
        self.aggregate.as_ref()
    }

    pub fn create(&self) -> Option<&CreateCapability> {
        self.create.as_ref()
    }

    pub fn read(&self) -> Option<&ReadCapability> {
        self.read.as_ref()
    }

    pub fn update(&self) -> Option<&UpdateCapability> {
        self.update.as_ref()
    }

    pub fn delete(&self) -> Option<&DeleteCapability> {
        self.delete.as_ref()
    }

    /// Dispatch a call by operation name with JSON arguments.
    pub async fn invoke(&self, name: &str, args: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        let descriptor = self
            .operation(name)
            .ok_or_else(|| ResolverError::UnknownOperation(format!("{}.{}", self.core.id, name)))?;
        let span = tracing::info_span!("operation", resolver = %self.core.id, operation = %name);
        self.dispatch(&descriptor.role, args, ctx).instrument(span).await
    }

    async fn dispatch(&self, role: &OperationRole, args: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        let missing = || ResolverError::UnknownOperation(format!("{}: {:?}", self.core.id, role));
        match role {
            OperationRole::QueryMany | OperationRole::QueryOne => {
                self.read.as_ref().ok_or_else(missing)?.invoke(role, args, ctx).await
            }
            OperationRole::CreateOne | OperationRole::CreateMany => {
                self.create.as_ref().ok_or_else(missing)?.invoke(role, args, ctx).await
            }
            OperationRole::UpdateOne | OperationRole::UpdateMany => {
                self.update.as_ref().ok_or_else(missing)?.invoke(role, args, ctx).await
            }
            OperationRole::DeleteOne | OperationRole::DeleteMany => {
                self.delete.as_ref().ok_or_else(missing)?.invoke(role, args, ctx).await
            }
            OperationRole::Aggregate => self.aggregate.as_ref().ok_or_else(missing)?.invoke(args, ctx).await,
            OperationRole::Relation(relation) => {
                self.relations.as_ref().ok_or_else(missing)?.invoke(relation, args, ctx).await
            }
            OperationRole::RelationAggregate(relation) => {
                self.relations
                    .as_ref()
                    .ok_or_else(missing)?
                    .invoke_aggregate(relation, args, ctx)
                    .await
            }
            OperationRole::ResolveReference => self.reference.as_ref().ok_or_else(missing)?.invoke(args, ctx).await,
        }
    }
}
