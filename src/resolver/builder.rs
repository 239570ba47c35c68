use super::{
    AggregateCapability, Aggregateable, CreateCapability, Creatable, DeleteCapability, Deleteable, GeneratedShape,
    Operation, OperationDescriptor, ReadCapability, Readable, ReferenceCapability, Referenceable, Relatable,
    RelationsCapability, Resolver, ResolverCore, UpdateCapability, Updateable,
};
use crate::case::ShapeNames;
use crate::config::{DataShape, OperationOptions, ResolverOptions};
use crate::error::ConfigError;
use crate::query::{ComparisonBuilder, FilterShape};
use std::collections::HashMap;
use std::sync::Arc;

/// A capability module: extends the builder with its operations and shapes,
/// or returns it unchanged when disabled.
pub trait Capability: Send {
    fn kind(&self) -> super::CapabilityKind;

    fn apply(self: Box<Self>, builder: ResolverBuilder) -> Result<ResolverBuilder, ConfigError>;
}

/// Reference, relations, aggregate, create, read, update, delete.
pub fn standard_capabilities() -> Vec<Box<dyn Capability>> {
    vec![
        Box::new(Referenceable),
        Box::new(Relatable),
        Box::new(Aggregateable),
        Box::new(Creatable),
        Box::new(Readable),
        Box::new(Updateable),
        Box::new(Deleteable),
    ]
}

pub fn federated_capabilities() -> Vec<Box<dyn Capability>> {
    vec![Box::new(Referenceable)]
}

/// Accumulates operations, shapes and capability handles during composition.
pub struct ResolverBuilder {
    core: Arc<ResolverCore>,
    options: ResolverOptions,
    comparisons: Arc<ComparisonBuilder>,
    related: HashMap<String, Arc<DataShape>>,
    operations: Vec<OperationDescriptor>,
    shapes: Vec<GeneratedShape>,
    pub(crate) reference: Option<ReferenceCapability>,
    pub(crate) relations: Option<RelationsCapability>,
    pub(crate) aggregate: Option<AggregateCapability>,
    pub(crate) create: Option<CreateCapability>,
    pub(crate) read: Option<ReadCapability>,
    pub(crate) update: Option<UpdateCapability>,
    pub(crate) delete: Option<DeleteCapability>,
}

impl ResolverBuilder {
    pub(crate) fn new(
        core: Arc<ResolverCore>,
        options: ResolverOptions,
        comparisons: Arc<ComparisonBuilder>,
        related: HashMap<String, Arc<DataShape>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ResolverBuilder {
            core,
            options,
            comparisons,
            related,
            operations: Vec::new(),
            shapes: Vec::new(),
            reference: None,
            relations: None,
            aggregate: None,
            create: None,
            read: None,
            update: None,
            delete: None,
        };
        let output = GeneratedShape::output(&builder.core.shape, builder.core.type_name());
        builder.register_shape(output)?;
        Ok(builder)
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn shape(&self) -> &Arc<DataShape> {
        &self.core.shape
    }

    pub fn names(&self) -> &ShapeNames {
        &self.core.names
    }

    pub fn type_name(&self) -> &str {
        self.core.type_name()
    }

    pub fn filter_shape(&self) -> &Arc<FilterShape> {
        &self.core.filter_shape
    }

    /// Operations registered by the modules applied so far.
    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.iter().any(|o| o.name == name)
    }

    pub fn shapes(&self) -> &[GeneratedShape] {
        &self.shapes
    }

    pub(crate) fn core(&self) -> Arc<ResolverCore> {
        self.core.clone()
    }

    pub(crate) fn comparisons(&self) -> &ComparisonBuilder {
        &self.comparisons
    }

    /// Data shape of a relation's target, when the factory knows it.
    pub(crate) fn related_shape(&self, name: &str) -> Option<&Arc<DataShape>> {
        self.related.get(name)
    }

    pub fn register_operation(&mut self, descriptor: OperationDescriptor) -> Result<(), ConfigError> {
        if let Some(existing) = self.operations.iter().find(|o| o.name == descriptor.name) {
            return Err(ConfigError::DuplicateOperation {
                name: descriptor.name,
                existing: existing.capability.to_string(),
                incoming: descriptor.capability.to_string(),
            });
        }
        self.operations.push(descriptor);
        Ok(())
    }

    /// Identical definitions under one name are registered once.
    pub fn register_shape(&mut self, shape: GeneratedShape) -> Result<(), ConfigError> {
        match self.shapes.iter().find(|s| s.name == shape.name) {
            Some(existing) if *existing == shape => Ok(()),
            Some(_) => Err(ConfigError::DuplicateShape(shape.name)),
            None => {
                self.shapes.push(shape);
                Ok(())
            }
        }
    }

    /// Register `descriptor` under its overridden name, unless the operation is disabled.
    pub(crate) fn add_operation(
        &mut self,
        mut descriptor: OperationDescriptor,
        options: &OperationOptions,
    ) -> Result<Option<Operation>, ConfigError> {
        if options.disabled {
            return Ok(None);
        }
        if let Some(name) = &options.name {
            descriptor.name = name.clone();
        }
        self.register_operation(descriptor.clone())?;
        Ok(Some(Operation::new(descriptor, self.options.merged(options))))
    }

    fn build(self) -> Resolver {
        tracing::info!(
            resolver = %self.core.id,
            operations = self.operations.len(),
            shapes = self.shapes.len(),
            "resolver composed"
        );
        Resolver {
            core: self.core,
            operations: self.operations,
            shapes: self.shapes,
            reference: self.reference,
            relations: self.relations,
            aggregate: self.aggregate,
            create: self.create,
            read: self.read,
            update: self.update,
            delete: self.delete,
        }
    }
}

/// Apply `capabilities` in order onto a fresh builder.
pub(crate) fn compose(
    core: ResolverCore,
    options: ResolverOptions,
    comparisons: Arc<ComparisonBuilder>,
    related: HashMap<String, Arc<DataShape>>,
    capabilities: Vec<Box<dyn Capability>>,
) -> Result<Resolver, ConfigError> {
    options.check_result_sizes()?;
    options.effective_paging_strategy()?;
    let mut builder = ResolverBuilder::new(Arc::new(core), options, comparisons, related)?;
    for capability in capabilities {
        tracing::debug!(resolver = %builder.core.id, capability = %capability.kind(), "applying capability");
        builder = capability.apply(builder)?;
    }
    Ok(builder.build())
}
