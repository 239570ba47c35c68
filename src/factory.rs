//! Auto-resolver factory: one resolver per data shape, from one of four sources.

use crate::auth::Authorizer;
use crate::case::ShapeNames;
use crate::config::{DataShape, ResolvedModel, ResolverOptions, SourceKind};
use crate::error::ConfigError;
use crate::events::EventPublisher;
use crate::query::ComparisonBuilder;
use crate::resolver::{compose, federated_capabilities, standard_capabilities, Resolver, ResolverCore};
use crate::service::{Assembler, AssemblerDataService, DataService};
use std::collections::HashMap;
use std::sync::Arc;

/// Where a resolver's records come from.
#[derive(Clone)]
pub enum ResolverSource {
    /// The persistence service registered under `entity`.
    Entity { entity: String },
    /// The service registered under `entity`, mapped through `assembler`.
    Assembler {
        assembler: Arc<dyn Assembler>,
        entity: String,
    },
    /// A caller-supplied service, used as is.
    Service(Arc<dyn DataService>),
    /// Reference resolution only.
    Federated(Arc<dyn DataService>),
}

#[derive(Clone)]
pub struct AutoResolverConfig {
    pub shape: Arc<DataShape>,
    pub options: ResolverOptions,
    pub source: ResolverSource,
}

impl AutoResolverConfig {
    /// Entity source keyed by the shape name, default options.
    pub fn entity(shape: Arc<DataShape>) -> Self {
        let entity = shape.name.clone();
        AutoResolverConfig {
            shape,
            options: ResolverOptions::default(),
            source: ResolverSource::Entity { entity },
        }
    }

    pub fn new(shape: Arc<DataShape>, source: ResolverSource) -> Self {
        AutoResolverConfig {
            shape,
            options: ResolverOptions::default(),
            source,
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }
}

/// Composed resolvers by id. Ids are unique.
#[derive(Default, Debug)]
pub struct ResolverRegistry {
    resolvers: Vec<Arc<Resolver>>,
}

impl ResolverRegistry {
    pub fn insert(&mut self, resolver: Resolver) -> Result<Arc<Resolver>, ConfigError> {
        if self.get(resolver.id()).is_some() {
            return Err(ConfigError::DuplicateResolver(resolver.id().to_string()));
        }
        let resolver = Arc::new(resolver);
        self.resolvers.push(resolver.clone());
        Ok(resolver)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Resolver>> {
        self.resolvers.iter().find(|r| r.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Resolver>> {
        self.resolvers.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

/// Holds what resolvers are built from: persistence services by entity name,
/// known shapes (for relation filters), authorizers by shape name and an
/// optional event publisher. One comparison cache is shared by everything it builds.
#[derive(Default)]
pub struct ResolverFactory {
    comparisons: Arc<ComparisonBuilder>,
    entity_services: HashMap<String, Arc<dyn DataService>>,
    shapes: HashMap<String, Arc<DataShape>>,
    authorizers: HashMap<String, Arc<dyn Authorizer>>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl ResolverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_service(mut self, entity: impl Into<String>, service: Arc<dyn DataService>) -> Self {
        self.entity_services.insert(entity.into(), service);
        self
    }

    pub fn with_shape(mut self, shape: Arc<DataShape>) -> Self {
        self.shapes.insert(shape.name.clone(), shape);
        self
    }

    /// Authorizer injected into the resolver of `shape`.
    pub fn with_authorizer(mut self, shape: impl Into<String>, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizers.insert(shape.into(), authorizer);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn comparisons(&self) -> &ComparisonBuilder {
        &self.comparisons
    }

    fn entity_service(&self, entity: &str) -> Result<Arc<dyn DataService>, ConfigError> {
        self.entity_services
            .get(entity)
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "entity service",
                id: entity.to_string(),
            })
    }

    pub fn create_resolver(&self, config: AutoResolverConfig) -> Result<Resolver, ConfigError> {
        self.build(config, &self.shapes)
    }

    /// Build every resolver into a registry; duplicate ids are rejected. The
    /// shapes of the batch are known to each other's relations.
    pub fn create_resolvers(&self, configs: Vec<AutoResolverConfig>) -> Result<ResolverRegistry, ConfigError> {
        let mut related = self.shapes.clone();
        for config in &configs {
            related.insert(config.shape.name.clone(), config.shape.clone());
        }
        let mut registry = ResolverRegistry::default();
        for config in configs {
            registry.insert(self.build(config, &related)?)?;
        }
        Ok(registry)
    }

    /// Resolvers for every resolver entry of a loaded model. Every shape of the
    /// model is known for relation filters.
    pub fn create_from_model(&self, model: &ResolvedModel) -> Result<ResolverRegistry, ConfigError> {
        let mut related = self.shapes.clone();
        for shape in &model.shapes {
            related.insert(shape.name.clone(), shape.clone());
        }
        let mut registry = ResolverRegistry::default();
        for entry in &model.resolvers {
            let shape = model.shape(&entry.shape).cloned().ok_or_else(|| ConfigError::MissingReference {
                kind: "shape",
                id: entry.shape.clone(),
            })?;
            let entity = entry.entity.clone().unwrap_or_else(|| shape.name.clone());
            let source = match entry.source {
                SourceKind::Entity => ResolverSource::Entity { entity },
                SourceKind::Federated => ResolverSource::Federated(self.entity_service(&entity)?),
            };
            let config = AutoResolverConfig {
                shape,
                options: entry.options.clone(),
                source,
            };
            registry.insert(self.build(config, &related)?)?;
        }
        Ok(registry)
    }

    fn build(&self, config: AutoResolverConfig, related: &HashMap<String, Arc<DataShape>>) -> Result<Resolver, ConfigError> {
        let AutoResolverConfig {
            shape,
            mut options,
            source,
        } = config;
        let type_name = ShapeNames::new(options.dto_name.as_deref().unwrap_or(&shape.name)).pascal;
        let (id, service, capabilities) = match source {
            ResolverSource::Entity { entity } => {
                (format!("{}AutoResolver", type_name), self.entity_service(&entity)?, standard_capabilities())
            }
            ResolverSource::Assembler { assembler, entity } => {
                let inner = self.entity_service(&entity)?;
                let service: Arc<dyn DataService> = Arc::new(AssemblerDataService::new(assembler, inner));
                (format!("{}AutoResolver", type_name), service, standard_capabilities())
            }
            ResolverSource::Service(service) => (format!("{}AutoResolver", type_name), service, standard_capabilities()),
            ResolverSource::Federated(service) => {
                if options.reference_by.key.is_none() {
                    options.reference_by.key = Some(shape.primary_key.clone());
                }
                (format!("{}FederatedAutoResolver", type_name), service, federated_capabilities())
            }
        };
        let mut core = ResolverCore::new(id, shape.clone(), &options, service, &self.comparisons)?;
        core.authorizer = self.authorizers.get(&shape.name).cloned();
        core.publisher = self.publisher.clone();
        compose(core, options, self.comparisons.clone(), related.clone(), capabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldDescriptor, FieldType};
    use crate::resolver::CapabilityKind;
    use crate::service::MemoryDataService;

    fn shape() -> Arc<DataShape> {
        DataShape::builder("TodoItem")
            .field(FieldDescriptor::new("id", FieldType::Int))
            .field(FieldDescriptor::new("title", FieldType::String))
            .build()
            .unwrap()
    }

    #[test]
    fn missing_entity_service_is_a_config_error() {
        let err = ResolverFactory::new()
            .create_resolver(AutoResolverConfig::entity(shape()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingReference {
                kind: "entity service",
                id: "TodoItem".into()
            }
        );
    }

    #[test]
    fn federated_resolvers_only_resolve_references() {
        let shape = shape();
        let service = Arc::new(MemoryDataService::new(shape.clone()));
        let resolver = ResolverFactory::new()
            .create_resolver(AutoResolverConfig::new(shape, ResolverSource::Federated(service)))
            .unwrap();
        assert_eq!(resolver.id(), "TodoItemFederatedAutoResolver");
        let names: Vec<&str> = resolver.operations().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["resolveReference"]);
        assert_eq!(resolver.operations()[0].capability, CapabilityKind::Reference);
        assert!(resolver.read().is_none());
        assert_eq!(resolver.reference().map(|r| r.key()), Some("id"));
    }

    #[test]
    fn duplicate_resolver_ids_are_rejected() {
        let shape = shape();
        let service: Arc<dyn DataService> = Arc::new(MemoryDataService::new(shape.clone()));
        let factory = ResolverFactory::new().with_entity_service("TodoItem", service.clone());
        let err = factory
            .create_resolvers(vec![
                AutoResolverConfig::entity(shape.clone()),
                AutoResolverConfig::new(shape, ResolverSource::Service(service)),
            ])
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateResolver("TodoItemAutoResolver".into()));
    }

    #[test]
    fn comparison_shapes_are_shared_across_resolvers() {
        let todo = shape();
        let tag = DataShape::builder("Tag")
            .field(FieldDescriptor::new("id", FieldType::Int))
            .field(FieldDescriptor::new("label", FieldType::String))
            .build()
            .unwrap();
        let factory = ResolverFactory::new()
            .with_entity_service("TodoItem", Arc::new(MemoryDataService::new(todo.clone())))
            .with_entity_service("Tag", Arc::new(MemoryDataService::new(tag.clone())));
        factory
            .create_resolvers(vec![AutoResolverConfig::entity(todo), AutoResolverConfig::entity(tag)])
            .unwrap();
        // Int and String comparison shapes only
        assert_eq!(factory.comparisons().cached(), 2);
    }
}
