use super::builder::{Capability, ResolverBuilder};
use super::{args, CapabilityKind, GeneratedShape, Operation, OperationDescriptor, OperationRole, ResolverCore};
use crate::auth::{apply_decision, RequestContext};
use crate::case::to_pascal_case;
use crate::config::{DataShape, OperationOptions, RelationDescriptor, RelationKind};
use crate::error::{ConfigError, ResolverError};
use crate::query::aggregate::aggregate_records;
use crate::query::paging::{per_parent, CursorPager, OffsetPager};
use crate::query::sort::check_sorting;
use crate::query::{
    AggregateQuery, AggregateResponse, Filter, FilterShape, Page, PageLimits, Pager, PagingStrategy, Query, QueryArgs,
};
use crate::service::RelationResult;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// One `<Name>.<relation>` operation per relation of the shape. Many-relations
/// page like the resolver's own reads and, with `enable_aggregate`, also get
/// `<Name>.<relation>Aggregate`.
pub struct Relatable;

impl Capability for Relatable {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Relations
    }

    fn apply(self: Box<Self>, mut builder: ResolverBuilder) -> Result<ResolverBuilder, ConfigError> {
        let options = builder.options().relations.clone();
        if !options.toggle.resolve("relations", true)? {
            return Ok(builder);
        }
        if let Some(unknown) = options.relations.keys().find(|k| builder.shape().relation(k).is_none()) {
            return Err(ConfigError::MissingReference {
                kind: "relation",
                id: format!("{}.{}", builder.shape().name, unknown),
            });
        }
        let strategy = builder.options().effective_paging_strategy()?;
        let with_total_count = builder.options().enable_total_count;
        let with_aggregate = builder.options().enable_aggregate;
        let limits = PageLimits {
            default_size: builder.options().default_result_size,
            max_size: builder.options().max_results_size,
        };

        let mut bindings = Vec::new();
        let relations = builder.shape().relations.clone();
        for relation in relations {
            let related = builder.related_shape(&relation.related).cloned().ok_or_else(|| {
                ConfigError::MissingReference {
                    kind: "shape",
                    id: format!("{} (relation {}.{})", relation.related, builder.shape().name, relation.name),
                }
            })?;
            let related_type = to_pascal_case(&relation.related);
            let filter_shape = Arc::new(FilterShape::for_shape(&related, &related_type, builder.comparisons())?);
            let output = match relation.kind {
                RelationKind::One => related_type.clone(),
                RelationKind::Many => match strategy {
                    PagingStrategy::Cursor => format!("{}Connection", related_type),
                    PagingStrategy::Offset => format!("{}OffsetConnection", related_type),
                },
            };
            let descriptor = OperationDescriptor::query(
                format!("{}.{}", builder.type_name(), relation.name),
                CapabilityKind::Relations,
                OperationRole::Relation(relation.name.clone()),
            )
            .input(filter_shape.name.as_str())
            .output(output.as_str());
            let op_options = options.relations.get(&relation.name).cloned().unwrap_or_default();
            let Some(op) = builder.add_operation(descriptor, &op_options)? else {
                continue;
            };
            builder.register_shape(GeneratedShape::filter(&filter_shape))?;

            let mut pager: Option<Box<dyn Pager>> = None;
            let mut aggregate = None;
            if relation.kind == RelationKind::Many {
                builder.register_shape(GeneratedShape::sort(&related_type))?;
                builder.register_shape(GeneratedShape::connection(&output, &related_type, strategy, with_total_count))?;
                let many: Box<dyn Pager> = match strategy {
                    PagingStrategy::Cursor => Box::new(CursorPager::new(related.clone(), limits, with_total_count)),
                    PagingStrategy::Offset => Box::new(OffsetPager::new(limits, with_total_count)),
                };
                pager = Some(many);
                if with_aggregate {
                    let response = GeneratedShape::aggregate(&related_type);
                    let descriptor = OperationDescriptor::query(
                        format!("{}.{}Aggregate", builder.type_name(), relation.name),
                        CapabilityKind::Relations,
                        OperationRole::RelationAggregate(relation.name.clone()),
                    )
                    .input(filter_shape.name.as_str())
                    .output(format!("[{}]", response.name));
                    let aggregate_options = OperationOptions {
                        name: None,
                        ..op_options.clone()
                    };
                    aggregate = builder.add_operation(descriptor, &aggregate_options)?;
                    builder.register_shape(response)?;
                }
            }
            bindings.push(RelationBinding {
                descriptor: relation,
                op,
                aggregate,
                related,
                filter_shape,
                pager,
            });
        }
        if bindings.is_empty() {
            return Ok(builder);
        }
        builder.relations = Some(RelationsCapability {
            core: builder.core(),
            bindings,
        });
        Ok(builder)
    }
}

struct RelationBinding {
    descriptor: RelationDescriptor,
    op: Operation,
    aggregate: Option<Operation>,
    related: Arc<DataShape>,
    filter_shape: Arc<FilterShape>,
    /// Many-relations only.
    pager: Option<Box<dyn Pager>>,
}

pub struct RelationsCapability {
    core: Arc<ResolverCore>,
    bindings: Vec<RelationBinding>,
}

impl RelationsCapability {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.descriptor.name.as_str())
    }

    pub fn descriptor(&self, relation: &str) -> Option<&RelationDescriptor> {
        self.binding(relation).ok().map(|b| &b.descriptor)
    }

    fn binding(&self, relation: &str) -> Result<&RelationBinding, ResolverError> {
        self.bindings
            .iter()
            .find(|b| b.descriptor.name == relation)
            .ok_or_else(|| ResolverError::UnknownOperation(format!("{}: no relation '{}'", self.core.id, relation)))
    }

    fn parent_ids(&self, op: &Operation, parents: &[Value]) -> Result<Vec<Value>, ResolverError> {
        parents
            .iter()
            .map(|p| {
                self.core.shape.record_id(p).cloned().ok_or_else(|| {
                    ResolverError::Validation(format!(
                        "{}: parent record has no '{}'",
                        op.name(),
                        self.core.shape.primary_key
                    ))
                })
            })
            .collect()
    }

    /// Guards and interceptors of `op`, then the authorizer's relation filter.
    async fn admit(&self, op: &Operation, relation: &str, ctx: &RequestContext) -> Result<Filter, ResolverError> {
        op.run_hooks(&self.core, ctx).await?;
        match &self.core.authorizer {
            Some(authorizer) => apply_decision(authorizer.authorize_relation(ctx, relation).await, op.name()),
            None => Ok(Filter::default()),
        }
    }

    /// Related records of every parent in one batched service call, keyed by
    /// [`crate::config::id_key`] of the parent id. `query.paging` applies per parent.
    pub async fn find_relation(
        &self,
        relation: &str,
        parents: &[Value],
        query: Query,
        ctx: &RequestContext,
    ) -> Result<HashMap<String, RelationResult>, ResolverError> {
        let binding = self.binding(relation)?;
        binding.filter_shape.check(&query.filter)?;
        check_sorting(&binding.related, &query.sorting)?;
        let ids = self.parent_ids(&binding.op, parents)?;
        let restriction = self.admit(&binding.op, relation, ctx).await?;
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = Query {
            filter: query.filter.merge_and(restriction),
            ..query
        };
        self.core.service.find_relation(relation, &ids, &query).await
    }

    /// One page of a many-relation per parent, in the resolver's paging strategy.
    pub async fn page_relation(
        &self,
        relation: &str,
        parents: &[Value],
        args: QueryArgs,
        ctx: &RequestContext,
    ) -> Result<HashMap<String, Page>, ResolverError> {
        let binding = self.binding(relation)?;
        let pager = binding.pager.as_ref().ok_or_else(|| {
            ResolverError::Validation(format!("{}: '{}' is not a many relation", self.core.id, relation))
        })?;
        binding.filter_shape.check(&args.filter)?;
        check_sorting(&binding.related, &args.sorting)?;
        let ids = self.parent_ids(&binding.op, parents)?;
        let restriction = self.admit(&binding.op, relation, ctx).await?;
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let filter = args.filter.merge_and(restriction);
        pager
            .page_relation(self.core.service.as_ref(), relation, &ids, filter, args.sorting, args.paging.as_ref())
            .await
    }

    /// Aggregates over each parent's related records; one row per group.
    pub async fn aggregate_relation(
        &self,
        relation: &str,
        parents: &[Value],
        filter: Filter,
        query: AggregateQuery,
        ctx: &RequestContext,
    ) -> Result<HashMap<String, Vec<AggregateResponse>>, ResolverError> {
        let binding = self.binding(relation)?;
        let op = binding.aggregate.as_ref().ok_or_else(|| {
            ResolverError::UnknownOperation(format!("{}: no aggregate for relation '{}'", self.core.id, relation))
        })?;
        binding.filter_shape.check(&filter)?;
        query.check(&binding.related)?;
        let ids = self.parent_ids(op, parents)?;
        let restriction = self.admit(op, relation, ctx).await?;
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let filter = filter.merge_and(restriction);
        let results = self
            .core
            .service
            .find_relation(relation, &ids, &Query::filtered(filter))
            .await?;
        Ok(per_parent(&ids, results)
            .into_iter()
            .map(|(key, records)| (key, aggregate_records(Some(&binding.related), &records, &query)))
            .collect())
    }

    /// `{parents: [record]}` or `{ids: [id]}`.
    fn parents(&self, args: &Value) -> Result<Vec<Value>, ResolverError> {
        match args::optional(args, "ids") {
            Some(_) => {
                let ids: Vec<Value> = args::typed(args, "ids")?;
                let pk = &self.core.shape.primary_key;
                Ok(ids
                    .into_iter()
                    .map(|id| Value::Object(Map::from_iter([(pk.clone(), id)])))
                    .collect())
            }
            None => args::typed(args, "parents"),
        }
    }

    /// Parents plus `filter`, `sorting` and `paging`. Many-relations answer with
    /// a page per parent, one-relations with the record or null.
    pub(crate) async fn invoke(&self, relation: &str, args: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        let binding = self.binding(relation)?;
        let query = args::query_args(&binding.filter_shape, &args)?;
        let parents = self.parents(&args)?;
        if binding.pager.is_some() {
            let pages = self.page_relation(relation, &parents, query, ctx).await?;
            return keyed(pages);
        }
        let query = Query {
            filter: query.filter,
            sorting: query.sorting,
            ..Query::default()
        };
        let results = self.find_relation(relation, &parents, query, ctx).await?;
        keyed(results)
    }

    pub(crate) async fn invoke_aggregate(&self, relation: &str, args: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        let binding = self.binding(relation)?;
        let filter = args::filter(&binding.filter_shape, &args)?;
        let query: AggregateQuery = args::typed(&args, "aggregate")?;
        let parents = self.parents(&args)?;
        keyed(self.aggregate_relation(relation, &parents, filter, query, ctx).await?)
    }
}

fn keyed<T: serde::Serialize>(results: HashMap<String, T>) -> Result<Value, ResolverError> {
    let out: Map<String, Value> = results
        .into_iter()
        .map(|(id, result)| args::to_json(&result).map(|v| (id, v)))
        .collect::<Result<_, _>>()?;
    Ok(Value::Object(out))
}
