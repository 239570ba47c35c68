use super::builder::{Capability, ResolverBuilder};
use super::{args, CapabilityKind, GeneratedShape, Operation, OperationDescriptor, OperationRole, ResolverCore};
use crate::auth::RequestContext;
use crate::error::{ConfigError, ResolverError};
use crate::query::{AggregateQuery, AggregateResponse, Filter};
use serde_json::Value;
use std::sync::Arc;

/// `<singular>Aggregate`, off unless `enable_aggregate` or `aggregate.enabled` is set.
pub struct Aggregateable;

impl Capability for Aggregateable {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Aggregate
    }

    fn apply(self: Box<Self>, mut builder: ResolverBuilder) -> Result<ResolverBuilder, ConfigError> {
        let options = builder.options().aggregate.clone();
        let default = builder.options().enable_aggregate;
        if !options.toggle.resolve("aggregate", default)? {
            return Ok(builder);
        }
        let names = builder.names().clone();
        let response = GeneratedShape::aggregate(&names.pascal);
        let filter_name = builder.filter_shape().name.clone();
        let Some(op) = builder.add_operation(
            OperationDescriptor::query(
                format!("{}Aggregate", names.singular),
                CapabilityKind::Aggregate,
                OperationRole::Aggregate,
            )
            .input(filter_name)
            .output(format!("[{}]", response.name)),
            &options.aggregate,
        )?
        else {
            return Ok(builder);
        };
        let filter = GeneratedShape::filter(builder.filter_shape());
        builder.register_shape(filter)?;
        builder.register_shape(response)?;
        builder.aggregate = Some(AggregateCapability {
            core: builder.core(),
            op,
        });
        Ok(builder)
    }
}

pub struct AggregateCapability {
    core: Arc<ResolverCore>,
    op: Operation,
}

impl AggregateCapability {
    /// Aggregates over the records matching `filter`; one row per group.
    pub async fn aggregate(
        &self,
        filter: Filter,
        query: AggregateQuery,
        ctx: &RequestContext,
    ) -> Result<Vec<AggregateResponse>, ResolverError> {
        self.core.filter_shape.check(&filter)?;
        query.check(&self.core.shape)?;
        let restriction = self.op.admit(&self.core, ctx).await?;
        let filter = filter.merge_and(restriction);
        self.core.service.aggregate(&filter, &query).await
    }

    pub(crate) async fn invoke(&self, args: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        let filter = args::filter(&self.core.filter_shape, &args)?;
        let query: AggregateQuery = args::typed(&args, "aggregate")?;
        args::to_json(&self.aggregate(filter, query, ctx).await?)
    }
}
