use super::builder::{Capability, ResolverBuilder};
use super::{args, enabled, CapabilityKind, GeneratedShape, Operation, OperationDescriptor, OperationRole, ResolverCore};
use crate::auth::RequestContext;
use crate::error::{ConfigError, ResolverError};
use crate::query::paging::{CursorPager, OffsetPager};
use crate::query::sort::check_sorting;
use crate::query::{Filter, Page, PageLimits, Pager, PagingStrategy, Query, QueryArgs};
use serde_json::Value;
use std::sync::Arc;

/// Query many (`<plural>`) and query one (`<singular>`).
pub struct Readable;

impl Capability for Readable {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Read
    }

    fn apply(self: Box<Self>, mut builder: ResolverBuilder) -> Result<ResolverBuilder, ConfigError> {
        let options = builder.options().read.clone();
        if !options.toggle.resolve("read", true)? {
            return Ok(builder);
        }
        let strategy = builder.options().effective_paging_strategy()?;
        let with_total_count = builder.options().enable_total_count;
        let type_name = builder.type_name().to_string();
        let names = builder.names().clone();
        let container = match &options.connection {
            Some(c) if c.strategy != strategy => {
                return Err(ConfigError::IncompatiblePaging(format!(
                    "container {} is a {} container but {} pages by {}",
                    c.name, c.strategy, type_name, strategy
                )))
            }
            Some(c) => c.name.clone(),
            None => match strategy {
                PagingStrategy::Cursor => format!("{}Connection", type_name),
                PagingStrategy::Offset => format!("{}OffsetConnection", type_name),
            },
        };
        let filter_name = builder.filter_shape().name.clone();

        let many = builder.add_operation(
            OperationDescriptor::query(names.plural.as_str(), CapabilityKind::Read, OperationRole::QueryMany)
                .input(filter_name)
                .output(container.as_str()),
            &options.query_many,
        )?;
        let one = builder.add_operation(
            OperationDescriptor::query(names.singular.as_str(), CapabilityKind::Read, OperationRole::QueryOne)
                .output(type_name.as_str()),
            &options.query_one,
        )?;
        if many.is_none() && one.is_none() {
            return Ok(builder);
        }
        if many.is_some() {
            let filter = GeneratedShape::filter(builder.filter_shape());
            builder.register_shape(filter)?;
            builder.register_shape(GeneratedShape::sort(&type_name))?;
            builder.register_shape(GeneratedShape::connection(
                &container,
                &type_name,
                strategy,
                with_total_count,
            ))?;
        }

        let limits = PageLimits {
            default_size: builder.options().default_result_size,
            max_size: builder.options().max_results_size,
        };
        let pager: Box<dyn Pager> = match strategy {
            PagingStrategy::Cursor => Box::new(CursorPager::new(builder.shape().clone(), limits, with_total_count)),
            PagingStrategy::Offset => Box::new(OffsetPager::new(limits, with_total_count)),
        };
        builder.read = Some(ReadCapability {
            core: builder.core(),
            many,
            one,
            pager,
        });
        Ok(builder)
    }
}

pub struct ReadCapability {
    core: Arc<ResolverCore>,
    many: Option<Operation>,
    one: Option<Operation>,
    pager: Box<dyn Pager>,
}

impl ReadCapability {
    pub fn paging_strategy(&self) -> PagingStrategy {
        self.pager.strategy()
    }

    /// One page of records matching `args.filter`, in the requested order.
    pub async fn query_many(&self, args: QueryArgs, ctx: &RequestContext) -> Result<Page, ResolverError> {
        let op = enabled(&self.many, &self.core, "query many")?;
        self.core.filter_shape.check(&args.filter)?;
        check_sorting(&self.core.shape, &args.sorting)?;
        let restriction = op.admit(&self.core, ctx).await?;
        let filter = args.filter.merge_and(restriction);
        self.pager
            .page(self.core.service.as_ref(), filter, args.sorting, args.paging.as_ref())
            .await
    }

    /// The record with primary key `id`, if it exists and is visible to the caller.
    pub async fn find_by_id(&self, id: &Value, ctx: &RequestContext) -> Result<Option<Value>, ResolverError> {
        let op = enabled(&self.one, &self.core, "query one")?;
        let restriction = op.admit(&self.core, ctx).await?;
        find_visible(&self.core, id, restriction).await
    }

    /// Like [`Self::find_by_id`], but `NotFound` when absent.
    pub async fn get_by_id(&self, id: &Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        self.find_by_id(id, ctx)
            .await?
            .ok_or_else(|| ResolverError::NotFound(format!("{} {}", self.core.type_name(), id)))
    }

    pub(crate) async fn invoke(&self, role: &OperationRole, args: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        match role {
            OperationRole::QueryMany => {
                let query = args::query_args(&self.core.filter_shape, &args)?;
                args::to_json(&self.query_many(query, ctx).await?)
            }
            _ => self.get_by_id(args::required(&args, "id")?, ctx).await,
        }
    }
}

/// Lookup by id that honours an authorizer restriction.
pub(crate) async fn find_visible(core: &ResolverCore, id: &Value, restriction: Filter) -> Result<Option<Value>, ResolverError> {
    if restriction.is_empty() {
        return core.service.find_by_id(id).await;
    }
    let filter = Filter::eq(core.shape.primary_key.clone(), id.clone()).merge_and(restriction);
    core.service.query_one(&Query::filtered(filter)).await
}
