use super::builder::{Capability, ResolverBuilder};
use super::read::find_visible;
use super::{args, enabled, CapabilityKind, GeneratedShape, Operation, OperationDescriptor, OperationRole, ResolverCore};
use crate::auth::RequestContext;
use crate::error::{ConfigError, ResolverError};
use crate::query::Filter;
use crate::service::DeleteManyResponse;
use serde_json::{json, Value};
use std::sync::Arc;

/// `deleteOne<Name>` and `deleteMany<Plural>`.
pub struct Deleteable;

impl Capability for Deleteable {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Delete
    }

    fn apply(self: Box<Self>, mut builder: ResolverBuilder) -> Result<ResolverBuilder, ConfigError> {
        let options = builder.options().delete.clone();
        if !options.toggle.resolve("delete", true)? {
            return Ok(builder);
        }
        let names = builder.names().clone();
        let filter_name = builder.filter_shape().name.clone();

        let one = builder.add_operation(
            OperationDescriptor::mutation(format!("deleteOne{}", names.pascal), CapabilityKind::Delete, OperationRole::DeleteOne)
                .output(names.pascal.as_str()),
            &options.delete_one,
        )?;
        let many = builder.add_operation(
            OperationDescriptor::mutation(
                format!("deleteMany{}", names.pascal_plural),
                CapabilityKind::Delete,
                OperationRole::DeleteMany,
            )
            .input(filter_name)
            .output("DeleteManyResponse"),
            &options.delete_many,
        )?;
        if one.is_none() && many.is_none() {
            return Ok(builder);
        }
        if many.is_some() {
            let filter = GeneratedShape::filter(builder.filter_shape());
            builder.register_shape(filter)?;
        }

        let subscriptions = options
            .enable_subscriptions
            .unwrap_or(builder.options().enable_subscriptions);
        builder.delete = Some(DeleteCapability {
            core: builder.core(),
            one,
            many,
            subscriptions,
        });
        Ok(builder)
    }
}

pub struct DeleteCapability {
    core: Arc<ResolverCore>,
    one: Option<Operation>,
    many: Option<Operation>,
    subscriptions: bool,
}

impl DeleteCapability {
    /// Deletes and returns the record with primary key `id`.
    pub async fn delete_one(&self, id: &Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        let op = enabled(&self.one, &self.core, "delete one")?;
        let restriction = op.admit(&self.core, ctx).await?;
        if !restriction.is_empty() && find_visible(&self.core, id, restriction).await?.is_none() {
            return Err(ResolverError::NotFound(format!("{} {}", self.core.type_name(), id)));
        }
        let deleted = self.core.service.delete_one(id).await?;
        let name = format!("deletedOne{}", self.core.names.pascal);
        self.core.publish(self.subscriptions, name, deleted.clone()).await;
        Ok(deleted)
    }

    /// Deletes every record matching `filter`, which must not be empty.
    pub async fn delete_many(&self, filter: Filter, ctx: &RequestContext) -> Result<DeleteManyResponse, ResolverError> {
        let op = enabled(&self.many, &self.core, "delete many")?;
        if filter.is_empty() {
            return Err(ResolverError::Validation(format!("{}: filter must not be empty", op.name())));
        }
        self.core.filter_shape.check(&filter)?;
        let restriction = op.admit(&self.core, ctx).await?;
        let filter = filter.merge_and(restriction);
        let response = self.core.service.delete_many(&filter).await?;
        let name = format!("deletedMany{}", self.core.names.pascal_plural);
        let payload = json!({"filter": filter.to_value(), "deletedCount": response.deleted_count});
        self.core.publish(self.subscriptions, name, payload).await;
        Ok(response)
    }

    pub(crate) async fn invoke(&self, role: &OperationRole, args: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        match role {
            OperationRole::DeleteMany => {
                let filter = args::filter(&self.core.filter_shape, &args)?;
                args::to_json(&self.delete_many(filter, ctx).await?)
            }
            _ => self.delete_one(args::required(&args, "id")?, ctx).await,
        }
    }
}
