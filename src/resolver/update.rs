use super::builder::{Capability, ResolverBuilder};
use super::read::find_visible;
use super::{
    args, enabled, CapabilityKind, GeneratedShape, InputShape, Operation, OperationDescriptor, OperationRole,
    ResolverCore, ShapeKind,
};
use crate::auth::RequestContext;
use crate::error::{ConfigError, ResolverError};
use crate::query::Filter;
use crate::service::{InputValidator, UpdateManyResponse};
use serde_json::{json, Value};
use std::sync::Arc;

/// `updateOne<Name>` and `updateMany<Plural>`.
pub struct Updateable;

impl Capability for Updateable {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Update
    }

    fn apply(self: Box<Self>, mut builder: ResolverBuilder) -> Result<ResolverBuilder, ConfigError> {
        let options = builder.options().update.clone();
        if !options.toggle.resolve("update", true)? {
            return Ok(builder);
        }
        let names = builder.names().clone();
        let input = match options.input {
            Some(input) => {
                input.check_override(builder.shape(), false)?;
                input
            }
            None => InputShape::update_for(builder.shape(), &names.pascal),
        };

        let one = builder.add_operation(
            OperationDescriptor::mutation(format!("updateOne{}", names.pascal), CapabilityKind::Update, OperationRole::UpdateOne)
                .input(input.name.as_str())
                .output(names.pascal.as_str()),
            &options.update_one,
        )?;
        let many = builder.add_operation(
            OperationDescriptor::mutation(
                format!("updateMany{}", names.pascal_plural),
                CapabilityKind::Update,
                OperationRole::UpdateMany,
            )
            .input(input.name.as_str())
            .output("UpdateManyResponse"),
            &options.update_many,
        )?;
        if one.is_none() && many.is_none() {
            return Ok(builder);
        }
        let generated = GeneratedShape::input(&input, builder.shape(), ShapeKind::UpdateInput);
        builder.register_shape(generated)?;
        if many.is_some() {
            let filter = GeneratedShape::filter(builder.filter_shape());
            builder.register_shape(filter)?;
        }

        let subscriptions = options
            .enable_subscriptions
            .unwrap_or(builder.options().enable_subscriptions);
        builder.update = Some(UpdateCapability {
            core: builder.core(),
            one,
            many,
            input,
            subscriptions,
        });
        Ok(builder)
    }
}

pub struct UpdateCapability {
    core: Arc<ResolverCore>,
    one: Option<Operation>,
    many: Option<Operation>,
    input: InputShape,
    subscriptions: bool,
}

impl UpdateCapability {
    pub fn input_shape(&self) -> &InputShape {
        &self.input
    }

    /// Partial update of the record with primary key `id`.
    pub async fn update_one(&self, id: &Value, update: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        let op = enabled(&self.one, &self.core, "update one")?;
        InputValidator::validate_update(&self.core.shape, &self.input, &update)?;
        let restriction = op.admit(&self.core, ctx).await?;
        if !restriction.is_empty() && find_visible(&self.core, id, restriction).await?.is_none() {
            return Err(ResolverError::NotFound(format!("{} {}", self.core.type_name(), id)));
        }
        let updated = self.core.service.update_one(id, update).await?;
        let name = format!("updatedOne{}", self.core.names.pascal);
        self.core.publish(self.subscriptions, name, updated.clone()).await;
        Ok(updated)
    }

    /// Applies `update` to every record matching `filter`, which must not be empty.
    pub async fn update_many(
        &self,
        filter: Filter,
        update: Value,
        ctx: &RequestContext,
    ) -> Result<UpdateManyResponse, ResolverError> {
        let op = enabled(&self.many, &self.core, "update many")?;
        if filter.is_empty() {
            return Err(ResolverError::Validation(format!("{}: filter must not be empty", op.name())));
        }
        self.core.filter_shape.check(&filter)?;
        InputValidator::validate_update(&self.core.shape, &self.input, &update)?;
        let restriction = op.admit(&self.core, ctx).await?;
        let filter = filter.merge_and(restriction);
        let response = self.core.service.update_many(&filter, update.clone()).await?;
        let name = format!("updatedMany{}", self.core.names.pascal_plural);
        let payload = json!({"filter": filter.to_value(), "update": update, "updatedCount": response.updated_count});
        self.core.publish(self.subscriptions, name, payload).await;
        Ok(response)
    }

    pub(crate) async fn invoke(&self, role: &OperationRole, args: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        let update = args::required(&args, "update")?.clone();
        match role {
            OperationRole::UpdateMany => {
                let filter = args::filter(&self.core.filter_shape, &args)?;
                args::to_json(&self.update_many(filter, update, ctx).await?)
            }
            _ => self.update_one(args::required(&args, "id")?, update, ctx).await,
        }
    }
}
