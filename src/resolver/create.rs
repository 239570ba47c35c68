use super::builder::{Capability, ResolverBuilder};
use super::{
    args, enabled, CapabilityKind, GeneratedShape, InputShape, Operation, OperationDescriptor, OperationRole,
    ResolverCore, ShapeKind,
};
use crate::auth::RequestContext;
use crate::error::{ConfigError, ResolverError};
use crate::query::Filter;
use crate::service::InputValidator;
use serde_json::Value;
use std::sync::Arc;

/// `createOne<Name>` and `createMany<Plural>`.
pub struct Creatable;

impl Capability for Creatable {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Create
    }

    fn apply(self: Box<Self>, mut builder: ResolverBuilder) -> Result<ResolverBuilder, ConfigError> {
        let options = builder.options().create.clone();
        if !options.toggle.resolve("create", true)? {
            return Ok(builder);
        }
        let names = builder.names().clone();
        let input = match options.input {
            Some(input) => {
                input.check_override(builder.shape(), true)?;
                input
            }
            None => InputShape::create_for(builder.shape(), &names.pascal),
        };

        let one = builder.add_operation(
            OperationDescriptor::mutation(format!("createOne{}", names.pascal), CapabilityKind::Create, OperationRole::CreateOne)
                .input(input.name.as_str())
                .output(names.pascal.as_str()),
            &options.create_one,
        )?;
        let many = builder.add_operation(
            OperationDescriptor::mutation(
                format!("createMany{}", names.pascal_plural),
                CapabilityKind::Create,
                OperationRole::CreateMany,
            )
            .input(input.name.as_str())
            .output(format!("[{}]", names.pascal)),
            &options.create_many,
        )?;
        if one.is_none() && many.is_none() {
            return Ok(builder);
        }
        let generated = GeneratedShape::input(&input, builder.shape(), ShapeKind::CreateInput);
        builder.register_shape(generated)?;

        let subscriptions = options
            .enable_subscriptions
            .unwrap_or(builder.options().enable_subscriptions);
        builder.create = Some(CreateCapability {
            core: builder.core(),
            one,
            many,
            input,
            subscriptions,
        });
        Ok(builder)
    }
}

pub struct CreateCapability {
    core: Arc<ResolverCore>,
    one: Option<Operation>,
    many: Option<Operation>,
    input: InputShape,
    subscriptions: bool,
}

impl CreateCapability {
    pub fn input_shape(&self) -> &InputShape {
        &self.input
    }

    pub async fn create_one(&self, record: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        let op = enabled(&self.one, &self.core, "create one")?;
        InputValidator::validate_create(&self.core.shape, &self.input, &record)?;
        let restriction = op.admit(&self.core, ctx).await?;
        check_allowed(op, &self.core, &restriction, &record)?;
        let created = self.core.service.create_one(record).await?;
        self.created(&created).await;
        Ok(created)
    }

    /// Every record is validated before any is written.
    pub async fn create_many(&self, records: Vec<Value>, ctx: &RequestContext) -> Result<Vec<Value>, ResolverError> {
        let op = enabled(&self.many, &self.core, "create many")?;
        if records.is_empty() {
            return Err(ResolverError::Validation(format!("{}: input must not be empty", op.name())));
        }
        for record in &records {
            InputValidator::validate_create(&self.core.shape, &self.input, record)?;
        }
        let restriction = op.admit(&self.core, ctx).await?;
        for record in &records {
            check_allowed(op, &self.core, &restriction, record)?;
        }
        let created = self.core.service.create_many(records).await?;
        for record in &created {
            self.created(record).await;
        }
        Ok(created)
    }

    async fn created(&self, record: &Value) {
        let name = format!("created{}", self.core.names.pascal);
        self.core.publish(self.subscriptions, name, record.clone()).await;
    }

    pub(crate) async fn invoke(&self, role: &OperationRole, args: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        match role {
            OperationRole::CreateMany => {
                let records: Vec<Value> = args::typed(&args, "input")?;
                Ok(Value::Array(self.create_many(records, ctx).await?))
            }
            _ => self.create_one(args::required(&args, "input")?.clone(), ctx).await,
        }
    }
}

/// A restricted caller may only create records inside its restriction.
fn check_allowed(op: &Operation, core: &ResolverCore, restriction: &Filter, record: &Value) -> Result<(), ResolverError> {
    if restriction.is_empty() || restriction.matches_in(&core.shape, record) {
        return Ok(());
    }
    tracing::warn!(operation = %op.name(), "record outside the caller's authorized filter");
    Err(ResolverError::Authorization(format!(
        "{}: record is outside the authorized filter",
        op.name()
    )))
}
