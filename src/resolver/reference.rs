use super::builder::{Capability, ResolverBuilder};
use super::read::find_visible;
use super::{CapabilityKind, GeneratedShape, Operation, OperationDescriptor, OperationRole, ResolverCore};
use crate::auth::RequestContext;
use crate::error::{ConfigError, ResolverError};
use crate::query::{Filter, Query};
use serde_json::Value;
use std::sync::Arc;

/// `resolveReference`: look a record up by its reference key.
pub struct Referenceable;

impl Capability for Referenceable {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Reference
    }

    fn apply(self: Box<Self>, mut builder: ResolverBuilder) -> Result<ResolverBuilder, ConfigError> {
        let options = builder.options().reference_by.clone();
        if !options.toggle.resolve("reference", options.key.is_some())? {
            return Ok(builder);
        }
        let key = options.key.ok_or_else(|| {
            ConfigError::Contradictory(format!("{}: reference enabled without a key", builder.type_name()))
        })?;
        let key_type = match builder.shape().field(&key) {
            Some(f) => f.field_type.type_name().to_string(),
            None => {
                return Err(ConfigError::InvalidField {
                    shape: builder.shape().name.clone(),
                    field: key,
                    reason: "reference key is not a field".into(),
                })
            }
        };
        let type_name = builder.type_name().to_string();
        let reference = GeneratedShape::reference(&type_name, &key, &key_type);
        let Some(op) = builder.add_operation(
            OperationDescriptor::query("resolveReference", CapabilityKind::Reference, OperationRole::ResolveReference)
                .input(reference.name.as_str())
                .output(type_name),
            &options.resolve,
        )?
        else {
            return Ok(builder);
        };
        builder.register_shape(reference)?;
        builder.reference = Some(ReferenceCapability {
            core: builder.core(),
            op,
            key,
        });
        Ok(builder)
    }
}

pub struct ReferenceCapability {
    core: Arc<ResolverCore>,
    op: Operation,
    key: String,
}

impl ReferenceCapability {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Resolve `{__typename?, <key>}` to the record, or `NotFound`.
    pub async fn resolve_reference(&self, reference: &Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        if let Some(typename) = reference.get("__typename").and_then(Value::as_str) {
            if typename != self.core.type_name() {
                return Err(ResolverError::Validation(format!(
                    "reference to {} cannot be resolved by {}",
                    typename, self.core.id
                )));
            }
        }
        let value = reference
            .get(&self.key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ResolverError::Validation(format!("reference is missing '{}'", self.key)))?;
        let restriction = self.op.admit(&self.core, ctx).await?;
        let found = if self.key == self.core.shape.primary_key {
            find_visible(&self.core, value, restriction).await?
        } else {
            let filter = Filter::eq(self.key.clone(), value.clone()).merge_and(restriction);
            self.core.service.query_one(&Query::filtered(filter)).await?
        };
        found.ok_or_else(|| ResolverError::NotFound(format!("{} {}={}", self.core.type_name(), self.key, value)))
    }

    pub(crate) async fn invoke(&self, args: Value, ctx: &RequestContext) -> Result<Value, ResolverError> {
        let reference = args.get("representation").cloned().unwrap_or(args);
        self.resolve_reference(&reference, ctx).await
    }
}
