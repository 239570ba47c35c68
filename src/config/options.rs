//! Capability options: shape-level settings plus one options struct per capability.
//!
//! Options are built once at composition time and are immutable afterwards.
//! Guards and interceptors are code, so they are skipped by serde and can
//! only be attached programmatically.

use crate::auth::{Guard, Interceptor};
use crate::error::ConfigError;
use crate::query::PagingStrategy;
use crate::resolver::shapes::{ContainerOverride, InputShape};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_RESULT_SIZE: u32 = 10;
pub const MAX_RESULTS_SIZE: u32 = 100;

/// Per-operation options.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationOptions {
    pub disabled: bool,
    /// Explicit operation name instead of the derived one.
    pub name: Option<String>,
    #[serde(skip)]
    pub guards: Vec<Arc<dyn Guard>>,
    #[serde(skip)]
    pub interceptors: Vec<Arc<dyn Interceptor>>,
}

impl fmt::Debug for OperationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationOptions")
            .field("disabled", &self.disabled)
            .field("name", &self.name)
            .field("guards", &self.guards.len())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

impl OperationOptions {
    pub fn disabled() -> Self {
        OperationOptions {
            disabled: true,
            ..Self::default()
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        OperationOptions {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_guard(mut self, guard: impl Guard + 'static) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    pub fn with_interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }
}

/// `enabled` / `disabled` switch shared by every capability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggle {
    pub enabled: Option<bool>,
    pub disabled: bool,
}

impl Toggle {
    /// Effective state; `default` applies when neither flag is set.
    pub fn resolve(&self, capability: &str, default: bool) -> Result<bool, ConfigError> {
        match (self.enabled, self.disabled) {
            (Some(true), true) => Err(ConfigError::Contradictory(format!(
                "{} is both enabled and disabled",
                capability
            ))),
            (_, true) => Ok(false),
            (Some(enabled), false) => Ok(enabled),
            (None, false) => Ok(default),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    #[serde(flatten)]
    pub toggle: Toggle,
    /// Must agree with the shape-level strategy when both are set.
    pub paging_strategy: Option<PagingStrategy>,
    /// Caller-supplied result container; its kind must match the paging strategy.
    pub connection: Option<ContainerOverride>,
    pub query_many: OperationOptions,
    pub query_one: OperationOptions,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateOptions {
    #[serde(flatten)]
    pub toggle: Toggle,
    pub enable_subscriptions: Option<bool>,
    /// Caller-supplied create input shape.
    pub input: Option<InputShape>,
    pub create_one: OperationOptions,
    pub create_many: OperationOptions,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOptions {
    #[serde(flatten)]
    pub toggle: Toggle,
    pub enable_subscriptions: Option<bool>,
    /// Caller-supplied update input shape.
    pub input: Option<InputShape>,
    pub update_one: OperationOptions,
    pub update_many: OperationOptions,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteOptions {
    #[serde(flatten)]
    pub toggle: Toggle,
    pub enable_subscriptions: Option<bool>,
    pub delete_one: OperationOptions,
    pub delete_many: OperationOptions,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateOptions {
    #[serde(flatten)]
    pub toggle: Toggle,
    pub aggregate: OperationOptions,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationsOptions {
    #[serde(flatten)]
    pub toggle: Toggle,
    /// Options per relation name; every key must name a relation of the shape.
    pub relations: HashMap<String, OperationOptions>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceOptions {
    #[serde(flatten)]
    pub toggle: Toggle,
    /// Field used to resolve references. The capability is off when unset.
    pub key: Option<String>,
    pub resolve: OperationOptions,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    /// Overrides the shape name in every generated name.
    pub dto_name: Option<String>,
    pub paging_strategy: Option<PagingStrategy>,
    pub enable_total_count: bool,
    pub enable_subscriptions: bool,
    pub enable_aggregate: bool,
    pub default_result_size: u32,
    pub max_results_size: u32,
    /// Prepended to every operation's guards.
    #[serde(skip)]
    pub guards: Vec<Arc<dyn Guard>>,
    /// Prepended to every operation's interceptors.
    #[serde(skip)]
    pub interceptors: Vec<Arc<dyn Interceptor>>,
    pub create: CreateOptions,
    pub read: ReadOptions,
    pub update: UpdateOptions,
    pub delete: DeleteOptions,
    pub aggregate: AggregateOptions,
    pub relations: RelationsOptions,
    pub reference_by: ReferenceOptions,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            dto_name: None,
            paging_strategy: None,
            enable_total_count: false,
            enable_subscriptions: false,
            enable_aggregate: false,
            default_result_size: DEFAULT_RESULT_SIZE,
            max_results_size: MAX_RESULTS_SIZE,
            guards: Vec::new(),
            interceptors: Vec::new(),
            create: CreateOptions::default(),
            read: ReadOptions::default(),
            update: UpdateOptions::default(),
            delete: DeleteOptions::default(),
            aggregate: AggregateOptions::default(),
            relations: RelationsOptions::default(),
            reference_by: ReferenceOptions::default(),
        }
    }
}

impl fmt::Debug for ResolverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverOptions")
            .field("dto_name", &self.dto_name)
            .field("paging_strategy", &self.paging_strategy)
            .field("enable_total_count", &self.enable_total_count)
            .field("enable_subscriptions", &self.enable_subscriptions)
            .field("enable_aggregate", &self.enable_aggregate)
            .field("default_result_size", &self.default_result_size)
            .field("max_results_size", &self.max_results_size)
            .field("create", &self.create)
            .field("read", &self.read)
            .field("update", &self.update)
            .field("delete", &self.delete)
            .field("aggregate", &self.aggregate)
            .field("relations", &self.relations)
            .field("reference_by", &self.reference_by)
            .finish_non_exhaustive()
    }
}

impl ResolverOptions {
    /// Effective paging strategy; the read-level and shape-level settings must agree.
    pub fn effective_paging_strategy(&self) -> Result<PagingStrategy, ConfigError> {
        match (self.paging_strategy, self.read.paging_strategy) {
            (Some(shape), Some(read)) if shape != read => Err(ConfigError::IncompatiblePaging(format!(
                "resolver uses {} paging but read options ask for {}",
                shape, read
            ))),
            (shape, read) => Ok(read.or(shape).unwrap_or_default()),
        }
    }

    pub fn check_result_sizes(&self) -> Result<(), ConfigError> {
        if self.default_result_size == 0 || self.default_result_size > self.max_results_size {
            return Err(ConfigError::Contradictory(format!(
                "default_result_size {} must be between 1 and max_results_size {}",
                self.default_result_size, self.max_results_size
            )));
        }
        Ok(())
    }

    /// Merge the resolver-level guards and interceptors into an operation's own.
    pub(crate) fn merged(&self, op: &OperationOptions) -> OperationOptions {
        OperationOptions {
            disabled: op.disabled,
            name: op.name.clone(),
            guards: self.guards.iter().chain(op.guards.iter()).cloned().collect(),
            interceptors: self
                .interceptors
                .iter()
                .chain(op.interceptors.iter())
                .cloned()
                .collect(),
        }
    }
}
