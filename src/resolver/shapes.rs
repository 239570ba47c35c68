//! Generated input/output shapes. All are pure functions of the data shape and options.

use crate::config::DataShape;
use crate::error::ConfigError;
use crate::query::{FilterShape, PagingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
}

/// Create or update input: which fields may be written and which must be.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub name: String,
    pub fields: Vec<InputField>,
}

impl InputShape {
    /// `Create<Name>`: every writable field, required when nothing else fills it in.
    pub fn create_for(shape: &DataShape, type_name: &str) -> Self {
        InputShape {
            name: format!("Create{}", type_name),
            fields: shape
                .fields
                .iter()
                .filter(|f| !f.read_only)
                .map(|f| InputField {
                    name: f.name.clone(),
                    required: (f.is_required_on_create() && f.name != shape.primary_key)
                        || f.validation.required == Some(true),
                })
                .collect(),
        }
    }

    /// `Update<Name>`: every writable field except the primary key, all optional.
    pub fn update_for(shape: &DataShape, type_name: &str) -> Self {
        InputShape {
            name: format!("Update{}", type_name),
            fields: shape
                .fields
                .iter()
                .filter(|f| !f.read_only && f.name != shape.primary_key)
                .map(|f| InputField {
                    name: f.name.clone(),
                    required: false,
                })
                .collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&InputField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// A caller-supplied override may only name writable fields of the shape.
    pub fn check_override(&self, shape: &DataShape, allow_primary_key: bool) -> Result<(), ConfigError> {
        for f in &self.fields {
            let descriptor = shape.field(&f.name).ok_or_else(|| ConfigError::InvalidField {
                shape: self.name.clone(),
                field: f.name.clone(),
                reason: format!("not a field of {}", shape.name),
            })?;
            if descriptor.read_only || (!allow_primary_key && f.name == shape.primary_key) {
                return Err(ConfigError::InvalidField {
                    shape: self.name.clone(),
                    field: f.name.clone(),
                    reason: "field is not writable".into(),
                });
            }
        }
        Ok(())
    }
}

/// Caller-supplied query-many result container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerOverride {
    pub name: String,
    pub strategy: PagingStrategy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Output,
    CreateInput,
    UpdateInput,
    Filter,
    Sort,
    Connection,
    OffsetConnection,
    Aggregate,
    Reference,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShapeField {
    pub name: String,
    pub type_name: String,
    pub required: bool,
    pub list: bool,
}

impl ShapeField {
    fn new(name: impl Into<String>, type_name: impl Into<String>, required: bool) -> Self {
        ShapeField {
            name: name.into(),
            type_name: type_name.into(),
            required,
            list: false,
        }
    }

    fn list(mut self) -> Self {
        self.list = true;
        self
    }
}

/// A shape registered on a resolver, listed next to its operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GeneratedShape {
    pub name: String,
    pub kind: ShapeKind,
    pub fields: Vec<ShapeField>,
}

impl GeneratedShape {
    pub fn output(shape: &DataShape, type_name: &str) -> Self {
        GeneratedShape {
            name: type_name.to_string(),
            kind: ShapeKind::Output,
            fields: shape
                .fields
                .iter()
                .map(|f| ShapeField::new(f.name.clone(), f.field_type.type_name(), !f.nullable))
                .collect(),
        }
    }

    pub fn input(input: &InputShape, shape: &DataShape, kind: ShapeKind) -> Self {
        GeneratedShape {
            name: input.name.clone(),
            kind,
            fields: input
                .fields
                .iter()
                .filter_map(|f| {
                    shape
                        .field(&f.name)
                        .map(|d| ShapeField::new(f.name.clone(), d.field_type.type_name(), f.required))
                })
                .collect(),
        }
    }

    pub fn filter(filter: &FilterShape) -> Self {
        let mut fields: Vec<ShapeField> = filter
            .fields
            .iter()
            .map(|(name, comparison)| ShapeField::new(name.clone(), comparison.name.clone(), false))
            .collect();
        fields.push(ShapeField::new("and", filter.name.clone(), false).list());
        fields.push(ShapeField::new("or", filter.name.clone(), false).list());
        fields.push(ShapeField::new("not", filter.name.clone(), false));
        GeneratedShape {
            name: filter.name.clone(),
            kind: ShapeKind::Filter,
            fields,
        }
    }

    pub fn sort(type_name: &str) -> Self {
        GeneratedShape {
            name: format!("{}Sort", type_name),
            kind: ShapeKind::Sort,
            fields: vec![
                ShapeField::new("field", format!("{}SortFields", type_name), true),
                ShapeField::new("direction", "SortDirection", true),
                ShapeField::new("nulls", "SortNulls", false),
            ],
        }
    }

    pub fn connection(name: &str, type_name: &str, strategy: PagingStrategy, total_count: bool) -> Self {
        let (kind, mut fields) = match strategy {
            PagingStrategy::Cursor => (
                ShapeKind::Connection,
                vec![
                    ShapeField::new("edges", format!("{}Edge", type_name), true).list(),
                    ShapeField::new("pageInfo", "PageInfo", true),
                ],
            ),
            PagingStrategy::Offset => (
                ShapeKind::OffsetConnection,
                vec![
                    ShapeField::new("nodes", type_name, true).list(),
                    ShapeField::new("pageInfo", "OffsetPageInfo", true),
                ],
            ),
        };
        if total_count {
            fields.push(ShapeField::new("totalCount", "Int", true));
        }
        GeneratedShape {
            name: name.to_string(),
            kind,
            fields,
        }
    }

    pub fn aggregate(type_name: &str) -> Self {
        let per_field = format!("{}AggregateFields", type_name);
        let mut fields: Vec<ShapeField> = ["count", "sum", "avg", "min", "max"]
            .iter()
            .map(|f| ShapeField::new(*f, per_field.clone(), false))
            .collect();
        fields.push(ShapeField::new("groupBy", per_field.clone(), false));
        GeneratedShape {
            name: format!("{}AggregateResponse", type_name),
            kind: ShapeKind::Aggregate,
            fields,
        }
    }

    pub fn reference(type_name: &str, key: &str, key_type: &str) -> Self {
        GeneratedShape {
            name: format!("{}Reference", type_name),
            kind: ShapeKind::Reference,
            fields: vec![
                ShapeField::new("__typename", "String", true),
                ShapeField::new(key, key_type, true),
            ],
        }
    }
}
