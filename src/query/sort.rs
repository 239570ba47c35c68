use crate::config::DataShape;
use crate::error::ResolverError;
use crate::query::comparison::compare_typed;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortNulls {
    NullsFirst,
    NullsLast,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nulls: Option<SortNulls>,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        SortField {
            field: field.into(),
            direction: SortDirection::Asc,
            nulls: None,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortField {
            field: field.into(),
            direction: SortDirection::Desc,
            nulls: None,
        }
    }

    pub fn with_nulls(mut self, nulls: SortNulls) -> Self {
        self.nulls = Some(nulls);
        self
    }

    /// Nulls go last ascending and first descending unless overridden.
    pub fn nulls_first(&self) -> bool {
        match self.nulls {
            Some(SortNulls::NullsFirst) => true,
            Some(SortNulls::NullsLast) => false,
            None => self.direction == SortDirection::Desc,
        }
    }

    /// Same field, opposite order (nulls placement flips too).
    pub fn reversed(&self) -> Self {
        SortField {
            field: self.field.clone(),
            direction: match self.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            },
            nulls: Some(if self.nulls_first() {
                SortNulls::NullsLast
            } else {
                SortNulls::NullsFirst
            }),
        }
    }
}

/// Sorting plus the primary key as ascending tiebreaker (unless already sorted on).
pub fn with_tiebreaker(sorting: &[SortField], primary_key: &str) -> Vec<SortField> {
    let mut ordering = sorting.to_vec();
    if !ordering.iter().any(|s| s.field == primary_key) {
        ordering.push(SortField::asc(primary_key));
    }
    ordering
}

pub fn check_sorting(shape: &DataShape, sorting: &[SortField]) -> Result<(), ResolverError> {
    for s in sorting {
        match shape.field(&s.field) {
            Some(f) if f.sortable => {}
            Some(_) => {
                return Err(ResolverError::Validation(format!(
                    "{}: '{}' is not sortable",
                    shape.name, s.field
                )))
            }
            None => {
                return Err(ResolverError::Validation(format!(
                    "{}: unknown sort field '{}'",
                    shape.name, s.field
                )))
            }
        }
    }
    Ok(())
}

/// Order two records by `sorting`, honoring null placement. Strings compare as text.
pub fn compare_records(a: &Value, b: &Value, sorting: &[SortField]) -> Ordering {
    compare_with(None, a, b, sorting)
}

/// [`compare_records`] with the field types of `shape`, so `Date` fields order by instant.
pub fn compare_records_in(shape: &DataShape, a: &Value, b: &Value, sorting: &[SortField]) -> Ordering {
    compare_with(Some(shape), a, b, sorting)
}

fn compare_with(shape: Option<&DataShape>, a: &Value, b: &Value, sorting: &[SortField]) -> Ordering {
    for s in sorting {
        let x = a.get(&s.field).unwrap_or(&Value::Null);
        let y = b.get(&s.field).unwrap_or(&Value::Null);
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if s.nulls_first() => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if s.nulls_first() => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let field_type = shape.and_then(|sh| sh.field(&s.field)).map(|f| &f.field_type);
                let ord = compare_typed(field_type, x, y).unwrap_or(Ordering::Equal);
                match s.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_placement_defaults() {
        let rows = [json!({"p": 2}), json!({"p": null}), json!({"p": 1})];

        let mut asc = rows.to_vec();
        asc.sort_by(|a, b| compare_records(a, b, &[SortField::asc("p")]));
        assert_eq!(asc, vec![json!({"p": 1}), json!({"p": 2}), json!({"p": null})]);

        let mut desc = rows.to_vec();
        desc.sort_by(|a, b| compare_records(a, b, &[SortField::desc("p")]));
        assert_eq!(desc, vec![json!({"p": null}), json!({"p": 2}), json!({"p": 1})]);

        let mut first = rows.to_vec();
        first.sort_by(|a, b| compare_records(a, b, &[SortField::asc("p").with_nulls(SortNulls::NullsFirst)]));
        assert_eq!(first[0], json!({"p": null}));
    }

    #[test]
    fn date_like_titles_sort_as_text() {
        let shape = DataShape::builder("Note")
            .field(crate::config::FieldDescriptor::new("id", crate::config::FieldType::Int))
            .field(crate::config::FieldDescriptor::new("title", crate::config::FieldType::String))
            .build()
            .unwrap();
        let mut rows = vec![
            json!({"id": 1, "title": "2024-01-01T00:00:00Z"}),
            json!({"id": 2, "title": "2024-01-01"}),
            json!({"id": 3, "title": "2023-12-31T23:00:00-02:00"}),
            json!({"id": 4, "title": "apple"}),
        ];
        rows.sort_by(|a, b| compare_records_in(&shape, a, b, &[SortField::asc("title")]));
        let ids: Vec<Value> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(3), json!(2), json!(1), json!(4)]);
    }

    #[test]
    fn reversed_flips_direction_and_nulls() {
        let s = SortField::asc("p");
        let r = s.reversed();
        assert_eq!(r.direction, SortDirection::Desc);
        assert!(r.nulls_first());
        assert_eq!(r.reversed().nulls_first(), s.nulls_first());
    }

    #[test]
    fn tiebreaker_added_once() {
        assert_eq!(
            with_tiebreaker(&[SortField::desc("title")], "id"),
            vec![SortField::desc("title"), SortField::asc("id")]
        );
        assert_eq!(with_tiebreaker(&[SortField::desc("id")], "id"), vec![SortField::desc("id")]);
    }

    #[test]
    fn deserializes_upper_case_directions() {
        let s: SortField = serde_json::from_value(json!({"field": "title", "direction": "DESC", "nulls": "NULLS_LAST"})).unwrap();
        assert_eq!(s, SortField::desc("title").with_nulls(SortNulls::NullsLast));
    }
}
