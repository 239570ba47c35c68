//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and aggregate SQL from a data shape.
//! Identifiers come from config only; every value is a parameter.

use crate::config::{DataShape, FieldDescriptor, TableBinding};
use crate::error::ResolverError;
use crate::query::{AggregateQuery, ComparisonOperator, Filter, Query, SortDirection, SortField};
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(table: &TableBinding) -> String {
    format!("{}.{}", quoted(&table.schema), quoted(&table.table))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Placeholder cast to the field's type.
    fn placeholder(&mut self, field: &FieldDescriptor, v: Value) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, field.pg_type)
    }
}

fn field<'a>(shape: &'a DataShape, name: &str) -> Result<&'a FieldDescriptor, ResolverError> {
    shape
        .field(name)
        .ok_or_else(|| ResolverError::Validation(format!("{}: unknown field '{}'", shape.name, name)))
}

/// Custom enums (`schema.type`) and numeric columns are read back as text.
fn column_expr(f: &FieldDescriptor) -> String {
    let q = quoted(&f.column);
    if f.pg_type.contains('.') || f.pg_type == "numeric" {
        format!("{}::text", q)
    } else {
        q
    }
}

/// SELECT list aliasing every column to its field name.
fn select_column_list(shape: &DataShape) -> String {
    shape
        .fields
        .iter()
        .map(|f| format!("{} AS {}", column_expr(f), quoted(&f.name)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// WHERE expression for a filter tree. The empty filter is `TRUE`.
pub fn filter_clause(shape: &DataShape, filter: &Filter, q: &mut QueryBuf) -> Result<String, ResolverError> {
    let mut parts = Vec::new();
    for (name, comparison) in &filter.fields {
        let f = field(shape, name)?;
        for (op, arg) in comparison {
            parts.push(comparison_clause(f, *op, arg, q)?);
        }
    }
    for sub in &filter.and {
        parts.push(filter_clause(shape, sub, q)?);
    }
    if !filter.or.is_empty() {
        let alternatives = filter
            .or
            .iter()
            .map(|sub| filter_clause(shape, sub, q))
            .collect::<Result<Vec<_>, _>>()?;
        parts.push(format!("({})", alternatives.join(" OR ")));
    }
    if let Some(not) = &filter.not {
        parts.push(format!("NOT {}", filter_clause(shape, not, q)?));
    }
    Ok(match parts.len() {
        0 => "TRUE".to_string(),
        1 => parts.remove(0),
        _ => format!("({})", parts.join(" AND ")),
    })
}

fn comparison_clause(f: &FieldDescriptor, op: ComparisonOperator, arg: &Value, q: &mut QueryBuf) -> Result<String, ResolverError> {
    use ComparisonOperator::*;
    let col = quoted(&f.column);
    let clause = match op {
        Is | IsNot => {
            let not = if op == IsNot { "NOT " } else { "" };
            let what = match arg {
                Value::Null => "NULL",
                Value::Bool(true) => "TRUE",
                Value::Bool(false) => "FALSE",
                other => {
                    return Err(ResolverError::Validation(format!(
                        "{}: '{}' expects true, false or null, got {}",
                        f.name, op, other
                    )))
                }
            };
            format!("{} IS {}{}", col, not, what)
        }
        Eq => format!("{} = {}", col, q.placeholder(f, arg.clone())),
        Neq => format!("{} IS DISTINCT FROM {}", col, q.placeholder(f, arg.clone())),
        Gt => format!("{} > {}", col, q.placeholder(f, arg.clone())),
        Gte => format!("{} >= {}", col, q.placeholder(f, arg.clone())),
        Lt => format!("{} < {}", col, q.placeholder(f, arg.clone())),
        Lte => format!("{} <= {}", col, q.placeholder(f, arg.clone())),
        In | NotIn => {
            let items = arg.as_array().ok_or_else(|| {
                ResolverError::Validation(format!("{}: '{}' expects a list", f.name, op))
            })?;
            if items.is_empty() {
                return Ok(if op == In { "FALSE" } else { "TRUE" }.to_string());
            }
            let list = items
                .iter()
                .map(|v| q.placeholder(f, v.clone()))
                .collect::<Vec<_>>()
                .join(", ");
            if op == In {
                format!("{} IN ({})", col, list)
            } else {
                format!("({} IS NULL OR {} NOT IN ({}))", col, col, list)
            }
        }
        Like | ILike => {
            let kw = if op == Like { "LIKE" } else { "ILIKE" };
            format!("{}::text {} ${}", col, kw, q.push_param(arg.clone()))
        }
        NotLike | NotILike => {
            let kw = if op == NotLike { "NOT LIKE" } else { "NOT ILIKE" };
            format!("({} IS NULL OR {}::text {} ${})", col, col, kw, q.push_param(arg.clone()))
        }
    };
    Ok(clause)
}

fn order_clause(shape: &DataShape, sorting: &[SortField]) -> Result<String, ResolverError> {
    if sorting.is_empty() {
        return Ok(String::new());
    }
    let parts = sorting
        .iter()
        .map(|s| {
            let f = field(shape, &s.field)?;
            let dir = match s.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            let nulls = if s.nulls_first() { "NULLS FIRST" } else { "NULLS LAST" };
            Ok(format!("{} {} {}", quoted(&f.column), dir, nulls))
        })
        .collect::<Result<Vec<_>, ResolverError>>()?;
    Ok(format!(" ORDER BY {}", parts.join(", ")))
}

/// SELECT with filter, ordering and window.
pub fn select_query(shape: &DataShape, table: &TableBinding, query: &Query) -> Result<QueryBuf, ResolverError> {
    let mut q = QueryBuf::new();
    let where_clause = filter_clause(shape, &query.filter, &mut q)?;
    let order = order_clause(shape, &query.sorting)?;
    let limit = query.paging.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset = query.paging.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}{}{}{}",
        select_column_list(shape),
        qualified_table(table),
        where_clause,
        order,
        limit,
        offset
    );
    Ok(q)
}

pub fn count_query(shape: &DataShape, table: &TableBinding, filter: &Filter) -> Result<QueryBuf, ResolverError> {
    let mut q = QueryBuf::new();
    let where_clause = filter_clause(shape, filter, &mut q)?;
    q.sql = format!(
        "SELECT COUNT(*) AS \"count\" FROM {} WHERE {}",
        qualified_table(table),
        where_clause
    );
    Ok(q)
}

/// SELECT by primary key.
pub fn select_by_id(shape: &DataShape, table: &TableBinding, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = shape.primary_key_field();
    let ph = q.placeholder(pk, id.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(shape),
        qualified_table(table),
        quoted(&pk.column),
        ph
    );
    q
}

/// INSERT the fields present in `record`; omitted columns take their database default.
pub fn insert(shape: &DataShape, table: &TableBinding, record: &Map<String, Value>) -> Result<QueryBuf, ResolverError> {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (name, v) in record {
        let f = field(shape, name)?;
        cols.push(quoted(&f.column));
        placeholders.push(q.placeholder(f, v.clone()));
    }
    let table = qualified_table(table);
    let returning = select_column_list(shape);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    Ok(q)
}

fn set_clause(shape: &DataShape, changes: &Map<String, Value>, q: &mut QueryBuf) -> Result<String, ResolverError> {
    let mut sets = Vec::new();
    for (name, v) in changes {
        if *name == shape.primary_key {
            continue;
        }
        let f = field(shape, name)?;
        let rhs = q.placeholder(f, v.clone());
        sets.push(format!("{} = {}", quoted(&f.column), rhs));
    }
    if sets.is_empty() {
        return Err(ResolverError::Validation(format!("{}: update has no fields", shape.name)));
    }
    Ok(sets.join(", "))
}

/// UPDATE by id, returning the updated row.
pub fn update(shape: &DataShape, table: &TableBinding, id: &Value, changes: &Map<String, Value>) -> Result<QueryBuf, ResolverError> {
    let mut q = QueryBuf::new();
    let sets = set_clause(shape, changes, &mut q)?;
    let pk = shape.primary_key_field();
    let id_ph = q.placeholder(pk, id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(table),
        sets,
        quoted(&pk.column),
        id_ph,
        select_column_list(shape)
    );
    Ok(q)
}

/// UPDATE every row matching `filter`.
pub fn update_where(shape: &DataShape, table: &TableBinding, filter: &Filter, changes: &Map<String, Value>) -> Result<QueryBuf, ResolverError> {
    let mut q = QueryBuf::new();
    let sets = set_clause(shape, changes, &mut q)?;
    let where_clause = filter_clause(shape, filter, &mut q)?;
    q.sql = format!("UPDATE {} SET {} WHERE {}", qualified_table(table), sets, where_clause);
    Ok(q)
}

/// DELETE by id, returning the deleted row.
pub fn delete(shape: &DataShape, table: &TableBinding, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = shape.primary_key_field();
    let ph = q.placeholder(pk, id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(table),
        quoted(&pk.column),
        ph,
        select_column_list(shape)
    );
    q
}

pub fn delete_where(shape: &DataShape, table: &TableBinding, filter: &Filter) -> Result<QueryBuf, ResolverError> {
    let mut q = QueryBuf::new();
    let where_clause = filter_clause(shape, filter, &mut q)?;
    q.sql = format!("DELETE FROM {} WHERE {}", qualified_table(table), where_clause);
    Ok(q)
}

/// Aggregate SELECT. Output columns are aliased `<func>_<field>` (`groupBy_<field>` for groups).
pub fn aggregate_query(
    shape: &DataShape,
    table: &TableBinding,
    filter: &Filter,
    aggregate: &AggregateQuery,
) -> Result<QueryBuf, ResolverError> {
    let mut q = QueryBuf::new();
    let mut select = Vec::new();
    let mut group_by = Vec::new();
    for name in &aggregate.group_by {
        let f = field(shape, name)?;
        select.push(format!("{} AS {}", column_expr(f), quoted(&format!("groupBy_{}", name))));
        group_by.push(quoted(&f.column));
    }
    let funcs: [(&str, &Vec<String>); 5] = [
        ("count", &aggregate.count),
        ("sum", &aggregate.sum),
        ("avg", &aggregate.avg),
        ("min", &aggregate.min),
        ("max", &aggregate.max),
    ];
    for (func, fields) in funcs {
        for name in fields {
            let f = field(shape, name)?;
            let col = quoted(&f.column);
            let expr = match func {
                "count" => format!("COUNT({})", col),
                "sum" => format!("SUM({})::double precision", col),
                "avg" => format!("AVG({})::double precision", col),
                _ if f.pg_type.contains('.') => format!("{}({}::text)", func.to_uppercase(), col),
                _ => format!("{}({})", func.to_uppercase(), col),
            };
            select.push(format!("{} AS {}", expr, quoted(&format!("{}_{}", func, name))));
        }
    }
    if select.is_empty() {
        return Err(ResolverError::Validation(format!("{} aggregate: nothing requested", shape.name)));
    }
    let where_clause = filter_clause(shape, filter, &mut q)?;
    let group_clause = if group_by.is_empty() {
        String::new()
    } else {
        format!(" GROUP BY {} ORDER BY {}", group_by.join(", "), group_by.join(", "))
    };
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}{}",
        select.join(", "),
        qualified_table(table),
        where_clause,
        group_clause
    );
    Ok(q)
}
