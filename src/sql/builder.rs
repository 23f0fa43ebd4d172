//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a declared model.
//! Identifiers come from validated model declarations; values are always bound.

use crate::config::{ColumnSpec, ModelSpec};
use crate::error::AppError;
use crate::sql::{canonical_value, Criterion, Dialect};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Quote identifier (safe: only from validated declarations).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Bind `v` and return a placeholder cast to the column's type, so untyped
    /// parameters (NULLs, strings for numeric columns) land with the right type.
    fn typed_param(&mut self, v: Value, column: &ColumnSpec, dialect: Dialect) -> String {
        let n = self.push_param(canonical_value(v, column.type_));
        format!("CAST(${} AS {})", n, dialect.type_name(column.type_))
    }
}

fn select_column_list(model: &ModelSpec) -> String {
    model
        .columns
        .iter()
        .map(|c| quoted(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column<'a>(model: &'a ModelSpec, name: &str) -> Result<&'a ColumnSpec, AppError> {
    model
        .column_named(name)
        .ok_or_else(|| AppError::Validation(format!("unknown field '{}' on {}", name, model.name)))
}

fn primary_key(model: &ModelSpec) -> Result<&ColumnSpec, AppError> {
    model
        .primary_key()
        .ok_or_else(|| AppError::NotImplemented(format!("model '{}' declares no primary key", model.name)))
}

fn render_criterion(
    q: &mut QueryBuf,
    model: &ModelSpec,
    dialect: Dialect,
    criterion: &Criterion,
) -> Result<String, AppError> {
    Ok(match criterion {
        Criterion::Raw(sql) if sql.trim().is_empty() => "1 = 1".to_string(),
        Criterion::Raw(sql) => format!("({})", sql),
        Criterion::Compare { column: name, op, value } => {
            let c = column(model, name)?;
            match (value, op) {
                (Value::Null, crate::sql::Operator::Eq) => format!("{} IS NULL", quoted(name)),
                (Value::Null, crate::sql::Operator::Ne) => format!("{} IS NOT NULL", quoted(name)),
                _ => {
                    let ph = q.typed_param(value.clone(), c, dialect);
                    format!("{} {} {}", quoted(name), op.as_sql(), ph)
                }
            }
        }
        Criterion::Like { column: name, pattern } => {
            column(model, name)?;
            let n = q.push_param(Value::String(pattern.clone()));
            format!("CAST({} AS TEXT) LIKE ${} ESCAPE '\\'", quoted(name), n)
        }
        Criterion::IsNull { column: name, negated } => {
            column(model, name)?;
            if *negated {
                format!("{} IS NOT NULL", quoted(name))
            } else {
                format!("{} IS NULL", quoted(name))
            }
        }
        Criterion::In { column: name, values } => {
            let c = column(model, name)?;
            if values.is_empty() {
                return Ok("1 = 0".to_string());
            }
            let placeholders: Vec<String> = values
                .iter()
                .map(|v| q.typed_param(v.clone(), c, dialect))
                .collect();
            format!("{} IN ({})", quoted(name), placeholders.join(", "))
        }
        Criterion::Any(inner) => {
            if inner.is_empty() {
                return Ok("1 = 0".to_string());
            }
            let parts = inner
                .iter()
                .map(|c| render_criterion(q, model, dialect, c))
                .collect::<Result<Vec<_>, _>>()?;
            format!("({})", parts.join(" OR "))
        }
        Criterion::All(inner) => {
            if inner.is_empty() {
                return Ok("1 = 1".to_string());
            }
            let parts = inner
                .iter()
                .map(|c| render_criterion(q, model, dialect, c))
                .collect::<Result<Vec<_>, _>>()?;
            format!("({})", parts.join(" AND "))
        }
        Criterion::Not(inner) => format!("NOT ({})", render_criterion(q, model, dialect, inner)?),
    })
}

/// WHERE clause for `criteria AND filters`; empty string when both are empty.
fn where_clause(
    q: &mut QueryBuf,
    model: &ModelSpec,
    dialect: Dialect,
    criteria: &[Criterion],
    filters: &BTreeMap<String, Value>,
) -> Result<String, AppError> {
    let mut parts = Vec::new();
    for c in criteria {
        parts.push(render_criterion(q, model, dialect, c)?);
    }
    for (name, value) in filters {
        let c = column(model, name)?;
        if value.is_null() {
            parts.push(format!("{} IS NULL", quoted(name)));
        } else {
            let ph = q.typed_param(value.clone(), c, dialect);
            parts.push(format!("{} = {}", quoted(name), ph));
        }
    }
    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    })
}

/// SELECT by primary key.
pub fn select_by_id(model: &ModelSpec, dialect: Dialect, id: &Value) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let pk = primary_key(model)?;
    let ph = q.typed_param(id.clone(), pk, dialect);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(model),
        quoted(&model.name),
        quoted(&pk.name),
        ph
    );
    Ok(q)
}

/// SELECT matching `criteria AND filters`, ORDER BY pk, then OFFSET `skip` / LIMIT `limit`.
pub fn select_many(
    model: &ModelSpec,
    dialect: Dialect,
    criteria: &[Criterion],
    filters: &BTreeMap<String, Value>,
    skip: u64,
    limit: Option<u64>,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let pk = primary_key(model)?;
    let where_clause = where_clause(&mut q, model, dialect, criteria, filters)?;
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}{}",
        select_column_list(model),
        quoted(&model.name),
        where_clause,
        quoted(&pk.name),
        dialect.pagination(skip, limit)
    );
    Ok(q)
}

/// INSERT one record; columns the record omits are left to the store (defaults, generated keys).
pub fn insert(model: &ModelSpec, dialect: Dialect, fields: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &model.columns {
        let Some(val) = fields.get(&c.name) else { continue };
        if c.primary_key && c.has_default && val.is_null() {
            continue;
        }
        placeholders.push(q.typed_param(val.clone(), c, dialect));
        cols.push(quoted(&c.name));
    }
    let returning = select_column_list(model);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", quoted(&model.name), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            quoted(&model.name),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

fn set_clause(q: &mut QueryBuf, model: &ModelSpec, dialect: Dialect, changes: &Map<String, Value>) -> Vec<String> {
    model
        .columns
        .iter()
        .filter(|c| !c.primary_key)
        .filter_map(|c| {
            changes
                .get(&c.name)
                .map(|v| format!("{} = {}", quoted(&c.name), q.typed_param(v.clone(), c, dialect)))
        })
        .collect()
}

/// UPDATE by id: SET only columns present in `changes`, never the primary key.
/// With nothing to set this degrades to a SELECT of the record.
pub fn update_by_id(
    model: &ModelSpec,
    dialect: Dialect,
    id: &Value,
    changes: &Map<String, Value>,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let pk = primary_key(model)?;
    let sets = set_clause(&mut q, model, dialect, changes);
    if sets.is_empty() {
        return select_by_id(model, dialect, id);
    }
    let id_ph = q.typed_param(id.clone(), pk, dialect);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        quoted(&model.name),
        sets.join(", "),
        quoted(&pk.name),
        id_ph,
        select_column_list(model)
    );
    Ok(q)
}

/// UPDATE every record matching `criteria AND filters`. `None` when there is nothing to set.
pub fn update_matching(
    model: &ModelSpec,
    dialect: Dialect,
    changes: &Map<String, Value>,
    criteria: &[Criterion],
    filters: &BTreeMap<String, Value>,
) -> Result<Option<QueryBuf>, AppError> {
    let mut q = QueryBuf::new();
    let sets = set_clause(&mut q, model, dialect, changes);
    if sets.is_empty() {
        return Ok(None);
    }
    let where_clause = where_clause(&mut q, model, dialect, criteria, filters)?;
    q.sql = format!("UPDATE {} SET {}{}", quoted(&model.name), sets.join(", "), where_clause);
    Ok(Some(q))
}

/// DELETE by id, returning the deleted record.
pub fn delete_by_id(model: &ModelSpec, dialect: Dialect, id: &Value) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let pk = primary_key(model)?;
    let ph = q.typed_param(id.clone(), pk, dialect);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        quoted(&model.name),
        quoted(&pk.name),
        ph,
        select_column_list(model)
    );
    Ok(q)
}

/// DELETE every record matching `criteria AND filters`.
pub fn delete_matching(
    model: &ModelSpec,
    dialect: Dialect,
    criteria: &[Criterion],
    filters: &BTreeMap<String, Value>,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_clause = where_clause(&mut q, model, dialect, criteria, filters)?;
    q.sql = format!("DELETE FROM {}{}", quoted(&model.name), where_clause);
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnSpec, ColumnType};
    use crate::sql::col;
    use serde_json::json;

    fn names() -> ModelSpec {
        ModelSpec::new("names")
            .column(ColumnSpec::primary_key("id", ColumnType::Integer))
            .column(ColumnSpec::new("title", ColumnType::Text).not_null())
    }

    fn filters(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn select_many_ands_criteria_and_filters() {
        let q = select_many(
            &names(),
            Dialect::Sqlite,
            &[col("id").lt(10), Criterion::from("id>2")],
            &filters(&[("title", json!("Roe"))]),
            1,
            Some(2),
        )
        .unwrap();
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"title\" FROM \"names\" WHERE \"id\" < CAST($1 AS INTEGER) AND (id>2) \
             AND \"title\" = CAST($2 AS TEXT) ORDER BY \"id\" LIMIT 2 OFFSET 1"
        );
        assert_eq!(q.params, vec![json!(10), json!("Roe")]);
    }

    #[test]
    fn postgres_types_in_casts() {
        let q = select_by_id(&names(), Dialect::Postgres, &json!(3)).unwrap();
        assert_eq!(q.sql, "SELECT \"id\", \"title\" FROM \"names\" WHERE \"id\" = CAST($1 AS BIGINT)");
    }

    #[test]
    fn unknown_filter_field_is_rejected() {
        let err = select_many(&names(), Dialect::Sqlite, &[], &filters(&[("nope", json!(1))]), 0, None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = delete_matching(&names(), Dialect::Sqlite, &[col("nope").eq(1)], &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn empty_any_matches_nothing_and_null_compares_as_is_null() {
        let q = select_many(
            &names(),
            Dialect::Sqlite,
            &[Criterion::any(vec![]), col("title").eq(Value::Null)],
            &BTreeMap::new(),
            0,
            None,
        )
        .unwrap();
        assert!(q.sql.contains("WHERE 1 = 0 AND \"title\" IS NULL"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn like_binds_pattern_and_escapes() {
        let q = select_many(
            &names(),
            Dialect::Postgres,
            &[Criterion::any(vec![col("title").contains("Ro"), col("id").contains("1")])],
            &BTreeMap::new(),
            0,
            None,
        )
        .unwrap();
        assert!(q.sql.contains(
            "WHERE (CAST(\"title\" AS TEXT) LIKE $1 ESCAPE '\\' OR CAST(\"id\" AS TEXT) LIKE $2 ESCAPE '\\')"
        ));
        assert_eq!(q.params, vec![json!("%Ro%"), json!("%1%")]);
    }

    #[test]
    fn insert_skips_generated_key() {
        let mut fields = Map::new();
        fields.insert("title".into(), json!("Doe"));
        let q = insert(&names(), Dialect::Sqlite, &fields);
        assert_eq!(
            q.sql,
            "INSERT INTO \"names\" (\"title\") VALUES (CAST($1 AS TEXT)) RETURNING \"id\", \"title\""
        );
        let q = insert(&names(), Dialect::Sqlite, &Map::new());
        assert!(q.sql.starts_with("INSERT INTO \"names\" DEFAULT VALUES"));
    }

    #[test]
    fn update_by_id_never_sets_primary_key() {
        let mut changes = Map::new();
        changes.insert("id".into(), json!(99));
        changes.insert("title".into(), json!("Rene"));
        let q = update_by_id(&names(), Dialect::Sqlite, &json!(2), &changes).unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"names\" SET \"title\" = CAST($1 AS TEXT) WHERE \"id\" = CAST($2 AS INTEGER) \
             RETURNING \"id\", \"title\""
        );
        assert_eq!(q.params, vec![json!("Rene"), json!(2)]);
    }

    #[test]
    fn update_matching_numbers_set_params_before_where_params() {
        let mut changes = Map::new();
        changes.insert("title".into(), json!("Rene"));
        let q = update_matching(
            &names(),
            Dialect::Sqlite,
            &changes,
            &[col("id").gt(2)],
            &filters(&[("title", json!("Roe"))]),
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"names\" SET \"title\" = CAST($1 AS TEXT) WHERE \"id\" > CAST($2 AS INTEGER) \
             AND \"title\" = CAST($3 AS TEXT)"
        );
        assert!(update_matching(&names(), Dialect::Sqlite, &Map::new(), &[], &BTreeMap::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn uuid_parameters_are_bound_in_canonical_form() {
        let tags = ModelSpec::new("tags").column(ColumnSpec::primary_key("key", ColumnType::Uuid));
        let q = select_by_id(&tags, Dialect::Sqlite, &json!("550E8400E29B41D4A716446655440000")).unwrap();
        assert_eq!(q.params, vec![json!("550e8400-e29b-41d4-a716-446655440000")]);
        let mut fields = Map::new();
        fields.insert("key".into(), json!("{550E8400-E29B-41D4-A716-446655440000}"));
        let q = insert(&tags, Dialect::Sqlite, &fields);
        assert_eq!(q.params, vec![json!("550e8400-e29b-41d4-a716-446655440000")]);
    }
}
