//! Binding serde_json values as query parameters and decoding rows back into field maps.

use crate::config::{ColumnSpec, ColumnType, ModelSpec};
use crate::sql::QueryBuf;
use serde_json::{Map, Number, Value};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Row};

type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// The stored form of a value for a column of type `ty`. UUIDs are kept lowercase
/// and hyphenated whatever form the client sent, so keys compare equal; reals read
/// back as floats.
pub fn canonical_value(value: Value, ty: ColumnType) -> Value {
    match ty {
        ColumnType::Uuid => match value.as_str().map(uuid::Uuid::parse_str) {
            Some(Ok(u)) => Value::String(u.to_string()),
            _ => value,
        },
        ColumnType::Real => match value.as_f64().and_then(Number::from_f64) {
            Some(n) => Value::Number(n),
            None => value,
        },
        _ => value,
    }
}

/// Bind one JSON value. Arrays and objects are bound as their JSON text.
pub fn bind_value<'q>(query: AnyQuery<'q>, v: &Value) -> AnyQuery<'q> {
    match v {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(v.to_string()),
    }
}

/// Prepare a built query with all of its parameters bound in order.
pub fn build_query(q: &QueryBuf) -> AnyQuery<'_> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    q.params
        .iter()
        .fold(sqlx::query(q.sql.as_str()), |query, p| bind_value(query, p))
}

/// Decode a row into a field map keyed by the model's column names.
pub fn row_to_record(row: &AnyRow, model: &ModelSpec) -> Result<Map<String, Value>, sqlx::Error> {
    let mut map = Map::new();
    for c in &model.columns {
        map.insert(c.name.clone(), cell_to_value(row, c)?);
    }
    Ok(map)
}

fn cell_to_value(row: &AnyRow, column: &ColumnSpec) -> Result<Value, sqlx::Error> {
    let name = column.name.as_str();
    Ok(match column.type_ {
        ColumnType::Integer => row
            .try_get::<Option<i64>, _>(name)?
            .map(|n| Value::Number(n.into()))
            .unwrap_or(Value::Null),
        ColumnType::Real => {
            let f = match row.try_get::<Option<f64>, _>(name) {
                Ok(v) => v,
                Err(_) => row.try_get::<Option<i64>, _>(name)?.map(|n| n as f64),
            };
            f.and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null)
        }
        ColumnType::Boolean => {
            // SQLite columns hold 0/1.
            let b = match row.try_get::<Option<bool>, _>(name) {
                Ok(v) => v,
                Err(_) => row.try_get::<Option<i64>, _>(name)?.map(|n| n != 0),
            };
            b.map(Value::Bool).unwrap_or(Value::Null)
        }
        ColumnType::Text | ColumnType::Uuid => row
            .try_get::<Option<String>, _>(name)?
            .map(Value::String)
            .unwrap_or(Value::Null),
    })
}
