//! Schema DDL derived from model declarations. Both directions are idempotent:
//! `CREATE TABLE IF NOT EXISTS` and `DROP TABLE IF EXISTS`.

use crate::config::{ColumnSpec, ColumnType, ModelSpec};
use crate::error::AppError;
use crate::sql::Dialect;
use sqlx::AnyConnection;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn column_def(c: &ColumnSpec, dialect: Dialect) -> String {
    if c.primary_key && c.type_ == ColumnType::Integer && c.has_default && c.default.is_none() {
        return format!("{} {} PRIMARY KEY", quote(&c.name), dialect.auto_key_type());
    }
    let mut def = format!("{} {}", quote(&c.name), dialect.type_name(c.type_));
    if !c.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(ref d) = c.default {
        def.push_str(" DEFAULT ");
        def.push_str(d);
    }
    if c.primary_key {
        def.push_str(" PRIMARY KEY");
    }
    def
}

pub fn create_table_sql(model: &ModelSpec, dialect: Dialect) -> String {
    let col_defs: Vec<String> = model.columns.iter().map(|c| column_def(c, dialect)).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quote(&model.name),
        col_defs.join(",\n  ")
    )
}

pub fn drop_table_sql(model: &ModelSpec) -> String {
    format!("DROP TABLE IF EXISTS {}", quote(&model.name))
}

/// Create every declared table that does not exist yet.
pub async fn create_tables(
    conn: &mut AnyConnection,
    models: &[ModelSpec],
    dialect: Dialect,
) -> Result<(), AppError> {
    for m in models {
        let sql = create_table_sql(m, dialect);
        tracing::debug!(%sql, "ddl");
        sqlx::query(&sql).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Drop every declared table, in reverse declaration order.
pub async fn drop_tables(conn: &mut AnyConnection, models: &[ModelSpec]) -> Result<(), AppError> {
    for m in models.iter().rev() {
        let sql = drop_table_sql(m);
        tracing::debug!(%sql, "ddl");
        sqlx::query(&sql).execute(&mut *conn).await?;
    }
    Ok(())
}
