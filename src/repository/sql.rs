//! Relational repository: one declared model on one `SqlDataSource`.

use super::{Fields, Options, Repository, Selection};
use crate::config::ModelSpec;
use crate::datasource::{SqlConnection, SqlDataSource};
use crate::error::AppError;
use crate::sql::{self, build_query, canonical_value, row_to_record, Criterion};
use crate::validation::RequestValidator;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Records are field maps; criteria are [`Criterion`] values, where a plain
/// string becomes a raw SQL predicate passed through unescaped.
pub struct SqlRepository<O> {
    datasource: Arc<SqlDataSource>,
    model: ModelSpec,
    validator: RequestValidator,
    _output: PhantomData<fn() -> O>,
}

impl<O> SqlRepository<O> {
    /// Bind to the model named `model_name`, which must be declared on the data source.
    pub fn new(datasource: Arc<SqlDataSource>, model_name: &str) -> Result<Self, AppError> {
        let model = datasource.model(model_name).cloned().ok_or_else(|| {
            AppError::NotImplemented(format!(
                "model '{}' is not registered with the data source",
                model_name
            ))
        })?;
        let validator = RequestValidator::new(&model)?;
        Ok(SqlRepository {
            datasource,
            model,
            validator,
            _output: PhantomData,
        })
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    fn decode(&self, row: &sqlx::any::AnyRow) -> Result<Fields, AppError> {
        Ok(row_to_record(row, &self.model)?)
    }

    /// Snapshot rows matching the selection, inside the caller's transaction.
    async fn snapshot(
        &self,
        conn: &mut sqlx::AnyConnection,
        dialect: sql::Dialect,
        selection: &Selection<Criterion>,
    ) -> Result<Vec<Fields>, AppError> {
        let q = sql::select_many(&self.model, dialect, &selection.criteria, &selection.filters, 0, None)?;
        let rows = build_query(&q).fetch_all(conn).await?;
        rows.iter().map(|r| self.decode(r)).collect()
    }
}

#[async_trait]
impl<O> Repository for SqlRepository<O>
where
    O: DeserializeOwned + Send + 'static,
{
    type Source = SqlDataSource;
    type Record = Fields;
    type Criterion = Criterion;
    type Dto = O;

    fn datasource(&self) -> &SqlDataSource {
        &self.datasource
    }

    fn to_output_dto(&self, record: Fields) -> Result<O, AppError> {
        serde_json::from_value(Value::Object(record))
            .map_err(|e| AppError::Dto(format!("{}: {}", self.model.name, e)))
    }

    async fn find_one(
        &self,
        conn: &mut SqlConnection,
        record_id: &Value,
        _options: &Options,
    ) -> Result<Option<Fields>, AppError> {
        let q = sql::select_by_id(&self.model, conn.dialect(), record_id)?;
        let row = build_query(&q).fetch_optional(&mut **conn).await?;
        row.map(|r| self.decode(&r)).transpose()
    }

    async fn find_many(
        &self,
        conn: &mut SqlConnection,
        selection: &Selection<Criterion>,
        skip: u64,
        limit: Option<u64>,
        _options: &Options,
    ) -> Result<Vec<Fields>, AppError> {
        let q = sql::select_many(
            &self.model,
            conn.dialect(),
            &selection.criteria,
            &selection.filters,
            skip,
            limit,
        )?;
        let rows = build_query(&q).fetch_all(&mut **conn).await?;
        rows.iter().map(|r| self.decode(r)).collect()
    }

    async fn insert_one(
        &self,
        conn: &mut SqlConnection,
        fields: Fields,
        _options: &Options,
    ) -> Result<Fields, AppError> {
        self.validator.validate(&fields)?;
        let q = sql::insert(&self.model, conn.dialect(), &fields);
        // The row only lands if it also reads back as a record.
        let mut tx = conn.begin().await?;
        let row = build_query(&q).fetch_one(&mut *tx).await?;
        let record = self.decode(&row)?;
        tx.commit().await?;
        Ok(record)
    }

    /// One `INSERT ... RETURNING` per record in a single transaction, so generated keys come back.
    async fn insert_many(
        &self,
        conn: &mut SqlConnection,
        records: Vec<Fields>,
        _options: &Options,
    ) -> Result<Vec<Fields>, AppError> {
        for fields in &records {
            self.validator.validate(fields)?;
        }
        let dialect = conn.dialect();
        let mut tx = conn.begin().await?;
        let mut created = Vec::with_capacity(records.len());
        for fields in &records {
            let q = sql::insert(&self.model, dialect, fields);
            let row = build_query(&q).fetch_one(&mut *tx).await?;
            created.push(self.decode(&row)?);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn modify_one(
        &self,
        conn: &mut SqlConnection,
        record_id: &Value,
        changes: Fields,
        _options: &Options,
    ) -> Result<Option<Fields>, AppError> {
        self.validator.validate_partial(&changes)?;
        let q = sql::update_by_id(&self.model, conn.dialect(), record_id, &changes)?;
        let mut tx = conn.begin().await?;
        let row = build_query(&q).fetch_optional(&mut *tx).await?;
        let record = row.map(|r| self.decode(&r)).transpose()?;
        tx.commit().await?;
        Ok(record)
    }

    async fn modify_many(
        &self,
        conn: &mut SqlConnection,
        changes: Fields,
        selection: &Selection<Criterion>,
        _options: &Options,
    ) -> Result<Vec<Fields>, AppError> {
        self.validator.validate_partial(&changes)?;
        let dialect = conn.dialect();
        let mut tx = conn.begin().await?;
        let mut affected = self.snapshot(&mut tx, dialect, selection).await?;
        if let Some(q) = sql::update_matching(
            &self.model,
            dialect,
            &changes,
            &selection.criteria,
            &selection.filters,
        )? {
            let result = build_query(&q).execute(&mut *tx).await?;
            tracing::debug!(model = %self.model.name, rows = result.rows_affected(), "bulk update");
        }
        tx.commit().await?;

        let merged: Vec<(&String, Value)> = changes
            .iter()
            .filter_map(|(name, value)| {
                let c = self.model.column_named(name)?;
                (!c.primary_key).then(|| (name, canonical_value(value.clone(), c.type_)))
            })
            .collect();
        for record in &mut affected {
            for (name, value) in &merged {
                record.insert((*name).clone(), value.clone());
            }
        }
        Ok(affected)
    }

    async fn delete_one(
        &self,
        conn: &mut SqlConnection,
        record_id: &Value,
        _options: &Options,
    ) -> Result<Option<Fields>, AppError> {
        let q = sql::delete_by_id(&self.model, conn.dialect(), record_id)?;
        let mut tx = conn.begin().await?;
        let row = build_query(&q).fetch_optional(&mut *tx).await?;
        let record = row.map(|r| self.decode(&r)).transpose()?;
        tx.commit().await?;
        Ok(record)
    }

    async fn delete_many(
        &self,
        conn: &mut SqlConnection,
        selection: &Selection<Criterion>,
        _options: &Options,
    ) -> Result<Vec<Fields>, AppError> {
        let dialect = conn.dialect();
        let mut tx = conn.begin().await?;
        let affected = self.snapshot(&mut tx, dialect, selection).await?;
        let q = sql::delete_matching(&self.model, dialect, &selection.criteria, &selection.filters)?;
        let result = build_query(&q).execute(&mut *tx).await?;
        tracing::debug!(model = %self.model.name, rows = result.rows_affected(), "bulk delete");
        tx.commit().await?;
        Ok(affected)
    }
}
