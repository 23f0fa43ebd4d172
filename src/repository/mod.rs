//! Generic CRUD repository contract.
//!
//! A concrete repository implements eight store primitives and two hooks. The
//! eight public operations are provided: each acquires one scoped connection,
//! delegates to its primitive, converts every record to the output DTO, and
//! releases the connection on the way out (the guard drops on every path).
//!
//! Input DTOs are anything `Serialize` that flattens to a JSON object. Partial
//! update DTOs should skip absent fields (`#[serde(skip_serializing_if = "Option::is_none")]`)
//! so that only the fields actually present are written.

pub mod sql;

use crate::datasource::DataSource;
use crate::error::AppError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

pub use sql::SqlRepository;

/// Flattened DTO: field name to value.
pub type Fields = Map<String, Value>;
/// Equality filters, ANDed together and with the criteria. Keys are unique.
pub type Filters = BTreeMap<String, Value>;
/// Named extras forwarded verbatim to the store primitives.
pub type Options = HashMap<String, Value>;

type Connection<R> = <<R as Repository>::Source as DataSource>::Connection;

/// Which records an operation applies to: `criteria AND filters`.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection<C> {
    pub criteria: Vec<C>,
    pub filters: Filters,
}

impl<C> Default for Selection<C> {
    fn default() -> Self {
        Selection {
            criteria: Vec::new(),
            filters: Filters::new(),
        }
    }
}

impl<C> Selection<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn criterion(mut self, c: impl Into<C>) -> Self {
        self.criteria.push(c.into());
        self
    }

    /// Require `field == value`. A repeated field replaces the earlier value.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty() && self.filters.is_empty()
    }
}

/// Flatten a DTO into its field map.
pub fn to_fields<D: Serialize + ?Sized>(dto: &D) -> Result<Fields, AppError> {
    match serde_json::to_value(dto).map_err(|e| AppError::BadRequest(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::BadRequest(format!("expected an object, got {}", other))),
    }
}

#[async_trait]
pub trait Repository: Send + Sync {
    type Source: DataSource;
    type Record: Send;
    type Criterion: Send + Sync;
    type Dto: Send;

    fn datasource(&self) -> &Self::Source;

    /// Build the output DTO from a store record. Failing here is a defect, not a business error.
    fn to_output_dto(&self, record: Self::Record) -> Result<Self::Dto, AppError>;

    async fn find_one(
        &self,
        conn: &mut Connection<Self>,
        record_id: &Value,
        options: &Options,
    ) -> Result<Option<Self::Record>, AppError>;

    async fn find_many(
        &self,
        conn: &mut Connection<Self>,
        selection: &Selection<Self::Criterion>,
        skip: u64,
        limit: Option<u64>,
        options: &Options,
    ) -> Result<Vec<Self::Record>, AppError>;

    async fn insert_one(
        &self,
        conn: &mut Connection<Self>,
        fields: Fields,
        options: &Options,
    ) -> Result<Self::Record, AppError>;

    async fn insert_many(
        &self,
        conn: &mut Connection<Self>,
        records: Vec<Fields>,
        options: &Options,
    ) -> Result<Vec<Self::Record>, AppError>;

    async fn modify_one(
        &self,
        conn: &mut Connection<Self>,
        record_id: &Value,
        changes: Fields,
        options: &Options,
    ) -> Result<Option<Self::Record>, AppError>;

    /// Returns the matching records as they were before the change, with `changes` merged in.
    async fn modify_many(
        &self,
        conn: &mut Connection<Self>,
        changes: Fields,
        selection: &Selection<Self::Criterion>,
        options: &Options,
    ) -> Result<Vec<Self::Record>, AppError>;

    async fn delete_one(
        &self,
        conn: &mut Connection<Self>,
        record_id: &Value,
        options: &Options,
    ) -> Result<Option<Self::Record>, AppError>;

    /// Returns the matching records as they were immediately before deletion.
    async fn delete_many(
        &self,
        conn: &mut Connection<Self>,
        selection: &Selection<Self::Criterion>,
        options: &Options,
    ) -> Result<Vec<Self::Record>, AppError>;

    fn to_output_dtos(&self, records: Vec<Self::Record>) -> Result<Vec<Self::Dto>, AppError> {
        records.into_iter().map(|r| self.to_output_dto(r)).collect()
    }

    async fn get_one(&self, record_id: &Value, options: &Options) -> Result<Self::Dto, AppError> {
        let mut conn = self.datasource().connect().await?;
        let record = self
            .find_one(&mut conn, record_id, options)
            .await?
            .ok_or_else(|| AppError::record_not_found(record_id))?;
        self.to_output_dto(record)
    }

    async fn get_many(
        &self,
        selection: &Selection<Self::Criterion>,
        skip: u64,
        limit: Option<u64>,
        options: &Options,
    ) -> Result<Vec<Self::Dto>, AppError> {
        let mut conn = self.datasource().connect().await?;
        let records = self.find_many(&mut conn, selection, skip, limit, options).await?;
        self.to_output_dtos(records)
    }

    async fn create_one<D>(&self, record: &D, options: &Options) -> Result<Self::Dto, AppError>
    where
        D: Serialize + Sync + ?Sized,
    {
        let fields = to_fields(record)?;
        let mut conn = self.datasource().connect().await?;
        let record = self.insert_one(&mut conn, fields, options).await?;
        self.to_output_dto(record)
    }

    async fn create_many<D>(&self, records: &[D], options: &Options) -> Result<Vec<Self::Dto>, AppError>
    where
        D: Serialize + Sync,
    {
        let fields = records.iter().map(to_fields).collect::<Result<Vec<_>, _>>()?;
        let mut conn = self.datasource().connect().await?;
        let records = self.insert_many(&mut conn, fields, options).await?;
        self.to_output_dtos(records)
    }

    async fn update_one<D>(&self, record_id: &Value, record: &D, options: &Options) -> Result<Self::Dto, AppError>
    where
        D: Serialize + Sync + ?Sized,
    {
        let changes = to_fields(record)?;
        let mut conn = self.datasource().connect().await?;
        let record = self
            .modify_one(&mut conn, record_id, changes, options)
            .await?
            .ok_or_else(|| AppError::record_not_found(record_id))?;
        self.to_output_dto(record)
    }

    async fn update_many<D>(
        &self,
        record: &D,
        selection: &Selection<Self::Criterion>,
        options: &Options,
    ) -> Result<Vec<Self::Dto>, AppError>
    where
        D: Serialize + Sync + ?Sized,
    {
        let changes = to_fields(record)?;
        let mut conn = self.datasource().connect().await?;
        let records = self.modify_many(&mut conn, changes, selection, options).await?;
        self.to_output_dtos(records)
    }

    async fn remove_one(&self, record_id: &Value, options: &Options) -> Result<Self::Dto, AppError> {
        let mut conn = self.datasource().connect().await?;
        let record = self
            .delete_one(&mut conn, record_id, options)
            .await?
            .ok_or_else(|| AppError::record_not_found(record_id))?;
        self.to_output_dto(record)
    }

    async fn remove_many(
        &self,
        selection: &Selection<Self::Criterion>,
        options: &Options,
    ) -> Result<Vec<Self::Dto>, AppError> {
        let mut conn = self.datasource().connect().await?;
        let records = self.delete_many(&mut conn, selection, options).await?;
        self.to_output_dtos(records)
    }
}
