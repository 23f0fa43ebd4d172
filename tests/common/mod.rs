//! Shared fixtures: the "names" model, its DTOs, and ten seeded records.
#![allow(dead_code)]

use lilly::{
    ColumnSpec, ColumnType, CrudRouteSet, CrudRouteSetSettings, DataSource, DataSourceConfig, ModelSpec,
    SqlDataSource, SqlRepository,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameDto {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameCreate {
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

pub type NamesRepository = SqlRepository<NameDto>;
pub type NamesRouteSet = CrudRouteSet<NameCreate, NamePatch, NameDto>;

pub const MOCK_NAME_RECORDS: [(i64, &str); 10] = [
    (1, "Doe"),
    (2, "Roe"),
    (3, "Doe"),
    (4, "Roe"),
    (5, "Doe"),
    (6, "Doe"),
    (7, "Roe"),
    (8, "Roe"),
    (9, "Doe"),
    (10, "Roe"),
];

pub fn name(id: i64, title: &str) -> NameDto {
    NameDto {
        id,
        title: title.to_string(),
    }
}

pub fn mock_names() -> Vec<NameDto> {
    MOCK_NAME_RECORDS.iter().map(|(id, t)| name(*id, t)).collect()
}

pub fn names_model() -> ModelSpec {
    ModelSpec::new("names")
        .column(ColumnSpec::primary_key("id", ColumnType::Integer))
        .column(ColumnSpec::new("title", ColumnType::Text).not_null())
}

/// Fresh in-memory database; a leaked connection shows up as an acquire timeout.
pub fn memory_datasource() -> Arc<SqlDataSource> {
    let mut config = DataSourceConfig::new("sqlite::memory:");
    config.acquire_timeout = Duration::from_secs(5);
    Arc::new(SqlDataSource::new(&config, vec![names_model()]).unwrap())
}

pub async fn seed_names(ds: &SqlDataSource) {
    let mut conn = ds.connect().await.unwrap();
    for (id, title) in MOCK_NAME_RECORDS {
        sqlx::query("INSERT INTO names (id, title) VALUES ($1, $2)")
            .bind(id)
            .bind(title.to_string())
            .execute(&mut *conn)
            .await
            .unwrap();
    }
}

pub async fn seeded_datasource() -> Arc<SqlDataSource> {
    let ds = memory_datasource();
    seed_names(&ds).await;
    ds
}

/// Every stored row, read with plain SQL.
pub async fn stored_names(ds: &SqlDataSource) -> Vec<NameDto> {
    let mut conn = ds.connect().await.unwrap();
    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, title FROM names ORDER BY id")
        .fetch_all(&mut *conn)
        .await
        .unwrap();
    rows.into_iter().map(|(id, title)| NameDto { id, title }).collect()
}

pub fn names_repository(ds: &Arc<SqlDataSource>) -> Arc<NamesRepository> {
    Arc::new(SqlRepository::new(Arc::clone(ds), "names").unwrap())
}

pub fn names_settings(repo: Arc<NamesRepository>) -> CrudRouteSetSettings<NameCreate, NamePatch, NameDto> {
    CrudRouteSetSettings::for_repository("/names", "/admin/names", repo).searchable(["title"])
}

/// A model exercising every column type, keyed by a UUID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gadget {
    pub code: String,
    pub label: String,
    pub weight: Option<f64>,
    pub active: Option<bool>,
    pub stock: Option<i64>,
}

/// Keyed by free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub slug: String,
    pub note: Option<String>,
}

pub fn gadgets_model() -> ModelSpec {
    ModelSpec::new("gadgets")
        .column(ColumnSpec::primary_key("code", ColumnType::Uuid))
        .column(ColumnSpec::new("label", ColumnType::Text).not_null())
        .column(ColumnSpec::new("weight", ColumnType::Real))
        .column(ColumnSpec::new("active", ColumnType::Boolean))
        .column(ColumnSpec::new("stock", ColumnType::Integer))
}

pub fn tags_model() -> ModelSpec {
    ModelSpec::new("tags")
        .column(ColumnSpec::primary_key("slug", ColumnType::Text))
        .column(ColumnSpec::new("note", ColumnType::Text))
}

pub fn gadget_code(n: u8) -> String {
    format!("00000000-0000-0000-0000-0000000000{:02x}", n)
}

pub fn gadget(n: u8, label: &str, weight: f64, active: bool, stock: i64) -> Gadget {
    Gadget {
        code: gadget_code(n),
        label: label.to_string(),
        weight: Some(weight),
        active: Some(active),
        stock: Some(stock),
    }
}

pub fn typed_datasource() -> Arc<SqlDataSource> {
    let mut config = DataSourceConfig::new("sqlite::memory:");
    config.acquire_timeout = Duration::from_secs(5);
    Arc::new(SqlDataSource::new(&config, vec![gadgets_model(), tags_model()]).unwrap())
}
