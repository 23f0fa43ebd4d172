//! Common routes: health, readiness, version.

use super::Endpoint;
use crate::datasource::{DataSource, SqlDataSource};
use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'static str>,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn ping(datasource: &SqlDataSource) -> Result<(), crate::error::AppError> {
    let mut conn = datasource.connect().await?;
    sqlx::query("SELECT 1").fetch_optional(&mut *conn).await?;
    Ok(())
}

async fn ready(State(datasource): State<Arc<SqlDataSource>>) -> Result<Json<ReadyBody>, (StatusCode, Json<ReadyBody>)> {
    if let Err(e) = ping(&datasource).await {
        tracing::warn!(error = %e, "readiness check failed");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyBody {
                status: "degraded",
                database: Some("unavailable"),
            }),
        ));
    }
    Ok(Json(ReadyBody {
        status: "ok",
        database: Some("ok"),
    }))
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Common routes (no data source): GET /health, GET /version.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}

/// Common routes plus GET /ready, which checks the data source with `SELECT 1`.
pub fn common_routes_with_ready(datasource: Arc<SqlDataSource>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .with_state(datasource)
}

pub fn common_endpoints(with_ready: bool) -> Vec<Endpoint> {
    let mut endpoints = vec![
        Endpoint::new(Method::GET, "/health", "health"),
        Endpoint::new(Method::GET, "/version", "version"),
    ];
    if with_ready {
        endpoints.push(Endpoint::new(Method::GET, "/ready", "ready"));
    }
    endpoints
}
