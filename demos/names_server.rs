//! Names service: a generated CRUD route set plus a handwritten one.
//!
//! Run from repo root: `cargo run --example names_server`
//! Configure with `DATABASE_URL`, `BIND_ADDR`, `APP_SETTINGS` (a `.env` file is read too).

use async_trait::async_trait;
use axum::{extract::Path, http::Method, routing::get, Router};
use lilly::{
    do_action, init_tracing, Action, ActionFactory, AppError, AppSettings, BoxAction, ColumnSpec, ColumnType,
    CrudRouteSet, CrudRouteSetSettings, Endpoint, Lilly, ModelSpec, RouteSet, SqlDataSource, SqlRepository,
    ValidationRule,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Name {
    id: i64,
    title: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct NewName {
    title: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct NamePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

fn names_model() -> ModelSpec {
    ModelSpec::new("names")
        .column(ColumnSpec::primary_key("id", ColumnType::Integer))
        .column(ColumnSpec::new("title", ColumnType::Text).not_null().rule(ValidationRule {
            min_length: Some(1),
            max_length: Some(100),
            ..ValidationRule::default()
        }))
}

struct Greet {
    who: String,
}

#[async_trait]
impl Action for Greet {
    type Output = String;

    async fn run(&self) -> Result<String, AppError> {
        Ok(format!("Hello, {}!", self.who))
    }
}

/// `GET /` and `GET /hello/:name`, answered by the greeting action.
struct GreetingRouteSet {
    greet: ActionFactory<String, String>,
}

impl RouteSet for GreetingRouteSet {
    fn router(&self) -> Router {
        let root = self.greet.clone();
        let named = self.greet.clone();
        Router::new()
            .route(
                "/",
                get(move || {
                    let f = root.clone();
                    async move { do_action(&f, "world".to_string()).await }
                }),
            )
            .route(
                "/hello/:name",
                get(move |Path(name): Path<String>| {
                    let f = named.clone();
                    async move { do_action(&f, name).await }
                }),
            )
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![
            Endpoint::new(Method::GET, "/", "greet"),
            Endpoint::new(Method::GET, "/hello/:name", "greet_by_name"),
        ]
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing("lilly=info,names_server=info");

    let settings = AppSettings::from_env()?;
    let datasource = Arc::new(SqlDataSource::new(&settings.database, vec![names_model()])?);
    let repository = Arc::new(SqlRepository::<Name>::new(Arc::clone(&datasource), "names")?);

    let names = CrudRouteSet::new(
        CrudRouteSetSettings::<NewName, NamePatch, Name>::for_repository("/names", "/admin/names", repository)
            .searchable(["title"]),
    )?;
    let greetings = GreetingRouteSet {
        greet: Arc::new(|who: String| -> BoxAction<String> { Box::new(Greet { who }) }),
    };

    let app = Lilly::new(settings)
        .datasource(datasource)
        .route_set(names)
        .route_set(greetings);
    app.serve().await?;
    Ok(())
}
